//! In-memory collaborators and fixtures for unit tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use hookline_core::domain::discussion::{DiscussionThread, ThreadKey};
use hookline_core::domain::environment::{Environment, EnvironmentStatus, RenderSet};
use hookline_core::domain::event::{MergeRequestEvent, MergeRequestState, PushEvent, SourceEvent};
use hookline_core::domain::pipeline::{HookControl, PipelineDefinition, TriggerHook};
use hookline_core::domain::task::{RunningExecution, TaskInvocationArgs, TaskStatus};
use hookline_core::domain::trigger::{HookEvent, TriggerRule};
use hookline_core::dto::feedback::{CreatedDiscussion, FileDiff, NoteUpdate};
use hookline_core::dto::task::CreatedTask;
use uuid::Uuid;

use crate::error::{CodehostError, RepositoryError};
use crate::repository::{
    CodehostClient, DiscussionStore, EnvironmentRuntime, EnvironmentStore, ExecutionStore,
    PipelineStore,
};

// Fixtures

pub fn rule(owner: &str, name: &str, branch: &str, is_regular: bool, events: &[HookEvent]) -> TriggerRule {
    TriggerRule {
        codehost_id: 1,
        repo_owner: owner.to_string(),
        repo_name: name.to_string(),
        branch: branch.to_string(),
        is_regular,
        events: events.to_vec(),
        match_folders: Vec::new(),
        auto_cancel: true,
    }
}

pub fn push_event(project: &str, git_ref: &str, before: &str, after: &str) -> SourceEvent {
    SourceEvent::Push(PushEvent {
        project_id: 1,
        path_with_namespace: project.to_string(),
        git_ref: git_ref.to_string(),
        before: before.to_string(),
        after: after.to_string(),
    })
}

pub fn merge_request_event(
    project: &str,
    iid: u64,
    target_branch: &str,
    state: MergeRequestState,
    commit: &str,
) -> SourceEvent {
    SourceEvent::MergeRequest(MergeRequestEvent {
        project_id: 1,
        target_path_with_namespace: project.to_string(),
        iid,
        source_branch: format!("feature-{}", iid),
        target_branch: target_branch.to_string(),
        state,
        last_commit_id: commit.to_string(),
    })
}

/// Opened merge request targeting `main`
pub fn opened_merge_request(project: &str, iid: u64, commit: &str) -> MergeRequestEvent {
    match merge_request_event(project, iid, "main", MergeRequestState::Opened, commit) {
        SourceEvent::MergeRequest(ev) => ev,
        SourceEvent::Push(_) => unreachable!(),
    }
}

pub fn environment(product: &str, env_name: &str) -> Environment {
    Environment {
        id: None,
        product_name: product.to_string(),
        env_name: env_name.to_string(),
        namespace: format!("{}-env-{}", product, env_name),
        render: None,
        vars: Vec::new(),
        services: vec!["api".to_string()],
        update_by: "operator".to_string(),
    }
}

/// Arguments of a run for merge request `merge_request_id` of acme/api
pub fn task_args_for(pipeline: &str, merge_request_id: &str, commit: &str) -> TaskInvocationArgs {
    TaskInvocationArgs {
        pipeline_name: pipeline.to_string(),
        codehost_id: 1,
        repo_owner: "acme".to_string(),
        repo_name: "api".to_string(),
        merge_request_id: merge_request_id.to_string(),
        commit_id: commit.to_string(),
        ..Default::default()
    }
}

pub fn pipeline(name: &str, product: &str, main_repo: TriggerRule, task_args: TaskInvocationArgs) -> PipelineDefinition {
    PipelineDefinition {
        name: name.to_string(),
        product_tmpl_name: product.to_string(),
        hook_ctl: Some(HookControl {
            enabled: true,
            items: vec![TriggerHook {
                main_repo,
                task_args: Some(task_args),
            }],
        }),
    }
}

// Pipelines

pub struct MemoryPipelines {
    pipelines: Result<Vec<PipelineDefinition>, RepositoryError>,
}

impl MemoryPipelines {
    pub fn new(pipelines: Vec<PipelineDefinition>) -> Self {
        Self {
            pipelines: Ok(pipelines),
        }
    }

    pub fn failing(err: RepositoryError) -> Self {
        Self {
            pipelines: Err(err),
        }
    }
}

#[async_trait]
impl PipelineStore for MemoryPipelines {
    async fn list_pipelines(&self) -> Result<Vec<PipelineDefinition>, RepositoryError> {
        self.pipelines.clone()
    }
}

// Environments

#[derive(Default)]
struct EnvironmentsState {
    envs: HashMap<(String, String), Environment>,
    render_sets: HashMap<(String, i64), RenderSet>,
    script: Vec<EnvironmentStatus>,
    polls: HashMap<String, usize>,
    created: Vec<Environment>,
    deleted: Vec<String>,
    fail_lookups_after_delete: bool,
}

/// Environment store and runtime in one
///
/// Clones report the scripted statuses in order, repeating the last one
/// (`Running` when nothing is scripted). Deleted environments are `Absent`.
#[derive(Default)]
pub struct MemoryEnvironments {
    state: Mutex<EnvironmentsState>,
}

impl MemoryEnvironments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, env: Environment) {
        let key = (env.product_name.clone(), env.env_name.clone());
        self.state.lock().unwrap().envs.insert(key, env);
    }

    pub fn insert_render_set(&self, set: RenderSet) {
        let key = (set.name.clone(), set.revision);
        self.state.lock().unwrap().render_sets.insert(key, set);
    }

    pub fn script_statuses(&self, statuses: &[EnvironmentStatus]) {
        self.state.lock().unwrap().script = statuses.to_vec();
    }

    pub fn fail_lookups_after_delete(&self) {
        self.state.lock().unwrap().fail_lookups_after_delete = true;
    }

    pub fn created(&self) -> Vec<Environment> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl EnvironmentStore for MemoryEnvironments {
    async fn find_environment(
        &self,
        product_name: &str,
        env_name: &str,
    ) -> Result<Option<Environment>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .envs
            .get(&(product_name.to_string(), env_name.to_string()))
            .cloned())
    }

    async fn find_render_set(
        &self,
        name: &str,
        revision: i64,
    ) -> Result<Option<RenderSet>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.render_sets.get(&(name.to_string(), revision)).cloned())
    }
}

#[async_trait]
impl EnvironmentRuntime for MemoryEnvironments {
    async fn create_environment(
        &self,
        _created_by: &str,
        _request_id: &str,
        environment: Environment,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let key = (environment.product_name.clone(), environment.env_name.clone());
        if state.envs.contains_key(&key) {
            return Err(RepositoryError::Rejected(format!(
                "environment {} already exists",
                environment.env_name
            )));
        }
        state.created.push(environment.clone());
        state.envs.insert(key, environment);
        Ok(())
    }

    async fn delete_environment(
        &self,
        _deleted_by: &str,
        product_name: &str,
        env_name: &str,
        _request_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state
            .envs
            .remove(&(product_name.to_string(), env_name.to_string()));
        state.deleted.push(env_name.to_string());
        Ok(())
    }

    async fn environment_status(
        &self,
        product_name: &str,
        env_name: &str,
    ) -> Result<EnvironmentStatus, RepositoryError> {
        let mut state = self.state.lock().unwrap();

        if state.deleted.iter().any(|name| name == env_name) {
            if state.fail_lookups_after_delete {
                return Err(RepositoryError::Unavailable("cluster unreachable".into()));
            }
            return Ok(EnvironmentStatus::Absent);
        }

        if state.created.iter().any(|env| env.env_name == env_name) {
            let polls = state.polls.entry(env_name.to_string()).or_insert(0);
            let index = *polls;
            *polls += 1;
            let status = state
                .script
                .get(index)
                .or(state.script.last())
                .copied()
                .unwrap_or(EnvironmentStatus::Running);
            return Ok(status);
        }

        let known = state
            .envs
            .contains_key(&(product_name.to_string(), env_name.to_string()));
        Ok(if known {
            EnvironmentStatus::Running
        } else {
            EnvironmentStatus::Absent
        })
    }
}

// Executions

struct StoredTask {
    args: TaskInvocationArgs,
    status: TaskStatus,
}

#[derive(Default)]
struct ExecutionsState {
    tasks: BTreeMap<u64, StoredTask>,
    next_id: u64,
    created: Vec<u64>,
    creators: Vec<String>,
    complete_with: Option<TaskStatus>,
    status_failures: usize,
    create_failures: HashMap<String, RepositoryError>,
    cancel_failure: Option<RepositoryError>,
    yield_on_access: bool,
}

impl ExecutionsState {
    fn store(&mut self, args: TaskInvocationArgs, status: TaskStatus) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.tasks.insert(id, StoredTask { args, status });
        id
    }
}

/// Execution store; task ids start at 1
#[derive(Default)]
pub struct MemoryExecutions {
    state: Mutex<ExecutionsState>,
}

impl MemoryExecutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a run that was not created through the store API
    pub fn insert(&self, args: TaskInvocationArgs, status: TaskStatus) -> u64 {
        self.state.lock().unwrap().store(args, status)
    }

    pub fn status_of(&self, task_id: u64) -> Option<TaskStatus> {
        let state = self.state.lock().unwrap();
        state.tasks.get(&task_id).map(|task| task.status)
    }

    /// Non-terminal runs jump to `status` the first time they are polled
    pub fn complete_with(&self, status: TaskStatus) {
        self.state.lock().unwrap().complete_with = Some(status);
    }

    /// Fails the next `count` status lookups
    pub fn fail_status_lookups(&self, count: usize) {
        self.state.lock().unwrap().status_failures = count;
    }

    pub fn fail_create_for(&self, pipeline_name: &str, err: RepositoryError) {
        self.state
            .lock()
            .unwrap()
            .create_failures
            .insert(pipeline_name.to_string(), err);
    }

    pub fn fail_cancel(&self, err: RepositoryError) {
        self.state.lock().unwrap().cancel_failure = Some(err);
    }

    /// Makes listing and creation give way to other tasks first, like a remote store
    pub fn yield_on_access(&self) {
        self.state.lock().unwrap().yield_on_access = true;
    }

    async fn maybe_yield(&self) {
        let yielding = self.state.lock().unwrap().yield_on_access;
        if yielding {
            tokio::task::yield_now().await;
        }
    }

    /// Arguments of runs created through the store, in creation order
    pub fn created_tasks(&self) -> Vec<TaskInvocationArgs> {
        let state = self.state.lock().unwrap();
        state
            .created
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|task| task.args.clone())
            .collect()
    }

    pub fn creators(&self) -> Vec<String> {
        self.state.lock().unwrap().creators.clone()
    }

    pub fn non_cancelled(&self) -> Vec<(u64, TaskInvocationArgs)> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .filter(|(_, task)| task.status != TaskStatus::Cancelled)
            .map(|(id, task)| (*id, task.args.clone()))
            .collect()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutions {
    async fn create_task(
        &self,
        args: TaskInvocationArgs,
        creator: &str,
    ) -> Result<CreatedTask, RepositoryError> {
        self.maybe_yield().await;
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.create_failures.get(&args.pipeline_name) {
            return Err(err.clone());
        }

        let pipeline_name = args.pipeline_name.clone();
        let task_id = state.store(args, TaskStatus::Created);
        state.created.push(task_id);
        state.creators.push(creator.to_string());

        Ok(CreatedTask {
            task_id,
            pipeline_name,
        })
    }

    async fn task_status(
        &self,
        task_id: u64,
        _pipeline_name: &str,
    ) -> Result<TaskStatus, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(RepositoryError::Unavailable("execution store timeout".into()));
        }

        let complete_with = state.complete_with;
        let task = state
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("task {}", task_id)))?;
        if let Some(status) = complete_with {
            if !task.status.is_terminal() {
                task.status = status;
            }
        }
        Ok(task.status)
    }

    async fn list_in_flight(
        &self,
        pipeline_name: &str,
    ) -> Result<Vec<RunningExecution>, RepositoryError> {
        self.maybe_yield().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .iter()
            .filter(|(_, task)| {
                task.args.pipeline_name == pipeline_name && !task.status.is_terminal()
            })
            .map(|(id, task)| RunningExecution {
                task_id: *id,
                pipeline_name: task.args.pipeline_name.clone(),
                status: task.status,
                merge_request_id: task.args.merge_request_id.clone(),
                commit_id: task.args.commit_id.clone(),
                codehost_id: task.args.codehost_id,
                repo_owner: task.args.repo_owner.clone(),
                repo_name: task.args.repo_name.clone(),
            })
            .collect())
    }

    async fn cancel_task(&self, task_id: u64, _pipeline_name: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.cancel_failure {
            return Err(err.clone());
        }
        let task = state
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("task {}", task_id)))?;
        task.status = TaskStatus::Cancelled;
        Ok(())
    }
}

// Discussions

#[derive(Default)]
pub struct MemoryDiscussions {
    threads: Mutex<HashMap<Uuid, DiscussionThread>>,
}

impl MemoryDiscussions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.lock().unwrap().len()
    }

    pub fn get(&self, id: Uuid) -> Option<DiscussionThread> {
        self.threads.lock().unwrap().get(&id).cloned()
    }

    pub fn threads(&self) -> Vec<DiscussionThread> {
        self.threads.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl DiscussionStore for MemoryDiscussions {
    async fn find_thread(&self, key: &ThreadKey) -> Result<Option<DiscussionThread>, RepositoryError> {
        let threads = self.threads.lock().unwrap();
        Ok(threads.values().find(|thread| &thread.key == key).cloned())
    }

    async fn create_thread(&self, thread: DiscussionThread) -> Result<(), RepositoryError> {
        let mut threads = self.threads.lock().unwrap();
        if threads.values().any(|existing| existing.key == thread.key) {
            return Err(RepositoryError::Rejected(format!(
                "thread for {}!{} exists",
                thread.key.project_path, thread.key.merge_request_iid
            )));
        }
        threads.insert(thread.id, thread);
        Ok(())
    }

    async fn update_thread(
        &self,
        id: Uuid,
        commit_id: &str,
        body: &str,
        resolved: bool,
    ) -> Result<(), RepositoryError> {
        let mut threads = self.threads.lock().unwrap();
        let thread = threads
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("thread {}", id)))?;
        thread.commit_id = commit_id.to_string();
        thread.body = body.to_string();
        thread.resolved = resolved;
        thread.updated_at = chrono::Utc::now();
        Ok(())
    }
}

// Code host

struct CodehostState {
    compare: Result<Vec<FileDiff>, CodehostError>,
    merge_request_changes: Result<Vec<String>, CodehostError>,
    compare_calls: usize,
    merge_request_calls: usize,
    discussions_created: usize,
    note_updates: usize,
    notes_created: usize,
    note_failure: Option<CodehostError>,
}

/// Code host with canned changesets and call counters
pub struct MemoryCodehost {
    state: Mutex<CodehostState>,
}

impl MemoryCodehost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CodehostState {
                compare: Ok(Vec::new()),
                merge_request_changes: Ok(Vec::new()),
                compare_calls: 0,
                merge_request_calls: 0,
                discussions_created: 0,
                note_updates: 0,
                notes_created: 0,
                note_failure: None,
            }),
        }
    }

    /// Pushes and merge requests both report `files` as changed
    pub fn with_changes(files: &[&str]) -> Self {
        let codehost = Self::new();
        codehost.set_compare(Ok(files
            .iter()
            .map(|file| FileDiff {
                old_path: file.to_string(),
                new_path: file.to_string(),
            })
            .collect()));
        codehost.set_merge_request_changes(Ok(files.iter().map(|file| file.to_string()).collect()));
        codehost
    }

    pub fn set_compare(&self, result: Result<Vec<FileDiff>, CodehostError>) {
        self.state.lock().unwrap().compare = result;
    }

    pub fn set_merge_request_changes(&self, result: Result<Vec<String>, CodehostError>) {
        self.state.lock().unwrap().merge_request_changes = result;
    }

    /// Fails every note edit and note creation
    pub fn fail_notes(&self, err: CodehostError) {
        self.state.lock().unwrap().note_failure = Some(err);
    }

    pub fn compare_calls(&self) -> usize {
        self.state.lock().unwrap().compare_calls
    }

    pub fn merge_request_calls(&self) -> usize {
        self.state.lock().unwrap().merge_request_calls
    }

    pub fn discussions_created(&self) -> usize {
        self.state.lock().unwrap().discussions_created
    }

    pub fn note_updates(&self) -> usize {
        self.state.lock().unwrap().note_updates
    }

    pub fn notes_created(&self) -> usize {
        self.state.lock().unwrap().notes_created
    }
}

#[async_trait]
impl CodehostClient for MemoryCodehost {
    async fn compare(
        &self,
        _codehost_id: i64,
        _project: &str,
        _before: &str,
        _after: &str,
    ) -> Result<Vec<FileDiff>, CodehostError> {
        let mut state = self.state.lock().unwrap();
        state.compare_calls += 1;
        state.compare.clone()
    }

    async fn merge_request_changes(
        &self,
        _codehost_id: i64,
        _project: &str,
        _merge_request_iid: u64,
    ) -> Result<Vec<String>, CodehostError> {
        let mut state = self.state.lock().unwrap();
        state.merge_request_calls += 1;
        state.merge_request_changes.clone()
    }

    async fn create_discussion(
        &self,
        _codehost_id: i64,
        _project: &str,
        _merge_request_iid: u64,
        _body: &str,
    ) -> Result<CreatedDiscussion, CodehostError> {
        let mut state = self.state.lock().unwrap();
        state.discussions_created += 1;
        let n = state.discussions_created;
        Ok(CreatedDiscussion {
            discussion_id: format!("d{}", n),
            note_id: Some(n as i64),
        })
    }

    async fn update_discussion_note(
        &self,
        _codehost_id: i64,
        _project: &str,
        _merge_request_iid: u64,
        _discussion_id: &str,
        _note_id: i64,
        _update: NoteUpdate,
    ) -> Result<(), CodehostError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.note_failure {
            return Err(err.clone());
        }
        state.note_updates += 1;
        Ok(())
    }

    async fn create_merge_request_note(
        &self,
        _codehost_id: i64,
        _project: &str,
        _merge_request_iid: u64,
        _body: &str,
    ) -> Result<(), CodehostError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.note_failure {
            return Err(err.clone());
        }
        state.notes_created += 1;
        Ok(())
    }
}
