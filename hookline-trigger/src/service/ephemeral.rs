//! Ephemeral environment orchestration
//!
//! Clones a base environment for a single merge request, waits for the
//! clone to become ready, runs the pipeline against it and recycles it
//! according to the hook's recycle policy.
//!
//! States: `Idle -> Cloning -> AwaitingReady -> Healthy -> TaskRunning ->
//! TaskTerminal -> (Recycling -> Deleted) | Retained`.
//!
//! Every wait is bounded by a deadline checked on each poll and can be
//! interrupted through the orchestrator's shutdown token.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use hookline_core::domain::discussion::DiscussionThread;
use hookline_core::domain::environment::{Environment, EnvironmentStatus};
use hookline_core::domain::task::{RecyclePolicy, TaskInvocationArgs, TaskStatus};
use hookline_core::dto::feedback::StatusSummary;
use hookline_core::dto::task::CreatedTask;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TriggerConfig;
use crate::error::{RepositoryError, TriggerError};
use crate::repository::{EnvironmentRuntime, EnvironmentStore, ExecutionStore};
use crate::service::feedback::FeedbackSynchronizer;
use crate::service::keyed_lock::KeyedLock;

/// Lifecycle state of an ephemeral environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Idle,
    Cloning,
    AwaitingReady,
    Healthy,
    TaskRunning,
    TaskTerminal,
    Recycling,
    Deleted,
    Retained,
}

impl std::fmt::Display for EnvState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnvState::Idle => "idle",
            EnvState::Cloning => "cloning",
            EnvState::AwaitingReady => "awaiting_ready",
            EnvState::Healthy => "healthy",
            EnvState::TaskRunning => "task_running",
            EnvState::TaskTerminal => "task_terminal",
            EnvState::Recycling => "recycling",
            EnvState::Deleted => "deleted",
            EnvState::Retained => "retained",
        };
        write!(f, "{}", s)
    }
}

/// One pipeline run against a fresh clone of `args.base_namespace`
#[derive(Debug, Clone)]
pub struct EphemeralRequest {
    /// Fully built invocation arguments; `pr_id` must be set
    pub args: TaskInvocationArgs,
    pub request_id: String,
    /// Thread receiving status updates, if one could be ensured
    pub thread: Option<DiscussionThread>,
}

/// Result of an orchestration that got as far as creating the pipeline run
#[derive(Debug)]
pub struct EphemeralOutcome {
    pub env_name: String,
    pub task: CreatedTask,
    pub terminal_status: TaskStatus,
    pub final_state: EnvState,
    /// Failure while deleting the environment; the run itself completed
    pub recycle_error: Option<TriggerError>,
}

/// Pipeline run created inside a ready ephemeral environment
#[derive(Debug)]
pub struct ProvisionedRun {
    pub env_name: String,
    pub task: CreatedTask,
    product: String,
    policy: RecyclePolicy,
    request_id: String,
    thread: Option<DiscussionThread>,
    state: EnvState,
}

/// Drives ephemeral environments through their lifecycle
pub struct EphemeralOrchestrator {
    environments: Arc<dyn EnvironmentStore>,
    runtime: Arc<dyn EnvironmentRuntime>,
    executions: Arc<dyn ExecutionStore>,
    feedback: Arc<FeedbackSynchronizer>,
    config: TriggerConfig,
    clone_locks: KeyedLock,
    reserved_names: Mutex<HashSet<String>>,
    shutdown: CancellationToken,
}

impl EphemeralOrchestrator {
    pub fn new(
        environments: Arc<dyn EnvironmentStore>,
        runtime: Arc<dyn EnvironmentRuntime>,
        executions: Arc<dyn ExecutionStore>,
        feedback: Arc<FeedbackSynchronizer>,
        config: TriggerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            environments,
            runtime,
            executions,
            feedback,
            config,
            clone_locks: KeyedLock::new(),
            reserved_names: Mutex::new(HashSet::new()),
            shutdown,
        }
    }

    /// Runs the full lifecycle for one request
    ///
    /// Errors before the pipeline run is created (missing base, clone
    /// submission, readiness timeout, task creation) are returned. A timed
    /// out environment is left in place for inspection. Recycling failures
    /// are reported in the outcome instead.
    pub async fn run(&self, request: EphemeralRequest) -> Result<EphemeralOutcome, TriggerError> {
        let run = self.provision(request).await?;
        self.supervise(run).await
    }

    /// Clones the environment, waits for it and creates the pipeline run in it
    ///
    /// Returns once the run exists. Callers that must serialize run creation
    /// hold their lock across this call and release it before [`supervise`].
    ///
    /// [`supervise`]: EphemeralOrchestrator::supervise
    pub async fn provision(&self, request: EphemeralRequest) -> Result<ProvisionedRun, TriggerError> {
        let EphemeralRequest {
            mut args,
            request_id,
            thread,
        } = request;
        let product = args.product_tmpl_name.clone();
        let policy = args.env_recycle_policy;
        let mut state = EnvState::Idle;

        advance(&mut state, EnvState::Cloning, &product, "-");
        let reservation = self.clone_environment(&args, &request_id).await?;
        let env_name = reservation.env_name().to_string();

        advance(&mut state, EnvState::AwaitingReady, &product, &env_name);
        self.wait_ready(&product, &env_name, policy, thread.as_ref())
            .await?;

        advance(&mut state, EnvState::Healthy, &product, &env_name);
        args.namespace = env_name.clone();
        let pipeline_name = args.pipeline_name.clone();
        let task = self
            .executions
            .create_task(args, &self.config.task_creator)
            .await
            .map_err(|source| TriggerError::TaskCreation {
                pipeline: pipeline_name,
                source,
            })?;
        // The environment exists in the store now; the name no longer needs holding.
        drop(reservation);

        info!(
            pipeline = %task.pipeline_name,
            task_id = task.task_id,
            env = %env_name,
            "Created task against ephemeral environment"
        );

        advance(&mut state, EnvState::TaskRunning, &product, &env_name);
        Ok(ProvisionedRun {
            env_name,
            task,
            product,
            policy,
            request_id,
            thread,
            state,
        })
    }

    /// Waits for a provisioned run to finish and recycles its environment
    ///
    /// Only shutdown makes this fail; the run keeps going on the execution
    /// engine in that case and the environment is left in place.
    pub async fn supervise(&self, run: ProvisionedRun) -> Result<EphemeralOutcome, TriggerError> {
        let ProvisionedRun {
            env_name,
            task,
            product,
            policy,
            request_id,
            thread,
            mut state,
        } = run;
        let thread = thread.as_ref();

        let terminal_status = self
            .wait_task_terminal(&task, &product, &env_name, policy, thread)
            .await?;

        advance(&mut state, EnvState::TaskTerminal, &product, &env_name);
        let mut recycle_error = None;

        if policy.should_recycle(terminal_status) {
            advance(&mut state, EnvState::Recycling, &product, &env_name);
            match self
                .recycle(&product, &env_name, &request_id, policy, thread)
                .await
            {
                Ok(()) => advance(&mut state, EnvState::Deleted, &product, &env_name),
                Err(e) => {
                    error!(
                        product = %product,
                        env = %env_name,
                        "Failed to recycle ephemeral environment: {}", e
                    );
                    recycle_error = Some(e);
                }
            }
        } else {
            advance(&mut state, EnvState::Retained, &product, &env_name);
            warn!(
                product = %product,
                env = %env_name,
                policy = ?policy,
                status = %terminal_status,
                "Retaining ephemeral environment; it must be deleted manually"
            );
        }

        Ok(EphemeralOutcome {
            env_name,
            task,
            terminal_status,
            final_state: state,
            recycle_error,
        })
    }

    /// Clones the base environment under a per-base lock and submits the clone
    async fn clone_environment(
        &self,
        args: &TaskInvocationArgs,
        request_id: &str,
    ) -> Result<NameReservation<'_>, TriggerError> {
        let product = args.product_tmpl_name.as_str();
        let base_name = args.base_namespace.trim();

        let _guard = self
            .clone_locks
            .lock(&format!("{}/{}", product, base_name))
            .await;

        let base = self
            .environments
            .find_environment(product, base_name)
            .await?
            .ok_or_else(|| {
                TriggerError::ConfigurationGap(format!(
                    "base environment {} of {} not found",
                    base_name, product
                ))
            })?;

        let mut clone = base.clone();
        if let Some(render) = &base.render {
            match self
                .environments
                .find_render_set(&render.name, render.revision)
                .await?
            {
                Some(set) => clone.vars = set.kvs,
                None => warn!(
                    product = %product,
                    env = %base_name,
                    render = %render.name,
                    revision = render.revision,
                    "Render set of base environment not found, cloning its own vars"
                ),
            }
        }

        let reservation = self.reserve_name(product, args.pr_id).await?;
        apply_clone_identity(&mut clone, reservation.env_name(), &self.config.system_user);

        self.runtime
            .create_environment(&self.config.system_user, request_id, clone)
            .await?;

        info!(
            product = %product,
            base = %base_name,
            env = %reservation.env_name(),
            "Submitted ephemeral environment"
        );

        Ok(reservation)
    }

    /// Picks a name not taken in the store nor by a concurrent clone
    async fn reserve_name(
        &self,
        product: &str,
        pr_id: u64,
    ) -> Result<NameReservation<'_>, TriggerError> {
        for _ in 0..self.config.name_attempts {
            let candidate = generate_env_name(pr_id);
            let key = format!("{}/{}", product, candidate);

            let fresh = self
                .reserved_names
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.clone());
            if !fresh {
                continue;
            }
            let reservation = NameReservation {
                names: &self.reserved_names,
                key,
                env_name: candidate,
            };

            match self
                .environments
                .find_environment(product, reservation.env_name())
                .await?
            {
                None => return Ok(reservation),
                Some(_) => debug!(env = %reservation.env_name(), "Environment name taken, retrying"),
            }
        }

        Err(RepositoryError::Rejected(format!(
            "no free environment name for {} after {} attempts",
            product, self.config.name_attempts
        ))
        .into())
    }

    /// Polls the runtime until the environment reports a ready status
    async fn wait_ready(
        &self,
        product: &str,
        env_name: &str,
        policy: RecyclePolicy,
        thread: Option<&DiscussionThread>,
    ) -> Result<(), TriggerError> {
        let deadline = Instant::now() + self.config.env_start_timeout;

        loop {
            match self.runtime.environment_status(product, env_name).await {
                Ok(status) => {
                    let summary = StatusSummary::new(product, policy)
                        .with_env(env_name)
                        .with_env_status(status);
                    self.feedback.sync_status(thread, &summary).await;

                    if status.is_ready() {
                        info!(env = %env_name, status = %status, "Ephemeral environment ready");
                        return Ok(());
                    }
                    debug!(env = %env_name, status = %status, "Waiting for environment");
                }
                Err(e) => warn!(env = %env_name, "Environment status lookup failed, retrying: {}", e),
            }

            if Instant::now() >= deadline {
                error!(
                    product = %product,
                    env = %env_name,
                    "Environment not ready in time, leaving it for inspection"
                );
                return Err(TriggerError::Timeout {
                    product: product.to_string(),
                    env_name: env_name.to_string(),
                    action: "become ready",
                    timeout: self.config.env_start_timeout,
                });
            }

            let wake = (Instant::now() + self.config.env_poll_interval).min(deadline);
            self.sleep_or_cancel(wake, env_name).await?;
        }
    }

    /// Polls the execution store until the run reaches a terminal status
    async fn wait_task_terminal(
        &self,
        task: &CreatedTask,
        product: &str,
        env_name: &str,
        policy: RecyclePolicy,
        thread: Option<&DiscussionThread>,
    ) -> Result<TaskStatus, TriggerError> {
        let mut last_status = None;

        loop {
            match self
                .executions
                .task_status(task.task_id, &task.pipeline_name)
                .await
            {
                Ok(status) => {
                    if last_status != Some(status) {
                        let summary = StatusSummary::new(product, policy)
                            .with_env(env_name)
                            .with_env_status(EnvironmentStatus::Running)
                            .with_task(task.task_id, status);
                        self.feedback.sync_status(thread, &summary).await;
                        last_status = Some(status);
                    }
                    if status.is_terminal() {
                        info!(
                            pipeline = %task.pipeline_name,
                            task_id = task.task_id,
                            status = %status,
                            "Task finished"
                        );
                        return Ok(status);
                    }
                }
                Err(e) => warn!(
                    pipeline = %task.pipeline_name,
                    task_id = task.task_id,
                    "Task status lookup failed, retrying: {}", e
                ),
            }

            let wake = Instant::now() + self.config.task_poll_interval;
            self.sleep_or_cancel(wake, &format!("task {}", task.task_id))
                .await?;
        }
    }

    async fn recycle(
        &self,
        product: &str,
        env_name: &str,
        request_id: &str,
        policy: RecyclePolicy,
        thread: Option<&DiscussionThread>,
    ) -> Result<(), TriggerError> {
        self.runtime
            .delete_environment(&self.config.system_user, product, env_name, request_id)
            .await?;

        self.wait_deleted(product, env_name, policy, thread).await
    }

    /// Polls until the environment is gone
    ///
    /// A failed lookup counts as deletion.
    async fn wait_deleted(
        &self,
        product: &str,
        env_name: &str,
        policy: RecyclePolicy,
        thread: Option<&DiscussionThread>,
    ) -> Result<(), TriggerError> {
        let deadline = Instant::now() + self.config.env_start_timeout;

        loop {
            let status = match self.runtime.environment_status(product, env_name).await {
                Ok(EnvironmentStatus::Absent) => None,
                Ok(status) => Some(status),
                Err(e) => {
                    debug!(env = %env_name, "Status lookup failed after delete, assuming gone: {}", e);
                    None
                }
            };

            let summary = StatusSummary::new(product, policy).with_env(env_name);
            match status {
                None => {
                    let summary = summary.with_env_status_label("completed");
                    self.feedback.sync_status(thread, &summary).await;
                    info!(product = %product, env = %env_name, "Ephemeral environment deleted");
                    return Ok(());
                }
                Some(status) => {
                    let summary = summary.with_env_status(status);
                    self.feedback.sync_status(thread, &summary).await;
                }
            }

            if Instant::now() >= deadline {
                return Err(TriggerError::Timeout {
                    product: product.to_string(),
                    env_name: env_name.to_string(),
                    action: "be deleted",
                    timeout: self.config.env_start_timeout,
                });
            }

            let wake = (Instant::now() + self.config.env_poll_interval).min(deadline);
            self.sleep_or_cancel(wake, env_name).await?;
        }
    }

    async fn sleep_or_cancel(&self, until: Instant, waiting_for: &str) -> Result<(), TriggerError> {
        tokio::select! {
            biased;

            () = self.shutdown.cancelled() => {
                info!(waiting_for = %waiting_for, "Shutdown requested, abandoning wait");
                Err(TriggerError::Cancelled(waiting_for.to_string()))
            }
            () = tokio::time::sleep_until(until) => Ok(()),
        }
    }
}

/// Name held back from concurrent clones until dropped
struct NameReservation<'a> {
    names: &'a Mutex<HashSet<String>>,
    key: String,
    env_name: String,
}

impl NameReservation<'_> {
    fn env_name(&self) -> &str {
        &self.env_name
    }
}

impl Drop for NameReservation<'_> {
    fn drop(&mut self) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn advance(state: &mut EnvState, next: EnvState, product: &str, env_name: &str) {
    debug!(product = %product, env = %env_name, from = %state, to = %next, "Ephemeral state change");
    *state = next;
}

/// `pr-<PR>-<3 digits><3 lowercase letters>`
fn generate_env_name(pr_id: u64) -> String {
    let mut rng = rand::rng();
    let digits: u16 = rng.random_range(0..1000);
    let letters: String = (0..3).map(|_| rng.random_range(b'a'..=b'z') as char).collect();
    format!("pr-{}-{:03}{}", pr_id, digits, letters)
}

fn apply_clone_identity(clone: &mut Environment, env_name: &str, system_user: &str) {
    clone.id = None;
    clone.namespace = format!("{}-env-{}", clone.product_name, env_name);
    clone.env_name = env_name.to_string();
    clone.update_by = system_user.to_string();
}
