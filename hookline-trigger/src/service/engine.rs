//! Trigger engine
//!
//! Entry point for one webhook delivery. Evaluates every enabled trigger
//! hook of every pipeline against the event and creates pipeline runs for
//! the ones that match, either directly or through an ephemeral environment.
//! A failing hook never prevents evaluation of its siblings; failures are
//! collected into one [`DispatchError`].

use std::sync::Arc;

use hookline_core::domain::discussion::DiscussionThread;
use hookline_core::domain::event::SourceEvent;
use hookline_core::domain::pipeline::{PipelineDefinition, TriggerHook};
use hookline_core::domain::task::{RepositoryRef, TaskInvocationArgs, TaskSource};
use hookline_core::domain::trigger::TriggerRule;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TriggerConfig;
use crate::error::{DispatchError, TriggerError};
use crate::repository::{
    CodehostClient, DiscussionStore, EnvironmentRuntime, EnvironmentStore, ExecutionStore,
    PipelineStore,
};
use crate::service::args_factory::{EventContext, build_task_args};
use crate::service::auto_cancel::{AutoCancelCoordinator, AutoCancelRequest};
use crate::service::changeset::ChangesetResolver;
use crate::service::ephemeral::{EphemeralOrchestrator, EphemeralRequest, ProvisionedRun};
use crate::service::feedback::FeedbackSynchronizer;
use crate::service::keyed_lock::KeyedLock;
use crate::service::matcher::{HookMatcher, MatchOutcome};

/// Collaborators the engine is wired with by the hosting process
#[derive(Clone)]
pub struct Collaborators {
    pub pipelines: Arc<dyn PipelineStore>,
    pub environments: Arc<dyn EnvironmentStore>,
    pub runtime: Arc<dyn EnvironmentRuntime>,
    pub executions: Arc<dyn ExecutionStore>,
    pub discussions: Arc<dyn DiscussionStore>,
    pub codehost: Arc<dyn CodehostClient>,
}

/// Dispatches source-control events to pipeline runs
pub struct TriggerEngine {
    pipelines: Arc<dyn PipelineStore>,
    environments: Arc<dyn EnvironmentStore>,
    executions: Arc<dyn ExecutionStore>,
    changes: ChangesetResolver,
    auto_cancel: AutoCancelCoordinator,
    feedback: Arc<FeedbackSynchronizer>,
    ephemeral: EphemeralOrchestrator,
    /// Serializes cancel-then-create per merge request and pipeline
    run_locks: KeyedLock,
    config: TriggerConfig,
}

impl TriggerEngine {
    pub fn new(collaborators: Collaborators, config: TriggerConfig) -> Self {
        Self::with_shutdown(collaborators, config, CancellationToken::new())
    }

    /// Creates an engine whose environment waits stop when `shutdown` fires
    pub fn with_shutdown(
        collaborators: Collaborators,
        config: TriggerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let Collaborators {
            pipelines,
            environments,
            runtime,
            executions,
            discussions,
            codehost,
        } = collaborators;

        let feedback = Arc::new(FeedbackSynchronizer::new(
            Arc::clone(&codehost),
            discussions,
            config.base_uri.clone(),
        ));
        let ephemeral = EphemeralOrchestrator::new(
            Arc::clone(&environments),
            runtime,
            Arc::clone(&executions),
            Arc::clone(&feedback),
            config.clone(),
            shutdown,
        );

        Self {
            pipelines,
            environments,
            auto_cancel: AutoCancelCoordinator::new(Arc::clone(&executions)),
            executions,
            changes: ChangesetResolver::new(codehost),
            feedback,
            ephemeral,
            run_locks: KeyedLock::new(),
            config,
        }
    }

    /// Triggers every pipeline the event matches
    ///
    /// # Arguments
    /// * `event` - Parsed webhook delivery
    /// * `request_id` - Correlation id stamped on created runs and environments
    ///
    /// # Returns
    /// `Ok(())` when every hook either matched and triggered or did not match
    pub async fn dispatch(&self, event: &SourceEvent, request_id: &str) -> Result<(), DispatchError> {
        let matcher = HookMatcher::for_event(event);
        let mut errors = DispatchError::new();

        let pipelines = match self.pipelines.list_pipelines().await {
            Ok(pipelines) => pipelines,
            Err(e) => {
                error!("Failed to list pipelines: {}", e);
                errors.push(e.into());
                return errors.into_result();
            }
        };

        debug!(
            project = %matcher.project_path(),
            event = ?matcher.hook_event(),
            pipelines = pipelines.len(),
            "Dispatching event"
        );

        for pipeline in &pipelines {
            for hook in pipeline.enabled_hooks() {
                self.trigger_hook(&matcher, pipeline, hook, request_id, &mut errors)
                    .await;
            }
        }

        if !errors.is_empty() {
            warn!(
                project = %matcher.project_path(),
                errors = errors.len(),
                "Dispatch finished with errors"
            );
        }

        errors.into_result()
    }

    async fn trigger_hook(
        &self,
        matcher: &HookMatcher<'_>,
        pipeline: &PipelineDefinition,
        hook: &TriggerHook,
        request_id: &str,
        errors: &mut DispatchError,
    ) {
        let Some(template) = &hook.task_args else {
            return;
        };

        let mut rule = hook.main_repo.clone();
        match matcher.evaluate(&mut rule, &self.changes).await {
            MatchOutcome::Matched => {}
            MatchOutcome::NotMatched => return,
            MatchOutcome::Failed(e) => {
                errors.push(e);
                return;
            }
        }

        info!(
            pipeline = %pipeline.name,
            project = %rule.project_path(),
            branch = %rule.branch,
            "Trigger rule matched"
        );

        let namespace = template.primary_namespace();
        let environment = match self
            .environments
            .find_environment(&pipeline.product_tmpl_name, namespace)
            .await
        {
            Ok(Some(environment)) => environment,
            Ok(None) => {
                warn!(
                    pipeline = %pipeline.name,
                    product = %pipeline.product_tmpl_name,
                    env = %namespace,
                    "Target environment not found, skipping trigger"
                );
                return;
            }
            Err(e) => {
                errors.push(e.into());
                return;
            }
        };

        let mut thread = None;
        let mut run_guard = None;
        if let Some(merge_request) = matcher.merge_request() {
            // Held until the new run exists, so a racing delivery sees it in flight.
            run_guard = Some(
                self.run_locks
                    .lock(&run_key(&rule, merge_request.iid, &pipeline.name))
                    .await,
            );

            let merge_request_id = merge_request.iid.to_string();
            let cancel = AutoCancelRequest {
                merge_request_id: &merge_request_id,
                commit_id: matcher.commit_id(),
                pipeline_name: &pipeline.name,
                rule: &rule,
            };
            if let Err(e) = self.auto_cancel.cancel_stale(cancel).await {
                warn!(pipeline = %pipeline.name, "Auto-cancel incomplete: {}", e);
                errors.push(e);
            }

            match self.feedback.ensure_thread(&rule, merge_request).await {
                Ok(ensured) => thread = Some(ensured),
                Err(e) => warn!(
                    pipeline = %pipeline.name,
                    merge_request = merge_request.iid,
                    "Failed to ensure discussion thread: {}", e
                ),
            }
        }

        let repository = RepositoryRef {
            codehost_id: rule.codehost_id,
            repo_owner: rule.repo_owner.clone(),
            repo_name: rule.repo_name.clone(),
            branch: rule.branch.clone(),
            pr: matcher.pr_id(),
        };
        let mut args = build_task_args(
            &EventContext {
                environment: &environment,
                repository: &repository,
                request_id,
            },
            template,
        );
        stamp_event(&mut args, matcher, pipeline, thread.as_ref());

        let created = if args.is_ephemeral() && matcher.merge_request().is_some() {
            self.ephemeral
                .provision(EphemeralRequest {
                    args,
                    request_id: request_id.to_string(),
                    thread,
                })
                .await
                .map(Some)
        } else {
            self.create_task(args).await.map(|()| None)
        };
        drop(run_guard);

        match created {
            Ok(Some(run)) => {
                if let Err(e) = self.supervise_ephemeral(run).await {
                    // The run exists; it was only the wait that stopped.
                    warn!(pipeline = %pipeline.name, "Stopped supervising ephemeral run: {}", e);
                    errors.push(e);
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.report_failure(&rule, &pipeline.name, &e, matcher.pr_id())
                    .await;
                errors.push(e);
            }
        }
    }

    async fn create_task(&self, args: TaskInvocationArgs) -> Result<(), TriggerError> {
        let pipeline_name = args.pipeline_name.clone();
        let created = self
            .executions
            .create_task(args, &self.config.task_creator)
            .await
            .map_err(|source| TriggerError::TaskCreation {
                pipeline: pipeline_name,
                source,
            })?;

        info!(
            pipeline = %created.pipeline_name,
            task_id = created.task_id,
            "Created task"
        );
        Ok(())
    }

    async fn supervise_ephemeral(&self, run: ProvisionedRun) -> Result<(), TriggerError> {
        let outcome = self.ephemeral.supervise(run).await?;

        info!(
            pipeline = %outcome.task.pipeline_name,
            task_id = outcome.task.task_id,
            env = %outcome.env_name,
            status = %outcome.terminal_status,
            state = %outcome.final_state,
            "Ephemeral run finished"
        );
        Ok(())
    }

    async fn report_failure(&self, rule: &TriggerRule, pipeline_name: &str, err: &TriggerError, pr_id: u64) {
        error!(pipeline = %pipeline_name, "Failed to trigger pipeline: {}", err);

        if let Err(e) = self
            .feedback
            .post_failure(rule, pipeline_name, err, pr_id)
            .await
        {
            warn!(pipeline = %pipeline_name, "Failed to post failure comment: {}", e);
        }
    }
}

fn run_key(rule: &TriggerRule, iid: u64, pipeline_name: &str) -> String {
    format!("{}:{}!{}#{}", rule.codehost_id, rule.project_path(), iid, pipeline_name)
}

fn stamp_event(
    args: &mut TaskInvocationArgs,
    matcher: &HookMatcher<'_>,
    pipeline: &PipelineDefinition,
    thread: Option<&DiscussionThread>,
) {
    args.pipeline_name = pipeline.name.clone();
    args.commit_id = matcher.commit_id().to_string();
    args.merge_request_id = matcher
        .merge_request()
        .map(|mr| mr.iid.to_string())
        .unwrap_or_default();
    args.source = TaskSource::Gitlab;
    args.notification_id = thread.map(|t| t.id);
}
