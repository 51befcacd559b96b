//! Task argument construction

use hookline_core::domain::environment::Environment;
use hookline_core::domain::task::{RepositoryRef, TaskInvocationArgs};

/// Resolved identity of a matched event
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// Environment the hook targets
    pub environment: &'a Environment,
    /// Repository with the resolved branch and PR number (zero for pushes)
    pub repository: &'a RepositoryRef,
    pub request_id: &'a str,
}

/// Projects a matched event onto a hook's invocation template
///
/// Copies the template and overlays the repository, branch and PR identity.
/// Build targets checking out the same repository follow the event's branch
/// and PR. Namespace, recycle policy and every other field are left as the
/// template has them.
pub fn build_task_args(ctx: &EventContext<'_>, template: &TaskInvocationArgs) -> TaskInvocationArgs {
    let mut args = template.clone();
    let repo = ctx.repository;

    args.product_tmpl_name = ctx.environment.product_name.clone();
    args.request_id = ctx.request_id.to_string();
    args.codehost_id = repo.codehost_id;
    args.repo_owner = repo.repo_owner.clone();
    args.repo_name = repo.repo_name.clone();
    args.branch = repo.branch.clone();
    args.pr_id = repo.pr;

    for target in &mut args.targets {
        for build_repo in &mut target.repos {
            if build_repo.same_repository(repo) {
                build_repo.branch = repo.branch.clone();
                build_repo.pr = repo.pr;
            }
        }
    }

    args
}
