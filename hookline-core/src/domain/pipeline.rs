//! Pipeline definition domain types

use serde::{Deserialize, Serialize};

use crate::domain::task::TaskInvocationArgs;
use crate::domain::trigger::TriggerRule;

/// Operator-managed pipeline definition
///
/// Read-only while matching events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub product_tmpl_name: String,
    #[serde(default)]
    pub hook_ctl: Option<HookControl>,
}

impl PipelineDefinition {
    /// Hooks of this pipeline, empty when webhook triggering is disabled
    pub fn enabled_hooks(&self) -> &[TriggerHook] {
        match &self.hook_ctl {
            Some(ctl) if ctl.enabled => &ctl.items,
            _ => &[],
        }
    }
}

/// Webhook trigger configuration of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookControl {
    pub enabled: bool,
    #[serde(default)]
    pub items: Vec<TriggerHook>,
}

/// A trigger rule and the invocation template it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerHook {
    pub main_repo: TriggerRule,
    #[serde(default)]
    pub task_args: Option<TaskInvocationArgs>,
}
