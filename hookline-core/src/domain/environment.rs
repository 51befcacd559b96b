//! Runtime environment domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Runtime environment of a product
///
/// Base environments are operator-managed; ephemeral ones are clones keyed
/// by a generated name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Store identity; cleared on clones
    pub id: Option<Uuid>,
    pub product_name: String,
    pub env_name: String,
    /// Cluster namespace the environment's workloads live in
    pub namespace: String,
    #[serde(default)]
    pub render: Option<RenderRef>,
    #[serde(default)]
    pub vars: Vec<RenderVar>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub update_by: String,
}

/// Reference to a revision of a render-variable set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRef {
    pub name: String,
    pub revision: i64,
}

/// A single render variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderVar {
    pub key: String,
    pub value: String,
}

/// Render-variable set as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSet {
    pub name: String,
    pub revision: i64,
    pub kvs: Vec<RenderVar>,
}

/// Status of an environment as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    Creating,
    Running,
    Unstable,
    Unknown,
    Deleting,
    Absent,
    Error,
}

impl EnvironmentStatus {
    /// Statuses after which a pipeline may run against the environment
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            EnvironmentStatus::Running | EnvironmentStatus::Unstable | EnvironmentStatus::Unknown
        )
    }
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnvironmentStatus::Creating => "creating",
            EnvironmentStatus::Running => "running",
            EnvironmentStatus::Unstable => "unstable",
            EnvironmentStatus::Unknown => "unknown",
            EnvironmentStatus::Deleting => "deleting",
            EnvironmentStatus::Absent => "absent",
            EnvironmentStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_statuses() {
        assert!(EnvironmentStatus::Running.is_ready());
        assert!(EnvironmentStatus::Unstable.is_ready());
        assert!(EnvironmentStatus::Unknown.is_ready());
        assert!(!EnvironmentStatus::Creating.is_ready());
        assert!(!EnvironmentStatus::Absent.is_ready());
        assert!(!EnvironmentStatus::Error.is_ready());
    }
}
