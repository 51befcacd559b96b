//! Task DTOs exchanged with the execution store

use serde::{Deserialize, Serialize};

/// Identity of a pipeline run returned on creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub task_id: u64,
    pub pipeline_name: String,
}
