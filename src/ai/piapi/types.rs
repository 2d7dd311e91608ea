use serde::{Deserialize, Serialize};

/// Body for `POST /api/v1/task`.
#[derive(Debug, Serialize)]
pub struct TaskRequest {
    pub model: String,
    pub task_type: String,
    pub input: TaskInput,
}

#[derive(Debug, Serialize)]
pub struct TaskInput {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

/// Envelope shared by task submission and task lookup responses.
#[derive(Debug, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default)]
    pub message: String,
    pub data: Option<TaskData>,
}

#[derive(Debug, Deserialize)]
pub struct TaskData {
    pub task_id: String,
    pub status: TaskStatus,
    pub output: Option<TaskOutput>,
    pub error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
pub struct TaskOutput {
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskError {
    #[serde(default)]
    pub message: String,
}

/// Task lifecycle as reported by PiAPI. Anything that is not terminal is
/// treated as still running.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TaskStatus {
    Completed,
    Failed,
    InProgress(String),
}

impl From<String> for TaskStatus {
    fn from(status: String) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::InProgress(status),
        }
    }
}
