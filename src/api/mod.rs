pub mod client;
pub mod types;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use client::HttpApi;
pub use types::*;

/// Uniform failure shape of every backend call
#[derive(Debug, Error)]
pub enum ApiError {
    /// Backend unreachable, timed out or the connection dropped
    #[error("{0}")]
    Transport(String),

    /// Non-success HTTP status; `detail` comes from the `{detail}` body when present
    #[error("{detail}")]
    Status { status: u16, detail: String },

    /// The response body did not have the expected shape
    #[error("unexpected response from backend: {0}")]
    Decode(String),
}

impl ApiError {
    /// Human-readable text shown to the user
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Typed access to the monitor backend's REST API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `GET /api/tasks`
    async fn list_tasks(&self) -> ApiResult<Vec<Task>>;

    /// `POST /api/tasks/generate`
    async fn generate_task(&self, request: &NewTaskRequest) -> ApiResult<TaskAck>;

    /// `PATCH /api/tasks/{id}`
    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> ApiResult<TaskAck>;

    /// `DELETE /api/tasks/{id}`
    async fn delete_task(&self, id: TaskId) -> ApiResult<Ack>;

    /// `POST /api/tasks/start/{id}`
    async fn start_task(&self, id: TaskId) -> ApiResult<Ack>;

    /// `POST /api/tasks/stop/{id}`
    async fn stop_task(&self, id: TaskId) -> ApiResult<Ack>;

    /// `GET /api/results/files`
    async fn list_result_files(&self) -> ApiResult<ResultFiles>;

    /// `DELETE /api/results/files/{name}`
    async fn delete_result_file(&self, name: &str) -> ApiResult<Ack>;

    /// `GET /api/results/{name}?...`
    async fn fetch_results(&self, name: &str, query: &ResultsQuery) -> ApiResult<ResultsPage>;

    /// `GET /api/logs?from_pos={cursor}`
    async fn fetch_logs(&self, from_pos: u64) -> ApiResult<LogChunk>;

    /// `DELETE /api/logs`
    async fn clear_logs(&self) -> ApiResult<Ack>;

    async fn notification_settings(&self) -> ApiResult<NotificationSettings>;

    async fn update_notification_settings(&self, settings: &NotificationSettings) -> ApiResult<Ack>;

    async fn ai_settings(&self) -> ApiResult<AiSettings>;

    async fn update_ai_settings(&self, settings: &AiSettings) -> ApiResult<Ack>;

    /// Test the given AI settings from the client's point of view
    async fn test_ai_settings(&self, settings: &AiSettings) -> ApiResult<AiTestOutcome>;

    /// Test the AI settings the backend is currently running with
    async fn test_ai_backend(&self) -> ApiResult<AiTestOutcome>;

    async fn system_status(&self) -> ApiResult<SystemStatus>;

    async fn list_prompts(&self) -> ApiResult<Vec<String>>;

    async fn prompt(&self, file: &str) -> ApiResult<PromptFile>;

    async fn update_prompt(&self, file: &str, content: &str) -> ApiResult<Ack>;

    async fn login_state(&self) -> ApiResult<Value>;

    async fn update_login_state(&self, content: &str) -> ApiResult<Ack>;

    async fn delete_login_state(&self) -> ApiResult<Ack>;
}
