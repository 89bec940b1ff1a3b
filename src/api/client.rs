use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::types::*;
use super::{ApiError, ApiResult, DashboardApi};
use crate::cli::config::ApiSettings;

/// Error body the backend sends with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// `DashboardApi` over HTTP
pub struct HttpApi {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
    generate_timeout: Duration,
}

impl HttpApi {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url)
            .context(format!("Invalid backend URL: {}", settings.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend URL cannot be used as a base: {}", settings.base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        let credentials = match (&settings.username, &settings.password) {
            (Some(user), password) => Some((user.clone(), password.clone().unwrap_or_default())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url,
            credentials,
            generate_timeout: Duration::from_secs(settings.generate_timeout_secs),
        })
    }

    /// Build an endpoint URL from raw path segments, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body, mapping every failure to `ApiError`
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> ApiResult<T> {
        let response = request.send().await.map_err(|e| {
            warn!("{}: {}", fallback, e);
            ApiError::Transport(format!("{}: {}", fallback, transport_reason(&e)))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response, fallback).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", fallback, e)))
    }

    async fn status_error(status: StatusCode, response: reqwest::Response, fallback: &str) -> ApiError {
        let detail = match response.json::<ErrorBody>().await {
            Ok(ErrorBody { detail: Some(detail) }) if !detail.is_empty() => detail,
            _ => format!("{} (HTTP {})", fallback, status.as_u16()),
        };
        warn!("Backend returned {}: {}", status, detail);
        ApiError::Status {
            status: status.as_u16(),
            detail,
        }
    }
}

fn transport_reason(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "backend unreachable".to_string()
    } else {
        error.to_string()
    }
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        self.send(self.request(Method::GET, &["api", "tasks"]), "Failed to load tasks")
            .await
    }

    async fn generate_task(&self, request: &NewTaskRequest) -> ApiResult<TaskAck> {
        let builder = self
            .request(Method::POST, &["api", "tasks", "generate"])
            .timeout(self.generate_timeout)
            .json(request);
        self.send(builder, "Failed to create task with AI").await
    }

    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> ApiResult<TaskAck> {
        let id = id.to_string();
        let builder = self.request(Method::PATCH, &["api", "tasks", &id]).json(update);
        self.send(builder, "Failed to update task").await
    }

    async fn delete_task(&self, id: TaskId) -> ApiResult<Ack> {
        let id = id.to_string();
        self.send(self.request(Method::DELETE, &["api", "tasks", &id]), "Failed to delete task")
            .await
    }

    async fn start_task(&self, id: TaskId) -> ApiResult<Ack> {
        let id = id.to_string();
        self.send(
            self.request(Method::POST, &["api", "tasks", "start", &id]),
            "Failed to start task",
        )
        .await
    }

    async fn stop_task(&self, id: TaskId) -> ApiResult<Ack> {
        let id = id.to_string();
        self.send(
            self.request(Method::POST, &["api", "tasks", "stop", &id]),
            "Failed to stop task",
        )
        .await
    }

    async fn list_result_files(&self) -> ApiResult<ResultFiles> {
        self.send(
            self.request(Method::GET, &["api", "results", "files"]),
            "Failed to load result files",
        )
        .await
    }

    async fn delete_result_file(&self, name: &str) -> ApiResult<Ack> {
        self.send(
            self.request(Method::DELETE, &["api", "results", "files", name]),
            "Failed to delete result file",
        )
        .await
    }

    async fn fetch_results(&self, name: &str, query: &ResultsQuery) -> ApiResult<ResultsPage> {
        let builder = self
            .request(Method::GET, &["api", "results", name])
            .query(&query.to_pairs());
        self.send(builder, &format!("Failed to load results of {}", name))
            .await
    }

    async fn fetch_logs(&self, from_pos: u64) -> ApiResult<LogChunk> {
        let builder = self
            .request(Method::GET, &["api", "logs"])
            .query(&[("from_pos", from_pos)]);
        self.send(builder, "Failed to load logs").await
    }

    async fn clear_logs(&self) -> ApiResult<Ack> {
        self.send(self.request(Method::DELETE, &["api", "logs"]), "Failed to clear logs")
            .await
    }

    async fn notification_settings(&self) -> ApiResult<NotificationSettings> {
        self.send(
            self.request(Method::GET, &["api", "settings", "notifications"]),
            "Failed to load notification settings",
        )
        .await
    }

    async fn update_notification_settings(&self, settings: &NotificationSettings) -> ApiResult<Ack> {
        let builder = self
            .request(Method::PUT, &["api", "settings", "notifications"])
            .json(settings);
        self.send(builder, "Failed to save notification settings").await
    }

    async fn ai_settings(&self) -> ApiResult<AiSettings> {
        self.send(
            self.request(Method::GET, &["api", "settings", "ai"]),
            "Failed to load AI settings",
        )
        .await
    }

    async fn update_ai_settings(&self, settings: &AiSettings) -> ApiResult<Ack> {
        let builder = self.request(Method::PUT, &["api", "settings", "ai"]).json(settings);
        self.send(builder, "Failed to save AI settings").await
    }

    async fn test_ai_settings(&self, settings: &AiSettings) -> ApiResult<AiTestOutcome> {
        let builder = self
            .request(Method::POST, &["api", "settings", "ai", "test"])
            .json(settings);
        self.send(builder, "Failed to test AI settings").await
    }

    async fn test_ai_backend(&self) -> ApiResult<AiTestOutcome> {
        self.send(
            self.request(Method::POST, &["api", "settings", "ai", "test", "backend"]),
            "Failed to test backend AI connection",
        )
        .await
    }

    async fn system_status(&self) -> ApiResult<SystemStatus> {
        self.send(
            self.request(Method::GET, &["api", "settings", "status"]),
            "Failed to load system status",
        )
        .await
    }

    async fn list_prompts(&self) -> ApiResult<Vec<String>> {
        self.send(self.request(Method::GET, &["api", "prompts"]), "Failed to load prompts")
            .await
    }

    async fn prompt(&self, file: &str) -> ApiResult<PromptFile> {
        self.send(
            self.request(Method::GET, &["api", "prompts", file]),
            &format!("Failed to load prompt {}", file),
        )
        .await
    }

    async fn update_prompt(&self, file: &str, content: &str) -> ApiResult<Ack> {
        let builder = self
            .request(Method::PUT, &["api", "prompts", file])
            .json(&json!({ "content": content }));
        self.send(builder, &format!("Failed to save prompt {}", file))
            .await
    }

    async fn login_state(&self) -> ApiResult<Value> {
        self.send(
            self.request(Method::GET, &["api", "login-state"]),
            "Failed to load login state",
        )
        .await
    }

    async fn update_login_state(&self, content: &str) -> ApiResult<Ack> {
        let builder = self
            .request(Method::POST, &["api", "login-state"])
            .json(&json!({ "content": content }));
        self.send(builder, "Failed to update login state").await
    }

    async fn delete_login_state(&self) -> ApiResult<Ack> {
        self.send(
            self.request(Method::DELETE, &["api", "login-state"]),
            "Failed to delete login state",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> ApiSettings {
        ApiSettings {
            base_url: server.uri(),
            ..ApiSettings::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_logs_sends_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs"))
            .and(query_param("from_pos", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "new_content": "line2\n",
                "new_pos": 12
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpApi::new(&settings_for(&server)).unwrap();
        let chunk = api.fetch_logs(6).await.unwrap();

        assert_eq!(chunk.new_content, "line2\n");
        assert_eq!(chunk.new_pos, 12);
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tasks/start/3"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "task already running"})),
            )
            .mount(&server)
            .await;

        let api = HttpApi::new(&settings_for(&server)).unwrap();
        let err = api.start_task(TaskId(3)).await.unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert_eq!(err.message(), "task already running");
    }

    #[tokio::test]
    async fn test_error_without_detail_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/tasks/9"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = HttpApi::new(&settings_for(&server)).unwrap();
        let err = api.delete_task(TaskId(9)).await.unwrap_err();

        assert_eq!(err.message(), "Failed to delete task (HTTP 500)");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let settings = ApiSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..ApiSettings::default()
        };
        let api = HttpApi::new(&settings).unwrap();

        let err = api.list_tasks().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_patch_sends_partial_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/tasks/7"))
            .and(body_json(json!({"enabled": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpApi::new(&settings_for(&server)).unwrap();
        api.update_task(TaskId(7), &TaskUpdate::enabled(true)).await.unwrap();
    }

    #[tokio::test]
    async fn test_results_query_and_encoded_file_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/results/my%20cam.jsonl"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "100"))
            .and(query_param("recommended_only", "false"))
            .and(query_param("sort_by", "crawl_time"))
            .and(query_param("sort_order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_items": 0, "page": 1, "limit": 100, "items": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpApi::new(&settings_for(&server)).unwrap();
        let query = ResultsQuery {
            page: 1,
            limit: 100,
            recommended_only: false,
            sort_by: SortKey::CaptureTime,
            sort_order: SortOrder::Descending,
        };
        let page = api.fetch_results("my cam.jsonl", &query).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_basic_auth_is_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let settings = ApiSettings {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..settings_for(&server)
        };
        let api = HttpApi::new(&settings).unwrap();
        assert!(api.list_tasks().await.unwrap().is_empty());
    }
}
