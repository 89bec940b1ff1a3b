//! In-memory backend used by the view tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::types::*;
use super::{ApiError, ApiResult, DashboardApi};

#[derive(Default)]
struct State {
    tasks: Vec<Task>,
    log: String,
    results: BTreeMap<String, Vec<Value>>,
    prompts: BTreeMap<String, String>,
    notifications: NotificationSettings,
    ai: AiSettings,
    login_state: Option<String>,
    calls: Vec<String>,
    failures: HashMap<&'static str, String>,
    delays: HashMap<&'static str, VecDeque<Duration>>,
}

/// A stateful stand-in for the backend that records every call
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

pub fn task(id: u64, name: &str, enabled: bool) -> Task {
    Task {
        id: TaskId(id),
        task_name: name.to_string(),
        enabled,
        keyword: format!("{} keyword", name),
        description: format!("looking for a good {}", name),
        max_pages: 3,
        personal_only: true,
        min_price: None,
        max_price: Some("1000".to_string()),
        cron: None,
        ai_prompt_base_file: "prompts/base_prompt.txt".to_string(),
        ai_prompt_criteria_file: format!("prompts/{}_criteria.txt", name),
        is_running: false,
    }
}

pub fn record(title: &str, recommended: Option<bool>) -> Value {
    json!({
        "商品信息": {"商品标题": title, "当前售价": "¥100", "商品链接": "https://example.com/item"},
        "卖家信息": {"卖家昵称": "seller"},
        "ai_analysis": {"is_recommended": recommended, "reason": "fits the criteria"},
        "爬取时间": "2024-05-02T08:30:15"
    })
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        self.state().tasks = tasks;
        self
    }

    pub fn with_result_file(self, name: &str, items: Vec<Value>) -> Self {
        self.state().results.insert(name.to_string(), items);
        self
    }

    pub fn with_prompt(self, name: &str, content: &str) -> Self {
        self.state().prompts.insert(name.to_string(), content.to_string());
        self
    }

    pub fn append_log(&self, text: &str) {
        self.state().log.push_str(text);
    }

    pub fn log(&self) -> String {
        self.state().log.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state().tasks.clone()
    }

    pub fn set_task(&self, task: Task) {
        let mut state = self.state();
        if let Some(existing) = state.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        }
    }

    /// Make every following call of `op` fail with `detail`
    pub fn fail(&self, op: &'static str, detail: &str) {
        self.state().failures.insert(op, detail.to_string());
    }

    pub fn recover(&self, op: &'static str) {
        self.state().failures.remove(op);
    }

    /// Hold the next call of `op` for `delay` before it answers
    pub fn delay_next(&self, op: &'static str, delay: Duration) {
        self.state().delays.entry(op).or_default().push_back(delay);
    }

    async fn hold(&self, op: &'static str) {
        let delay = self.state().delays.get_mut(op).and_then(|queue| queue.pop_front());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state().calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn enter(&self, op: &'static str, call: String) -> ApiResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(detail) = state.failures.get(op) {
            return Err(ApiError::Status {
                status: 500,
                detail: detail.clone(),
            });
        }
        Ok(state)
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        detail: format!("{} not found", what),
    }
}

#[async_trait]
impl DashboardApi for FakeApi {
    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        self.hold("list_tasks").await;
        let state = self.enter("list_tasks", "GET /api/tasks".to_string())?;
        Ok(state.tasks.clone())
    }

    async fn generate_task(&self, request: &NewTaskRequest) -> ApiResult<TaskAck> {
        let mut state = self.enter("generate_task", "POST /api/tasks/generate".to_string())?;
        let id = state.tasks.iter().map(|t| t.id.0 + 1).max().unwrap_or(0);
        let mut created = task(id, &request.task_name, true);
        created.keyword = request.keyword.clone();
        created.description = request.description.clone();
        created.max_pages = request.max_pages;
        state.tasks.push(created.clone());
        Ok(TaskAck {
            message: "created".to_string(),
            task: Some(serde_json::to_value(created).unwrap()),
        })
    }

    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> ApiResult<TaskAck> {
        let body = serde_json::to_string(update).unwrap();
        let mut state = self.enter("update_task", format!("PATCH /api/tasks/{} {}", id, body))?;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("task"))?;
        if let Some(name) = &update.task_name {
            task.task_name = name.clone();
        }
        if let Some(enabled) = update.enabled {
            task.enabled = enabled;
        }
        if let Some(keyword) = &update.keyword {
            task.keyword = keyword.clone();
        }
        if let Some(description) = &update.description {
            task.description = description.clone();
        }
        if let Some(max_pages) = update.max_pages {
            task.max_pages = max_pages;
        }
        if let Some(personal_only) = update.personal_only {
            task.personal_only = personal_only;
        }
        if let Some(min_price) = &update.min_price {
            task.min_price = min_price.clone();
        }
        if let Some(max_price) = &update.max_price {
            task.max_price = max_price.clone();
        }
        if let Some(cron) = &update.cron {
            task.cron = cron.clone();
        }
        Ok(TaskAck {
            message: "updated".to_string(),
            task: Some(serde_json::to_value(task.clone()).unwrap()),
        })
    }

    async fn delete_task(&self, id: TaskId) -> ApiResult<Ack> {
        let mut state = self.enter("delete_task", format!("DELETE /api/tasks/{}", id))?;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Err(not_found("task"));
        }
        Ok(Ack {
            message: "deleted".to_string(),
        })
    }

    async fn start_task(&self, id: TaskId) -> ApiResult<Ack> {
        let mut state = self.enter("start_task", format!("POST /api/tasks/start/{}", id))?;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("task"))?;
        task.is_running = true;
        Ok(Ack::default())
    }

    async fn stop_task(&self, id: TaskId) -> ApiResult<Ack> {
        let mut state = self.enter("stop_task", format!("POST /api/tasks/stop/{}", id))?;
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.is_running = false;
        }
        Ok(Ack::default())
    }

    async fn list_result_files(&self) -> ApiResult<ResultFiles> {
        let state = self.enter("list_result_files", "GET /api/results/files".to_string())?;
        Ok(ResultFiles {
            files: state.results.keys().cloned().collect(),
        })
    }

    async fn delete_result_file(&self, name: &str) -> ApiResult<Ack> {
        let mut state = self.enter("delete_result_file", format!("DELETE /api/results/files/{}", name))?;
        state.results.remove(name).ok_or_else(|| not_found("result file"))?;
        Ok(Ack {
            message: format!("{} deleted", name),
        })
    }

    async fn fetch_results(&self, name: &str, query: &ResultsQuery) -> ApiResult<ResultsPage> {
        self.hold("fetch_results").await;
        let call = format!(
            "GET /api/results/{}?recommended_only={}&sort_by={}&sort_order={}",
            name,
            query.recommended_only,
            query.sort_by.as_param(),
            query.sort_order.as_param()
        );
        let state = self.enter("fetch_results", call)?;
        let items: Vec<Value> = state
            .results
            .get(name)
            .ok_or_else(|| not_found("result file"))?
            .iter()
            .filter(|item| !query.recommended_only || item["ai_analysis"]["is_recommended"] == json!(true))
            .cloned()
            .collect();
        Ok(ResultsPage {
            total_items: items.len() as u64,
            page: query.page,
            limit: query.limit,
            items,
        })
    }

    async fn fetch_logs(&self, from_pos: u64) -> ApiResult<LogChunk> {
        let state = self.enter("fetch_logs", format!("GET /api/logs?from_pos={}", from_pos))?;
        let size = state.log.len() as u64;
        if from_pos >= size {
            return Ok(LogChunk {
                new_content: String::new(),
                new_pos: size,
            });
        }
        Ok(LogChunk {
            new_content: state.log[from_pos as usize..].to_string(),
            new_pos: size,
        })
    }

    async fn clear_logs(&self) -> ApiResult<Ack> {
        let mut state = self.enter("clear_logs", "DELETE /api/logs".to_string())?;
        state.log.clear();
        Ok(Ack {
            message: "logs cleared".to_string(),
        })
    }

    async fn notification_settings(&self) -> ApiResult<NotificationSettings> {
        let state = self.enter("notification_settings", "GET /api/settings/notifications".to_string())?;
        Ok(state.notifications.clone())
    }

    async fn update_notification_settings(&self, settings: &NotificationSettings) -> ApiResult<Ack> {
        let mut state = self.enter(
            "update_notification_settings",
            "PUT /api/settings/notifications".to_string(),
        )?;
        state.notifications = settings.clone();
        Ok(Ack {
            message: "notification settings saved".to_string(),
        })
    }

    async fn ai_settings(&self) -> ApiResult<AiSettings> {
        let state = self.enter("ai_settings", "GET /api/settings/ai".to_string())?;
        Ok(state.ai.clone())
    }

    async fn update_ai_settings(&self, settings: &AiSettings) -> ApiResult<Ack> {
        let mut state = self.enter("update_ai_settings", "PUT /api/settings/ai".to_string())?;
        state.ai = settings.clone();
        Ok(Ack {
            message: "AI settings saved".to_string(),
        })
    }

    async fn test_ai_settings(&self, settings: &AiSettings) -> ApiResult<AiTestOutcome> {
        let _state = self.enter("test_ai_settings", "POST /api/settings/ai/test".to_string())?;
        let ok = settings.get("OPENAI_API_KEY").map_or(false, |k| !k.is_empty());
        Ok(AiTestOutcome {
            success: ok,
            message: if ok { "connection ok" } else { "missing key" }.to_string(),
            response: None,
        })
    }

    async fn test_ai_backend(&self) -> ApiResult<AiTestOutcome> {
        let _state = self.enter("test_ai_backend", "POST /api/settings/ai/test/backend".to_string())?;
        Ok(AiTestOutcome {
            success: true,
            message: "backend connection ok".to_string(),
            response: Some("hi".to_string()),
        })
    }

    async fn system_status(&self) -> ApiResult<SystemStatus> {
        let state = self.enter("system_status", "GET /api/settings/status".to_string())?;
        Ok(SystemStatus {
            scraper_running: state.tasks.iter().any(|t| t.is_running),
            login_state_file: LoginStateFile {
                exists: state.login_state.is_some(),
                path: "state.json".to_string(),
            },
            env_file: EnvFileStatus {
                exists: true,
                ..Default::default()
            },
        })
    }

    async fn list_prompts(&self) -> ApiResult<Vec<String>> {
        let state = self.enter("list_prompts", "GET /api/prompts".to_string())?;
        Ok(state.prompts.keys().cloned().collect())
    }

    async fn prompt(&self, file: &str) -> ApiResult<PromptFile> {
        let state = self.enter("prompt", format!("GET /api/prompts/{}", file))?;
        let content = state.prompts.get(file).ok_or_else(|| not_found("prompt"))?;
        Ok(PromptFile {
            filename: file.to_string(),
            content: content.clone(),
        })
    }

    async fn update_prompt(&self, file: &str, content: &str) -> ApiResult<Ack> {
        let mut state = self.enter("update_prompt", format!("PUT /api/prompts/{}", file))?;
        state.prompts.insert(file.to_string(), content.to_string());
        Ok(Ack {
            message: format!("{} saved", file),
        })
    }

    async fn login_state(&self) -> ApiResult<Value> {
        let state = self.enter("login_state", "GET /api/login-state".to_string())?;
        let content = state.login_state.clone().ok_or_else(|| not_found("login state"))?;
        Ok(serde_json::from_str(&content).unwrap_or(Value::String(content)))
    }

    async fn update_login_state(&self, content: &str) -> ApiResult<Ack> {
        let mut state = self.enter("update_login_state", "POST /api/login-state".to_string())?;
        state.login_state = Some(content.to_string());
        Ok(Ack {
            message: "login state saved".to_string(),
        })
    }

    async fn delete_login_state(&self) -> ApiResult<Ack> {
        let mut state = self.enter("delete_login_state", "DELETE /api/login-state".to_string())?;
        state.login_state = None;
        Ok(Ack {
            message: "login state deleted".to_string(),
        })
    }
}
