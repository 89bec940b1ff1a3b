use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ViewContext;
use crate::api::{AiSettings, ApiResult, NotificationSettings, SystemStatus};

/// AI setting keys the form always shows, in display order
pub const AI_FIELDS: &[&str] = &["OPENAI_API_KEY", "OPENAI_BASE_URL", "OPENAI_MODEL_NAME", "PROXY_URL"];

/// One independently loaded part of the settings view
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> Section<T> {
    fn from_result(result: ApiResult<T>, what: &str) -> Self {
        match result {
            Ok(value) => Section::Loaded(value),
            Err(e) => {
                warn!("Loading {} failed: {}", what, e);
                Section::Failed(format!("Failed to load {}: {}", what, e.message()))
            }
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Section::Loaded(value) => Some(value),
            _ => None,
        }
    }

    fn loaded_mut(&mut self) -> Option<&mut T> {
        match self {
            Section::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEditor {
    /// Nothing selected; editing and saving are disabled
    Idle,
    Loading(String),
    Editing { file: String, content: String },
    Failed { file: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsState {
    pub status: Section<SystemStatus>,
    pub notifications: Section<NotificationSettings>,
    pub ai: Section<AiSettings>,
    pub prompts: Section<Vec<String>>,
    pub editor: PromptEditor,
    pub revision: u64,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            status: Section::Loading,
            notifications: Section::Loading,
            ai: Section::Loading,
            prompts: Section::Loading,
            editor: PromptEditor::Idle,
            revision: 0,
        }
    }
}

impl SettingsState {
    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// System status, notification and AI settings, and the prompt editor
#[derive(Clone)]
pub struct SettingsPanel {
    ctx: ViewContext,
    state: Arc<Mutex<SettingsState>>,
}

impl SettingsPanel {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            state: Arc::new(Mutex::new(SettingsState::default())),
        }
    }

    /// Load every section concurrently
    pub async fn activate(&self) {
        let api = &self.ctx.api;
        let (status, notifications, ai, prompts) = futures::join!(
            api.system_status(),
            api.notification_settings(),
            api.ai_settings(),
            api.list_prompts(),
        );
        if !self.ctx.is_current() {
            return;
        }

        let mut state = self.state.lock().await;
        state.status = Section::from_result(status, "system status");
        state.notifications = Section::from_result(notifications, "notification settings");
        state.ai = Section::from_result(ai, "AI settings");
        state.prompts = Section::from_result(prompts, "prompt list");
        state.touch();
    }

    /// Re-read only the status section
    pub async fn reload_status(&self) {
        let status = self.ctx.api.system_status().await;
        if !self.ctx.is_current() {
            return;
        }
        let mut state = self.state.lock().await;
        state.status = Section::from_result(status, "system status");
        state.touch();
    }

    /// Load a prompt file into the editor
    pub async fn select_prompt(&self, file: &str) {
        {
            let mut state = self.state.lock().await;
            state.editor = if file.is_empty() {
                PromptEditor::Idle
            } else {
                PromptEditor::Loading(file.to_string())
            };
            state.touch();
        }
        if file.is_empty() {
            return;
        }

        let result = self.ctx.api.prompt(file).await;
        if !self.ctx.is_current() {
            return;
        }

        let mut state = self.state.lock().await;
        // Another prompt may have been selected while this one loaded
        if state.editor != PromptEditor::Loading(file.to_string()) {
            return;
        }
        state.editor = match result {
            Ok(prompt) => {
                debug!("Loaded prompt {}", file);
                PromptEditor::Editing {
                    file: file.to_string(),
                    content: prompt.content,
                }
            }
            Err(e) => PromptEditor::Failed {
                file: file.to_string(),
                message: format!("Failed to load {}: {}", file, e.message()),
            },
        };
        state.touch();
    }

    pub async fn set_prompt_content(&self, text: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        match &mut state.editor {
            PromptEditor::Editing { content, .. } => *content = text.to_string(),
            _ => anyhow::bail!("select a prompt file first"),
        }
        state.touch();
        Ok(())
    }

    pub async fn save_prompt(&self) {
        let editing = match &self.state.lock().await.editor {
            PromptEditor::Editing { file, content } => Some((file.clone(), content.clone())),
            _ => None,
        };
        let Some((file, content)) = editing else {
            self.ctx.interaction.notify("Select a prompt file to save first.");
            return;
        };

        match self.ctx.api.update_prompt(&file, &content).await {
            Ok(ack) => {
                info!("Saved prompt {}", file);
                self.notify_ack(&ack.message, "Saved.");
            }
            Err(e) => self.notify_error(e.message()),
        }
    }

    pub async fn set_notification_field(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let Some(settings) = state.notifications.loaded_mut() else {
            anyhow::bail!("notification settings are not loaded");
        };
        if !settings.set(key, value) {
            anyhow::bail!(
                "unknown notification setting '{}', expected one of {}",
                key,
                NotificationSettings::FIELDS.join(", ")
            );
        }
        state.touch();
        Ok(())
    }

    pub async fn save_notifications(&self) {
        let Some(settings) = self.state.lock().await.notifications.loaded().cloned() else {
            self.ctx.interaction.notify("Notification settings are not loaded.");
            return;
        };

        match self.ctx.api.update_notification_settings(&settings).await {
            Ok(ack) => {
                info!("Saved notification settings");
                self.notify_ack(&ack.message, "Notification settings saved.");
            }
            Err(e) => self.notify_error(e.message()),
        }
    }

    pub async fn set_ai_field(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let key = key.to_ascii_uppercase();
        if !AI_FIELDS.contains(&key.as_str()) {
            anyhow::bail!("unknown AI setting '{}', expected one of {}", key, AI_FIELDS.join(", "));
        }

        let mut state = self.state.lock().await;
        let Some(settings) = state.ai.loaded_mut() else {
            anyhow::bail!("AI settings are not loaded");
        };
        settings.insert(key, value.to_string());
        state.touch();
        Ok(())
    }

    async fn ai_form(&self) -> Option<AiSettings> {
        let form = self.state.lock().await.ai.loaded().cloned();
        if form.is_none() {
            self.ctx.interaction.notify("AI settings are not loaded.");
        }
        form
    }

    pub async fn save_ai(&self) {
        let Some(settings) = self.ai_form().await else {
            return;
        };
        match self.ctx.api.update_ai_settings(&settings).await {
            Ok(ack) => {
                info!("Saved AI settings");
                self.notify_ack(&ack.message, "AI settings saved.");
            }
            Err(e) => self.notify_error(e.message()),
        }
    }

    /// Test the values currently in the form
    pub async fn test_ai(&self) {
        let Some(settings) = self.ai_form().await else {
            return;
        };
        match self.ctx.api.test_ai_settings(&settings).await {
            Ok(outcome) if outcome.success => {
                self.notify_ack(&outcome.message, "AI connection test succeeded.");
            }
            Ok(outcome) => {
                self.ctx
                    .interaction
                    .notify(&format!("AI connection test failed: {}", outcome.message));
            }
            Err(e) => self.notify_error(e.message()),
        }
    }

    /// Test the settings the backend is running with
    pub async fn test_ai_backend(&self) {
        match self.ctx.api.test_ai_backend().await {
            Ok(outcome) if outcome.success => {
                self.notify_ack(&outcome.message, "Backend AI connection test succeeded.");
            }
            Ok(outcome) => {
                self.ctx
                    .interaction
                    .notify(&format!("Backend AI test failed: {}", outcome.message));
            }
            Err(e) => {
                self.ctx
                    .interaction
                    .notify(&format!("Backend AI test error: {}", e.message()));
            }
        }
    }

    fn notify_ack(&self, message: &str, fallback: &str) {
        let message = if message.is_empty() { fallback } else { message };
        self.ctx.interaction.notify(message);
    }

    fn notify_error(&self, message: String) {
        self.ctx.interaction.notify(&format!("Error: {}", message));
    }

    pub async fn snapshot(&self) -> SettingsState {
        self.state.lock().await.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.state.lock().await.revision
    }

    pub async fn render(&self) -> String {
        render_settings(&*self.state.lock().await)
    }
}

fn flag(set: bool) -> &'static str {
    if set {
        "ok"
    } else {
        "missing"
    }
}

fn masked(key: &str, value: &str) -> String {
    if value.is_empty() {
        "(empty)".to_string()
    } else if key.contains("KEY") || key.contains("TOKEN") {
        "********".to_string()
    } else {
        value.to_string()
    }
}

pub fn render_settings(state: &SettingsState) -> String {
    let mut out = String::from("== System status ==\n");
    match &state.status {
        Section::Loading => out.push_str("  loading...\n"),
        Section::Failed(message) => out.push_str(&format!("  {}\n", message)),
        Section::Loaded(status) => {
            out.push_str(&format!(
                "  scraper: {}\n  login state file: {} ({})\n  .env file: {}\n  OPENAI_API_KEY: {}  OPENAI_BASE_URL: {}  OPENAI_MODEL_NAME: {}  NTFY_TOPIC_URL: {}\n",
                if status.scraper_running { "running" } else { "stopped" },
                flag(status.login_state_file.exists),
                status.login_state_file.path,
                flag(status.env_file.exists),
                flag(status.env_file.openai_api_key_set),
                flag(status.env_file.openai_base_url_set),
                flag(status.env_file.openai_model_name_set),
                flag(status.env_file.ntfy_topic_url_set),
            ));
        }
    }

    out.push_str("\n== Notifications ==\n");
    match &state.notifications {
        Section::Loading => out.push_str("  loading...\n"),
        Section::Failed(message) => out.push_str(&format!("  {}\n", message)),
        Section::Loaded(settings) => {
            let value = serde_json::to_value(settings).unwrap_or_default();
            for key in NotificationSettings::FIELDS {
                let shown = match &value[*key] {
                    serde_json::Value::String(text) => masked(key, text),
                    other => other.to_string(),
                };
                out.push_str(&format!("  {}: {}\n", key, shown));
            }
        }
    }

    out.push_str("\n== AI model ==\n");
    match &state.ai {
        Section::Loading => out.push_str("  loading...\n"),
        Section::Failed(message) => out.push_str(&format!("  {}\n", message)),
        Section::Loaded(settings) => {
            for key in AI_FIELDS {
                let value = settings.get(*key).map(String::as_str).unwrap_or("");
                out.push_str(&format!("  {}: {}\n", key, masked(key, value)));
            }
        }
    }

    out.push_str("\n== Prompts ==\n");
    match &state.prompts {
        Section::Loading => out.push_str("  loading...\n"),
        Section::Failed(message) => out.push_str(&format!("  {}\n", message)),
        Section::Loaded(files) if files.is_empty() => out.push_str("  no prompt files found\n"),
        Section::Loaded(files) => out.push_str(&format!("  {}\n", files.join("  "))),
    }
    match &state.editor {
        PromptEditor::Idle => out.push_str("  select a prompt file to edit it\n"),
        PromptEditor::Loading(file) => out.push_str(&format!("  loading {}...\n", file)),
        PromptEditor::Failed { message, .. } => out.push_str(&format!("  {}\n", message)),
        PromptEditor::Editing { file, content } => {
            out.push_str(&format!("  -- {} --\n{}\n", file, content));
        }
    }
    out
}
