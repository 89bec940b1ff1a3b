use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a monitoring task as assigned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monitoring task as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Display name
    pub task_name: String,

    pub enabled: bool,

    /// Search keyword used by the scraper
    pub keyword: String,

    /// Free-text description the AI criteria were derived from
    #[serde(default)]
    pub description: String,

    /// Page-depth limit
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Only individual sellers, no shops
    #[serde(default)]
    pub personal_only: bool,

    #[serde(default)]
    pub min_price: Option<String>,

    #[serde(default)]
    pub max_price: Option<String>,

    /// Cron-style schedule expression
    #[serde(default)]
    pub cron: Option<String>,

    #[serde(default)]
    pub ai_prompt_base_file: String,

    /// Reference to the AI-criteria document
    #[serde(default)]
    pub ai_prompt_criteria_file: String,

    /// Backend process state, never written by the client
    #[serde(default)]
    pub is_running: bool,
}

pub fn default_max_pages() -> u32 {
    3
}

/// Partial update for `PATCH /api/tasks/{id}`.
///
/// Outer `None` leaves a field untouched; for the nullable fields `Some(None)`
/// is sent as an explicit `null` and clears the value server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<Option<String>>,
}

impl TaskUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn description(description: String) -> Self {
        Self {
            description: Some(description),
            ..Default::default()
        }
    }
}

/// Body of `POST /api/tasks/generate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTaskRequest {
    pub task_name: String,
    pub keyword: String,
    pub description: String,
    pub personal_only: bool,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub max_pages: u32,
    pub cron: Option<String>,
}

/// Generic `{message}` acknowledgement returned by mutating endpoints
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

/// Response of task create/update calls
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskAck {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub task: Option<Value>,
}

/// One incremental read of the backend log
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogChunk {
    pub new_content: String,
    pub new_pos: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultFiles {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Server-side sort key of a results query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CaptureTime,
    PublishTime,
    Price,
}

impl SortKey {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortKey::CaptureTime => "crawl_time",
            SortKey::PublishTime => "publish_time",
            SortKey::Price => "price",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "crawl_time" | "capture" => Some(SortKey::CaptureTime),
            "publish_time" | "publish" => Some(SortKey::PublishTime),
            "price" => Some(SortKey::Price),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Ascending),
            "desc" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

/// Parameters of `GET /api/results/{name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsQuery {
    pub page: u32,
    pub limit: u32,
    pub recommended_only: bool,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl ResultsQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("recommended_only", self.recommended_only.to_string()),
            ("sort_by", self.sort_by.as_param().to_string()),
            ("sort_order", self.sort_order.as_param().to_string()),
        ]
    }
}

/// One page of scraped records
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultsPage {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemInfo {
    #[serde(rename = "商品标题", default)]
    pub title: Option<String>,
    #[serde(rename = "商品链接", default)]
    pub link: Option<String>,
    #[serde(rename = "当前售价", default)]
    pub price: Option<String>,
    #[serde(rename = "商品图片列表", default)]
    pub images: Vec<String>,
    #[serde(rename = "发布时间", default)]
    pub publish_time: Option<String>,
    #[serde(rename = "卖家昵称", default)]
    pub seller_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SellerInfo {
    #[serde(rename = "卖家昵称", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub is_recommended: Option<bool>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// AI verdict on a scraped item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Recommended,
    NotRecommended,
    Undecided,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Recommended => "recommended",
            Verdict::NotRecommended => "not recommended",
            Verdict::Undecided => "undecided",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct ItemRecord {
    #[serde(rename = "商品信息", default)]
    info: ItemInfo,
    #[serde(rename = "卖家信息", default)]
    seller: SellerInfo,
    #[serde(default)]
    ai_analysis: AiAnalysis,
    #[serde(rename = "爬取时间", default)]
    captured_at: Option<String>,
}

/// A scraped record, immutable once fetched
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub info: ItemInfo,
    pub seller: SellerInfo,
    pub analysis: AiAnalysis,
    pub captured_at: Option<String>,

    /// The record exactly as the backend sent it
    pub raw: Value,
}

impl ResultItem {
    /// Build an item from a raw record, tolerating missing or malformed sections
    pub fn from_record(raw: Value) -> Self {
        let record: ItemRecord = serde_json::from_value(raw.clone()).unwrap_or_default();
        Self {
            info: record.info,
            seller: record.seller,
            analysis: record.ai_analysis,
            captured_at: record.captured_at,
            raw,
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self.analysis.is_recommended {
            Some(true) => Verdict::Recommended,
            Some(false) => Verdict::NotRecommended,
            None => Verdict::Undecided,
        }
    }

    /// Seller name, preferring the item-level field
    pub fn seller_name(&self) -> Option<&str> {
        self.info
            .seller_name
            .as_deref()
            .or(self.seller.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Capture time as `YYYY-MM-DD HH:MM`
    pub fn capture_time_display(&self) -> Option<String> {
        let raw = self.captured_at.as_deref()?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.format("%Y-%m-%d %H:%M").to_string());
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(parsed.format("%Y-%m-%d %H:%M").to_string());
        }
        None
    }
}

/// Notification channel settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(rename = "NTFY_TOPIC_URL", default)]
    pub ntfy_topic_url: String,
    #[serde(rename = "GOTIFY_URL", default)]
    pub gotify_url: String,
    #[serde(rename = "GOTIFY_TOKEN", default)]
    pub gotify_token: String,
    #[serde(rename = "BARK_URL", default)]
    pub bark_url: String,
    #[serde(rename = "WX_BOT_URL", default)]
    pub wx_bot_url: String,
    #[serde(rename = "TELEGRAM_BOT_TOKEN", default)]
    pub telegram_bot_token: String,
    #[serde(rename = "TELEGRAM_CHAT_ID", default)]
    pub telegram_chat_id: String,
    #[serde(rename = "WEBHOOK_URL", default)]
    pub webhook_url: String,
    #[serde(rename = "WEBHOOK_METHOD", default)]
    pub webhook_method: String,
    #[serde(rename = "WEBHOOK_HEADERS", default)]
    pub webhook_headers: String,
    #[serde(rename = "WEBHOOK_CONTENT_TYPE", default)]
    pub webhook_content_type: String,
    #[serde(rename = "WEBHOOK_QUERY_PARAMETERS", default)]
    pub webhook_query_parameters: String,
    #[serde(rename = "WEBHOOK_BODY", default)]
    pub webhook_body: String,
    #[serde(rename = "PCURL_TO_MOBILE", default)]
    pub pcurl_to_mobile: bool,
}

impl NotificationSettings {
    pub const FIELDS: &'static [&'static str] = &[
        "NTFY_TOPIC_URL",
        "GOTIFY_URL",
        "GOTIFY_TOKEN",
        "BARK_URL",
        "WX_BOT_URL",
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_CHAT_ID",
        "WEBHOOK_URL",
        "WEBHOOK_METHOD",
        "WEBHOOK_HEADERS",
        "WEBHOOK_CONTENT_TYPE",
        "WEBHOOK_QUERY_PARAMETERS",
        "WEBHOOK_BODY",
        "PCURL_TO_MOBILE",
    ];

    /// Set a field by its wire key; returns false for unknown keys
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let slot = match key {
            "NTFY_TOPIC_URL" => &mut self.ntfy_topic_url,
            "GOTIFY_URL" => &mut self.gotify_url,
            "GOTIFY_TOKEN" => &mut self.gotify_token,
            "BARK_URL" => &mut self.bark_url,
            "WX_BOT_URL" => &mut self.wx_bot_url,
            "TELEGRAM_BOT_TOKEN" => &mut self.telegram_bot_token,
            "TELEGRAM_CHAT_ID" => &mut self.telegram_chat_id,
            "WEBHOOK_URL" => &mut self.webhook_url,
            "WEBHOOK_METHOD" => &mut self.webhook_method,
            "WEBHOOK_HEADERS" => &mut self.webhook_headers,
            "WEBHOOK_CONTENT_TYPE" => &mut self.webhook_content_type,
            "WEBHOOK_QUERY_PARAMETERS" => &mut self.webhook_query_parameters,
            "WEBHOOK_BODY" => &mut self.webhook_body,
            "PCURL_TO_MOBILE" => {
                self.pcurl_to_mobile = matches!(value, "true" | "on" | "1" | "yes");
                return true;
            }
            _ => return false,
        };
        *slot = value.to_string();
        true
    }
}

/// AI model settings, keyed by the backend's environment variable names
pub type AiSettings = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AiTestOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoginStateFile {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnvFileStatus {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub openai_api_key_set: bool,
    #[serde(default)]
    pub openai_base_url_set: bool,
    #[serde(default)]
    pub openai_model_name_set: bool,
    #[serde(default)]
    pub ntfy_topic_url_set: bool,
}

/// `GET /api/settings/status`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub scraper_running: bool,
    #[serde(default)]
    pub login_state_file: LoginStateFile,
    #[serde(default)]
    pub env_file: EnvFileStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptFile {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content: String,
}
