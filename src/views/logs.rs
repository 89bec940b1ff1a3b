use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::poll::PollConcern;
use super::ViewContext;

pub const LOADING_TEXT: &str = "Loading...";
pub const EMPTY_TEXT: &str = "Log is empty, waiting for content...";

/// What the log pane currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBuffer {
    Loading,
    Empty,
    Text(String),
}

impl LogBuffer {
    pub fn as_str(&self) -> &str {
        match self {
            LogBuffer::Loading => LOADING_TEXT,
            LogBuffer::Empty => EMPTY_TEXT,
            LogBuffer::Text(text) => text,
        }
    }

    /// Append new content; placeholders are replaced, not appended to
    fn push(&mut self, content: &str) {
        match self {
            LogBuffer::Text(text) => text.push_str(content),
            _ => *self = LogBuffer::Text(content.to_string()),
        }
    }
}

/// Log text plus a line-based viewport over it
#[derive(Debug, Clone)]
pub struct LogPane {
    buffer: LogBuffer,
    cursor: u64,
    scroll_top: usize,
    client_height: usize,
    tolerance: usize,
    auto_refresh: bool,
    revision: u64,
}

impl LogPane {
    pub fn new(client_height: usize, tolerance: usize) -> Self {
        Self {
            buffer: LogBuffer::Loading,
            cursor: 0,
            scroll_top: 0,
            client_height: client_height.max(1),
            tolerance,
            auto_refresh: false,
            revision: 0,
        }
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn text(&self) -> &str {
        self.buffer.as_str()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Content height in rows
    pub fn scroll_height(&self) -> usize {
        self.text().lines().count().max(1)
    }

    pub fn max_scroll(&self) -> usize {
        self.scroll_height().saturating_sub(self.client_height)
    }

    /// Whether the viewport sits within the tolerance of the bottom
    pub fn is_at_bottom(&self) -> bool {
        self.max_scroll() <= self.scroll_top + self.tolerance
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll();
        self.revision += 1;
    }

    pub fn scroll_to(&mut self, row: usize) {
        self.scroll_top = row.min(self.max_scroll());
        self.revision += 1;
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let row = if delta < 0 {
            self.scroll_top.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_top.saturating_add(delta as usize)
        };
        self.scroll_to(row);
    }

    /// Rows currently inside the viewport
    pub fn visible_lines(&self) -> Vec<&str> {
        self.text()
            .lines()
            .skip(self.scroll_top)
            .take(self.client_height)
            .collect()
    }

    fn begin_full_refresh(&mut self) {
        self.cursor = 0;
        self.buffer = LogBuffer::Loading;
        self.revision += 1;
    }

    fn replace(&mut self, content: String, new_pos: u64) {
        self.buffer = if content.is_empty() {
            LogBuffer::Empty
        } else {
            LogBuffer::Text(content)
        };
        self.cursor = new_pos;
        self.revision += 1;
    }

    fn append(&mut self, content: &str) {
        self.buffer.push(content);
        self.revision += 1;
    }
}

/// Incremental tail of the backend log for one activation of the logs view
#[derive(Clone)]
pub struct LogTailer {
    ctx: ViewContext,
    pane: Arc<Mutex<LogPane>>,
    // Held for the whole of a fetch so ticks never overlap
    fetching: Arc<Mutex<()>>,
}

impl LogTailer {
    pub fn new(ctx: ViewContext) -> Self {
        let pane = LogPane::new(ctx.config.logs.viewport_rows, ctx.config.logs.scroll_tolerance);
        Self {
            ctx,
            pane: Arc::new(Mutex::new(pane)),
            fetching: Arc::new(Mutex::new(())),
        }
    }

    pub async fn activate(&self) {
        self.full_refresh().await;
    }

    /// Reset the cursor and reload the whole log
    pub async fn full_refresh(&self) {
        let _fetching = self.fetching.lock().await;
        self.pane.lock().await.begin_full_refresh();

        let result = self.ctx.api.fetch_logs(0).await;
        if !self.ctx.is_current() {
            debug!("Dropping log response for a view that is no longer active");
            return;
        }

        let mut pane = self.pane.lock().await;
        match result {
            Ok(chunk) => {
                debug!("Loaded {} bytes of log, cursor at {}", chunk.new_content.len(), chunk.new_pos);
                pane.replace(chunk.new_content, chunk.new_pos);
            }
            Err(e) => {
                warn!("Full log refresh failed: {}", e);
                pane.append(&failure_line(&e.message()));
            }
        }
        pane.scroll_to_bottom();
    }

    /// Fetch only what was appended since the cursor.
    ///
    /// Skipped when another fetch for the log is still in flight.
    pub async fn incremental_tick(&self) {
        let Ok(_fetching) = self.fetching.try_lock() else {
            debug!("Previous log fetch still in flight, skipping tick");
            return;
        };

        let (from_pos, was_at_bottom) = {
            let pane = self.pane.lock().await;
            (pane.cursor, pane.is_at_bottom())
        };

        let result = self.ctx.api.fetch_logs(from_pos).await;
        if !self.ctx.is_current() {
            return;
        }

        let mut pane = self.pane.lock().await;
        let appended = match result {
            Ok(chunk) => {
                pane.cursor = chunk.new_pos;
                if chunk.new_content.is_empty() {
                    false
                } else {
                    pane.append(&chunk.new_content);
                    true
                }
            }
            Err(e) => {
                // Keep the cursor so the next tick retries from the same position
                warn!("Incremental log fetch from {} failed: {}", from_pos, e);
                pane.append(&failure_line(&e.message()));
                true
            }
        };

        if appended && was_at_bottom {
            pane.scroll_to_bottom();
        }
    }

    pub async fn set_auto_refresh(&self, enabled: bool) {
        {
            let mut pane = self.pane.lock().await;
            pane.auto_refresh = enabled;
            pane.revision += 1;
        }

        if enabled {
            let period = Duration::from_millis(self.ctx.config.logs.poll_interval_ms);
            let tailer = self.clone();
            self.ctx.polls.spawn(
                PollConcern::Logs,
                self.ctx.view_generation(),
                period,
                move || {
                    let tailer = tailer.clone();
                    async move { tailer.incremental_tick().await }
                },
            );
            info!("Log auto-refresh enabled");
        } else {
            self.ctx.polls.cancel(PollConcern::Logs);
            info!("Log auto-refresh disabled");
        }
    }

    /// Truncate the backend log after confirmation, then reload
    pub async fn clear(&self) -> bool {
        if !self
            .ctx
            .interaction
            .confirm("Clear all run logs? This cannot be undone.")
            .await
        {
            return false;
        }

        match self.ctx.api.clear_logs().await {
            Ok(ack) => {
                self.full_refresh().await;
                let message = if ack.message.is_empty() { "Logs cleared." } else { ack.message.as_str() };
                self.ctx.interaction.notify(message);
                true
            }
            Err(e) => {
                warn!("Clearing logs failed: {}", e);
                self.ctx.interaction.notify(&format!("Error: {}", e.message()));
                false
            }
        }
    }

    pub async fn scroll_to(&self, row: usize) {
        self.pane.lock().await.scroll_to(row);
    }

    pub async fn scroll_by(&self, delta: isize) {
        self.pane.lock().await.scroll_by(delta);
    }

    pub async fn scroll_to_bottom(&self) {
        self.pane.lock().await.scroll_to_bottom();
    }

    pub async fn snapshot(&self) -> LogPane {
        self.pane.lock().await.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.pane.lock().await.revision
    }

    pub async fn render(&self) -> String {
        render_pane(&*self.pane.lock().await)
    }
}

fn failure_line(message: &str) -> String {
    format!("\nFailed to load log: {}\n", message)
}

pub fn render_pane(pane: &LogPane) -> String {
    let mut out = format!(
        "auto-refresh: {}   rows {}-{} of {}   cursor: {}\n",
        if pane.auto_refresh { "on" } else { "off" },
        pane.scroll_top + 1,
        (pane.scroll_top + pane.client_height).min(pane.scroll_height()),
        pane.scroll_height(),
        pane.cursor,
    );
    for line in pane.visible_lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}
