use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ViewContext;
use crate::api::{ResultItem, ResultsPage, ResultsQuery, SortKey, SortOrder};
use crate::storage::LAST_RESULT_FILE_KEY;

/// What the item grid currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum Grid {
    Loading,
    /// The backend has no result files at all
    NoFiles,
    Failed(String),
    Items { total: u64, items: Vec<ResultItem> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsState {
    pub files: Vec<String>,
    pub selected: Option<String>,
    pub recommended_only: bool,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub grid: Grid,
    /// Pretty-printed record shown by the JSON viewer
    pub viewer: Option<String>,
    pub revision: u64,
    issued: u64,
}

impl Default for ResultsState {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            selected: None,
            recommended_only: false,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            grid: Grid::Loading,
            viewer: None,
            revision: 0,
            issued: 0,
        }
    }
}

impl ResultsState {
    /// The delete control is only enabled with a selection
    pub fn can_delete(&self) -> bool {
        self.selected.is_some()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Selection, filter and sort controls bound to a server-side results query
#[derive(Clone)]
pub struct ResultsBrowser {
    ctx: ViewContext,
    state: Arc<Mutex<ResultsState>>,
}

impl ResultsBrowser {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            state: Arc::new(Mutex::new(ResultsState::default())),
        }
    }

    pub async fn activate(&self) {
        self.initialize().await;
    }

    /// Load the file list, pick a file and fetch its items
    pub async fn initialize(&self) {
        let listing = self.ctx.api.list_result_files().await;
        if !self.ctx.is_current() {
            return;
        }

        {
            let mut state = self.state.lock().await;
            state.viewer = None;
            match listing {
                Ok(listing) if listing.files.is_empty() => {
                    state.files.clear();
                    state.selected = None;
                    state.grid = Grid::NoFiles;
                    state.touch();
                    return;
                }
                Ok(listing) => {
                    let remembered = self.ctx.prefs.get(LAST_RESULT_FILE_KEY);
                    let selected = remembered
                        .filter(|name| listing.files.contains(name))
                        .or_else(|| listing.files.first().cloned());
                    debug!("Selecting result file {:?}", selected);
                    state.files = listing.files;
                    state.selected = selected;
                }
                Err(e) => {
                    warn!("Loading result files failed: {}", e);
                    state.files.clear();
                    state.selected = None;
                    state.grid = Grid::Failed(format!("Failed to load file list: {}", e.message()));
                    state.touch();
                    return;
                }
            }
        }

        self.refresh().await;
    }

    /// Re-fetch the selected file with the current filter and sort
    pub async fn refresh(&self) {
        let (name, query, issued) = {
            let mut state = self.state.lock().await;
            let Some(name) = state.selected.clone() else {
                return;
            };
            state.issued += 1;
            state.grid = Grid::Loading;
            state.touch();
            let query = ResultsQuery {
                page: 1,
                limit: self.ctx.config.results.page_size,
                recommended_only: state.recommended_only,
                sort_by: state.sort_by,
                sort_order: state.sort_order,
            };
            (name, query, state.issued)
        };

        // Persisted whether or not the fetch succeeds
        if let Err(e) = self.ctx.prefs.set(LAST_RESULT_FILE_KEY, &name) {
            warn!("Could not remember result file selection: {:#}", e);
        }

        let result = self.ctx.api.fetch_results(&name, &query).await;
        if !self.ctx.is_current() {
            return;
        }

        let mut state = self.state.lock().await;
        if state.issued != issued {
            debug!("Discarding superseded results for {}", name);
            return;
        }
        state.grid = match result {
            Ok(ResultsPage {
                total_items, items, ..
            }) => {
                debug!("Loaded {} of {} items from {}", items.len(), total_items, name);
                Grid::Items {
                    total: total_items,
                    items: items.into_iter().map(ResultItem::from_record).collect(),
                }
            }
            Err(e) => {
                warn!("Loading results of {} failed: {}", name, e);
                Grid::Failed(format!("Failed to load results: {}", e.message()))
            }
        };
        state.touch();
    }

    /// Switch to another listed file
    pub async fn select_file(&self, name: &str) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock().await;
            if !state.files.iter().any(|file| file == name) {
                anyhow::bail!("no result file named '{}'", name);
            }
            state.selected = Some(name.to_string());
            state.touch();
        }
        self.refresh().await;
        Ok(())
    }

    pub async fn set_recommended_only(&self, recommended_only: bool) {
        self.state.lock().await.recommended_only = recommended_only;
        self.refresh().await;
    }

    pub async fn set_sort_key(&self, sort_by: SortKey) {
        self.state.lock().await.sort_by = sort_by;
        self.refresh().await;
    }

    pub async fn set_sort_order(&self, sort_order: SortOrder) {
        self.state.lock().await.sort_order = sort_order;
        self.refresh().await;
    }

    /// Delete the selected file after confirmation, then start over
    pub async fn delete_selected(&self) {
        let Some(name) = self.state.lock().await.selected.clone() else {
            self.ctx.interaction.notify("Select a result file first.");
            return;
        };

        let question = format!("Delete result file \"{}\"? This cannot be undone.", name);
        if !self.ctx.interaction.confirm(&question).await {
            return;
        }

        match self.ctx.api.delete_result_file(&name).await {
            Ok(ack) => {
                info!("Deleted result file {}", name);
                self.ctx.interaction.notify(&ack.message);
                self.initialize().await;
            }
            Err(e) => {
                warn!("Deleting result file {} failed: {}", name, e);
                self.ctx.interaction.notify(&format!("Error: {}", e.message()));
            }
        }
    }

    /// Open the JSON viewer on one rendered item
    pub async fn view_item(&self, index: usize) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let raw = match &state.grid {
            Grid::Items { items, .. } => items.get(index).map(|item| item.raw.clone()),
            _ => None,
        };
        let Some(raw) = raw else {
            anyhow::bail!("no item #{} on screen", index + 1);
        };
        state.viewer = Some(serde_json::to_string_pretty(&raw)?);
        state.touch();
        Ok(())
    }

    pub async fn close_viewer(&self) {
        let mut state = self.state.lock().await;
        if state.viewer.take().is_some() {
            state.touch();
        }
    }

    pub async fn snapshot(&self) -> ResultsState {
        self.state.lock().await.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.state.lock().await.revision
    }

    pub async fn render(&self) -> String {
        render_results(&*self.state.lock().await)
    }
}

fn render_card(index: usize, item: &ResultItem) -> String {
    let info = &item.info;
    let verdict = item.verdict();
    format!(
        "{:>3}. {}\n     {}  |  AI: {} ({})\n     seller: {}  published: {}  captured: {}\n     {}\n",
        index + 1,
        info.title.as_deref().unwrap_or("(untitled)"),
        info.price.as_deref().unwrap_or("price unknown"),
        verdict.label(),
        item.analysis.reason.as_deref().unwrap_or("no analysis"),
        item.seller_name().unwrap_or("unknown"),
        info.publish_time.as_deref().unwrap_or("unknown"),
        item.capture_time_display().as_deref().unwrap_or("unknown"),
        info.link.as_deref().unwrap_or("-"),
    )
}

/// Pure rendering of the fetched items plus the controls' state
pub fn render_results(state: &ResultsState) -> String {
    let mut out = String::new();

    let files = if state.files.is_empty() {
        "no result files".to_string()
    } else {
        state
            .files
            .iter()
            .map(|file| {
                if state.selected.as_deref() == Some(file.as_str()) {
                    format!("[{}]", file)
                } else {
                    file.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };
    out.push_str(&format!("Files: {}\n", files));
    out.push_str(&format!(
        "Recommended only: {}  Sort: {} {}  Delete: {}\n\n",
        if state.recommended_only { "on" } else { "off" },
        state.sort_by.as_param(),
        state.sort_order.as_param(),
        if state.can_delete() { "enabled" } else { "disabled" },
    ));

    match &state.grid {
        Grid::Loading => out.push_str("Loading results...\n"),
        Grid::NoFiles => out.push_str("No result files found. Run a monitoring task first.\n"),
        Grid::Failed(message) => {
            out.push_str(message);
            out.push('\n');
        }
        Grid::Items { items, .. } if items.is_empty() => {
            out.push_str("No records match the current filter.\n");
        }
        Grid::Items { total, items } => {
            out.push_str(&format!("Showing {} of {} records\n", items.len(), total));
            for (index, item) in items.iter().enumerate() {
                out.push_str(&render_card(index, item));
            }
        }
    }

    if let Some(json) = &state.viewer {
        out.push_str("\n-- Record --\n");
        out.push_str(json);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{record, FakeApi};
    use crate::storage::Preferences;
    use crate::views::testing::{harness, harness_with, ScriptedInteraction};
    use std::time::Duration;

    fn two_files() -> FakeApi {
        FakeApi::new()
            .with_result_file("camera_full_data.jsonl", vec![record("Camera A", Some(true))])
            .with_result_file(
                "lens_full_data.jsonl",
                vec![record("Lens A", Some(true)), record("Lens B", Some(false))],
            )
    }

    #[tokio::test]
    async fn test_selection_survives_reinitialization() {
        let api = Arc::new(two_files());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());

        browser.initialize().await;
        assert_eq!(
            browser.snapshot().await.selected.as_deref(),
            Some("camera_full_data.jsonl")
        );

        browser.select_file("lens_full_data.jsonl").await.unwrap();
        assert_eq!(
            h.prefs.get(LAST_RESULT_FILE_KEY).as_deref(),
            Some("lens_full_data.jsonl")
        );

        let again = ResultsBrowser::new(h.ctx.clone());
        again.initialize().await;
        let state = again.snapshot().await;
        assert_eq!(state.selected.as_deref(), Some("lens_full_data.jsonl"));
        assert!(matches!(state.grid, Grid::Items { total: 2, .. }));
    }

    #[tokio::test]
    async fn test_deleted_selection_is_not_reselected() {
        let api = Arc::new(two_files());
        let h = harness_with(api.clone(), ScriptedInteraction::answering(&[true]));
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;
        browser.select_file("lens_full_data.jsonl").await.unwrap();
        api.clear_calls();

        browser.delete_selected().await;

        let state = browser.snapshot().await;
        assert_eq!(state.files, vec!["camera_full_data.jsonl".to_string()]);
        assert_eq!(state.selected.as_deref(), Some("camera_full_data.jsonl"));
        assert_eq!(api.count_calls("GET /api/results/lens"), 0);
        assert_eq!(h.interaction.notices(), vec!["lens_full_data.jsonl deleted".to_string()]);
    }

    #[tokio::test]
    async fn test_declined_delete_keeps_file() {
        let api = Arc::new(two_files());
        let h = harness_with(api.clone(), ScriptedInteraction::answering(&[false]));
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;

        browser.delete_selected().await;
        assert_eq!(api.count_calls("DELETE"), 0);
        assert_eq!(browser.snapshot().await.files.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_for_old_filter_is_discarded() {
        let api = Arc::new(two_files());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;
        browser.select_file("lens_full_data.jsonl").await.unwrap();

        api.delay_next("fetch_results", Duration::from_secs(2));
        let slow = tokio::spawn({
            let browser = browser.clone();
            async move { browser.set_recommended_only(true).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        browser.set_recommended_only(false).await;
        assert!(matches!(browser.snapshot().await.grid, Grid::Items { total: 2, .. }));

        slow.await.unwrap();
        assert_eq!(
            api.calls().last().unwrap(),
            "GET /api/results/lens_full_data.jsonl?recommended_only=true&sort_by=crawl_time&sort_order=desc"
        );
        let state = browser.snapshot().await;
        assert!(!state.recommended_only);
        assert!(matches!(state.grid, Grid::Items { total: 2, .. }));
    }

    #[tokio::test]
    async fn test_filter_changes_refetch_from_server() {
        let api = Arc::new(two_files());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;
        browser.select_file("lens_full_data.jsonl").await.unwrap();
        api.clear_calls();

        browser.set_recommended_only(true).await;
        browser.set_sort_key(SortKey::Price).await;
        browser.set_sort_order(SortOrder::Ascending).await;

        assert_eq!(
            api.calls(),
            vec![
                "GET /api/results/lens_full_data.jsonl?recommended_only=true&sort_by=crawl_time&sort_order=desc",
                "GET /api/results/lens_full_data.jsonl?recommended_only=true&sort_by=price&sort_order=desc",
                "GET /api/results/lens_full_data.jsonl?recommended_only=true&sort_by=price&sort_order=asc",
            ]
        );
        match browser.snapshot().await.grid {
            Grid::Items { items, .. } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].info.title.as_deref(), Some("Lens A"));
            }
            other => panic!("unexpected grid {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_selection_persisted_even_when_fetch_fails() {
        let api = Arc::new(two_files());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;
        api.fail("fetch_results", "file is being written");

        browser.select_file("lens_full_data.jsonl").await.unwrap();

        assert_eq!(
            h.prefs.get(LAST_RESULT_FILE_KEY).as_deref(),
            Some("lens_full_data.jsonl")
        );
        assert_eq!(
            browser.snapshot().await.grid,
            Grid::Failed("Failed to load results: file is being written".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_file_is_rejected() {
        let api = Arc::new(two_files());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;

        assert!(browser.select_file("gone.jsonl").await.is_err());
        assert_eq!(
            browser.snapshot().await.selected.as_deref(),
            Some("camera_full_data.jsonl")
        );
    }

    #[tokio::test]
    async fn test_no_files() {
        let api = Arc::new(FakeApi::new());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;

        let state = browser.snapshot().await;
        assert_eq!(state.grid, Grid::NoFiles);
        assert!(!state.can_delete());
        assert!(render_results(&state).contains("no result files"));
        assert_eq!(api.count_calls("GET /api/results/files"), 1);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_json_viewer_shows_raw_record() {
        let api = Arc::new(two_files());
        let h = harness(api.clone());
        let browser = ResultsBrowser::new(h.ctx.clone());
        browser.initialize().await;

        browser.view_item(0).await.unwrap();
        let viewer = browser.snapshot().await.viewer.unwrap();
        assert!(viewer.contains("\"商品标题\": \"Camera A\""));
        assert!(browser.view_item(5).await.is_err());

        browser.close_viewer().await;
        assert!(browser.snapshot().await.viewer.is_none());
    }

    #[test]
    fn test_render_cards() {
        let state = ResultsState {
            files: vec!["a.jsonl".to_string()],
            selected: Some("a.jsonl".to_string()),
            grid: Grid::Items {
                total: 1,
                items: vec![ResultItem::from_record(record("Camera A", None))],
            },
            ..Default::default()
        };

        let text = render_results(&state);
        assert!(text.contains("[a.jsonl]"));
        assert!(text.contains("Camera A"));
        assert!(text.contains("AI: undecided"));
        assert!(text.contains("seller: seller"));
        assert!(text.contains("captured: 2024-05-02 08:30"));
        assert!(text.contains("Delete: enabled"));
    }
}
