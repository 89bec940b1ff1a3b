use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::poll::PollConcern;
use super::ViewContext;
use crate::api::{default_max_pages, ApiError, NewTaskRequest, Task, TaskId, TaskUpdate};

/// Local validation failures, caught before any request is made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{0} must not be empty")]
    Required(&'static str),

    #[error("{field} must be a positive whole number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// Why a table action did not go through
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Invalid(#[from] EditError),

    #[error("Error: {}", .0.message())]
    Api(#[from] ApiError),

    /// The task disappeared, e.g. deleted from another session
    #[error("task {0} no longer exists")]
    UnknownTask(TaskId),

    #[error("task {0} is not being edited")]
    NotEditing(TaskId),

    #[error("task {0} is disabled")]
    Disabled(TaskId),

    #[error("no dialog is open")]
    NoDialog,
}

/// Tagged action attached to each interactive control of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    Start(TaskId),
    Stop(TaskId),
    Edit(TaskId),
    Save(TaskId),
    Cancel(TaskId),
    Delete(TaskId),
    RefreshCriteria(TaskId),
    ToggleEnabled(TaskId, bool),
}

/// Editable columns of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Enabled,
    Name,
    Keyword,
    MinPrice,
    MaxPrice,
    PersonalOnly,
    MaxPages,
    Cron,
}

impl EditField {
    pub fn parse(name: &str) -> Result<Self, EditError> {
        match name {
            "enabled" => Ok(EditField::Enabled),
            "name" | "task_name" => Ok(EditField::Name),
            "keyword" => Ok(EditField::Keyword),
            "min_price" | "min" => Ok(EditField::MinPrice),
            "max_price" | "max" => Ok(EditField::MaxPrice),
            "personal_only" | "personal" => Ok(EditField::PersonalOnly),
            "max_pages" | "pages" => Ok(EditField::MaxPages),
            "cron" | "schedule" => Ok(EditField::Cron),
            other => Err(EditError::UnknownField(other.to_string())),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "on" | "yes" | "1")
}

fn optional_text(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_pages(value: &str) -> Result<u32, EditError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(default_max_pages());
    }
    value
        .parse::<u32>()
        .ok()
        .filter(|pages| *pages > 0)
        .ok_or_else(|| EditError::NotANumber {
            field: "max_pages",
            value: value.to_string(),
        })
}

/// In-progress values of a row being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub enabled: bool,
    pub task_name: String,
    pub keyword: String,
    pub min_price: String,
    pub max_price: String,
    pub personal_only: bool,
    pub max_pages: String,
    pub cron: String,
}

impl EditForm {
    pub fn from_task(task: &Task) -> Self {
        Self {
            enabled: task.enabled,
            task_name: task.task_name.clone(),
            keyword: task.keyword.clone(),
            min_price: task.min_price.clone().unwrap_or_default(),
            max_price: task.max_price.clone().unwrap_or_default(),
            personal_only: task.personal_only,
            max_pages: task.max_pages.to_string(),
            cron: task.cron.clone().unwrap_or_default(),
        }
    }

    pub fn set(&mut self, field: EditField, value: &str) {
        match field {
            EditField::Enabled => self.enabled = parse_flag(value),
            EditField::Name => self.task_name = value.to_string(),
            EditField::Keyword => self.keyword = value.to_string(),
            EditField::MinPrice => self.min_price = value.to_string(),
            EditField::MaxPrice => self.max_price = value.to_string(),
            EditField::PersonalOnly => self.personal_only = parse_flag(value),
            EditField::MaxPages => self.max_pages = value.to_string(),
            EditField::Cron => self.cron = value.to_string(),
        }
    }

    /// Validate and convert into the partial update sent on save
    pub fn to_update(&self) -> Result<TaskUpdate, EditError> {
        let task_name = self.task_name.trim();
        if task_name.is_empty() {
            return Err(EditError::Required("task name"));
        }
        let keyword = self.keyword.trim();
        if keyword.is_empty() {
            return Err(EditError::Required("keyword"));
        }

        Ok(TaskUpdate {
            task_name: Some(task_name.to_string()),
            enabled: Some(self.enabled),
            keyword: Some(keyword.to_string()),
            description: None,
            max_pages: Some(parse_pages(&self.max_pages)?),
            personal_only: Some(self.personal_only),
            min_price: Some(optional_text(&self.min_price)),
            max_price: Some(optional_text(&self.max_price)),
            cron: Some(optional_text(&self.cron)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMode {
    Viewing,
    Editing(EditForm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: TaskId,
    pub mode: RowMode,
    /// Transient label while a start/stop request is pending
    pub busy: Option<&'static str>,
}

impl TaskRow {
    fn viewing(id: TaskId) -> Self {
        Self {
            id,
            mode: RowMode::Viewing,
            busy: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, RowMode::Editing(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableBody {
    Loading,
    Failed(String),
    Rows(Vec<TaskRow>),
}

/// Fields of the creation dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskForm {
    pub task_name: String,
    pub keyword: String,
    pub description: String,
    pub min_price: String,
    pub max_price: String,
    pub personal_only: bool,
    pub max_pages: String,
    pub cron: String,
}

impl Default for NewTaskForm {
    fn default() -> Self {
        Self {
            task_name: String::new(),
            keyword: String::new(),
            description: String::new(),
            min_price: String::new(),
            max_price: String::new(),
            personal_only: true,
            max_pages: default_max_pages().to_string(),
            cron: String::new(),
        }
    }
}

impl NewTaskForm {
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), EditError> {
        match field {
            "name" | "task_name" => self.task_name = value.to_string(),
            "keyword" => self.keyword = value.to_string(),
            "description" => self.description = value.to_string(),
            "min_price" | "min" => self.min_price = value.to_string(),
            "max_price" | "max" => self.max_price = value.to_string(),
            "personal_only" | "personal" => self.personal_only = parse_flag(value),
            "max_pages" | "pages" => self.max_pages = value.to_string(),
            "cron" | "schedule" => self.cron = value.to_string(),
            other => return Err(EditError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    pub fn to_request(&self) -> Result<NewTaskRequest, EditError> {
        let required = |value: &str, name: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(EditError::Required(name))
            } else {
                Ok(value.to_string())
            }
        };

        Ok(NewTaskRequest {
            task_name: required(&self.task_name, "task name")?,
            keyword: required(&self.keyword, "keyword")?,
            description: required(&self.description, "description")?,
            personal_only: self.personal_only,
            min_price: optional_text(&self.min_price),
            max_price: optional_text(&self.max_price),
            max_pages: parse_pages(&self.max_pages)?,
            cron: optional_text(&self.cron),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDialog {
    pub form: NewTaskForm,
    pub submitting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriteriaDialog {
    pub task_id: TaskId,
    pub description: String,
    pub submitting: bool,
}

/// Everything the task view shows
#[derive(Debug, Clone)]
pub struct TableState {
    pub body: TableBody,
    /// Last known record per task, seeds edit forms
    pub records: HashMap<TaskId, Task>,
    pub create: Option<CreateDialog>,
    pub criteria: Option<CriteriaDialog>,
    pub revision: u64,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            body: TableBody::Loading,
            records: HashMap::new(),
            create: None,
            criteria: None,
            revision: 0,
        }
    }
}

impl TableState {
    pub fn any_editing(&self) -> bool {
        match &self.body {
            TableBody::Rows(rows) => rows.iter().any(TaskRow::is_editing),
            _ => false,
        }
    }

    pub fn row(&self, id: TaskId) -> Option<&TaskRow> {
        match &self.body {
            TableBody::Rows(rows) => rows.iter().find(|row| row.id == id),
            _ => None,
        }
    }

    fn row_mut(&mut self, id: TaskId) -> Option<&mut TaskRow> {
        match &mut self.body {
            TableBody::Rows(rows) => rows.iter_mut().find(|row| row.id == id),
            _ => None,
        }
    }

    fn replace(&mut self, tasks: Vec<Task>) {
        self.body = TableBody::Rows(tasks.iter().map(|task| TaskRow::viewing(task.id)).collect());
        self.records = tasks.into_iter().map(|task| (task.id, task)).collect();
        self.touch();
    }

    fn remove(&mut self, id: TaskId) {
        if let TableBody::Rows(rows) = &mut self.body {
            rows.retain(|row| row.id != id);
        }
        self.records.remove(&id);
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Outcome of a table refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Rendered,
    /// A row is being edited; fresh data was fetched and discarded
    SkippedEditing,
    Failed,
    Stale,
}

/// Task table with its poll loop and local edit state
#[derive(Clone)]
pub struct TaskTableController {
    ctx: ViewContext,
    state: Arc<Mutex<TableState>>,
    polling: Arc<Mutex<()>>,
}

impl TaskTableController {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            state: Arc::new(Mutex::new(TableState::default())),
            polling: Arc::new(Mutex::new(())),
        }
    }

    /// Refresh now, then keep refreshing on the configured interval
    pub async fn activate(&self) {
        self.refresh().await;
        if !self.ctx.is_current() {
            return;
        }

        let period = Duration::from_millis(self.ctx.config.tasks.poll_interval_ms);
        let controller = self.clone();
        self.ctx.polls.spawn(
            PollConcern::Tasks,
            self.ctx.view_generation(),
            period,
            move || {
                let controller = controller.clone();
                async move { controller.poll_tick().await }
            },
        );
    }

    /// One poll-loop tick; skipped while the previous tick's fetch is unresolved
    pub async fn poll_tick(&self) {
        let Ok(_polling) = self.polling.try_lock() else {
            debug!("Previous task refresh still in flight, skipping tick");
            return;
        };
        self.refresh().await;
    }

    /// Fetch all tasks and re-render unless any row is being edited
    pub async fn refresh(&self) -> RefreshOutcome {
        let result = self.ctx.api.list_tasks().await;
        if !self.ctx.is_current() {
            return RefreshOutcome::Stale;
        }

        let mut state = self.state.lock().await;
        if state.any_editing() {
            debug!("A task row is being edited, skipping table refresh");
            return RefreshOutcome::SkippedEditing;
        }

        match result {
            Ok(tasks) => {
                debug!("Rendering {} tasks", tasks.len());
                state.replace(tasks);
                RefreshOutcome::Rendered
            }
            Err(e) => {
                warn!("Loading tasks failed: {}", e);
                state.body = TableBody::Failed(e.message());
                state.touch();
                RefreshOutcome::Failed
            }
        }
    }

    /// Single entry point for every row control; failures are shown to the user
    pub async fn dispatch(&self, action: TaskAction) -> Result<(), ActionError> {
        debug!("Task action {:?}", action);
        let result = match action {
            TaskAction::Start(id) => self.start(id).await,
            TaskAction::Stop(id) => self.stop(id).await,
            TaskAction::Edit(id) => self.begin_edit(id).await,
            TaskAction::Save(id) => self.save(id).await,
            TaskAction::Cancel(id) => self.cancel(id).await,
            TaskAction::Delete(id) => self.delete(id).await,
            TaskAction::RefreshCriteria(id) => self.open_criteria(id).await,
            TaskAction::ToggleEnabled(id, enabled) => self.toggle_enabled(id, enabled).await,
        };

        if let Err(e) = &result {
            self.ctx.interaction.notify(&e.to_string());
        }
        result
    }

    async fn record(&self, id: TaskId) -> Result<Task, ActionError> {
        self.state
            .lock()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or(ActionError::UnknownTask(id))
    }

    async fn set_busy(&self, id: TaskId, label: Option<&'static str>) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.row_mut(id) {
            row.busy = label;
            state.touch();
        }
    }

    async fn start(&self, id: TaskId) -> Result<(), ActionError> {
        let task = self.record(id).await?;
        if !task.enabled {
            return Err(ActionError::Disabled(id));
        }

        self.set_busy(id, Some("starting...")).await;
        let result = self.ctx.api.start_task(id).await;
        self.set_busy(id, None).await;
        self.refresh().await;

        result?;
        info!("Started task {}", id);
        Ok(())
    }

    async fn stop(&self, id: TaskId) -> Result<(), ActionError> {
        self.record(id).await?;

        self.set_busy(id, Some("stopping...")).await;
        let result = self.ctx.api.stop_task(id).await;
        self.set_busy(id, None).await;
        self.refresh().await;

        result?;
        info!("Stopped task {}", id);
        Ok(())
    }

    async fn begin_edit(&self, id: TaskId) -> Result<(), ActionError> {
        let mut state = self.state.lock().await;
        let form = state
            .records
            .get(&id)
            .map(EditForm::from_task)
            .ok_or(ActionError::UnknownTask(id))?;
        let row = state.row_mut(id).ok_or(ActionError::UnknownTask(id))?;
        if !row.is_editing() {
            row.mode = RowMode::Editing(form);
            state.touch();
        }
        Ok(())
    }

    /// Change one input of a row being edited
    pub async fn edit_field(&self, id: TaskId, field: EditField, value: &str) -> Result<(), ActionError> {
        let mut state = self.state.lock().await;
        let row = state.row_mut(id).ok_or(ActionError::UnknownTask(id))?;
        match &mut row.mode {
            RowMode::Editing(form) => form.set(field, value),
            RowMode::Viewing => return Err(ActionError::NotEditing(id)),
        }
        state.touch();
        Ok(())
    }

    async fn save(&self, id: TaskId) -> Result<(), ActionError> {
        let update = {
            let state = self.state.lock().await;
            match state.row(id).map(|row| &row.mode) {
                Some(RowMode::Editing(form)) => form.to_update()?,
                Some(RowMode::Viewing) => return Err(ActionError::NotEditing(id)),
                None => return Err(ActionError::UnknownTask(id)),
            }
        };

        // On failure the row stays in editing with the user's values
        self.ctx.api.update_task(id, &update).await?;
        info!("Updated task {}", id);

        {
            let mut state = self.state.lock().await;
            if let Some(row) = state.row_mut(id) {
                row.mode = RowMode::Viewing;
                state.touch();
            }
        }
        self.refresh().await;
        Ok(())
    }

    async fn cancel(&self, id: TaskId) -> Result<(), ActionError> {
        {
            let mut state = self.state.lock().await;
            let row = state.row_mut(id).ok_or(ActionError::UnknownTask(id))?;
            row.mode = RowMode::Viewing;
            state.touch();
        }
        self.refresh().await;
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<(), ActionError> {
        let task = self.record(id).await?;
        let question = format!("Delete task \"{}\"?", task.task_name);
        if !self.ctx.interaction.confirm(&question).await {
            return Ok(());
        }

        self.ctx.api.delete_task(id).await?;
        info!("Deleted task {}", id);
        self.state.lock().await.remove(id);
        Ok(())
    }

    async fn toggle_enabled(&self, id: TaskId, enabled: bool) -> Result<(), ActionError> {
        let known = {
            let mut state = self.state.lock().await;
            let row = state.row_mut(id).ok_or(ActionError::UnknownTask(id))?;
            if let RowMode::Editing(form) = &mut row.mode {
                // Inside an edit the switch is just another input
                form.enabled = enabled;
                state.touch();
                return Ok(());
            }
            let record = state.records.get_mut(&id).ok_or(ActionError::UnknownTask(id))?;
            let known = record.enabled;
            record.enabled = enabled;
            state.touch();
            known
        };

        if let Err(e) = self.ctx.api.update_task(id, &TaskUpdate::enabled(enabled)).await {
            let mut state = self.state.lock().await;
            if let Some(record) = state.records.get_mut(&id) {
                record.enabled = known;
            }
            state.touch();
            return Err(e.into());
        }
        debug!("Task {} enabled={}", id, enabled);
        Ok(())
    }

    async fn open_criteria(&self, id: TaskId) -> Result<(), ActionError> {
        let mut state = self.state.lock().await;
        let description = state
            .records
            .get(&id)
            .map(|task| task.description.clone())
            .ok_or(ActionError::UnknownTask(id))?;
        state.criteria = Some(CriteriaDialog {
            task_id: id,
            description,
            submitting: false,
        });
        state.touch();
        Ok(())
    }

    pub async fn set_criteria_description(&self, description: &str) -> Result<(), ActionError> {
        let mut state = self.state.lock().await;
        let dialog = state.criteria.as_mut().ok_or(ActionError::NoDialog)?;
        dialog.description = description.to_string();
        state.touch();
        Ok(())
    }

    /// Send the new description so the backend regenerates the criteria
    pub async fn submit_criteria(&self) -> Result<(), ActionError> {
        let result = self.try_submit_criteria().await;
        if let Err(e) = &result {
            self.ctx.interaction.notify(&e.to_string());
        }
        result
    }

    async fn try_submit_criteria(&self) -> Result<(), ActionError> {
        let (id, description) = {
            let mut state = self.state.lock().await;
            let dialog = state.criteria.as_mut().ok_or(ActionError::NoDialog)?;
            let description = dialog.description.trim().to_string();
            if description.is_empty() {
                return Err(EditError::Required("description").into());
            }
            dialog.submitting = true;
            (dialog.task_id, description)
        };

        let result = self.ctx.api.update_task(id, &TaskUpdate::description(description)).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(_) => {
                info!("Regenerated criteria of task {}", id);
                state.criteria = None;
                state.touch();
                Ok(())
            }
            Err(e) => {
                if let Some(dialog) = state.criteria.as_mut() {
                    dialog.submitting = false;
                }
                state.touch();
                Err(e.into())
            }
        }
    }

    pub async fn close_criteria(&self) {
        let mut state = self.state.lock().await;
        state.criteria = None;
        state.touch();
    }

    pub async fn open_create(&self) {
        let mut state = self.state.lock().await;
        if state.create.is_none() {
            state.create = Some(CreateDialog {
                form: NewTaskForm::default(),
                submitting: false,
            });
            state.touch();
        }
    }

    pub async fn set_create_field(&self, field: &str, value: &str) -> Result<(), ActionError> {
        let mut state = self.state.lock().await;
        let dialog = state.create.as_mut().ok_or(ActionError::NoDialog)?;
        dialog.form.set(field, value)?;
        state.touch();
        Ok(())
    }

    pub async fn close_create(&self) {
        let mut state = self.state.lock().await;
        state.create = None;
        state.touch();
    }

    /// Ask the backend to generate a task; the dialog stays open on failure
    pub async fn submit_create(&self) -> Result<(), ActionError> {
        let result = self.try_submit_create().await;
        if let Err(e) = &result {
            self.ctx.interaction.notify(&e.to_string());
        }
        result
    }

    async fn try_submit_create(&self) -> Result<(), ActionError> {
        let request = {
            let mut state = self.state.lock().await;
            let dialog = state.create.as_mut().ok_or(ActionError::NoDialog)?;
            let request = dialog.form.to_request()?;
            dialog.submitting = true;
            state.touch();
            request
        };

        info!("Generating task '{}'", request.task_name);
        let result = self.ctx.api.generate_task(&request).await;

        {
            let mut state = self.state.lock().await;
            match &result {
                Ok(_) => state.create = None,
                Err(_) => {
                    if let Some(dialog) = state.create.as_mut() {
                        dialog.submitting = false;
                    }
                }
            }
            state.touch();
        }

        result?;
        self.refresh().await;
        Ok(())
    }

    pub async fn snapshot(&self) -> TableState {
        self.state.lock().await.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.state.lock().await.revision
    }

    pub async fn render(&self) -> String {
        render_table(&*self.state.lock().await)
    }
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value.filter(|v| !v.is_empty()).unwrap_or(placeholder)
}

struct Cells<'a>(&'a Task);

impl fmt::Display for Cells<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.0;
        write!(
            f,
            "[{}] #{:<3} {:<20} {:<8} {:<16} {} - {:<8} {:<9} pages {:<3} {:<24} {}",
            if task.enabled { "x" } else { " " },
            task.id,
            task.task_name,
            if task.is_running { "running" } else { "stopped" },
            task.keyword,
            or_placeholder(task.min_price.as_deref(), "any"),
            or_placeholder(task.max_price.as_deref(), "any"),
            if task.personal_only { "personal" } else { "" },
            task.max_pages,
            or_placeholder(Some(task.ai_prompt_criteria_file.trim_start_matches("prompts/")), "N/A"),
            or_placeholder(task.cron.as_deref(), "not set"),
        )
    }
}

fn row_actions(task: &Task) -> &'static str {
    if task.is_running {
        "stop | edit | delete | criteria"
    } else if task.enabled {
        "start | edit | delete | criteria"
    } else {
        "edit | delete | criteria (disabled)"
    }
}

/// Text rendering of the table and any open dialog
pub fn render_table(state: &TableState) -> String {
    let mut out = String::new();
    match &state.body {
        TableBody::Loading => out.push_str("Loading tasks...\n"),
        TableBody::Failed(message) => out.push_str(&format!("Failed to load tasks: {}\n", message)),
        TableBody::Rows(rows) if rows.is_empty() => {
            out.push_str("No tasks yet. Use `new` to create one.\n");
        }
        TableBody::Rows(rows) => {
            for row in rows {
                let Some(task) = state.records.get(&row.id) else {
                    continue;
                };
                match &row.mode {
                    RowMode::Viewing => {
                        let actions = row.busy.unwrap_or_else(|| row_actions(task));
                        out.push_str(&format!("{}   {}\n", Cells(task), actions));
                    }
                    RowMode::Editing(form) => {
                        out.push_str(&format!(
                            "[{}] #{:<3} (editing) name='{}' keyword='{}' price='{}'-'{}' personal={} pages='{}' cron='{}'   {} {}   save | cancel\n",
                            if form.enabled { "x" } else { " " },
                            task.id,
                            form.task_name,
                            form.keyword,
                            form.min_price,
                            form.max_price,
                            form.personal_only,
                            form.max_pages,
                            form.cron,
                            if task.is_running { "running" } else { "stopped" },
                            or_placeholder(Some(task.ai_prompt_criteria_file.trim_start_matches("prompts/")), "N/A"),
                        ));
                    }
                }
            }
        }
    }

    if let Some(dialog) = &state.create {
        let form = &dialog.form;
        out.push_str(&format!(
            "\n-- New task{} --\n  name: {}\n  keyword: {}\n  description: {}\n  price: {} - {}\n  personal only: {}\n  pages: {}\n  cron: {}\n",
            if dialog.submitting { " (generating criteria...)" } else { "" },
            form.task_name,
            form.keyword,
            form.description,
            form.min_price,
            form.max_price,
            form.personal_only,
            form.max_pages,
            form.cron,
        ));
    }

    if let Some(dialog) = &state.criteria {
        out.push_str(&format!(
            "\n-- Regenerate AI criteria for task #{}{} --\n  {}\n",
            dialog.task_id,
            if dialog.submitting { " (working...)" } else { "" },
            dialog.description,
        ));
    }
    out
}
