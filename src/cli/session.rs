use anyhow::{anyhow, bail, Context, Result};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::prompt::TerminalInteraction;
use crate::api::{SortKey, SortOrder, TaskId};
use crate::views::tasks::EditField;
use crate::views::{ActiveView, Router, TaskAction};

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

const HELP: &str = "\
navigation:  go tasks|results|logs|settings   refresh   help   quit
tasks:       start|stop|edit|save|cancel|delete <id>   set <id> <field> <value>
             toggle <id> on|off   criteria <id>   criteria-set <text>   criteria-submit   criteria-close
             new   new-set <field> <value>   new-submit   new-close
results:     file <name>   recommended on|off   sort capture|publish|price   order asc|desc
             delete-file   json <n>   json-close
logs:        auto on|off   clear   scroll top|bottom|up <n>|down <n>|<row>
settings:    prompt <file>   prompt-set <text>   prompt-save   notify-set <KEY> <value>   notify-save
             ai-set <KEY> <value>   ai-save   ai-test   ai-test-backend
login:       login-show   login-update <json>   login-delete";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scroll {
    Top,
    Bottom,
    By(isize),
    To(usize),
}

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go(String),
    Refresh,
    Task(TaskAction),
    SetField { id: TaskId, field: EditField, value: String },
    CriteriaSet(String),
    CriteriaSubmit,
    CriteriaClose,
    NewTask,
    NewSet { field: String, value: String },
    NewSubmit,
    NewClose,
    AutoRefresh(bool),
    ClearLogs,
    Scroll(Scroll),
    SelectFile(String),
    RecommendedOnly(bool),
    SortBy(SortKey),
    Order(SortOrder),
    DeleteFile,
    ViewJson(usize),
    CloseJson,
    SelectPrompt(String),
    SetPrompt(String),
    SavePrompt,
    NotifySet { key: String, value: String },
    NotifySave,
    AiSet { key: String, value: String },
    AiSave,
    AiTest,
    AiTestBackend,
    LoginShow,
    LoginUpdate(String),
    LoginDelete,
    Help,
    Quit,
}

fn switch(value: &str) -> Result<bool> {
    match value {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => bail!("expected on or off, got '{}'", other),
    }
}

fn task_id(value: &str) -> Result<TaskId> {
    let value = required(value, "task id")?;
    let id = value
        .trim_start_matches('#')
        .parse::<u64>()
        .with_context(|| format!("'{}' is not a task id", value))?;
    Ok(TaskId(id))
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.is_empty() {
        bail!("missing {}", what);
    }
    Ok(value)
}

/// Split `"<word> <rest>"` keeping the rest verbatim
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

/// Parse one input line; blank lines are not commands
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let (name, rest) = split_word(line);
    if name.is_empty() {
        return Ok(None);
    }
    let (first, tail) = split_word(rest);

    let command = match name {
        "go" => Command::Go(rest.to_string()),
        "tasks" | "results" | "logs" | "settings" => Command::Go(name.to_string()),
        "refresh" | "r" => Command::Refresh,

        "start" => Command::Task(TaskAction::Start(task_id(rest)?)),
        "stop" => Command::Task(TaskAction::Stop(task_id(rest)?)),
        "edit" => Command::Task(TaskAction::Edit(task_id(rest)?)),
        "save" => Command::Task(TaskAction::Save(task_id(rest)?)),
        "cancel" => Command::Task(TaskAction::Cancel(task_id(rest)?)),
        "delete" => Command::Task(TaskAction::Delete(task_id(rest)?)),
        "criteria" => Command::Task(TaskAction::RefreshCriteria(task_id(rest)?)),
        "toggle" => Command::Task(TaskAction::ToggleEnabled(
            task_id(first)?,
            switch(required(tail, "on or off")?)?,
        )),
        "set" => {
            let (field, value) = split_word(tail);
            Command::SetField {
                id: task_id(first)?,
                field: EditField::parse(required(field, "field name")?)?,
                value: value.to_string(),
            }
        }
        "criteria-set" => Command::CriteriaSet(rest.to_string()),
        "criteria-submit" => Command::CriteriaSubmit,
        "criteria-close" => Command::CriteriaClose,
        "new" => Command::NewTask,
        "new-set" => Command::NewSet {
            field: required(first, "field name")?.to_string(),
            value: tail.to_string(),
        },
        "new-submit" => Command::NewSubmit,
        "new-close" => Command::NewClose,

        "auto" => Command::AutoRefresh(switch(required(rest, "on or off")?)?),
        "clear" => Command::ClearLogs,
        "scroll" => Command::Scroll(match (first, tail) {
            ("top", _) => Scroll::Top,
            ("bottom", _) => Scroll::Bottom,
            ("up", n) => Scroll::By(-n.parse::<isize>().unwrap_or(1)),
            ("down", n) => Scroll::By(n.parse::<isize>().unwrap_or(1)),
            (row, _) => Scroll::To(
                row.parse::<usize>()
                    .with_context(|| format!("cannot scroll to '{}'", row))?
                    .saturating_sub(1),
            ),
        }),

        "file" => Command::SelectFile(required(rest, "file name")?.to_string()),
        "recommended" => Command::RecommendedOnly(switch(required(rest, "on or off")?)?),
        "sort" => Command::SortBy(
            SortKey::parse(rest).ok_or_else(|| anyhow!("sort by capture, publish or price"))?,
        ),
        "order" => Command::Order(SortOrder::parse(rest).ok_or_else(|| anyhow!("order is asc or desc"))?),
        "delete-file" => Command::DeleteFile,
        "json" => {
            let n = rest
                .parse::<usize>()
                .with_context(|| format!("'{}' is not an item number", rest))?;
            if n == 0 {
                bail!("items are numbered from 1");
            }
            Command::ViewJson(n - 1)
        }
        "json-close" => Command::CloseJson,

        "prompt" => Command::SelectPrompt(required(rest, "prompt file")?.to_string()),
        "prompt-set" => Command::SetPrompt(rest.replace("\\n", "\n")),
        "prompt-save" => Command::SavePrompt,
        "notify-set" => Command::NotifySet {
            key: required(first, "setting name")?.to_string(),
            value: tail.to_string(),
        },
        "notify-save" => Command::NotifySave,
        "ai-set" => Command::AiSet {
            key: required(first, "setting name")?.to_string(),
            value: tail.to_string(),
        },
        "ai-save" => Command::AiSave,
        "ai-test" => Command::AiTest,
        "ai-test-backend" => Command::AiTestBackend,

        "login-show" => Command::LoginShow,
        "login-update" => Command::LoginUpdate(rest.to_string()),
        "login-delete" => Command::LoginDelete,

        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command '{}', type `help` for a list", other),
    };
    Ok(Some(command))
}

fn wrong_view(command: &Command) -> anyhow::Error {
    anyhow!("{:?} is not available on this view", command)
}

/// Run one command against the router and its active view
pub async fn execute(router: &Router, command: Command) -> Result<()> {
    debug!("Executing {:?}", command);
    let view = router.current().await;

    match (command, view) {
        (Command::Go(route), _) => router.navigate(&route).await,
        (Command::Refresh, ActiveView::Tasks(tasks)) => {
            tasks.refresh().await;
        }
        (Command::Refresh, ActiveView::Results(results)) => results.refresh().await,
        (Command::Refresh, ActiveView::Logs(logs)) => logs.full_refresh().await,
        (Command::Refresh, _) => router.reload().await,

        // Failures are already shown to the user by the controller
        (Command::Task(action), ActiveView::Tasks(tasks)) => {
            let _ = tasks.dispatch(action).await;
        }
        (Command::SetField { id, field, value }, ActiveView::Tasks(tasks)) => {
            tasks.edit_field(id, field, &value).await?
        }
        (Command::CriteriaSet(text), ActiveView::Tasks(tasks)) => tasks.set_criteria_description(&text).await?,
        (Command::CriteriaSubmit, ActiveView::Tasks(tasks)) => {
            let _ = tasks.submit_criteria().await;
        }
        (Command::CriteriaClose, ActiveView::Tasks(tasks)) => tasks.close_criteria().await,
        (Command::NewTask, ActiveView::Tasks(tasks)) => tasks.open_create().await,
        (Command::NewSet { field, value }, ActiveView::Tasks(tasks)) => {
            tasks.set_create_field(&field, &value).await?
        }
        (Command::NewSubmit, ActiveView::Tasks(tasks)) => {
            let _ = tasks.submit_create().await;
        }
        (Command::NewClose, ActiveView::Tasks(tasks)) => tasks.close_create().await,

        (Command::AutoRefresh(enabled), ActiveView::Logs(logs)) => logs.set_auto_refresh(enabled).await,
        (Command::ClearLogs, ActiveView::Logs(logs)) => {
            logs.clear().await;
        }
        (Command::Scroll(scroll), ActiveView::Logs(logs)) => match scroll {
            Scroll::Top => logs.scroll_to(0).await,
            Scroll::Bottom => logs.scroll_to_bottom().await,
            Scroll::By(delta) => logs.scroll_by(delta).await,
            Scroll::To(row) => logs.scroll_to(row).await,
        },

        (Command::SelectFile(name), ActiveView::Results(results)) => results.select_file(&name).await?,
        (Command::RecommendedOnly(on), ActiveView::Results(results)) => results.set_recommended_only(on).await,
        (Command::SortBy(key), ActiveView::Results(results)) => results.set_sort_key(key).await,
        (Command::Order(order), ActiveView::Results(results)) => results.set_sort_order(order).await,
        (Command::DeleteFile, ActiveView::Results(results)) => results.delete_selected().await,
        (Command::ViewJson(index), ActiveView::Results(results)) => results.view_item(index).await?,
        (Command::CloseJson, ActiveView::Results(results)) => results.close_viewer().await,

        (Command::SelectPrompt(file), ActiveView::Settings(settings)) => settings.select_prompt(&file).await,
        (Command::SetPrompt(text), ActiveView::Settings(settings)) => settings.set_prompt_content(&text).await?,
        (Command::SavePrompt, ActiveView::Settings(settings)) => settings.save_prompt().await,
        (Command::NotifySet { key, value }, ActiveView::Settings(settings)) => {
            settings.set_notification_field(&key, &value).await?
        }
        (Command::NotifySave, ActiveView::Settings(settings)) => settings.save_notifications().await,
        (Command::AiSet { key, value }, ActiveView::Settings(settings)) => settings.set_ai_field(&key, &value).await?,
        (Command::AiSave, ActiveView::Settings(settings)) => settings.save_ai().await,
        (Command::AiTest, ActiveView::Settings(settings)) => settings.test_ai().await,
        (Command::AiTestBackend, ActiveView::Settings(settings)) => settings.test_ai_backend().await,

        (Command::LoginShow, _) => {
            if let Some(document) = router.login().show().await {
                println!("{}", document);
            }
        }
        (Command::LoginUpdate(content), _) => router.update_login_state(&content).await,
        (Command::LoginDelete, _) => router.delete_login_state().await,

        (Command::Help, _) => println!("{}", HELP),
        (Command::Quit, _) => {}
        (command, _) => return Err(wrong_view(&command)),
    }
    Ok(())
}

fn draw(screen: &str) {
    print!("\x1B[2J\x1B[H{}\n> ", screen);
    let _ = io::stdout().flush();
}

/// Interactive loop: commands from stdin, redraws when anything on screen changed
pub async fn run(router: Router, interaction: Arc<TerminalInteraction>, route: &str) -> Result<()> {
    router.login().refresh().await;
    router.navigate(route).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut redraw = time::interval(REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut shown = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    info!("Input closed, ending session");
                    break;
                };
                if interaction.answer(&line) {
                    continue;
                }
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(command)) => {
                        // Long calls such as task generation must not block the prompt
                        let router = router.clone();
                        tokio::spawn(async move {
                            if let Err(e) = execute(&router, command).await {
                                println!("\n!! {:#}", e);
                            }
                        });
                    }
                    Err(e) => println!("!! {:#}", e),
                }
            }
            _ = redraw.tick() => {
                if interaction.is_asking() {
                    continue;
                }
                let revision = router.revision().await;
                if shown != Some(revision) {
                    shown = Some(revision);
                    draw(&router.render().await);
                }
            }
        }
    }

    router.teardown();
    Ok(())
}
