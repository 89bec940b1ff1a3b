use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::login::LoginWidget;
use super::registry::{Shell, ViewKind, ViewRegistry};
use super::{
    Generation, Interaction, LogTailer, PollSet, ResultsBrowser, SettingsPanel, TaskTableController,
    ViewContext,
};
use crate::api::DashboardApi;
use crate::cli::config::ConsoleConfig;
use crate::storage::Preferences;

/// The one view instance currently on screen
#[derive(Clone)]
pub enum ActiveView {
    Tasks(TaskTableController),
    Results(ResultsBrowser),
    Logs(LogTailer),
    Settings(SettingsPanel),
    NotFound,
}

impl ActiveView {
    fn build(kind: ViewKind, ctx: ViewContext) -> Self {
        match kind {
            ViewKind::Tasks => ActiveView::Tasks(TaskTableController::new(ctx)),
            ViewKind::Results => ActiveView::Results(ResultsBrowser::new(ctx)),
            ViewKind::Logs => ActiveView::Logs(LogTailer::new(ctx)),
            ViewKind::Settings => ActiveView::Settings(SettingsPanel::new(ctx)),
        }
    }

    async fn activate(&self) {
        match self {
            ActiveView::Tasks(view) => view.activate().await,
            ActiveView::Results(view) => view.activate().await,
            ActiveView::Logs(view) => view.activate().await,
            ActiveView::Settings(view) => view.activate().await,
            ActiveView::NotFound => {}
        }
    }

    async fn revision(&self) -> u64 {
        match self {
            ActiveView::Tasks(view) => view.revision().await,
            ActiveView::Results(view) => view.revision().await,
            ActiveView::Logs(view) => view.revision().await,
            ActiveView::Settings(view) => view.revision().await,
            ActiveView::NotFound => 0,
        }
    }

    async fn render(&self) -> Option<String> {
        match self {
            ActiveView::Tasks(view) => Some(view.render().await),
            ActiveView::Results(view) => Some(view.render().await),
            ActiveView::Logs(view) => Some(view.render().await),
            ActiveView::Settings(view) => Some(view.render().await),
            ActiveView::NotFound => None,
        }
    }
}

struct Screen {
    route: String,
    shell: Shell,
    view: ActiveView,
    navigations: u64,
}

/// Redraw marker; any change means the screen is out of date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revision {
    navigations: u64,
    view: u64,
    login: u64,
}

/// Top-level controller switching between mutually exclusive views
#[derive(Clone)]
pub struct Router {
    api: Arc<dyn DashboardApi>,
    interaction: Arc<dyn Interaction>,
    prefs: Arc<dyn Preferences>,
    config: Arc<ConsoleConfig>,
    registry: ViewRegistry,
    generation: Generation,
    polls: PollSet,
    login: LoginWidget,
    screen: Arc<Mutex<Screen>>,
}

impl Router {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        interaction: Arc<dyn Interaction>,
        prefs: Arc<dyn Preferences>,
        config: Arc<ConsoleConfig>,
    ) -> Self {
        let generation = Generation::default();
        let polls = PollSet::new(generation.clone());
        let login = LoginWidget::new(api.clone(), interaction.clone());
        Self {
            api,
            interaction,
            prefs,
            config,
            registry: ViewRegistry::standard(),
            generation,
            polls,
            login,
            screen: Arc::new(Mutex::new(Screen {
                route: String::new(),
                shell: ViewRegistry::not_found_shell(),
                view: ActiveView::NotFound,
                navigations: 0,
            })),
        }
    }

    /// Tear down the current view, then install and initialize the next one
    pub async fn navigate(&self, route: &str) {
        let generation = self.teardown();

        let key = ViewRegistry::normalize(route);
        let entry = self.registry.lookup(&key).copied();
        let view = match entry {
            Some(entry) => {
                let ctx = ViewContext::new(
                    self.api.clone(),
                    self.interaction.clone(),
                    self.prefs.clone(),
                    self.config.clone(),
                    self.polls.clone(),
                    self.generation.clone(),
                );
                ActiveView::build(entry.kind, ctx)
            }
            None => {
                info!("No view for route '{}'", key);
                ActiveView::NotFound
            }
        };

        {
            let mut screen = self.screen.lock().await;
            if !self.generation.is_current(generation) {
                debug!("Navigation to '{}' superseded before it was installed", key);
                return;
            }
            screen.shell = entry.map_or_else(ViewRegistry::not_found_shell, |entry| (entry.shell)());
            screen.route = key;
            screen.view = view.clone();
            screen.navigations += 1;
        }
        debug!("Activating generation {}", generation);

        view.activate().await;
    }

    /// Stop every poll loop and invalidate in-flight work of the current view.
    /// Returns the generation of the view that comes next.
    pub fn teardown(&self) -> u64 {
        self.polls.cancel_all();
        self.generation.advance()
    }

    pub async fn current(&self) -> ActiveView {
        self.screen.lock().await.view.clone()
    }

    pub async fn active_route(&self) -> String {
        self.screen.lock().await.route.clone()
    }

    pub fn polls(&self) -> &PollSet {
        &self.polls
    }

    pub fn login(&self) -> &LoginWidget {
        &self.login
    }

    /// Re-run the current view's initializer as a fresh activation
    pub async fn reload(&self) {
        let route = self.active_route().await;
        self.navigate(&route).await;
    }

    pub async fn update_login_state(&self, content: &str) {
        if self.login.update(content).await {
            self.refresh_settings_status().await;
        }
    }

    pub async fn delete_login_state(&self) {
        if self.login.delete().await {
            self.refresh_settings_status().await;
        }
    }

    async fn refresh_settings_status(&self) {
        if let ActiveView::Settings(panel) = self.current().await {
            panel.reload_status().await;
        }
    }

    pub async fn revision(&self) -> Revision {
        let (navigations, view) = {
            let screen = self.screen.lock().await;
            (screen.navigations, screen.view.clone())
        };
        Revision {
            navigations,
            view: view.revision().await,
            login: self.login.revision().await,
        }
    }

    /// Navigation bar, header widget, shell and the active view's body
    pub async fn render(&self) -> String {
        let (route, shell, view) = {
            let screen = self.screen.lock().await;
            (screen.route.clone(), screen.shell.clone(), screen.view.clone())
        };

        let mut out = format!(
            "{}    {}\n== {} ==\n",
            self.registry.nav_bar(&route),
            self.login.render().await,
            shell.title
        );
        if !shell.controls.is_empty() {
            out.push_str(&format!("commands: {}\n", shell.controls));
        }
        out.push('\n');
        match view.render().await {
            Some(body) => out.push_str(&body),
            None => {
                out.push_str(shell.placeholder);
                out.push('\n');
            }
        }
        out
    }
}
