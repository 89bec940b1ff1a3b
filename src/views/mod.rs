pub mod login;
pub mod logs;
pub mod poll;
pub mod registry;
pub mod results;
pub mod router;
pub mod settings;
pub mod tasks;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::sync::Arc;

use crate::api::DashboardApi;
use crate::cli::config::ConsoleConfig;
use crate::storage::Preferences;

// Re-export common types
pub use login::LoginWidget;
pub use logs::LogTailer;
pub use poll::{Generation, PollConcern, PollSet};
pub use registry::{Shell, ViewKind, ViewRegistry};
pub use results::ResultsBrowser;
pub use router::{ActiveView, Router};
pub use settings::SettingsPanel;
pub use tasks::{TaskAction, TaskTableController};

/// User-facing confirmations and blocking notifications
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Ask a yes/no question; only an explicit yes confirms
    async fn confirm(&self, question: &str) -> bool;

    /// Show a message the user has to see
    fn notify(&self, message: &str);
}

/// Everything one view instance needs, scoped to the navigation that created it
#[derive(Clone)]
pub struct ViewContext {
    pub api: Arc<dyn DashboardApi>,
    pub interaction: Arc<dyn Interaction>,
    pub prefs: Arc<dyn Preferences>,
    pub config: Arc<ConsoleConfig>,
    pub polls: PollSet,
    generation: Generation,
    view_generation: u64,
}

impl ViewContext {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        interaction: Arc<dyn Interaction>,
        prefs: Arc<dyn Preferences>,
        config: Arc<ConsoleConfig>,
        polls: PollSet,
        generation: Generation,
    ) -> Self {
        let view_generation = generation.current();
        Self {
            api,
            interaction,
            prefs,
            config,
            polls,
            generation,
            view_generation,
        }
    }

    pub fn view_generation(&self) -> u64 {
        self.view_generation
    }

    /// False once the user has navigated away from the view owning this context
    pub fn is_current(&self) -> bool {
        self.generation.is_current(self.view_generation)
    }
}
