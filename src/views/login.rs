use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::Interaction;
use crate::api::DashboardApi;

/// Marketplace login state as last reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Unknown,
    LoggedIn,
    LoggedOut,
}

/// Header widget showing whether the backend holds a login state file.
///
/// Lives as long as the session, across navigations.
#[derive(Clone)]
pub struct LoginWidget {
    api: Arc<dyn DashboardApi>,
    interaction: Arc<dyn Interaction>,
    status: Arc<Mutex<(LoginStatus, u64)>>,
}

impl LoginWidget {
    pub fn new(api: Arc<dyn DashboardApi>, interaction: Arc<dyn Interaction>) -> Self {
        Self {
            api,
            interaction,
            status: Arc::new(Mutex::new((LoginStatus::Unknown, 0))),
        }
    }

    /// Re-read the system status; a failed read leaves the widget unchanged
    pub async fn refresh(&self) {
        match self.api.system_status().await {
            Ok(status) => {
                let next = if status.login_state_file.exists {
                    LoginStatus::LoggedIn
                } else {
                    LoginStatus::LoggedOut
                };
                let mut current = self.status.lock().await;
                if current.0 != next {
                    debug!("Login state is now {:?}", next);
                    *current = (next, current.1 + 1);
                }
            }
            Err(e) => warn!("Could not read login state: {}", e),
        }
    }

    pub async fn status(&self) -> LoginStatus {
        self.status.lock().await.0
    }

    pub async fn revision(&self) -> u64 {
        self.status.lock().await.1
    }

    /// The stored login state document, pretty-printed
    pub async fn show(&self) -> Option<String> {
        match self.api.login_state().await {
            Ok(document) => Some(
                serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string()),
            ),
            Err(e) => {
                self.interaction.notify(&format!("Error: {}", e.message()));
                None
            }
        }
    }

    /// Upload a new login state; returns whether it was stored
    pub async fn update(&self, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() {
            self.interaction.notify("Paste the login state JSON first.");
            return false;
        }

        match self.api.update_login_state(content).await {
            Ok(_) => {
                info!("Login state updated");
                self.interaction.notify("Login state updated.");
                self.refresh().await;
                true
            }
            Err(e) => {
                self.interaction.notify(&format!("Update failed: {}", e.message()));
                false
            }
        }
    }

    /// Delete the login state after confirmation; returns whether it was deleted
    pub async fn delete(&self) -> bool {
        if !self
            .interaction
            .confirm("Delete the login state? Monitoring tasks will stop working until you log in again.")
            .await
        {
            return false;
        }

        match self.api.delete_login_state().await {
            Ok(ack) => {
                info!("Login state deleted");
                let message = if ack.message.is_empty() {
                    "Login state deleted."
                } else {
                    ack.message.as_str()
                };
                self.interaction.notify(message);
                self.refresh().await;
                true
            }
            Err(e) => {
                self.interaction.notify(&format!("Error: {}", e.message()));
                false
            }
        }
    }

    pub async fn render(&self) -> &'static str {
        match self.status().await {
            LoginStatus::Unknown => "login: checking...",
            LoginStatus::LoggedIn => "login: ok (login-update | login-delete)",
            LoginStatus::LoggedOut => "login: NOT LOGGED IN (login-update <json>)",
        }
    }
}
