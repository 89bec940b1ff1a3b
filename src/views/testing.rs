//! Shared fixtures for the view tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Generation, Interaction, PollSet, ViewContext};
use crate::api::DashboardApi;
use crate::cli::config::ConsoleConfig;
use crate::storage::{MemoryPreferences, Preferences};

/// Answers confirmations from a script and records notifications
#[derive(Default)]
pub struct ScriptedInteraction {
    answers: Mutex<VecDeque<bool>>,
    notices: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn confirm(&self, question: &str) -> bool {
        self.questions.lock().unwrap().push(question.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub ctx: ViewContext,
    pub interaction: Arc<ScriptedInteraction>,
    pub prefs: Arc<MemoryPreferences>,
    pub generation: Generation,
    pub polls: PollSet,
}

impl Harness {
    /// Navigate away: start a new generation and hand out its context
    pub fn next_view(&self) -> ViewContext {
        self.generation.advance();
        ViewContext::new(
            self.ctx.api.clone(),
            self.ctx.interaction.clone(),
            self.ctx.prefs.clone(),
            self.ctx.config.clone(),
            self.polls.clone(),
            self.generation.clone(),
        )
    }
}

pub fn harness(api: Arc<dyn DashboardApi>) -> Harness {
    harness_with(api, ScriptedInteraction::default())
}

pub fn harness_with(api: Arc<dyn DashboardApi>, interaction: ScriptedInteraction) -> Harness {
    let interaction = Arc::new(interaction);
    let prefs = Arc::new(MemoryPreferences::default());
    let generation = Generation::default();
    let polls = PollSet::new(generation.clone());
    generation.advance();

    let mut config = ConsoleConfig::default();
    config.logs.viewport_rows = 3;
    config.logs.scroll_tolerance = 1;

    let ctx = ViewContext::new(
        api,
        interaction.clone(),
        prefs.clone() as Arc<dyn Preferences>,
        Arc::new(config),
        polls.clone(),
        generation.clone(),
    );

    Harness {
        ctx,
        interaction,
        prefs,
        generation,
        polls,
    }
}
