use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::views::Interaction;

type Question = (String, oneshot::Sender<bool>);

/// Confirmations and notices on the terminal.
///
/// The session loop owns stdin; a line typed while a question is open is
/// handed to [`TerminalInteraction::answer`] instead of being run as a command.
#[derive(Default)]
pub struct TerminalInteraction {
    open: Mutex<VecDeque<Question>>,
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl TerminalInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> MutexGuard<'_, VecDeque<Question>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a question is waiting for an answer
    pub fn is_asking(&self) -> bool {
        !self.open().is_empty()
    }

    /// Answer the oldest open question; false when nothing was asked
    pub fn answer(&self, line: &str) -> bool {
        let mut open = self.open();
        let Some((_, reply)) = open.pop_front() else {
            return false;
        };
        // The asker may have gone away; an unheard answer is fine
        let _ = reply.send(is_yes(line));
        if let Some((next, _)) = open.front() {
            println!("? {} [y/N]", next);
        }
        true
    }
}

#[async_trait]
impl Interaction for TerminalInteraction {
    async fn confirm(&self, question: &str) -> bool {
        let (reply, answer) = oneshot::channel();
        {
            let mut open = self.open();
            if open.is_empty() {
                println!("\n? {} [y/N]", question);
            }
            open.push_back((question.to_string(), reply));
        }
        answer.await.unwrap_or(false)
    }

    fn notify(&self, message: &str) {
        println!("\n>> {}", message);
    }
}
