//! Assistant core
//!
//! [`Assistant`] owns every collaborator and exposes three entry points:
//! [`Assistant::handle_callback`], [`Assistant::handle_message`] and
//! [`Assistant::handle_command`]. None of them fail; the transport applies
//! whatever they return.

mod callbacks;
mod commands;
mod menus;
mod messages;
pub mod preferences;

use crate::llm::TextService;
use crate::render::Response;
use crate::scheduler::Scheduler;
use crate::search::WebSearch;
use crate::session::SessionRegistry;
use crate::store::Store;
use std::sync::Arc;

pub use commands::{format_reminder_time, reminder_notice, split_command};
pub use menus::language_name;

/// Shown whenever a top-level guard catches a failure
pub const GENERIC_ERROR: &str = "An error occurred while processing your request.";

/// Who triggered an update
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: i64,
    pub first_name: String,
}

impl Caller {
    pub fn new(user_id: i64, first_name: impl Into<String>) -> Self {
        Self {
            user_id,
            first_name: first_name.into(),
        }
    }
}

/// What to do with the message that carried the pressed button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Replace the message text and keyboard in place
    Edit(Response),
    /// Send a new message, leaving the original untouched
    Send(Response),
    /// Drop the inline keyboard
    RemoveMarkup,
}

/// Result of one callback: exactly one acknowledgment plus at most one effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub ack: String,
    pub effect: Effect,
}

impl CallbackOutcome {
    pub fn ack(text: impl Into<String>) -> Self {
        Self {
            ack: text.into(),
            effect: Effect::None,
        }
    }

    pub fn edit(text: impl Into<String>, response: Response) -> Self {
        Self {
            ack: text.into(),
            effect: Effect::Edit(response),
        }
    }

    pub fn send(text: impl Into<String>, response: Response) -> Self {
        Self {
            ack: text.into(),
            effect: Effect::Send(response),
        }
    }

    pub fn remove_markup(text: impl Into<String>) -> Self {
        Self {
            ack: text.into(),
            effect: Effect::RemoveMarkup,
        }
    }
}

/// Wiring for the assistant core
pub struct Assistant {
    store: Arc<Store>,
    sessions: SessionRegistry,
    text: TextService,
    search: WebSearch,
    scheduler: Arc<Scheduler>,
    max_reminders: usize,
}

impl Assistant {
    pub fn new(
        store: Arc<Store>,
        text: TextService,
        search: WebSearch,
        scheduler: Arc<Scheduler>,
        max_history: usize,
        max_reminders: usize,
    ) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(max_history),
            text,
            search,
            scheduler,
            max_reminders,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }
}

/// Opaque id for an ordinary answer
fn fresh_opaque_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
