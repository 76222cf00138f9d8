//! Per-user ephemeral session state
//!
//! Lives only as long as the process. Durable data belongs in [`crate::store`];
//! nothing here is ever written to disk.

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// What the next free-text message from a user should be treated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Value for this preference key
    PreferenceValue(String),
    /// Text to translate into this language name
    TranslationTarget(String),
    /// Text to summarize in this style
    SummaryStyle(String),
    /// Topic for this content type
    GenerationType(String),
}

impl PendingAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreferenceValue(_) => "preference_value",
            Self::TranslationTarget(_) => "translation_target",
            Self::SummaryStyle(_) => "summary_style",
            Self::GenerationType(_) => "generation_type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Rolling window of the most recent turns
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    max_len: usize,
    turns: VecDeque<Turn>,
}

impl ConversationHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            turns: VecDeque::with_capacity(max_len),
        }
    }

    /// Append a turn, dropping the oldest ones beyond the bound
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(Turn {
            role,
            content: content.into(),
        });
        while self.turns.len() > self.max_len {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }
}

/// Transient state for one user
#[derive(Debug, Clone)]
pub struct Session {
    /// At most one pending action at a time
    pub pending: Option<PendingAction>,
    /// Full prompt of the last generation, for `regen`
    pub last_generation_prompt: Option<String>,
    /// Set by `/reset`, consumed by `reset:confirm|cancel`
    pub reset_pending: bool,
    pub history: ConversationHistory,
}

impl Session {
    pub fn new(max_history: usize) -> Self {
        Self {
            pending: None,
            last_generation_prompt: None,
            reset_pending: false,
            history: ConversationHistory::new(max_history),
        }
    }
}

/// All live sessions, keyed by Telegram user id
pub struct SessionRegistry {
    max_history: usize,
    sessions: RwLock<HashMap<i64, Session>>,
}

impl SessionRegistry {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Copy of a user's session (fresh one if unseen)
    pub async fn get(&self, user_id: i64) -> Session {
        let sessions = self.sessions.read().await;
        sessions
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Session::new(self.max_history))
    }

    /// Mutate a user's session in place
    pub async fn update<F, R>(&self, user_id: i64, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(self.max_history));
        f(session)
    }

    /// Replace whatever was pending with `action`
    pub async fn set_pending(&self, user_id: i64, action: PendingAction) {
        self.update(user_id, |s| s.pending = Some(action)).await;
    }

    /// Remove and return the pending action
    pub async fn take_pending(&self, user_id: i64) -> Option<PendingAction> {
        self.update(user_id, |s| s.pending.take()).await
    }

    pub async fn push_turn(&self, user_id: i64, role: Role, content: &str) {
        self.update(user_id, |s| s.history.push(role, content)).await;
    }

    pub async fn history(&self, user_id: i64) -> Vec<Turn> {
        self.get(user_id).await.history.turns()
    }
}
