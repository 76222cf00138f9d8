//! Error taxonomy shared by the store, collaborators and routers

/// Errors raised inside the assistant core.
///
/// None of these ever reach the transport: entry points turn them into a
/// user-visible reply or acknowledgment.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Malformed command arguments, unparseable reminder time, invalid key
    #[error("invalid input: {0}")]
    UserInput(String),

    /// LLM or search call failed or timed out
    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Unrecognized callback token or malformed structured payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reminder cap already met; nothing was written
    #[error("reminder limit reached ({max})")]
    LimitReached { max: usize },
}

pub type Result<T> = std::result::Result<T, AssistantError>;
