//! Just Ask AI
//!
//! Telegram assistant backed by Gemini, with web search, a shared knowledge
//! base, per-user preferences and scheduled reminders.
//!
//! # Features
//!
//! - **Conversation**: per-user history, factual questions grounded in the
//!   knowledge base and the web
//! - **Tools**: translation, summarization, creative generation, search
//! - **Preferences**: stored per user, applied to every answer
//! - **Reminders**: natural-language times, durable in SQLite, exactly-once delivery
//! - **Inline keyboards**: compact callback tokens with legacy-format tolerance
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► telegram (teloxide) ──► handlers::Assistant ──► llm (Gemini)
//!                   ▲                        │                  search (SerpAPI)
//!                   │                        ├── session (in-memory)
//!                   │                        ├── store (SQLite + FTS5)
//!                   └──── deliveries ◄────── scheduler
//! ```

pub mod callback;
pub mod config;
pub mod datetime;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod reminders;
pub mod render;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod store;
pub mod telegram;

pub use callback::CallbackAction;
pub use config::Config;
pub use error::{AssistantError, Result};
pub use handlers::{Assistant, CallbackOutcome, Caller, Effect};
pub use render::Response;
pub use store::Store;
