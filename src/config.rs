//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Google Gemini API key
    pub gemini_api_key: String,

    /// Gemini model name
    pub gemini_model: String,

    /// SerpAPI key (web search is disabled without it)
    pub serpapi_key: Option<String>,

    /// SQLite database path
    pub db_path: PathBuf,

    /// Messages kept per user in conversation history
    pub max_conversation_history: usize,

    /// Default log level when RUST_LOG is unset
    pub log_level: String,

    pub log_format: LogFormat,

    /// Active (not completed) reminders a user may hold at once
    pub max_reminders_per_user: usize,

    /// Interval of the overdue-reminder sweep
    pub reminder_sweep_interval: Duration,

    /// Upper bound for every LLM and search request
    pub http_timeout: Duration,

    /// Telegram user ids allowed to talk to the bot (empty = everyone)
    pub allowed_users: Vec<i64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let telegram_token =
            std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN not set")?;
        let gemini_api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;

        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());

        let serpapi_key = std::env::var("SERPAPI_KEY").ok().filter(|k| !k.is_empty());

        let db_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/justaskai.db"));

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let allowed_users = std::env::var("ALLOWED_USERS")
            .map(|v| parse_user_list(&v))
            .unwrap_or_default();

        Ok(Self {
            telegram_token,
            gemini_api_key,
            gemini_model,
            serpapi_key,
            db_path,
            max_conversation_history: env_parse("MAX_CONVERSATION_HISTORY", 10),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            max_reminders_per_user: env_parse("MAX_REMINDERS_PER_USER", 5),
            reminder_sweep_interval: Duration::from_secs(env_parse("REMINDER_SWEEP_SECS", 60)),
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 30)),
            allowed_users,
        })
    }

    /// Whether a Telegram user may use the bot
    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_user_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}
