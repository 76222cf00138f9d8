//! Just Ask AI - Entry Point

use justask_bot::config::{Config, LogFormat};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Just Ask AI v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: justask-bot");
        println!();
        println!("Environment variables:");
        println!("  TELEGRAM_BOT_TOKEN       Telegram bot token (required)");
        println!("  GEMINI_API_KEY           Gemini API key (required)");
        println!("  GEMINI_MODEL             Gemini model (default: gemini-2.0-flash)");
        println!("  SERPAPI_KEY              SerpAPI key; web search is off without it");
        println!("  DATABASE_PATH            SQLite file (default: data/justaskai.db)");
        println!("  MAX_CONVERSATION_HISTORY Turns kept per user (default: 10)");
        println!("  MAX_REMINDERS_PER_USER   Active reminders per user (default: 5)");
        println!("  REMINDER_SWEEP_SECS      Overdue-reminder sweep interval (default: 60)");
        println!("  HTTP_TIMEOUT_SECS        LLM and search timeout (default: 30)");
        println!("  ALLOWED_USERS            Comma-separated user ids; empty allows everyone");
        println!("  LOG_LEVEL / RUST_LOG     Log filter (default: info)");
        println!("  LOG_FORMAT               pretty or json (default: pretty)");
        return Ok(());
    }

    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Pretty => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    info!("Just Ask AI v{}", env!("CARGO_PKG_VERSION"));
    justask_bot::telegram::run_telegram_bot(config).await
}
