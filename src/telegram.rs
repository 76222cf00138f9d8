//! Telegram transport for Just Ask AI
//!
//! Wires the collaborators together, runs the teloxide dispatcher and turns
//! [`Response`] / [`CallbackOutcome`] values into Bot API calls. All
//! behavior lives in [`Assistant`]; this module only moves bytes.
//!
//! Uses explicit Dispatcher pattern for reliable message polling. Updates
//! from one chat are handled in order.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, Update},
};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::handlers::{reminder_notice, Assistant, CallbackOutcome, Caller, Effect};
use crate::llm::{GeminiClient, TextService};
use crate::render::{split_chunks, Keyboard, Response, MAX_MESSAGE_CHARS};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::search::{SerpApiClient, WebSearch};
use crate::store::{Reminder, Store};

/// Reminders waiting for delivery
const DELIVERY_BUFFER: usize = 64;

/// Shared state handed to every dispatcher endpoint
pub struct BotData {
    pub assistant: Assistant,
    pub config: Config,
}

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(config: Config) -> Result<()> {
    tracing::info!(
        model = %config.gemini_model,
        max_history = config.max_conversation_history,
        max_reminders = config.max_reminders_per_user,
        allow_list = config.allowed_users.len(),
        "configuration loaded"
    );

    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let store = Arc::new(Store::open(&config.db_path)?);
    tracing::info!(db = %config.db_path.display(), "store opened");

    let gemini = Arc::new(GeminiClient::from_config(&config)?);
    let serpapi = Arc::new(SerpApiClient::new(config.serpapi_key.clone(), config.http_timeout)?);
    if config.serpapi_key.is_none() {
        tracing::warn!("SERPAPI_KEY not set, web search disabled");
    }

    let scheduler_config = SchedulerConfig {
        sweep_interval: config.reminder_sweep_interval,
        ..SchedulerConfig::default()
    };
    let (scheduler, deliveries) = Scheduler::new(store.clone(), scheduler_config, DELIVERY_BUFFER);
    let rearmed = scheduler.rearm_all().await?;
    tracing::info!(rearmed, "reminders re-armed from store");
    let scheduler_task = scheduler.start();

    let assistant = Assistant::new(
        store,
        TextService::new(gemini, config.http_timeout),
        WebSearch::new(serpapi, config.http_timeout),
        scheduler.clone(),
        config.max_conversation_history,
        config.max_reminders_per_user,
    );

    let bot = Bot::new(config.telegram_token.clone());
    tokio::spawn(deliver_reminders(bot.clone(), deliveries));

    let handler_data = Arc::new(BotData { assistant, config });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    tracing::info!("Starting dispatcher with long polling...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![handler_data])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in update handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    scheduler.stop();
    let _ = scheduler_task.await;
    tracing::warn!("Dispatcher stopped");
    Ok(())
}

/// Send every reminder the scheduler hands over
async fn deliver_reminders(bot: Bot, mut deliveries: mpsc::Receiver<Reminder>) {
    while let Some(reminder) = deliveries.recv().await {
        let chat_id = ChatId(reminder.user_id);
        match send_response(&bot, chat_id, &reminder_notice(&reminder)).await {
            Ok(()) => tracing::info!(reminder_id = reminder.id, user_id = reminder.user_id, "reminder delivered"),
            Err(e) => tracing::warn!(reminder_id = reminder.id, error = %e, "failed to deliver reminder"),
        }
    }
    tracing::warn!("Reminder delivery loop stopped");
}

/// Message handler endpoint for the dispatcher
async fn message_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    if !data.config.is_allowed(user_id) {
        tracing::warn!(user_id, "ignoring message from user outside the allow-list");
        return Ok(());
    }

    let Some(text) = msg.text() else {
        tracing::debug!(user_id, "ignoring non-text message");
        return Ok(());
    };

    let caller = Caller::new(user_id, user.first_name.clone());
    show_typing(&bot, msg.chat.id).await;

    let response = if text.starts_with('/') {
        let command_text = with_replied_text(&msg, text);
        data.assistant.handle_command(&caller, &command_text).await
    } else {
        data.assistant.handle_message(&caller, text).await
    };

    if let Err(e) = send_response(&bot, msg.chat.id, &response).await {
        tracing::error!(user_id, error = %e, "failed to send reply");
    }
    Ok(())
}

/// Best effort; a failed indicator never blocks the reply
async fn show_typing(bot: &Bot, chat_id: ChatId) {
    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send typing indicator");
    }
}

/// `/summarize` with no text summarizes the message it replies to
fn with_replied_text(msg: &Message, text: &str) -> String {
    let (command, args) = crate::handlers::split_command(text);
    if command != "summarize" || !args.is_empty() {
        return text.to_string();
    }
    match msg.reply_to_message().and_then(|m| m.text()) {
        Some(replied) => format!("/summarize {}", replied),
        None => text.to_string(),
    }
}

/// Callback query handler for inline keyboard buttons
async fn callback_handler(bot: Bot, query: CallbackQuery, data: Arc<BotData>) -> ResponseResult<()> {
    let user_id = query.from.id.0 as i64;

    if !data.config.is_allowed(user_id) {
        tracing::warn!(user_id, "callback from user outside the allow-list");
        bot.answer_callback_query(&query.id).text("Unauthorized").await?;
        return Ok(());
    }

    let Some(callback_data) = query.data.as_deref() else {
        bot.answer_callback_query(&query.id).await?;
        return Ok(());
    };

    let caller = Caller::new(user_id, query.from.first_name.clone());
    let outcome = data.assistant.handle_callback(&caller, callback_data).await;
    let target = query.message.as_ref().map(|m| (m.chat().id, m.id()));

    apply_outcome(&bot, &query, target, outcome).await
}

async fn apply_outcome(
    bot: &Bot,
    query: &CallbackQuery,
    target: Option<(ChatId, MessageId)>,
    outcome: CallbackOutcome,
) -> ResponseResult<()> {
    bot.answer_callback_query(&query.id).text(outcome.ack).await?;

    let Some((chat_id, message_id)) = target else {
        return Ok(());
    };

    match outcome.effect {
        Effect::None => {}
        Effect::Edit(response) => {
            if let Err(e) = edit_response(bot, chat_id, message_id, &response).await {
                tracing::warn!(error = %e, "failed to edit message");
            }
        }
        Effect::Send(response) => {
            if let Err(e) = send_response(bot, chat_id, &response).await {
                tracing::warn!(error = %e, "failed to send message");
            }
        }
        Effect::RemoveMarkup => {
            if let Err(e) = bot.edit_message_reply_markup(chat_id, message_id).await {
                tracing::warn!(error = %e, "failed to remove keyboard");
            }
        }
    }
    Ok(())
}

fn keyboard_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Send a reply, split to fit Telegram's limit. The keyboard rides on the
/// last chunk. Falls back to plain text when Telegram rejects the HTML.
pub async fn send_response(bot: &Bot, chat_id: ChatId, response: &Response) -> Result<()> {
    let chunks = split_chunks(&response.text, MAX_MESSAGE_CHARS);
    let last = chunks.len().saturating_sub(1);

    for (i, chunk) in chunks.iter().enumerate() {
        let keyboard = (i == last && response.has_buttons()).then(|| keyboard_markup(&response.buttons));

        let mut request = bot.send_message(chat_id, *chunk);
        if response.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(markup) = keyboard.clone() {
            request = request.reply_markup(markup);
        }

        if let Err(e) = request.await {
            if !response.html {
                return Err(e.into());
            }
            tracing::debug!(error = %e, "HTML rejected, resending as plain text");
            let mut fallback = bot.send_message(chat_id, crate::render::strip_html(chunk));
            if let Some(markup) = keyboard {
                fallback = fallback.reply_markup(markup);
            }
            fallback.await?;
        }
    }
    Ok(())
}

async fn edit_response(bot: &Bot, chat_id: ChatId, message_id: MessageId, response: &Response) -> Result<()> {
    let mut request = bot.edit_message_text(chat_id, message_id, &response.text);
    if response.html {
        request = request.parse_mode(ParseMode::Html);
    }
    if response.has_buttons() {
        request = request.reply_markup(keyboard_markup(&response.buttons));
    }

    if let Err(e) = request.await {
        if !response.html {
            return Err(e.into());
        }
        tracing::debug!(error = %e, "HTML rejected, editing as plain text");
        let mut fallback = bot.edit_message_text(chat_id, message_id, response.plain_text());
        if response.has_buttons() {
            fallback = fallback.reply_markup(keyboard_markup(&response.buttons));
        }
        fallback.await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::CallbackAction;
    use crate::render::Button;

    #[tokio::test]
    async fn test_typing_failure_is_swallowed() {
        // nothing listens on the discard port
        let api = reqwest::Url::parse("http://127.0.0.1:9/").unwrap();
        let bot = Bot::new("123:token").set_api_url(api);
        tokio::time::timeout(std::time::Duration::from_secs(10), show_typing(&bot, ChatId(1)))
            .await
            .expect("typing indicator should give up, not hang");
    }

    #[test]
    fn test_keyboard_markup_shape() {
        let keyboard = vec![
            vec![
                Button::new("A", &CallbackAction::Menu("search".into())),
                Button::new("B", &CallbackAction::Menu("ask".into())),
            ],
            vec![Button::new("C", &CallbackAction::Cancel)],
        ];
        let markup = keyboard_markup(&keyboard);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "C");
    }
}
