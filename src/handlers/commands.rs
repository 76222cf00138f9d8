//! Slash commands

use super::{fresh_opaque_id, menus, preferences, Assistant, Caller, GENERIC_ERROR};
use crate::callback::CallbackAction;
use crate::datetime::{datetime_response, is_datetime_question};
use crate::error::{AssistantError, Result};
use crate::llm::{SummaryFormat, SummaryLength};
use crate::reminders::parse_reminder;
use crate::render::{
    feedback_buttons, html_escape, llm_to_html, rating_picker, regenerate_buttons, truncate,
    Button, Response,
};
use crate::store::{job_key, Reminder};
use chrono::{Local, TimeZone};
use tracing::{debug, error, info, warn};

const SEARCH_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 200;
const REMINDER_TIME_FORMAT: &str = "%A, %B %d, %Y at %I:%M %p";

/// Split `/cmd@bot rest` into (`cmd`, `rest`)
pub fn split_command(text: &str) -> (String, &str) {
    let text = text.trim();
    let (head, args) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };
    let name = head
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    (name, args)
}

/// Human-readable local time for a stored unix timestamp
pub fn format_reminder_time(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(at) => at.format(REMINDER_TIME_FORMAT).to_string(),
        None => timestamp.to_string(),
    }
}

/// `Question | Answer`, both parts non-empty
fn parse_learn(args: &str) -> Result<(&str, &str)> {
    match args.split_once('|') {
        Some((q, a)) if !q.trim().is_empty() && !a.trim().is_empty() => Ok((q.trim(), a.trim())),
        _ => Err(AssistantError::UserInput(
            "expected 'question | answer'".to_string(),
        )),
    }
}

fn parse_reminder_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AssistantError::UserInput(format!("not a reminder id: {}", raw)))
}

/// The message a user receives when a reminder fires
pub fn reminder_notice(reminder: &Reminder) -> Response {
    Response::template("⏰ Reminder", &html_escape(&reminder.text), None)
}

impl Assistant {
    /// Handle one slash command. Never fails.
    pub async fn handle_command(&self, caller: &Caller, text: &str) -> Response {
        let (command, args) = split_command(text);
        info!(user_id = caller.user_id, command = %command, "command received");

        match self.run_command(caller, &command, args).await {
            Ok(response) => response,
            Err(e) => {
                error!(user_id = caller.user_id, command = %command, error = %e, "command failed");
                Response::plain(GENERIC_ERROR)
            }
        }
    }

    async fn run_command(&self, caller: &Caller, command: &str, args: &str) -> Result<Response> {
        let user_id = caller.user_id;

        match command {
            "start" => Ok(menus::welcome(&caller.first_name)),
            "help" => Ok(menus::help_menu(false)),
            "translate" => Ok(self.translate_command(user_id, args).await),
            "summarize" => Ok(self.summarize_command(user_id, args).await),
            "generate" => Ok(self.generate_command(user_id, args).await),
            "reset" => {
                self.sessions.update(user_id, |s| s.reset_pending = true).await;
                Ok(Response::template(
                    "🔄 Reset Conversation",
                    "Are you sure you want to reset our conversation history? This will clear all previous messages and context.",
                    None,
                )
                .with_buttons(vec![vec![
                    Button::new("Yes, reset history", &CallbackAction::Reset("confirm".into())),
                    Button::new("No, keep history", &CallbackAction::Reset("cancel".into())),
                ]]))
            }
            "search" => Ok(self.search_command(args).await),
            "ask" => Ok(self.ask_command(args).await),
            "learn" => Ok(self.learn_command(args)),
            "preferences" => {
                let prefs = self.store.get_preferences(user_id)?;
                Ok(preferences::overview(&prefs))
            }
            "setpreference" => self.set_preference_command(user_id, args),
            "deletepreference" => self.delete_preference_command(user_id, args),
            "remind" => Ok(self.remind_command(user_id, args).await),
            "reminders" => self.reminders_command(user_id),
            "cancelreminder" => self.cancel_reminder_command(user_id, args).await,
            "feedback" => Ok(Response::template(
                "How would you rate your experience with Just Ask AI?",
                "Your feedback helps us improve the bot.",
                None,
            )
            .with_buttons(rating_picker("general"))),
            _ => Ok(Response::plain(
                "I don't know that command. Use /help to see what I can do.",
            )),
        }
    }

    async fn translate_command(&self, user_id: i64, args: &str) -> Response {
        if args.is_empty() {
            return Response::template(
                "🌎 Translation",
                "Please provide text to translate and the target language.\n\n\
                 Example: /translate Hello to Spanish\n\n\
                 Or select a language below and then send the text you want to translate.",
                None,
            )
            .with_buttons(menus::language_buttons(false));
        }

        // ASCII lowering keeps byte offsets valid for slicing the original
        let Some(idx) = args.to_ascii_lowercase().find(" to ") else {
            return Response::plain(
                "Please specify the target language using 'to'.\n\
                 Example: /translate Hello to Spanish",
            );
        };
        let source = args[..idx].trim();
        let target = args[idx + 4..].trim();
        if source.is_empty() || target.is_empty() {
            return Response::plain(
                "Please specify the target language using 'to'.\n\
                 Example: /translate Hello to Spanish",
            );
        }

        let translated = self.text.translate(source, target).await;
        let opaque_id = format!("tr_{}_{}", user_id, target.chars().take(2).collect::<String>());
        Response::template(
            &format!("🌐 Translation to {}", target),
            &llm_to_html(&translated),
            None,
        )
        .with_buttons(feedback_buttons(&opaque_id))
    }

    async fn summarize_command(&self, user_id: i64, args: &str) -> Response {
        if args.is_empty() {
            return Response::template(
                "📋 Text Summarization",
                "Please provide text to summarize or reply to a message with /summarize.\n\n\
                 You can also select a summary style below and then send the text you want to summarize.",
                None,
            )
            .with_buttons(menus::summary_buttons(false));
        }

        let summary = self
            .text
            .summarize(args, SummaryLength::Medium, SummaryFormat::Paragraph)
            .await;
        let opaque_id = format!("sum_{}_{}", user_id, args.chars().count() % 100);
        Response::template("📝 Summary", &llm_to_html(&summary), None)
            .with_buttons(feedback_buttons(&opaque_id))
    }

    async fn generate_command(&self, user_id: i64, args: &str) -> Response {
        let (kind, prompt) = match args.split_once(char::is_whitespace) {
            Some((kind, prompt)) if !prompt.trim().is_empty() => (kind.to_lowercase(), prompt.trim()),
            _ => {
                return Response::template(
                    "✨ Content Generation",
                    "Please specify what to generate.\n\n\
                     Example: /generate poem about nature\n\n\
                     Or select a content type below and then send your topic.",
                    None,
                )
                .with_buttons(menus::generation_buttons(false));
            }
        };

        if !menus::CONTENT_TYPES.contains(&kind.as_str()) {
            return Response::plain(format!(
                "Invalid content type. Please choose from: {}",
                menus::CONTENT_TYPES.join(", ")
            ));
        }

        self.remember_generation_prompt(user_id, prompt).await;
        let content = self.text.generate_creative(prompt, &kind).await;
        let opaque_id = format!("gen_{}_{}", user_id, kind);
        Response::template(
            &format!("✨ Generated {}", kind),
            &llm_to_html(&content),
            None,
        )
        .with_buttons(regenerate_buttons(&opaque_id, &kind, prompt))
    }

    async fn search_command(&self, query: &str) -> Response {
        if query.is_empty() {
            return Response::plain(
                "Please provide a search query.\nExample: /search latest news about AI",
            );
        }

        if is_datetime_question(query) {
            return Response::plain(datetime_response(query));
        }

        let results = self.search.search(query, SEARCH_RESULTS).await;

        if results.is_empty() {
            let answer = self.text.answer_question(query, None).await;
            return Response::template(
                &format!("🔍 Search for \"{}\"", query),
                &format!(
                    "I couldn't find any search results, but here's what I know:\n\n{}",
                    llm_to_html(&answer)
                ),
                None,
            )
            .with_buttons(feedback_buttons(&fresh_opaque_id()));
        }

        let mut body = String::new();
        for (i, result) in results.iter().enumerate() {
            body.push_str(&format!(
                "{}. <b>{}</b>\n   {}\n   <a href=\"{}\">🔗 Source</a>\n\n",
                i + 1,
                html_escape(result.title.trim()),
                html_escape(&truncate(result.snippet.trim(), SNIPPET_CHARS)),
                html_escape(&result.link).replace('"', "&quot;"),
            ));
        }

        Response::template(&format!("🔍 Search results for \"{}\"", query), body.trim_end(), None)
            .with_buttons(feedback_buttons(&fresh_opaque_id()))
    }

    async fn ask_command(&self, question: &str) -> Response {
        if question.is_empty() {
            return Response::plain(
                "Please provide a question to answer.\nExample: /ask What is the capital of France?",
            );
        }

        let answer = if is_datetime_question(question) {
            datetime_response(question)
        } else {
            self.factual_answer(question).await
        };

        Response::template(&format!("Q: {}", question), &llm_to_html(&answer), None)
            .with_buttons(feedback_buttons(&fresh_opaque_id()))
    }

    fn learn_command(&self, args: &str) -> Response {
        const EXAMPLE: &str =
            "Example: /learn What is Just Ask AI? | Just Ask AI is a Telegram bot powered by Google's Gemini API.";

        if args.is_empty() {
            return Response::plain(format!(
                "Please provide a question and answer to add to the knowledge base.\n\
                 Format: /learn Question | Answer\n{}",
                EXAMPLE
            ));
        }

        let (question, answer) = match parse_learn(args) {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "rejected /learn arguments");
                return Response::plain(format!(
                    "Please separate the question and answer with a | character.\n{}",
                    EXAMPLE
                ));
            }
        };

        match self.store.add_knowledge(question, answer) {
            Ok(id) => {
                info!(knowledge_id = id, "knowledge entry added");
                Response::template(
                    "✅ Added to knowledge base",
                    &format!(
                        "Q: <b>{}</b>\n\nA: {}",
                        html_escape(question),
                        html_escape(answer)
                    ),
                    None,
                )
            }
            Err(e) => {
                error!(error = %e, "failed to add knowledge entry");
                Response::template("❌ Failed to add to knowledge base", "Please try again later.", None)
            }
        }
    }

    fn set_preference_command(&self, user_id: i64, args: &str) -> Result<Response> {
        let Some((key, value)) = args
            .split_once(char::is_whitespace)
            .map(|(k, v)| (k.to_lowercase(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
        else {
            return Ok(preferences::category_picker());
        };

        if !preferences::is_known_key(&key) {
            return Ok(preferences::invalid_key(&key));
        }

        if let Err(e) = self.store.set_preference(user_id, &key, value) {
            error!(user_id, key = %key, error = %e, "failed to store preference");
            return Ok(Response::plain(
                "❌ Failed to set preference. Please try again later.",
            ));
        }

        let prefs = self.store.get_preferences(user_id)?;
        Ok(preferences::updated(&key, value, &prefs))
    }

    fn delete_preference_command(&self, user_id: i64, args: &str) -> Result<Response> {
        let prefs = self.store.get_preferences(user_id)?;
        if prefs.is_empty() {
            return Ok(preferences::nothing_to_delete());
        }

        let Some(key) = args.split_whitespace().next().map(str::to_lowercase) else {
            return Ok(preferences::delete_picker(&prefs));
        };

        if !prefs.contains_key(&key) {
            return Ok(preferences::not_set(&key, &prefs));
        }

        match self.store.delete_preference(user_id, &key) {
            Ok(true) => {
                let remaining = self.store.get_preferences(user_id)?;
                Ok(preferences::deleted(&key, &remaining))
            }
            Ok(false) => Ok(preferences::not_set(&key, &prefs)),
            Err(e) => {
                error!(user_id, key = %key, error = %e, "failed to delete preference");
                Ok(Response::plain(
                    "❌ Failed to delete preference. Please try again later.",
                ))
            }
        }
    }

    async fn remind_command(&self, user_id: i64, args: &str) -> Response {
        if args.is_empty() {
            return Response::plain(
                "Please provide a reminder text and time.\n\
                 Examples:\n\
                 • /remind Call John in 30 minutes\n\
                 • /remind Buy milk tomorrow at 10am\n\
                 • /remind Meeting with team on Friday at 2pm",
            );
        }

        let Some(parsed) = parse_reminder(args, &Local::now()) else {
            return Response::plain(
                "I couldn't understand when you want to be reminded. Please specify a time.\n\
                 Examples:\n\
                 • in 30 minutes\n\
                 • tomorrow at 10am\n\
                 • on Friday at 2pm",
            );
        };

        let reminder = match self.store.create_reminder(
            user_id,
            &parsed.text,
            parsed.at.timestamp(),
            self.max_reminders,
        ) {
            Ok(reminder) => reminder,
            Err(AssistantError::LimitReached { max }) => {
                info!(user_id, max, "reminder limit reached");
                return Response::plain(
                    "❌ Failed to set reminder. You may have reached the maximum number of reminders.",
                );
            }
            Err(e) => {
                error!(user_id, error = %e, "failed to create reminder");
                return Response::plain("❌ Failed to set reminder. Please try again later.");
            }
        };

        self.scheduler.schedule(&reminder).await;

        Response::template(
            "✅ Reminder Set",
            &format!(
                "I'll remind you: <b>{}</b>\n\nOn: {}\nReminder ID: {}",
                html_escape(&reminder.text),
                parsed.at.format(REMINDER_TIME_FORMAT),
                reminder.id
            ),
            None,
        )
    }

    fn reminders_command(&self, user_id: i64) -> Result<Response> {
        let reminders = self.store.active_reminders(user_id)?;
        if reminders.is_empty() {
            return Ok(Response::plain(
                "You don't have any active reminders. Use /remind to set a reminder.",
            ));
        }

        let body = reminders
            .iter()
            .map(|r| {
                format!(
                    "• ID {}: <b>{}</b> on {}",
                    r.id,
                    html_escape(&r.text),
                    format_reminder_time(r.scheduled_at)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Response::template(
            "Your Active Reminders",
            &body,
            Some("Use /cancelreminder <id> to cancel a reminder."),
        ))
    }

    async fn cancel_reminder_command(&self, user_id: i64, args: &str) -> Result<Response> {
        let Some(raw_id) = args.split_whitespace().next() else {
            return Ok(Response::plain(
                "Please provide a reminder ID to cancel.\n\
                 Example: /cancelreminder 123\n\n\
                 Use /reminders to see your active reminders.",
            ));
        };

        let reminder_id = match parse_reminder_id(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!(user_id, error = %e, "rejected /cancelreminder argument");
                return Ok(Response::plain(
                    "Invalid reminder ID. Please provide a valid number.",
                ));
            }
        };

        let Some(reminder) = self.store.get_reminder(reminder_id)? else {
            return Ok(Response::plain(format!(
                "Reminder with ID {} not found.",
                reminder_id
            )));
        };

        if reminder.user_id != user_id {
            warn!(user_id, reminder_id, "cancel attempted by non-owner");
            return Ok(Response::plain(
                "You don't have permission to cancel this reminder.",
            ));
        }

        if !self.store.delete_reminder(reminder_id, user_id)? {
            return Ok(Response::template(
                "❌ Failed to Cancel Reminder",
                "Please try again later.",
                None,
            ));
        }

        self.scheduler.cancel(&job_key(reminder_id)).await;
        info!(user_id, reminder_id, "reminder cancelled");

        Ok(Response::template(
            "✅ Reminder Cancelled",
            &format!("Reminder with ID {} has been cancelled.", reminder_id),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("/start"), ("start".to_string(), ""));
        assert_eq!(
            split_command("/Remind@JustAskBot  Call John in 5 minutes "),
            ("remind".to_string(), "Call John in 5 minutes")
        );
        assert_eq!(split_command("/learn Q | A"), ("learn".to_string(), "Q | A"));
    }

    #[test]
    fn test_user_input_parsers() {
        assert_eq!(parse_learn(" Q? | A. ").unwrap(), ("Q?", "A."));
        assert!(matches!(parse_learn("Q? |  "), Err(AssistantError::UserInput(_))));
        assert_eq!(parse_reminder_id("42").unwrap(), 42);
        assert!(matches!(parse_reminder_id("4x"), Err(AssistantError::UserInput(_))));
    }

    #[test]
    fn test_reminder_notice_escapes() {
        let reminder = Reminder {
            id: 1,
            user_id: 7,
            text: "<b>buy</b> milk".into(),
            scheduled_at: 0,
            created_at: 0,
            is_completed: false,
        };
        let notice = reminder_notice(&reminder);
        assert!(notice.text.starts_with("<b>⏰ Reminder</b>"));
        assert!(notice.text.contains("&lt;b&gt;buy"));
    }
}
