//! Message Router
//!
//! A pending action, when one is set, claims the next free-text message and
//! is cleared whether or not resolving it succeeds. Everything else is
//! ordinary conversation.

use super::{fresh_opaque_id, preferences, Assistant, Caller, GENERIC_ERROR};
use crate::datetime::{datetime_context, datetime_response, is_datetime_question};
use crate::error::Result;
use crate::llm::{summary_params, Category};
use crate::render::{capitalize, feedback_buttons, llm_to_html, regenerate_buttons, Response};
use crate::search::format_for_prompt;
use crate::session::{PendingAction, Role};
use tracing::{debug, error, info, warn};

impl Assistant {
    /// Handle one free-text message. Never fails.
    pub async fn handle_message(&self, caller: &Caller, text: &str) -> Response {
        let user_id = caller.user_id;
        debug!(user_id, preview = %text.chars().take(50).collect::<String>(), "message received");

        match self.route_message(user_id, text).await {
            Ok(response) => response,
            Err(e) => {
                error!(user_id, error = %e, "message handling failed");
                Response::plain(GENERIC_ERROR)
            }
        }
    }

    async fn route_message(&self, user_id: i64, text: &str) -> Result<Response> {
        // taken before resolving so a failure cannot leave it stuck
        if let Some(pending) = self.sessions.take_pending(user_id).await {
            info!(user_id, pending = pending.name(), "resolving pending action");
            return Ok(self.resolve_pending(user_id, pending, text).await);
        }
        self.converse(user_id, text).await
    }

    async fn resolve_pending(&self, user_id: i64, pending: PendingAction, text: &str) -> Response {
        match pending {
            PendingAction::PreferenceValue(key) => {
                let saved = self
                    .store
                    .set_preference(user_id, &key, text)
                    .and_then(|_| self.store.get_preferences(user_id));
                match saved {
                    Ok(prefs) => preferences::updated(&key, text, &prefs),
                    Err(e) => {
                        error!(user_id, key = %key, error = %e, "failed to store preference");
                        Response::plain("❌ Failed to set preference. Please try again later.")
                    }
                }
            }

            PendingAction::TranslationTarget(language) => {
                let translated = self.text.translate(text, &language).await;
                let opaque_id = format!(
                    "tr_{}_{}",
                    user_id,
                    language.chars().take(2).collect::<String>()
                );
                Response::template(
                    &format!("🌐 Translation to {}", language),
                    &llm_to_html(&translated),
                    None,
                )
                .with_buttons(feedback_buttons(&opaque_id))
            }

            PendingAction::SummaryStyle(style) => {
                let (length, format) = summary_params(&style);
                let summary = self.text.summarize(text, length, format).await;
                let opaque_id = format!("sum_{}_{}", user_id, style);
                Response::template(
                    &format!("📝 {} Summary", capitalize(&style)),
                    &llm_to_html(&summary),
                    None,
                )
                .with_buttons(feedback_buttons(&opaque_id))
            }

            PendingAction::GenerationType(kind) => {
                self.remember_generation_prompt(user_id, text).await;
                let content = self.text.generate_creative(text, &kind).await;
                let opaque_id = format!("gen_{}_{}", user_id, kind);
                Response::template(
                    &format!("✨ Generated {}", capitalize(&kind)),
                    &llm_to_html(&content),
                    None,
                )
                .with_buttons(regenerate_buttons(&opaque_id, &kind, text))
            }
        }
    }

    /// Ordinary conversation turn
    async fn converse(&self, user_id: i64, text: &str) -> Result<Response> {
        let history = self.sessions.history(user_id).await;
        self.sessions.push_turn(user_id, Role::User, text).await;

        let answer = if is_datetime_question(text) {
            info!(user_id, "answering date/time question from the clock");
            datetime_response(text)
        } else {
            let category = self.text.classify(text).await;
            info!(user_id, category = category.label(), "classified message");
            if category == Category::Factual {
                self.factual_answer(text).await
            } else {
                self.text.generate(text, &history).await
            }
        };

        let answer = match self.store.get_preferences(user_id) {
            Ok(prefs) if !prefs.is_empty() => self.text.personalize(&answer, &prefs).await,
            Ok(_) => answer,
            Err(e) => {
                warn!(user_id, error = %e, "could not load preferences, answering unpersonalized");
                answer
            }
        };

        self.sessions.push_turn(user_id, Role::Assistant, &answer).await;

        Ok(Response::html(llm_to_html(&answer)).with_buttons(feedback_buttons(&fresh_opaque_id())))
    }

    /// Answer grounded in the clock, the knowledge base (top 3) and the web (top 3)
    pub(super) async fn factual_answer(&self, question: &str) -> String {
        let mut context = datetime_context();

        match self.store.search_knowledge(question, 3) {
            Ok(entries) if !entries.is_empty() => {
                context.push_str("\nKnowledge Base:\n");
                for entry in entries {
                    context.push_str(&format!("Q: {}\nA: {}\n", entry.question, entry.answer));
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "knowledge search failed"),
        }

        let results = self.search.search(question, 3).await;
        if !results.is_empty() {
            context.push('\n');
            context.push_str(&format_for_prompt(&results));
        }

        self.text.answer_question(question, Some(&context)).await
    }

    pub(super) async fn remember_generation_prompt(&self, user_id: i64, prompt: &str) {
        let prompt = prompt.to_string();
        self.sessions
            .update(user_id, move |s| s.last_generation_prompt = Some(prompt))
            .await;
    }
}
