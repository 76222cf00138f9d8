//! Callback Router
//!
//! Decodes the button token into a [`CallbackAction`] once, then dispatches
//! exhaustively. Every branch produces exactly one acknowledgment.

use super::{menus, preferences, Assistant, Caller, CallbackOutcome, GENERIC_ERROR};
use crate::callback::{short_id, CallbackAction, PrefAction};
use crate::error::Result;
use crate::render::{
    capitalize, feedback_reason_picker, html_escape, llm_to_html, regenerate_buttons, Response,
};
use crate::session::PendingAction;
use tracing::{debug, error, info, warn};

impl Assistant {
    /// Handle one button press. Never fails.
    pub async fn handle_callback(&self, caller: &Caller, data: &str) -> CallbackOutcome {
        debug!(user_id = caller.user_id, data = %data, "callback received");

        let action = CallbackAction::decode(data);
        info!(user_id = caller.user_id, action = action.name(), "dispatching callback");

        match self.dispatch_callback(caller, action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id = caller.user_id, error = %e, "callback handling failed");
                CallbackOutcome::ack(GENERIC_ERROR)
            }
        }
    }

    async fn dispatch_callback(&self, caller: &Caller, action: CallbackAction) -> Result<CallbackOutcome> {
        let user_id = caller.user_id;

        match action {
            CallbackAction::Feedback { rating, opaque_id } => {
                self.store
                    .store_feedback(user_id, &opaque_id, rating, None, None)?;
                if rating > 3 {
                    return Ok(CallbackOutcome::ack("Thanks for the positive feedback!"));
                }
                let picker = Response::template(
                    "We'd like to improve",
                    "Could you tell us what was wrong with the response?",
                    None,
                )
                .with_buttons(feedback_reason_picker(short_id(&opaque_id)));
                Ok(CallbackOutcome::edit(
                    "Thanks for your feedback. Would you like to tell us more?",
                    picker,
                ))
            }

            CallbackAction::DetailedFeedback { reason, opaque_id } => {
                self.store
                    .store_feedback(user_id, &opaque_id, 1, Some(reason), None)?;
                Ok(CallbackOutcome::remove_markup("Thanks for your detailed feedback!"))
            }

            CallbackAction::CancelPicker { .. } | CallbackAction::Cancel => {
                Ok(CallbackOutcome::remove_markup("Cancelled"))
            }

            CallbackAction::Menu(section) => Ok(
                match menus::menu_section(&section, &caller.first_name) {
                    Some(screen) => CallbackOutcome::edit(format!("Navigating to {}", section), screen),
                    None => CallbackOutcome::ack("Unknown section"),
                },
            ),

            CallbackAction::Help(section) => {
                let ack = format!("Showing {} commands", section);
                if section == "back" {
                    return Ok(CallbackOutcome::edit(ack, menus::help_menu(true)));
                }
                Ok(match menus::help_section(&section) {
                    Some(screen) => CallbackOutcome::edit(ack, screen),
                    None => CallbackOutcome::ack("Unknown help section"),
                })
            }

            CallbackAction::Translate(code) => {
                let language = menus::language_name(&code);
                self.sessions
                    .set_pending(user_id, PendingAction::TranslationTarget(language.clone()))
                    .await;
                let screen = Response::template(
                    &format!("🌎 Translation to {}", language),
                    "Please send the text you want to translate.",
                    Some(format!("Your text will be translated to {}.", language).as_str()),
                );
                Ok(CallbackOutcome::edit(format!("Selected {}", language), screen))
            }

            CallbackAction::Summarize(style) => {
                self.sessions
                    .set_pending(user_id, PendingAction::SummaryStyle(style.clone()))
                    .await;
                let screen = Response::template(
                    &format!("📋 {} Summary", capitalize(&style)),
                    "Please send the text you want to summarize.",
                    Some(format!("Your text will be summarized in {} style.", style).as_str()),
                );
                Ok(CallbackOutcome::edit(format!("Selected {} summary style", style), screen))
            }

            CallbackAction::Generate(kind) => {
                self.sessions
                    .set_pending(user_id, PendingAction::GenerationType(kind.clone()))
                    .await;
                let screen = Response::template(
                    &format!("✨ Generate {}", capitalize(&kind)),
                    &format!("Please send the topic for your {}.", html_escape(&kind)),
                    Some(format!("I'll generate a {} based on your topic.", kind).as_str()),
                );
                Ok(CallbackOutcome::edit(format!("Selected {} generation", kind), screen))
            }

            CallbackAction::Regenerate {
                content_type,
                prompt_prefix,
            } => {
                let prompt = self
                    .sessions
                    .get(user_id)
                    .await
                    .last_generation_prompt
                    .unwrap_or_else(|| prompt_prefix.clone());

                let content = self.text.generate_creative(&prompt, &content_type).await;
                let opaque_id = format!("regen_{}_{}", user_id, content_type);
                let response = Response::template(
                    &format!("✨ Regenerated {}", content_type),
                    &llm_to_html(&content),
                    None,
                )
                .with_buttons(regenerate_buttons(&opaque_id, &content_type, &prompt_prefix));

                Ok(CallbackOutcome::send(
                    format!("Regenerating {}...", content_type),
                    response,
                ))
            }

            CallbackAction::Reset(choice) => {
                let pending = self
                    .sessions
                    .update(user_id, |s| std::mem::replace(&mut s.reset_pending, false))
                    .await;
                if !pending {
                    return Ok(CallbackOutcome::ack("No reset pending"));
                }
                match choice.as_str() {
                    "confirm" => {
                        self.sessions.update(user_id, |s| s.history.clear()).await;
                        info!(user_id, "conversation history reset");
                        Ok(CallbackOutcome::edit(
                            "Conversation history has been reset",
                            Response::template(
                                "🔄 Conversation Reset",
                                "Your conversation history has been reset. Let's start fresh!",
                                None,
                            ),
                        ))
                    }
                    "cancel" => Ok(CallbackOutcome::edit(
                        "Reset cancelled",
                        Response::template(
                            "Reset Cancelled",
                            "Your conversation history has been preserved.",
                            None,
                        ),
                    )),
                    other => {
                        warn!(user_id, choice = other, "unknown reset choice");
                        Ok(CallbackOutcome::ack("This button is no longer supported."))
                    }
                }
            }

            CallbackAction::Pref(PrefAction::View) => {
                let prefs = self.store.get_preferences(user_id)?;
                Ok(CallbackOutcome::edit("Selected view", preferences::overview(&prefs)))
            }

            CallbackAction::Pref(PrefAction::Set(key)) => Ok(CallbackOutcome::edit(
                format!("Selected set {}", key),
                preferences::value_picker(&key),
            )),

            CallbackAction::Pref(PrefAction::Delete(key)) => {
                // re-read: the value may have been removed since the button was rendered
                match self.store.get_preference(user_id, &key)? {
                    Some(current) => Ok(CallbackOutcome::edit(
                        format!("Selected delete {}", key),
                        preferences::confirm_delete(&key, &current),
                    )),
                    None => {
                        let prefs = self.store.get_preferences(user_id)?;
                        Ok(CallbackOutcome::edit(
                            "This preference no longer exists.",
                            preferences::overview(&prefs),
                        ))
                    }
                }
            }

            CallbackAction::PrefValue { key, value } => {
                self.store.set_preference(user_id, &key, &value)?;
                let prefs = self.store.get_preferences(user_id)?;
                info!(user_id, key = %key, "preference set");
                Ok(CallbackOutcome::edit(
                    format!("Setting {} to {}", key, value),
                    preferences::updated(&key, &value, &prefs),
                ))
            }

            CallbackAction::PrefCustom(key) => {
                self.sessions
                    .set_pending(user_id, PendingAction::PreferenceValue(key.clone()))
                    .await;
                Ok(CallbackOutcome::edit(
                    "Please enter your custom value",
                    preferences::custom_value_prompt(&key),
                ))
            }

            CallbackAction::PrefConfirmDelete(key) => {
                if !self.store.delete_preference(user_id, &key)? {
                    let prefs = self.store.get_preferences(user_id)?;
                    return Ok(CallbackOutcome::edit(
                        "Failed to delete preference. Please try again.",
                        preferences::overview(&prefs),
                    ));
                }
                let remaining = self.store.get_preferences(user_id)?;
                info!(user_id, key = %key, "preference deleted");
                Ok(CallbackOutcome::edit(
                    format!("{} preference deleted", capitalize(&key)),
                    preferences::deleted(&key, &remaining),
                ))
            }

            CallbackAction::QuickReply(query) => Ok(match query.filter(|q| !q.is_empty()) {
                Some(q) => CallbackOutcome::send(
                    format!("Sending: {}", q),
                    Response::plain(format!("/{}", q)),
                ),
                None => CallbackOutcome::ack("Invalid quick reply data."),
            }),

            CallbackAction::MoreInfo(kind) => {
                let Some(kind) = kind.filter(|k| !k.is_empty()) else {
                    return Ok(CallbackOutcome::ack("Invalid info type."));
                };
                let ack = format!("Showing more information about {}", kind);
                Ok(match menus::more_info(&kind) {
                    Some(screen) => CallbackOutcome::edit(ack, screen),
                    None => CallbackOutcome::ack(ack),
                })
            }

            CallbackAction::UnknownAction(action) => {
                warn!(user_id, action = %action, "unknown callback action");
                Ok(CallbackOutcome::ack(format!("Unknown action: {}", action)))
            }

            CallbackAction::Unsupported => {
                warn!(user_id, "unsupported callback data");
                Ok(CallbackOutcome::ack("This button is no longer supported."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FeedbackReason;

    #[test]
    fn test_reason_codes_round_trip_through_picker() {
        let rows = feedback_reason_picker("abcdefgh");
        let decoded = CallbackAction::decode(&rows[0][1].data);
        assert_eq!(
            decoded,
            CallbackAction::DetailedFeedback {
                reason: FeedbackReason::Incorrect,
                opaque_id: "abcdefgh".into()
            }
        );
    }
}
