//! Callback Router Integration Tests
//!
//! Button presses against a real SQLite store with fake collaborators.

mod common;

use common::{caller, harness};
use justask_bot::handlers::Effect;
use justask_bot::llm::Task;
use justask_bot::session::PendingAction;

fn edited(effect: &Effect) -> &justask_bot::Response {
    match effect {
        Effect::Edit(response) => response,
        other => panic!("expected edit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_low_rating_opens_reason_picker() {
    let h = harness();
    let outcome = h
        .assistant
        .handle_callback(&caller(1), "fb:2:abcdefgh")
        .await;

    assert_eq!(
        outcome.ack,
        "Thanks for your feedback. Would you like to tell us more?"
    );
    let picker = edited(&outcome.effect);
    assert!(picker.text.contains("We'd like to improve"));
    let tokens: Vec<&str> = picker.buttons.iter().flatten().map(|b| b.data.as_str()).collect();
    assert!(tokens.contains(&"df:nh:abcdefgh"));
    assert!(tokens.contains(&"cn:abcdefgh"));

    let feedback = h.store.feedback_for_user(1).unwrap();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].rating, 2);
    assert_eq!(feedback[0].message_id, "abcdefgh");
}

#[tokio::test]
async fn test_high_rating_is_only_acknowledged() {
    let h = harness();
    let outcome = h.assistant.handle_callback(&caller(1), "fb:5:abcdefgh").await;

    assert_eq!(outcome.ack, "Thanks for the positive feedback!");
    assert_eq!(outcome.effect, Effect::None);
    assert_eq!(h.store.feedback_for_user(1).unwrap().len(), 1);
}

#[tokio::test]
async fn test_detailed_feedback_removes_keyboard() {
    let h = harness();
    let outcome = h.assistant.handle_callback(&caller(1), "df:ic:abcdefgh").await;

    assert_eq!(outcome.ack, "Thanks for your detailed feedback!");
    assert_eq!(outcome.effect, Effect::RemoveMarkup);
    let feedback = h.store.feedback_for_user(1).unwrap();
    assert_eq!(feedback[0].reason.as_deref(), Some("incorrect"));
}

#[tokio::test]
async fn test_garbage_token_changes_nothing() {
    let h = harness();
    let outcome = h.assistant.handle_callback(&caller(1), "garbage_not_json").await;

    assert_eq!(outcome.ack, "This button is no longer supported.");
    assert_eq!(outcome.effect, Effect::None);
    assert!(h.store.feedback_for_user(1).unwrap().is_empty());
    assert!(h.store.get_preferences(1).unwrap().is_empty());
    assert!(h.assistant.sessions().get(1).await.pending.is_none());
}

#[tokio::test]
async fn test_out_of_range_rating_is_unsupported() {
    let h = harness();
    let outcome = h.assistant.handle_callback(&caller(1), "fb:9:abcdefgh").await;
    assert_eq!(outcome.ack, "This button is no longer supported.");
    assert!(h.store.feedback_for_user(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_truncated_pref_view_is_repaired() {
    let h = harness();
    for token in ["pref:viw", "pref:vi", "pref:view"] {
        let outcome = h.assistant.handle_callback(&caller(1), token).await;
        assert!(
            edited(&outcome.effect).text.contains("No Preferences"),
            "{}",
            token
        );
    }

    let outcome = h.assistant.handle_callback(&caller(1), "pref:viewx").await;
    assert_eq!(outcome.ack, "This button is no longer supported.");
}

#[tokio::test]
async fn test_set_then_delete_preference_by_buttons() {
    let h = harness();
    let user = caller(3);

    let outcome = h.assistant.handle_callback(&user, "prefval:tone:Casual").await;
    assert_eq!(outcome.ack, "Setting tone to Casual");
    assert_eq!(
        h.store.get_preference(3, "tone").unwrap().as_deref(),
        Some("Casual")
    );

    let outcome = h.assistant.handle_callback(&user, "pref:delete:tone").await;
    assert!(edited(&outcome.effect).text.contains("Casual"));

    let outcome = h
        .assistant
        .handle_callback(&user, "prefconfirm:delete:tone")
        .await;
    assert_eq!(outcome.ack, "Tone preference deleted");
    assert!(h.store.get_preference(3, "tone").unwrap().is_none());

    let outcome = h.assistant.handle_callback(&user, "pref:view").await;
    assert!(edited(&outcome.effect).text.contains("No Preferences"));
}

#[tokio::test]
async fn test_deleting_vanished_preference() {
    let h = harness();
    let outcome = h.assistant.handle_callback(&caller(4), "pref:delete:tone").await;
    assert_eq!(outcome.ack, "This preference no longer exists.");
    assert!(edited(&outcome.effect).text.contains("No Preferences"));
}

#[tokio::test]
async fn test_custom_value_claims_next_message() {
    let h = harness();
    let user = caller(5);

    h.assistant.handle_callback(&user, "prefcustom:tone").await;
    assert_eq!(
        h.assistant.sessions().get(5).await.pending,
        Some(PendingAction::PreferenceValue("tone".into()))
    );

    let response = h.assistant.handle_message(&user, "Pirate").await;
    assert!(response.text.contains("Preference Updated"));
    assert_eq!(
        h.store.get_preference(5, "tone").unwrap().as_deref(),
        Some("Pirate")
    );
    assert_eq!(h.llm.calls(Task::Generate), 0);
    assert!(h.assistant.sessions().get(5).await.pending.is_none());
}

#[tokio::test]
async fn test_translation_pending_beats_datetime_question() {
    let h = harness();
    let user = caller(6);

    let outcome = h.assistant.handle_callback(&user, "tr:es").await;
    assert_eq!(outcome.ack, "Selected Spanish");

    let response = h.assistant.handle_message(&user, "what time is it?").await;
    assert!(response.text.contains("Translation to Spanish"));
    assert!(response.text.contains("translated text"));

    let request = h.llm.last(Task::Translate).unwrap();
    assert!(request.prompt.contains("Spanish"));
    assert!(request.prompt.contains("what time is it?"));
}

#[tokio::test]
async fn test_later_picker_replaces_pending() {
    let h = harness();
    let user = caller(7);

    h.assistant.handle_callback(&user, "tr:fr").await;
    h.assistant.handle_callback(&user, "sum:key").await;

    let response = h.assistant.handle_message(&user, "a long text").await;
    assert!(response.text.contains("Key Summary"));
    assert_eq!(h.llm.calls(Task::Translate), 0);
    assert_eq!(h.llm.calls(Task::Summarize), 1);
}

#[tokio::test]
async fn test_menu_navigation() {
    let h = harness();
    let outcome = h.assistant.handle_callback(&caller(1), "menu:translate").await;
    assert_eq!(outcome.ack, "Navigating to translate");
    assert!(edited(&outcome.effect)
        .buttons
        .iter()
        .flatten()
        .any(|b| b.data == "tr:es"));

    let outcome = h.assistant.handle_callback(&caller(1), "menu:settings").await;
    assert_eq!(outcome.ack, "Unknown section");
    assert_eq!(outcome.effect, Effect::None);
}

#[tokio::test]
async fn test_reset_requires_pending_request() {
    let h = harness();
    let user = caller(8);

    let outcome = h.assistant.handle_callback(&user, "reset:confirm").await;
    assert_eq!(outcome.ack, "No reset pending");

    h.assistant.handle_message(&user, "hello there").await;
    assert!(!h.assistant.sessions().history(8).await.is_empty());

    h.assistant.handle_command(&user, "/reset").await;
    let outcome = h.assistant.handle_callback(&user, "reset:confirm").await;
    assert_eq!(outcome.ack, "Conversation history has been reset");
    assert!(h.assistant.sessions().history(8).await.is_empty());

    let outcome = h.assistant.handle_callback(&user, "reset:confirm").await;
    assert_eq!(outcome.ack, "No reset pending");
}

#[tokio::test]
async fn test_regenerate_uses_full_remembered_prompt() {
    let h = harness();
    let user = caller(9);

    h.assistant
        .handle_command(&user, "/generate poem about the sea at night")
        .await;
    let outcome = h
        .assistant
        .handle_callback(&user, "regen:poem:about the")
        .await;

    assert_eq!(outcome.ack, "Regenerating poem...");
    match &outcome.effect {
        Effect::Send(response) => assert!(response.text.contains("Regenerated poem")),
        other => panic!("expected send, got {:?}", other),
    }
    let request = h.llm.last(Task::Creative).unwrap();
    assert!(request.prompt.contains("about the sea at night"));
}

#[tokio::test]
async fn test_legacy_json_tokens() {
    let h = harness();

    let outcome = h
        .assistant
        .handle_callback(&caller(1), r#"{"action":"quick_reply","query":"help"}"#)
        .await;
    assert_eq!(outcome.ack, "Sending: help");

    let outcome = h
        .assistant
        .handle_callback(&caller(1), r#"{"action":"more_info","type":"features"}"#)
        .await;
    assert!(edited(&outcome.effect).text.contains("Bot Features"));

    let outcome = h
        .assistant
        .handle_callback(&caller(1), r#"{"action":"frobnicate"}"#)
        .await;
    assert_eq!(outcome.ack, "Unknown action: frobnicate");
}
