//! Reminder Integration Tests
//!
//! Creation through `/remind`, the per-user cap, cancellation, and
//! exactly-once delivery across the timer and the sweep.

mod common;

use chrono::Utc;
use common::{caller, harness, harness_with_limit};
use justask_bot::store::job_key;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_remind_creates_and_arms() {
    let h = harness();
    let response = h
        .assistant
        .handle_command(&caller(1), "/remind Call John in 30 minutes")
        .await;

    assert!(response.text.contains("Reminder Set"));
    assert!(response.text.contains("<b>Call John</b>"));

    let active = h.store.active_reminders(1).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].text, "Call John");
    let delta = active[0].scheduled_at - Utc::now().timestamp();
    assert!((1790..=1800).contains(&delta), "delta was {}", delta);
    assert!(h.scheduler.is_armed(&job_key(active[0].id)).await);
}

#[tokio::test]
async fn test_unparseable_time() {
    let h = harness();
    let response = h
        .assistant
        .handle_command(&caller(1), "/remind water the plants")
        .await;
    assert!(response.text.starts_with("I couldn't understand when"));
    assert!(h.store.active_reminders(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_reminder_cap() {
    let h = harness_with_limit(2);
    let user = caller(1);

    for i in 0..2 {
        let response = h
            .assistant
            .handle_command(&user, &format!("/remind task {} in {} minutes", i, i + 5))
            .await;
        assert!(response.text.contains("Reminder Set"));
    }

    let response = h
        .assistant
        .handle_command(&user, "/remind one too many in 9 minutes")
        .await;
    assert_eq!(
        response.text,
        "❌ Failed to set reminder. You may have reached the maximum number of reminders."
    );
    assert_eq!(h.store.active_reminders(1).unwrap().len(), 2);

    // the cap is per user
    let response = h
        .assistant
        .handle_command(&caller(2), "/remind mine in 9 minutes")
        .await;
    assert!(response.text.contains("Reminder Set"));
}

#[tokio::test]
async fn test_store_failure_is_not_reported_as_limit() {
    let h = harness();
    rusqlite::Connection::open(h.db_path())
        .unwrap()
        .execute_batch("DROP TABLE reminders")
        .unwrap();

    let response = h
        .assistant
        .handle_command(&caller(1), "/remind stretch in 5 minutes")
        .await;
    assert_eq!(response.text, "❌ Failed to set reminder. Please try again later.");
}

#[test]
fn test_concurrent_creation_respects_cap() {
    let h = harness();
    let store = h.store.clone();
    let at = Utc::now().timestamp() + 3600;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.create_reminder(7, &format!("r{}", i), at, 5).is_ok())
        })
        .collect();
    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(created, 5);
    assert_eq!(store.active_reminders(7).unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_and_cancel() {
    let h = harness();
    let owner = caller(1);

    let response = h.assistant.handle_command(&owner, "/reminders").await;
    assert!(response.text.starts_with("You don't have any active reminders"));

    h.assistant
        .handle_command(&owner, "/remind Buy milk in 2 hours")
        .await;
    let id = h.store.active_reminders(1).unwrap()[0].id;

    let response = h.assistant.handle_command(&owner, "/reminders").await;
    assert!(response.text.contains(&format!("• ID {}: <b>Buy milk</b>", id)));

    let response = h
        .assistant
        .handle_command(&caller(2), &format!("/cancelreminder {}", id))
        .await;
    assert_eq!(response.text, "You don't have permission to cancel this reminder.");
    assert!(h.scheduler.is_armed(&job_key(id)).await);

    let response = h
        .assistant
        .handle_command(&owner, &format!("/cancelreminder {}", id))
        .await;
    assert!(response.text.contains("Reminder Cancelled"));
    assert!(!h.scheduler.is_armed(&job_key(id)).await);
    assert!(h.store.active_reminders(1).unwrap().is_empty());

    let response = h.assistant.handle_command(&owner, "/cancelreminder abc").await;
    assert_eq!(response.text, "Invalid reminder ID. Please provide a valid number.");

    let response = h.assistant.handle_command(&owner, "/cancelreminder 999").await;
    assert_eq!(response.text, "Reminder with ID 999 not found.");
}

#[tokio::test]
async fn test_overdue_reminder_delivered_once() {
    let mut h = harness();
    let reminder = h
        .store
        .create_reminder(1, "stretch", Utc::now().timestamp() - 30, 5)
        .unwrap();

    assert_eq!(h.scheduler.sweep().await, 1);
    let delivered = tokio::time::timeout(Duration::from_secs(1), h.deliveries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered.id, reminder.id);

    // neither another sweep nor the timer path can deliver it again
    assert_eq!(h.scheduler.sweep().await, 0);
    assert!(!h.scheduler.fire(reminder.id).await);
    assert!(h.deliveries.try_recv().is_err());
    assert!(h.store.get_reminder(reminder.id).unwrap().unwrap().is_completed);
}

#[tokio::test]
async fn test_cancelled_reminder_never_fires() {
    let h = harness();
    let reminder = h
        .store
        .create_reminder(1, "gone", Utc::now().timestamp() - 30, 5)
        .unwrap();
    assert!(h.store.delete_reminder(reminder.id, 1).unwrap());

    assert_eq!(h.scheduler.sweep().await, 0);
    assert!(!h.scheduler.fire(reminder.id).await);
}
