//! Reminder Scheduler
//!
//! One deferred-execution queue for both delivery paths:
//! - one-shot triggers armed when a reminder is created (keyed `reminder_{id}`)
//! - a periodic sweep over the store for overdue reminders, which covers
//!   triggers lost to a restart
//!
//! Both paths end in [`Scheduler::fire`], where the store's
//! scheduled -> completed transition decides who delivers.

use crate::store::{job_key, Reminder, Store};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Entry in the trigger queue
#[derive(Debug, Clone)]
struct QueueEntry {
    fire_at: i64,
    reminder_id: i64,
    key: String,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.fire_at == other.fire_at
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: earliest fire time must compare greatest
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.reminder_id.cmp(&self.reminder_id))
    }
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often armed triggers are checked
    pub poll_interval: Duration,
    /// How often the store is swept for overdue reminders
    pub sweep_interval: Duration,
    /// Triggers armed for a past time fire this far in the future instead
    pub min_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(60),
            min_delay: Duration::from_secs(60),
        }
    }
}

/// Deferred delivery of reminders
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<Store>,
    queue: RwLock<BinaryHeap<QueueEntry>>,
    /// Current fire time per armed key; heap entries with another time are stale
    armed: RwLock<HashMap<String, i64>>,
    delivery_tx: mpsc::Sender<Reminder>,
    sweep_lock: Mutex<()>,
    running: AtomicBool,
}

impl Scheduler {
    /// Create a scheduler; delivered reminders arrive on the receiver
    pub fn new(
        store: Arc<Store>,
        config: SchedulerConfig,
        buffer_size: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Reminder>) {
        let (tx, rx) = mpsc::channel(buffer_size);

        let scheduler = Arc::new(Self {
            config,
            store,
            queue: RwLock::new(BinaryHeap::new()),
            armed: RwLock::new(HashMap::new()),
            delivery_tx: tx,
            sweep_lock: Mutex::new(()),
            running: AtomicBool::new(false),
        });

        (scheduler, rx)
    }

    /// Arm the one-shot trigger for a reminder. Past times are clamped to
    /// `now + min_delay`. Re-arming the same reminder replaces its trigger.
    pub async fn schedule(&self, reminder: &Reminder) -> i64 {
        let now = chrono::Utc::now().timestamp();
        let min_fire = now + self.config.min_delay.as_secs() as i64;
        let fire_at = if reminder.scheduled_at <= now {
            min_fire
        } else {
            reminder.scheduled_at
        };

        let key = reminder.job_key();
        self.queue.write().await.push(QueueEntry {
            fire_at,
            reminder_id: reminder.id,
            key: key.clone(),
        });
        self.armed.write().await.insert(key.clone(), fire_at);

        info!(reminder_id = reminder.id, fire_at, "Scheduled reminder: {}", key);
        fire_at
    }

    /// Disarm a trigger by key. Returns false if nothing was armed.
    pub async fn cancel(&self, key: &str) -> bool {
        let removed = self.armed.write().await.remove(key).is_some();
        if removed {
            // drop stale heap entries eagerly so they do not pile up
            self.queue.write().await.retain(|e| e.key != key);
            debug!("Cancelled trigger {}", key);
        }
        removed
    }

    pub async fn is_armed(&self, key: &str) -> bool {
        self.armed.read().await.contains_key(key)
    }

    /// Fire time of an armed trigger
    pub async fn fire_time(&self, key: &str) -> Option<i64> {
        self.armed.read().await.get(key).copied()
    }

    /// Re-arm every active reminder from the store (after a restart)
    pub async fn rearm_all(&self) -> crate::error::Result<usize> {
        let reminders = self.store.all_active_reminders()?;
        for reminder in &reminders {
            self.schedule(reminder).await;
        }
        info!(count = reminders.len(), "Re-armed active reminders");
        Ok(reminders.len())
    }

    /// Fire every armed trigger whose time has come
    pub async fn process_due(&self) -> usize {
        self.process_due_at(chrono::Utc::now().timestamp()).await
    }

    async fn process_due_at(&self, now: i64) -> usize {
        let due: Vec<QueueEntry> = {
            let mut queue = self.queue.write().await;
            let mut due = Vec::new();
            while queue.peek().is_some_and(|e| e.fire_at <= now) {
                if let Some(entry) = queue.pop() {
                    due.push(entry);
                }
            }
            due
        };

        let mut delivered = 0;
        for entry in due {
            // cancelled or superseded by a later re-arm
            {
                let mut armed = self.armed.write().await;
                if armed.get(&entry.key) != Some(&entry.fire_at) {
                    continue;
                }
                armed.remove(&entry.key);
            }
            if self.fire(entry.reminder_id).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver every overdue reminder found in the store. Only one sweep
    /// runs at a time; an overlapping call returns 0 immediately.
    pub async fn sweep(&self) -> usize {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            debug!("Sweep already in progress");
            return 0;
        };

        let overdue = match self.store.due_reminders(chrono::Utc::now().timestamp()) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Reminder sweep failed to read store");
                return 0;
            }
        };

        let mut delivered = 0;
        for reminder in overdue {
            if self.fire(reminder.id).await {
                delivered += 1;
            }
        }
        if delivered > 0 {
            info!(delivered, "Reminder sweep delivered overdue reminders");
        }
        delivered
    }

    /// Deliver a reminder if, and only if, this call completes it.
    pub async fn fire(&self, reminder_id: i64) -> bool {
        let reminder = match self.store.get_reminder(reminder_id) {
            Ok(Some(r)) if !r.is_completed => r,
            Ok(_) => return false,
            Err(e) => {
                error!(reminder_id, error = %e, "Failed to load reminder");
                return false;
            }
        };

        match self.store.complete_reminder(reminder_id) {
            Ok(true) => {}
            Ok(false) => {
                debug!(reminder_id, "Reminder already completed elsewhere");
                return false;
            }
            Err(e) => {
                error!(reminder_id, error = %e, "Failed to complete reminder");
                return false;
            }
        }

        self.armed.write().await.remove(&job_key(reminder_id));

        if self.delivery_tx.send(reminder).await.is_err() {
            warn!(reminder_id, "Reminder delivery channel closed");
            return false;
        }
        info!(reminder_id, "Reminder delivered");
        true
    }

    /// Start the scheduler loop
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, AtomicOrdering::SeqCst);
        let scheduler = Arc::clone(self);

        tokio::spawn(async move {
            info!("Scheduler started");
            let mut last_sweep: Option<Instant> = None;

            while scheduler.running.load(AtomicOrdering::SeqCst) {
                scheduler.process_due().await;

                if last_sweep.map_or(true, |t| t.elapsed() >= scheduler.config.sweep_interval) {
                    scheduler.sweep().await;
                    last_sweep = Some(Instant::now());
                }

                tokio::time::sleep(scheduler.config.poll_interval).await;
            }

            info!("Scheduler stopped");
        })
    }

    /// Stop the scheduler
    pub fn stop(&self) {
        self.running.store(false, AtomicOrdering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Store>, Arc<Scheduler>, mpsc::Receiver<Reminder>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (scheduler, rx) = Scheduler::new(store.clone(), SchedulerConfig::default(), 16);
        (store, scheduler, rx)
    }

    #[test]
    fn test_queue_pops_earliest_first() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry { fire_at: 300, reminder_id: 1, key: "a".into() });
        heap.push(QueueEntry { fire_at: 100, reminder_id: 2, key: "b".into() });
        heap.push(QueueEntry { fire_at: 200, reminder_id: 3, key: "c".into() });

        assert_eq!(heap.pop().unwrap().fire_at, 100);
        assert_eq!(heap.pop().unwrap().fire_at, 200);
    }

    #[tokio::test]
    async fn test_past_trigger_is_clamped() {
        let (store, scheduler, _rx) = setup();
        let now = chrono::Utc::now().timestamp();
        let reminder = store.create_reminder(1, "late", now - 600, 5).unwrap();

        let fire_at = scheduler.schedule(&reminder).await;
        assert!(fire_at >= now + 60);
        assert_eq!(scheduler.process_due().await, 0);
    }

    #[tokio::test]
    async fn test_one_shot_delivers() {
        let (store, scheduler, mut rx) = setup();
        let now = chrono::Utc::now().timestamp();
        let reminder = store.create_reminder(1, "stand up", now + 30, 5).unwrap();
        scheduler.schedule(&reminder).await;

        assert_eq!(scheduler.process_due_at(now + 31).await, 1);
        assert_eq!(rx.try_recv().unwrap().text, "stand up");
        assert!(!scheduler.is_armed(&reminder.job_key()).await);
    }

    #[tokio::test]
    async fn test_sweep_then_trigger_delivers_once() {
        let (store, scheduler, mut rx) = setup();
        let now = chrono::Utc::now().timestamp();
        let reminder = store.create_reminder(1, "once", now + 30, 5).unwrap();
        scheduler.schedule(&reminder).await;

        // restart lost nothing, but the sweep sees it overdue first
        store.complete_reminder(reminder.id).unwrap();
        assert!(!scheduler.fire(reminder.id).await);
        assert_eq!(scheduler.process_due_at(now + 31).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweep_delivers_overdue() {
        let (store, scheduler, mut rx) = setup();
        let now = chrono::Utc::now().timestamp();
        let overdue = store.create_reminder(1, "overdue", now - 5, 5).unwrap();
        store.create_reminder(1, "future", now + 3600, 5).unwrap();

        assert_eq!(scheduler.sweep().await, 1);
        assert_eq!(rx.try_recv().unwrap().id, overdue.id);
        assert_eq!(scheduler.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_rearm_replaces_trigger() {
        let (store, scheduler, mut rx) = setup();
        let now = chrono::Utc::now().timestamp();
        let mut reminder = store.create_reminder(1, "moved", now + 30, 5).unwrap();
        scheduler.schedule(&reminder).await;

        reminder.scheduled_at = now + 600;
        scheduler.schedule(&reminder).await;
        assert_eq!(scheduler.fire_time(&reminder.job_key()).await, Some(now + 600));

        // the old time passes without a delivery
        assert_eq!(scheduler.process_due_at(now + 31).await, 0);
        assert!(rx.try_recv().is_err());
        assert!(scheduler.is_armed(&reminder.job_key()).await);

        assert_eq!(scheduler.process_due_at(now + 601).await, 1);
        assert_eq!(rx.try_recv().unwrap().id, reminder.id);
    }

    #[tokio::test]
    async fn test_cancel_disarms() {
        let (store, scheduler, _rx) = setup();
        let now = chrono::Utc::now().timestamp();
        let reminder = store.create_reminder(1, "x", now + 30, 5).unwrap();
        scheduler.schedule(&reminder).await;

        assert!(scheduler.cancel(&reminder.job_key()).await);
        assert!(!scheduler.cancel(&reminder.job_key()).await);
        assert_eq!(scheduler.process_due_at(now + 31).await, 0);
    }

    #[tokio::test]
    async fn test_overlapping_sweeps() {
        let (store, scheduler, mut rx) = setup();
        let now = chrono::Utc::now().timestamp();
        for i in 0..3 {
            store.create_reminder(1, &format!("r{}", i), now - 1, 5).unwrap();
        }

        let (a, b) = tokio::join!(scheduler.sweep(), scheduler.sweep());
        assert_eq!(a + b, 3);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
