//! Shared fixtures: in-process LLM and search fakes plus a wired assistant

#![allow(dead_code)]

use async_trait::async_trait;
use justask_bot::handlers::{Assistant, Caller};
use justask_bot::llm::{CompletionRequest, LlmClient, Task, TextService};
use justask_bot::scheduler::{Scheduler, SchedulerConfig};
use justask_bot::search::{SearchClient, SearchResult, WebSearch};
use justask_bot::store::{Reminder, Store};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Canned reply per task, records every request
#[derive(Default)]
pub struct FakeLlm {
    overrides: Mutex<Vec<(Task, String)>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeLlm {
    pub fn reply(&self, task: Task, text: &str) {
        let mut overrides = self.overrides.lock();
        overrides.retain(|(t, _)| *t != task);
        overrides.push((task, text.to_string()));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self, task: Task) -> usize {
        self.requests.lock().iter().filter(|r| r.task == task).count()
    }

    pub fn last(&self, task: Task) -> Option<CompletionRequest> {
        self.requests.lock().iter().rev().find(|r| r.task == task).cloned()
    }

    fn default_reply(task: Task) -> &'static str {
        match task {
            Task::Classify => "CONVERSATION",
            Task::Generate => "generated reply",
            Task::Translate => "translated text",
            Task::Summarize => "summary text",
            Task::Creative => "creative piece",
            Task::Personalize => "personalized reply",
            Task::Answer => "grounded answer",
        }
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        self.requests.lock().push(request.clone());
        let reply = self
            .overrides
            .lock()
            .iter()
            .find(|(t, _)| *t == request.task)
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| Self::default_reply(request.task).to_string());
        Ok(reply)
    }
}

/// Fixed result list, counts queries
#[derive(Default)]
pub struct FakeSearch {
    results: Mutex<Vec<SearchResult>>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn set_results(&self, results: Vec<SearchResult>) {
        *self.results.lock() = results;
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchResult>> {
        self.queries.lock().push(query.to_string());
        Ok(self.results.lock().iter().take(max_results).cloned().collect())
    }
}

pub fn result(title: &str, snippet: &str, link: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        snippet: snippet.to_string(),
        link: link.to_string(),
    }
}

pub struct Harness {
    pub assistant: Assistant,
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
    pub llm: Arc<FakeLlm>,
    pub search: Arc<FakeSearch>,
    pub deliveries: mpsc::Receiver<Reminder>,
    _temp: TempDir,
}

impl Harness {
    /// File behind `store`, for tests that need a second connection
    pub fn db_path(&self) -> PathBuf {
        self._temp.path().join("bot.db")
    }
}

pub fn harness() -> Harness {
    harness_with_limit(5)
}

pub fn harness_with_limit(max_reminders: usize) -> Harness {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(Store::open(&temp.path().join("bot.db")).expect("Failed to open store"));
    let llm = Arc::new(FakeLlm::default());
    let search = Arc::new(FakeSearch::default());
    let (scheduler, deliveries) = Scheduler::new(store.clone(), SchedulerConfig::default(), 16);

    let assistant = Assistant::new(
        store.clone(),
        TextService::new(llm.clone(), Duration::from_secs(2)),
        WebSearch::new(search.clone(), Duration::from_secs(2)),
        scheduler.clone(),
        10,
        max_reminders,
    );

    Harness {
        assistant,
        store,
        scheduler,
        llm,
        search,
        deliveries,
        _temp: temp,
    }
}

pub fn caller(user_id: i64) -> Caller {
    Caller::new(user_id, "Ana")
}
