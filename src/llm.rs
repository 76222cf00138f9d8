//! LLM text service
//!
//! [`LlmClient`] is the raw completion seam (Gemini in production, fakes in
//! tests). [`TextService`] builds the task prompts on top of it, bounds every
//! call with a timeout and never fails: errors come back as an apology.

use crate::error::AssistantError;
use crate::session::{Role, Turn};
use crate::store::Preferences;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TIMED_OUT: &str = "timed out";

const APOLOGY: &str = "I'm sorry, I encountered an error processing your request. Please try again later.";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Which operation a completion serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Generate,
    Classify,
    Translate,
    Summarize,
    Creative,
    Personalize,
    Answer,
}

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub task: Task,
    pub prompt: String,
    pub history: Vec<Turn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    fn new(task: Task, prompt: String, temperature: f32) -> Self {
        Self {
            task,
            prompt,
            history: Vec::new(),
            temperature,
            max_tokens: 2048,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Message categories used to pick the answer path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Factual,
    Opinion,
    Creative,
    Personal,
    Translation,
    Summarization,
    Conversation,
    Other,
}

impl Category {
    const ALL: [Category; 8] = [
        Category::Factual,
        Category::Opinion,
        Category::Creative,
        Category::Personal,
        Category::Translation,
        Category::Summarization,
        Category::Conversation,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Factual => "FACTUAL",
            Self::Opinion => "OPINION",
            Self::Creative => "CREATIVE",
            Self::Personal => "PERSONAL",
            Self::Translation => "TRANSLATION",
            Self::Summarization => "SUMMARIZATION",
            Self::Conversation => "CONVERSATION",
            Self::Other => "OTHER",
        }
    }

    /// First label found in a model reply; `Other` when none is
    pub fn from_reply(reply: &str) -> Self {
        let upper = reply.to_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| upper.contains(c.label()))
            .unwrap_or(Category::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLength {
    Short,
    Medium,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    Paragraph,
    BulletPoints,
}

/// Length and format for a `sum:` style
pub fn summary_params(style: &str) -> (SummaryLength, SummaryFormat) {
    match style {
        "short" => (SummaryLength::Short, SummaryFormat::Paragraph),
        "detailed" => (SummaryLength::Detailed, SummaryFormat::Paragraph),
        "key" => (SummaryLength::Medium, SummaryFormat::BulletPoints),
        _ => (SummaryLength::Medium, SummaryFormat::Paragraph),
    }
}

/// Task-level operations over an [`LlmClient`]
#[derive(Clone)]
pub struct TextService {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TextService {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn run(&self, request: CompletionRequest) -> crate::error::Result<String> {
        let task = request.task;
        match tokio::time::timeout(self.timeout, self.client.complete(&request)).await {
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(e)) => {
                warn!(?task, error = %e, "LLM call failed");
                Err(AssistantError::Collaborator(e.to_string()))
            }
            Err(_) => {
                warn!(?task, timeout_secs = self.timeout.as_secs(), "LLM call timed out");
                Err(AssistantError::Collaborator(TIMED_OUT.to_string()))
            }
        }
    }

    async fn run_soft(&self, request: CompletionRequest) -> String {
        match self.run(request).await {
            Ok(text) => text,
            Err(AssistantError::Collaborator(reason)) if reason == TIMED_OUT => {
                "I'm sorry, the request took too long. Please try again.".to_string()
            }
            // details were logged in `run`; they never reach the chat
            Err(_) => APOLOGY.to_string(),
        }
    }

    /// Conversational reply with history
    pub async fn generate(&self, prompt: &str, history: &[Turn]) -> String {
        let mut request = CompletionRequest::new(Task::Generate, prompt.to_string(), 0.7);
        request.history = history.to_vec();
        self.run_soft(request).await
    }

    /// One of the eight labels; `Other` when the call fails
    pub async fn classify(&self, text: &str) -> Category {
        let prompt = format!(
            "Classify the following message into exactly one category: {}.\n\
             Reply with the category name only.\n\nMessage: {}",
            Category::ALL.map(|c| c.label()).join(", "),
            text
        );
        let mut request = CompletionRequest::new(Task::Classify, prompt, 0.1);
        request.max_tokens = 10;
        match self.run(request).await {
            Ok(reply) => Category::from_reply(&reply),
            Err(_) => Category::Other,
        }
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> String {
        let prompt = format!(
            "Translate the following text to {}. Reply with the translation only.\n\n{}",
            target_language, text
        );
        self.run_soft(CompletionRequest::new(Task::Translate, prompt, 0.2))
            .await
    }

    pub async fn summarize(&self, text: &str, length: SummaryLength, format: SummaryFormat) -> String {
        let length_hint = match length {
            SummaryLength::Short => "in one or two sentences",
            SummaryLength::Medium => "in a short paragraph",
            SummaryLength::Detailed => "in detail, keeping all important points",
        };
        let format_hint = match format {
            SummaryFormat::Paragraph => "as prose",
            SummaryFormat::BulletPoints => "as a bulleted list of key points",
        };
        let prompt = format!(
            "Summarize the following text {} {}.\n\n{}",
            length_hint, format_hint, text
        );
        self.run_soft(CompletionRequest::new(Task::Summarize, prompt, 0.3))
            .await
    }

    pub async fn generate_creative(&self, prompt: &str, content_type: &str) -> String {
        let instruction = match content_type {
            "poem" => "Write a poem about",
            "story" => "Write a short story about",
            "joke" => "Tell a clean, funny joke about",
            "code" => "Write well-commented code for",
            _ => "Write creative content about",
        };
        let prompt = format!("{} {}", instruction, prompt);
        self.run_soft(CompletionRequest::new(Task::Creative, prompt, 0.9))
            .await
    }

    /// Rewrite an answer to match the user's stored preferences
    pub async fn personalize(&self, text: &str, preferences: &Preferences) -> String {
        if preferences.is_empty() {
            return text.to_string();
        }
        let prefs = preferences
            .iter()
            .map(|(k, v)| format!("- {}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Rewrite the response below to suit these user preferences, keeping its meaning.\n\
             Preferences:\n{}\n\nResponse:\n{}",
            prefs, text
        );
        // a failed rewrite keeps the original answer
        match self
            .run(CompletionRequest::new(Task::Personalize, prompt, 0.7))
            .await
        {
            Ok(rewritten) if !rewritten.is_empty() => rewritten,
            _ => text.to_string(),
        }
    }

    /// Factual answer, optionally grounded in retrieved context
    pub async fn answer_question(&self, question: &str, context: Option<&str>) -> String {
        let prompt = match context {
            Some(ctx) if !ctx.trim().is_empty() => format!(
                "Answer the question using the context where relevant.\n\nContext:\n{}\n\nQuestion: {}",
                ctx, question
            ),
            _ => format!("Answer the question accurately and concisely.\n\nQuestion: {}", question),
        };
        self.run_soft(CompletionRequest::new(Task::Answer, prompt, 0.3))
            .await
    }
}

// ============ Gemini ============

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Google Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: GEMINI_API_BASE.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::new(&config.gemini_api_key, &config.gemini_model, config.http_timeout)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![Part {
                    text: turn.content.clone(),
                }],
            })
            .collect();
        contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: request.prompt.clone(),
            }],
        });

        let body = GenerateRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!(
            model = %self.model,
            task = ?request.task,
            prompt_len = request.prompt.len(),
            "Calling Gemini API"
        );

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(reqwest::Error::without_url)?;
            anyhow::bail!("Gemini API error {}: {}", status, text);
        }

        let result: GenerateResponse = response.json().await.map_err(reqwest::Error::without_url)?;
        let text = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            anyhow::bail!("Gemini returned no content");
        }
        Ok(text)
    }
}
