//! OpenAI-compatible chat completions backend

use super::{AnswerBackend, GenerationError};
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::models::Mode;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_INSTRUCTION: &str = "You are a Clinical Policy Verification Engine. \
Identify conflicts, gaps, and compliance risks using only provided context. \
If evidence is insufficient, state that explicitly. \
Cite every key claim in [doc_name|page|paragraph] format.";

const ERROR_BODY_CHARS: usize = 240;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat completions client
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl HttpBackend {
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }

    fn build_prompt(mode: Mode, question: &str, context: &str) -> String {
        format!(
            "MODE: {}\nQUESTION:\n{}\n\nDOCUMENT CONTEXT:\n{}\n\n\
             Return: (1) finding summary, (2) conflict risk, (3) remediation pointers.",
            mode, question, context
        )
    }
}

#[async_trait]
impl AnswerBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        mode: Mode,
        question: &str,
        context: &str,
    ) -> std::result::Result<String, GenerationError> {
        let prompt = Self::build_prompt(mode, question, context);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_INSTRUCTION },
                ChatMessage { role: "user", content: &prompt },
            ],
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling generation backend");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| GenerationError::Fatal {
            message: format!("Failed to parse completion response: {}", e),
        })?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            Ok("Model returned an empty response.".to_string())
        } else {
            Ok(text)
        }
    }
}

fn classify_transport(error: reqwest::Error) -> GenerationError {
    let message = format!("Completion request failed: {}", error);
    if error.is_timeout() || error.is_connect() || error.is_request() {
        GenerationError::Retryable { message }
    } else {
        GenerationError::from_message(message)
    }
}

/// 429 and 5xx are transient; other client errors are final unless the body
/// carries rate-limit wording.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let snippet: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let snippet: String = snippet.chars().take(ERROR_BODY_CHARS).collect();
    let message = format!("Completion API error {}: {}", status, snippet);

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GenerationError::Retryable { message }
    } else {
        GenerationError::from_message(message)
    }
}
