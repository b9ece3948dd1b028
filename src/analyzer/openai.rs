//! OpenAI-compatible chat completions client.
//!
//! Works against api.openai.com as well as local servers exposing the same
//! `/chat/completions` route (Ollama, vLLM).

use super::ChatModel;
use crate::config::ModelConfig;
use crate::error::AnalysisError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat model reached over HTTP.
pub struct OpenAiChat {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model_name: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OpenAiChat {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        info!("Initializing model client {} at {}", config.name, config.api_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for the model API")?;

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatRequest {
            model: &self.model_name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Timeout {
                    seconds: self.timeout_seconds,
                }
            } else if e.is_connect() {
                AnalysisError::Request {
                    status: None,
                    message: format!("cannot connect to model API at {}", self.api_url),
                }
            } else {
                AnalysisError::Request {
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), body, self.timeout_seconds));
        }

        let chat_response: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AnalysisError::InvalidResponse {
                    message: format!("unreadable completion: {}", e),
                })?;

        let text = first_choice_text(chat_response)?;
        debug!(model = %self.model_name, chars = text.len(), "Model responded");
        Ok(text)
    }
}

fn first_choice_text(response: ChatResponse) -> Result<String, AnalysisError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AnalysisError::InvalidResponse {
            message: "completion had no message content".to_string(),
        })
}

fn error_for_status(status: u16, body: String, timeout_seconds: u64) -> AnalysisError {
    let message: String = body.chars().take(300).collect();
    match status {
        429 => AnalysisError::QuotaExceeded { message },
        408 | 504 => AnalysisError::Timeout {
            seconds: timeout_seconds,
        },
        _ => AnalysisError::Request {
            status: Some(status),
            message,
        },
    }
}
