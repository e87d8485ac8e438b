use serde::{Deserialize, Serialize};

use crate::app::AppError;
use crate::config::LlmConfig;

/// Single-turn, non-streaming chat client for a locally served model.
#[derive(Debug, Clone)]
pub struct LlmClient {
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        }
    }

    pub fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        log::debug!("{}: sending prompt to '{}'", self.endpoint, self.model);

        let client = reqwest::blocking::Client::new();
        let resp = client.post(&self.endpoint).json(&body).send()?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Upstream(format!("model server returned {status}: {text}")));
        }

        let parsed: ChatResponse = resp.json()?;
        Ok(parsed.message.content)
    }
}
