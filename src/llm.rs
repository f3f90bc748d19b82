use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::constants;
use crate::extractor::CodeState;

// Structures matching the OpenAI chat completions endpoint
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for the LLM collaborator. The endpoint and model are configurable
/// so tests can point it at a mock server.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            constants::OPENAI_API_URL.clone(),
            constants::OPENAI_API_KEY.clone(),
            constants::OPENAI_MODEL.clone(),
        )
    }

    /// Ask the model for code. Returns the raw completion text; fence
    /// extraction is the caller's job.
    #[instrument(skip(self, current_code))]
    pub async fn generate(&self, prompt: &str, current_code: &CodeState) -> Result<String> {
        let system = format!(
            "{}\nCurrent code state:\nHTML: {}\nCSS: {}\nJavaScript: {}",
            constants::SYSTEM_PROMPT,
            current_code.markup,
            current_code.stylesheet,
            current_code.script,
        );

        let request_payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_payload)
            .send()
            .await
            .with_context(|| format!("Failed to send request to LLM API at {}", self.api_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "LLM API request failed");
            return Err(anyhow::anyhow!(
                "LLM API request failed with status {}: {}",
                status,
                error_body
            ));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .context("Failed to parse JSON response from LLM API")?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("LLM API response contained no choices")?;

        debug!(len = content.len(), "Received LLM completion");
        Ok(content)
    }
}
