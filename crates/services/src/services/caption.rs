use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_CAPTION_MODEL: &str = "llava-v1.6-mistral-7b";
pub const DEFAULT_CAPTION_PROMPT: &str = "Create a short and engaging Instagram post description based on this photo. Keep it generic and appealing to a wide audience";

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Caption API request timed out")]
    Timeout,
    #[error("Caption API error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("Caption API returned no description")]
    EmptyResponse,
    #[error("Caption API request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for CaptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CaptionError::Timeout
        } else {
            CaptionError::Request(err)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
pub trait CaptionApi: Send + Sync {
    /// Generates a description for a base64-encoded image. `prompt` falls
    /// back to the default social-media caption prompt.
    async fn describe(
        &self,
        image_base64: &str,
        prompt: Option<&str>,
    ) -> Result<String, CaptionError>;

    async fn is_healthy(&self) -> bool;
}

#[derive(Clone)]
pub struct CaptionService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    model: String,
    default_prompt: String,
}

impl CaptionService {
    pub fn new(base_url: String, timeout: Duration, model: String, default_prompt: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
            model,
            default_prompt,
        }
    }
}

#[async_trait]
impl CaptionApi for CaptionService {
    async fn describe(
        &self,
        image_base64: &str,
        prompt: Option<&str>,
    ) -> Result<String, CaptionError> {
        let prompt = prompt.unwrap_or(&self.default_prompt);
        tracing::debug!(prompt, "submitting caption request");

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::Text {
                        text: prompt.to_string(),
                    },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{image_base64}"),
                        },
                    },
                ],
            }],
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatResponse = response.json().await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CaptionError::EmptyResponse)?;
        Ok(content)
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!("Caption API health check failed: {}", err);
                false
            }
        }
    }
}
