use serde::{Deserialize, Serialize};

use super::ai_service::{DescriptionGenerator, FeedbackStreamer};
use super::event_stream::text_deltas;
use crate::error::{DietError, DietResult};
use crate::models::{EncodedImage, FeedbackStream};
use crate::prompts::Prompts;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client, used for both the vision and the feedback call.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    description_max_tokens: u32,
    feedback_max_tokens: u32,
    prompts: Prompts,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(client: reqwest::Client, api_key: String, model: String, prompts: Prompts) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.anthropic.com".to_string(),
            description_max_tokens: 480,
            feedback_max_tokens: 1024,
            prompts,
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, description: u32, feedback: u32) -> Self {
        self.description_max_tokens = description;
        self.feedback_max_tokens = feedback;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> DietResult<reqwest::Response> {
        log::debug!(
            "📤 Anthropic request: model={}, max_tokens={}, stream={}",
            request.model,
            request.max_tokens,
            request.stream
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| DietError::GenerationFailed(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        log::debug!("📥 Anthropic response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Anthropic API error response: {}", error_text);
            return Err(DietError::GenerationFailed(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl DescriptionGenerator for AnthropicClient {
    async fn describe(&self, image: &EncodedImage) -> DietResult<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.description_max_tokens,
            stream: false,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: &image.media_type,
                            data: &image.data,
                        },
                    },
                    ContentPart::Text {
                        text: self.prompts.description.text(),
                    },
                ],
            }],
        };

        log::info!("🤖 Requesting image description from {}", self.model);
        let response = self.send(&request).await?;

        let body: MessagesResponse = response.json().await.map_err(|e| {
            DietError::GenerationFailed(format!("Failed to parse Anthropic response: {}", e))
        })?;

        let description = first_text(body);
        if description.is_empty() {
            log::warn!("⚠️ Vision model returned no text block, continuing with an empty description");
        } else {
            log::info!("💬 Image description: {} chars", description.len());
        }

        Ok(description)
    }
}

#[async_trait::async_trait]
impl FeedbackStreamer for AnthropicClient {
    async fn stream_feedback(&self, description: &str) -> DietResult<FeedbackStream> {
        let prompt = self.prompts.feedback.render(description);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.feedback_max_tokens,
            stream: true,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![ContentPart::Text { text: &prompt }],
            }],
        };

        log::info!("🤖 Opening feedback stream with {}", self.model);
        let response = self.send(&request).await?;

        Ok(text_deltas(response.bytes_stream()))
    }
}

/// Only the first content block counts, and only if it is text.
fn first_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .next()
        .filter(|block| block.kind == "text")
        .and_then(|block| block.text)
        .unwrap_or_default()
}
