use crate::error::DietResult;
use crate::models::{EncodedImage, FeedbackStream};

/// Vision model that turns a food photo into a plain description.
#[async_trait::async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Returns an empty string when the model replies without a text block.
    async fn describe(&self, image: &EncodedImage) -> DietResult<String>;
}

/// Text model that streams nutritional feedback for a meal description.
#[async_trait::async_trait]
pub trait FeedbackStreamer: Send + Sync {
    /// Errors only if the stream cannot be opened. Once open, provider
    /// failures end the stream early instead of surfacing an error.
    async fn stream_feedback(&self, description: &str) -> DietResult<FeedbackStream>;
}
