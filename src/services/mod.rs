pub mod ai_service; // LLM seams used by the pipeline
pub mod anthropic; // Anthropic Messages API
pub mod event_stream;
pub mod image_encoder;
pub mod image_fetcher;

pub use ai_service::{DescriptionGenerator, FeedbackStreamer};
pub use anthropic::AnthropicClient;
pub use image_fetcher::{HttpImageFetcher, ImageFetcher};
