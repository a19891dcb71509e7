use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Where the food image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Url(String),
    Upload {
        bytes: Bytes,
        content_type: Option<String>,
    },
}

/// Downloaded image bytes, already checked against the size limit.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl RawImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Base64 image ready to embed in an LLM request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub media_type: String,
}

/// Incremental feedback text, in generation order.
pub type FeedbackStream = BoxStream<'static, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Fetching,
    Encoding,
    Describing,
    Streaming,
    Done,
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Encoding => "encoding",
            PipelineStage::Describing => "describing",
            PipelineStage::Streaming => "streaming",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
