use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::error::{DietError, DietResult};
use crate::models::{FeedbackStream, ImageSource, PipelineStage, RawImage};
use crate::services::image_encoder;
use crate::services::image_fetcher::ensure_within_limit;
use crate::services::{DescriptionGenerator, FeedbackStreamer, ImageFetcher};

/// Runs one request through fetch → encode → describe → stream feedback.
///
/// Collaborators are built once per process and shared between requests.
pub struct DietHandler {
    fetcher: Arc<dyn ImageFetcher>,
    describer: Arc<dyn DescriptionGenerator>,
    feedback: Arc<dyn FeedbackStreamer>,
}

impl DietHandler {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        describer: Arc<dyn DescriptionGenerator>,
        feedback: Arc<dyn FeedbackStreamer>,
    ) -> Self {
        Self {
            fetcher,
            describer,
            feedback,
        }
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.fetcher.max_bytes()
    }

    pub async fn handle(&self, source: ImageSource) -> DietResult<FeedbackStream> {
        let mut tracker = StageTracker::new();

        match self.run(source, &mut tracker).await {
            Ok(stream) => Ok(TrackedStream {
                inner: stream,
                tracker: Some(tracker),
            }
            .boxed()),
            Err(err) => {
                tracker.fail(&err);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        source: ImageSource,
        tracker: &mut StageTracker,
    ) -> DietResult<FeedbackStream> {
        tracker.advance(PipelineStage::Fetching);
        let image = match source {
            ImageSource::Url(url) => self.fetcher.fetch(&url).await?,
            ImageSource::Upload {
                bytes,
                content_type,
            } => {
                ensure_within_limit(self.fetcher.max_bytes(), bytes.len() as u64)?;
                RawImage {
                    bytes,
                    content_type,
                }
            }
        };

        tracker.advance(PipelineStage::Encoding);
        let encoded = image_encoder::encode(&image);
        drop(image);

        tracker.advance(PipelineStage::Describing);
        let description = self.describer.describe(&encoded).await?;

        tracker.advance(PipelineStage::Streaming);
        self.feedback.stream_feedback(&description).await
    }
}

/// Logs stage transitions for a single request.
struct StageTracker {
    stage: PipelineStage,
    started: Instant,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: PipelineStage::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        log::info!(
            "🔀 {} -> {} ({} ms)",
            self.stage,
            next,
            self.started.elapsed().as_millis()
        );
        self.stage = next;
    }

    fn fail(&mut self, err: &DietError) {
        log::warn!("⚠️ Pipeline failed while {}: {}", self.stage, err);
        self.advance(PipelineStage::Failed);
    }
}

/// Feedback stream that records the end of the pipeline, or the client leaving early.
struct TrackedStream {
    inner: FeedbackStream,
    tracker: Option<StageTracker>,
}

impl Stream for TrackedStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        let next = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(None) = next {
            if let Some(mut tracker) = self.tracker.take() {
                tracker.advance(PipelineStage::Done);
            }
        }
        next
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if self.tracker.is_some() {
            log::info!("🔌 Client went away mid-stream, dropping the provider connection");
        }
    }
}
