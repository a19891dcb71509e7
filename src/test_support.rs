//! Fakes and helpers shared by the unit tests.

use axum::Router;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{DietError, DietResult};
use crate::models::{EncodedImage, FeedbackStream, RawImage};
use crate::services::{DescriptionGenerator, FeedbackStreamer, ImageFetcher};

pub const TEST_MAX_BYTES: u64 = 4 * 1024 * 1024;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

type Respond<T> = Box<dyn Fn() -> DietResult<T> + Send + Sync>;

pub struct FakeFetcher {
    respond: Respond<RawImage>,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_image(len: usize) -> Self {
        Self::new(move || {
            Ok(RawImage {
                bytes: Bytes::from(vec![0xABu8; len]),
                content_type: Some("image/jpeg".to_string()),
            })
        })
    }

    pub fn failing(make: impl Fn() -> DietError + Send + Sync + 'static) -> Self {
        Self::new(move || Err(make()))
    }

    fn new(respond: impl Fn() -> DietResult<RawImage> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> DietResult<RawImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)()
    }

    fn max_bytes(&self) -> u64 {
        TEST_MAX_BYTES
    }
}

pub struct FakeDescriber {
    respond: Respond<String>,
    pub calls: AtomicUsize,
    pub last_image: Mutex<Option<EncodedImage>>,
}

impl FakeDescriber {
    pub fn returning(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move || Ok(text.clone()))
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move || Err(DietError::GenerationFailed(message.clone())))
    }

    pub fn new(respond: impl Fn() -> DietResult<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DescriptionGenerator for FakeDescriber {
    async fn describe(&self, image: &EncodedImage) -> DietResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image.clone());
        (self.respond)()
    }
}

pub struct FakeStreamer {
    chunks: Vec<String>,
    pub last_description: Mutex<Option<String>>,
}

impl FakeStreamer {
    pub fn with_chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|chunk| chunk.to_string()).collect(),
            last_description: Mutex::new(None),
        }
    }

    pub fn last_description(&self) -> Option<String> {
        self.last_description.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl FeedbackStreamer for FakeStreamer {
    async fn stream_feedback(&self, description: &str) -> DietResult<FeedbackStream> {
        *self.last_description.lock().unwrap() = Some(description.to_string());
        Ok(stream::iter(self.chunks.clone()).boxed())
    }
}
