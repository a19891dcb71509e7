use base64::{engine::general_purpose, Engine};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;

use crate::error::{DietError, DietResult};
use crate::models::RawImage;

/// Retrieves image bytes for a URL, enforcing the size limit.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> DietResult<RawImage>;

    /// Largest image accepted, in bytes.
    fn max_bytes(&self) -> u64;
}

pub fn ensure_within_limit(max: u64, size: u64) -> DietResult<()> {
    if size > max {
        return Err(DietError::ImageTooLarge { max, actual: size });
    }
    Ok(())
}

/// Outcome of [`read_capped`].
#[derive(Debug)]
pub enum CappedBody {
    Complete(Bytes),
    /// The limit was exceeded; holds the total number of bytes seen.
    Overflow(u64),
}

/// Drain `stream`, keeping at most `limit` bytes in memory.
///
/// Past the limit the bytes are only counted so callers can report the real size.
pub async fn read_capped<S, E>(stream: S, limit: u64) -> Result<CappedBody, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    futures_util::pin_mut!(stream);

    let mut buffer = BytesMut::new();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        received += chunk.len() as u64;
        if received <= limit {
            buffer.extend_from_slice(&chunk);
        } else if !buffer.is_empty() {
            buffer = BytesMut::new();
        }
    }

    if received > limit {
        Ok(CappedBody::Overflow(received))
    } else {
        Ok(CappedBody::Complete(buffer.freeze()))
    }
}

/// Fetches over HTTP with a HEAD probe before the download. `data:` URLs are
/// decoded in place.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: u64,
    timeout: Duration,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client, max_bytes: u64, timeout: Duration) -> Self {
        Self {
            client,
            max_bytes,
            timeout,
        }
    }

    async fn probe(&self, url: &str) -> DietResult<()> {
        let response = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fetch_failed)?;

        let status = response.status();
        if !status.is_success() {
            // Plenty of hosts refuse HEAD; the download still enforces the limit.
            log::debug!("HEAD {} answered {}, skipping size probe", url, status);
            return Ok(());
        }

        if let Some(advertised) = advertised_length(response.headers()) {
            log::debug!("📏 HEAD advertises {} bytes for {}", advertised, url);
            ensure_within_limit(self.max_bytes, advertised)?;
        }

        Ok(())
    }

    async fn download(&self, url: &str) -> DietResult<RawImage> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fetch_failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DietError::FetchFailed(format!("HTTP {} from {}", status, url)));
        }

        if let Some(advertised) = advertised_length(response.headers()) {
            ensure_within_limit(self.max_bytes, advertised)?;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match read_capped(response.bytes_stream(), self.max_bytes)
            .await
            .map_err(fetch_failed)?
        {
            CappedBody::Complete(bytes) => Ok(RawImage {
                bytes,
                content_type,
            }),
            CappedBody::Overflow(actual) => Err(DietError::ImageTooLarge {
                max: self.max_bytes,
                actual,
            }),
        }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> DietResult<RawImage> {
        if url.starts_with("data:") {
            let image = decode_data_url(url)?;
            ensure_within_limit(self.max_bytes, image.len() as u64)?;
            log::info!("🖼️ Decoded inline image ({} bytes)", image.len());
            return Ok(image);
        }

        log::info!("📥 Fetching image: {}", url);
        self.probe(url).await?;
        let image = self.download(url).await?;
        log::info!("✅ Downloaded {} bytes from {}", image.len(), url);

        Ok(image)
    }

    fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

fn fetch_failed(err: reqwest::Error) -> DietError {
    DietError::FetchFailed(err.to_string())
}

fn advertised_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn decode_data_url(url: &str) -> DietResult<RawImage> {
    let rest = url.strip_prefix("data:").unwrap_or(url);
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DietError::FetchFailed("malformed data URL".to_string()))?;

    let content_type = meta.strip_suffix(";base64").ok_or_else(|| {
        DietError::FetchFailed("only base64 data URLs are supported".to_string())
    })?;

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| DietError::FetchFailed(format!("invalid base64 in data URL: {}", e)))?;

    Ok(RawImage {
        bytes: bytes.into(),
        content_type: (!content_type.is_empty()).then(|| content_type.to_string()),
    })
}
