use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures on the request path, from image fetch to the start of the feedback stream.
#[derive(Error, Debug)]
pub enum DietError {
    #[error("Image too large. Maximum allowed size: {max} bytes, actual size: {actual} bytes")]
    ImageTooLarge { max: u64, actual: u64 },

    #[error("Failed to fetch image: {0}")]
    FetchFailed(String),

    #[error("Failed to generate image description: {0}")]
    GenerationFailed(String),

    #[error("{0}")]
    Unexpected(String),
}

impl DietError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DietError::ImageTooLarge { .. } => StatusCode::BAD_REQUEST,
            DietError::FetchFailed(_)
            | DietError::GenerationFailed(_)
            | DietError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for DietError {
    fn from(err: anyhow::Error) -> Self {
        DietError::Unexpected(err.to_string())
    }
}

impl IntoResponse for DietError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ Request failed ({}): {}", status, self);
        } else {
            log::warn!("⚠️ Request rejected ({}): {}", status, self);
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type DietResult<T> = std::result::Result<T, DietError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_too_large_message() {
        let err = DietError::ImageTooLarge {
            max: 4_194_304,
            actual: 5_242_880,
        };

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Image too large. Maximum allowed size: 4194304 bytes, actual size: 5242880 bytes"
        );
    }

    #[test]
    fn test_provider_failures_are_server_errors() {
        let fetch = DietError::FetchFailed("dns error".to_string());
        let generation = DietError::GenerationFailed("HTTP 401".to_string());
        let unexpected: DietError = anyhow::anyhow!("boom").into();

        assert_eq!(fetch.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(generation.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unexpected.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unexpected.to_string(), "boom");
    }
}
