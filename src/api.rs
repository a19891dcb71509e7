use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::services::ServeDir;

use crate::error::DietError;
use crate::handlers::DietHandler;
use crate::models::{FeedbackStream, ImageSource};
use crate::services::image_fetcher::{read_capped, CappedBody};

/// Headroom on top of the encoded image for the JSON framing.
const BODY_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Body of `POST /diet/process` and `POST /diet`.
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    /// Public URL of the food image, or a base64 `data:` URL.
    #[serde(alias = "food_image_url")]
    pub url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub diet_handler: Arc<DietHandler>,
}

pub fn create_router(diet_handler: Arc<DietHandler>, static_dir: &str) -> Router {
    let state = AppState { diet_handler };

    let cors_layer = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any);

    Router::new()
        .route("/diet/process", post(process_handler))
        .route("/diet", post(process_handler))
        // Upload bodies are counted by the handler instead.
        .route(
            "/diet/upload",
            post(upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer)
}

/// Largest JSON body buffered: a maximum-size image inline as a base64 data URL.
fn inline_body_limit(max_image_bytes: u64) -> u64 {
    (max_image_bytes / 3 + 1) * 4 + BODY_OVERHEAD_BYTES
}

async fn process_handler(State(state): State<AppState>, body: Body) -> Response {
    let max = state.diet_handler.max_image_bytes();
    let bytes = match read_capped(body.into_data_stream(), inline_body_limit(max)).await {
        Ok(CappedBody::Complete(bytes)) => bytes,
        Ok(CappedBody::Overflow(received)) => {
            // Too long for any acceptable inline image; size it as if it were all base64.
            return DietError::ImageTooLarge {
                max,
                actual: received / 4 * 3,
            }
            .into_response();
        }
        Err(e) => {
            return DietError::Unexpected(format!("Failed to read request body: {}", e))
                .into_response()
        }
    };

    let request = match Json::<ImageRequest>::from_bytes(&bytes) {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection.into_response(),
    };

    let url = request.url.trim();
    if url.is_empty() {
        return validation_error("url", "url cannot be empty");
    }

    log::info!("📨 Diet request for {}", preview(url));

    match state
        .diet_handler
        .handle(ImageSource::Url(url.to_string()))
        .await
    {
        Ok(stream) => streaming_response(stream),
        Err(err) => err.into_response(),
    }
}

async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return e.into_response(),
        };

        let is_image_field =
            field.file_name().is_some() || matches!(field.name(), Some("file") | Some("image"));
        if !is_image_field {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let max = state.diet_handler.max_image_bytes();
        let bytes = match read_capped(field, max).await {
            Ok(CappedBody::Complete(bytes)) => bytes,
            Ok(CappedBody::Overflow(actual)) => {
                return DietError::ImageTooLarge { max, actual }.into_response()
            }
            Err(e) => return e.into_response(),
        };

        log::info!(
            "📸 Diet upload: {} bytes ({})",
            bytes.len(),
            content_type.as_deref().unwrap_or("unknown type")
        );

        return match state
            .diet_handler
            .handle(ImageSource::Upload {
                bytes,
                content_type,
            })
            .await
        {
            Ok(stream) => streaming_response(stream),
            Err(err) => err.into_response(),
        };
    }

    validation_error("file", "an image file is required")
}

async fn health_check() -> &'static str {
    "OK"
}

fn streaming_response(stream: FeedbackStream) -> Response {
    let body = Body::from_stream(stream.map(Ok::<_, Infallible>));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

fn validation_error(field: &str, message: &str) -> Response {
    log::warn!("⚠️ Validation failed for {}: {}", field, message);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "detail": [{
                "type": "value_error",
                "loc": ["body", field],
                "msg": message,
            }]
        })),
    )
        .into_response()
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "Internal server error".to_string()
    };

    DietError::Unexpected(message).into_response()
}

/// Data URLs can be megabytes long; only log their head.
fn preview(url: &str) -> &str {
    match url.char_indices().nth(100) {
        Some((index, _)) => &url[..index],
        None => url,
    }
}
