//! Moderation endpoint

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartError,
    },
    http::StatusCode,
    routing::post,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::debug;

use super::RouteLimits;
use crate::AppState;
use crate::services::error::{ApiError, LogErr};
use crate::services::moderation::submission_from_parts;

pub fn routes(limits: RouteLimits) -> Router<Arc<AppState>> {
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(limits.rate_limit_refill_secs)
        .burst_size(limits.rate_limit_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/moderate", post(moderate))
        .layer(DefaultBodyLimit::max(limits.max_upload_bytes))
        .layer(rate_limit_layer)
}

/// Keeps axum's status for multipart faults so an oversized body stays 413
fn checked<T>(result: Result<T, MultipartError>) -> Result<T, ApiError> {
    let status = result
        .as_ref()
        .err()
        .map(MultipartError::status)
        .unwrap_or(StatusCode::BAD_REQUEST);
    result.log_status("Invalid multipart body", status)
}

fn duplicate(field: &str) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        format!("'{field}' may only be provided once"),
    )
}

/// Moderate one submission
///
/// Accepts multipart form data with exactly one of:
/// - `text`: the text to moderate (may be empty)
/// - `image`: an image file
async fn moderate(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut text: Option<String> = None;
    let mut image: Option<Bytes> = None;

    while let Some(field) = checked(multipart.next_field().await)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => {
                if text.is_some() {
                    return Err(duplicate("text"));
                }
                text = Some(checked(field.text().await)?);
            }
            Some("image") => {
                if image.is_some() {
                    return Err(duplicate("image"));
                }
                image = Some(checked(field.bytes().await)?);
            }
            other => debug!(field = ?other, "ignoring unknown multipart field"),
        }
    }

    let submission = submission_from_parts(text, image)?;
    let report = state.engine.moderate(submission).await?;

    Ok(Json(json!({ "result": report })))
}
