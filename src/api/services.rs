use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{
    error::ApiError,
    models::{HealthResponse, SubmitParams, SubmitResponse},
    state::AppState,
    utils::parse_content_type,
};
use crate::submission::{self, accounting};

/// Geosubmit endpoint (POST /v1/geosubmit?key=...)
///
/// ## Flow:
/// 1. Resolve the API key and count the request against it
/// 2. Check Content-Type (when sent) and read the body, enforcing the size limit
/// 3. Decode JSON and run the submission pipeline
/// 4. Emit per-request counts
/// 5. Insert observations into the primary store (failure -> 503)
/// 6. Export the normalized reports, best effort
/// 7. Return 200 with an empty JSON object
///
/// Everything wrong below the batch structure is dropped silently and only
/// shows up in the metrics.
pub async fn geosubmit(
    State(state): State<AppState>,
    Query(params): Query<SubmitParams>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state.api_keys.check(params.key.as_deref()).map_err(|rejection| {
        debug!(%rejection, "Rejecting submission");
        ApiError::InvalidApiKey(rejection.to_string())
    })?;

    if let Err(err) = state
        .metrics
        .incr(&format!("geosubmit.api_key.{}", api_key.shortname), 1)
    {
        warn!(error = %err, "Failed to count API key usage");
    }

    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        let content_type = content_type
            .to_str()
            .map_err(|_| ApiError::InvalidPayload("invalid Content-Type header".into()))?;
        parse_content_type(content_type)?;
    }

    let body_bytes = read_body(body, state.config.server.max_payload_bytes).await?;
    let raw: Value = serde_json::from_slice(&body_bytes)?;

    let submission = submission::validate_and_normalize(&raw, Utc::now())?;
    accounting::emit(&submission.counts, &api_key.shortname, state.metrics.as_ref());

    if !submission.observations.is_empty() {
        state
            .store
            .insert(submission.observations)
            .await
            .map_err(|err| {
                error!(
                    error = %err,
                    api_key = %api_key.shortname,
                    "Failed to store observations"
                );
                ApiError::ServiceUnavailable("observation store unavailable".into())
            })?;
    }

    if let Err(err) = state
        .exporter
        .export(&api_key.shortname, &submission.reports)
        .await
    {
        warn!(error = %err, api_key = %api_key.shortname, "Failed to export reports");
    }

    Ok((StatusCode::OK, Json(SubmitResponse::default())))
}

/// Reads the request body, stopping as soon as it passes `max_size`
///
/// Decompression is handled by RequestDecompressionLayer, so the limit
/// applies to the decoded payload.
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Bytes, ApiError> {
    let data = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(max_size)
            } else {
                ApiError::InvalidPayload(format!("failed to read body: {err}"))
            }
        })?
        .to_bytes();

    Ok(data)
}

/// Health check endpoint (GET /health)
///
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();

    components.insert("api".to_string(), "healthy");
    components.insert("store".to_string(), status(state.store.health().await));
    components.insert("export".to_string(), status(state.exporter.health().await));

    let all_healthy = components.values().all(|status| *status == "healthy");
    let (status_code, overall_status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components: components
            .into_iter()
            .map(|(name, status)| (name, status.to_string()))
            .collect(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

fn status(healthy: bool) -> &'static str {
    if healthy { "healthy" } else { "unhealthy" }
}
