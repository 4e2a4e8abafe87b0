//! HTTP models for the geosubmit endpoints.
//!
//! The request body itself is decoded into a `serde_json::Value` and handed
//! to [`crate::submission`]; only the envelope types live here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query string of `POST /v1/geosubmit`
#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    pub key: Option<String>,
}

/// Body of every successful submission
#[derive(Debug, Default, Serialize)]
pub struct SubmitResponse {}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub version: String,
}
