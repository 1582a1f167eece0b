//! Axum middleware layers applied to the router.
//!
//! Includes request IDs, request tracing, timeout enforcement, body size
//! limits, and response compression.

use std::time::Duration;

use axum::{body::Body, http::Request};
use tracing::Span;

use crate::config::Config;

/// Header carrying the per-request UUID, set if the caller did not send one.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Limits applied by the router's middleware stack.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Per-request timeout; exceeded requests receive `408 Request Timeout`.
    pub request_timeout: Duration,
    /// Largest accepted request body; larger bodies receive `413`.
    pub max_body_bytes: usize,
}

impl Limits {
    /// Read the timeout and body limit from validated configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            request_timeout: cfg.request_timeout(),
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Root span for a request. Records method, path, and request ID only;
/// query strings and bodies stay out of telemetry.
pub fn request_span(req: &Request<Body>) -> Span {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id,
    )
}
