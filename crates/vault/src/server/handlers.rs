//! Axum request handlers for all service endpoints.
//!
//! JSON bodies are taken as `Result<Json<_>, JsonRejection>` so that malformed
//! input gets the standard [`ErrorResponse`] body. Rejection details are not
//! echoed back, since serde error messages can quote the submitted values.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{
    protocol::{
        DecryptResponse, EncryptRequest, EncryptedPayload, ErrorResponse, HealthResponse,
        RecordRequest, RecordResponse,
    },
    ServiceError,
};
use tracing::{debug, warn};

use super::state::AppState;
use crate::record::{self, RecordError};

/// `POST /encrypt` — encrypt a single value under a fresh IV.
pub async fn encrypt(
    State(state): State<AppState>,
    body: Result<Json<EncryptRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection),
    };

    let payload = state.encryptor.encrypt(&req.plaintext);
    (StatusCode::OK, Json(payload)).into_response()
}

/// `POST /decrypt` — decrypt a stored `{ciphertext, iv}` pair.
///
/// Returns `422` when the pair cannot be decrypted with the configured key.
pub async fn decrypt(
    State(state): State<AppState>,
    body: Result<Json<EncryptedPayload>, JsonRejection>,
) -> Response {
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    match state.encryptor.decrypt_payload(&payload) {
        Ok(plaintext) => (StatusCode::OK, Json(DecryptResponse { plaintext })).into_response(),
        Err(e) => {
            warn!(error = %e, "decryption failed");
            error_response(ServiceError::DecryptionFailure(e.to_string()))
        }
    }
}

/// `POST /records/encrypt` — encrypt the listed fields of a record in place,
/// adding an IV sibling next to each.
pub async fn encrypt_record(
    State(state): State<AppState>,
    body: Result<Json<RecordRequest>, JsonRejection>,
) -> Response {
    let req = match parse_record_request(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match record::encrypt_fields(
        &req.record,
        &req.fields,
        &state.encryptor,
        &state.iv_field_suffix,
    ) {
        Ok(record) => {
            debug!(fields = req.fields.len(), "record encrypted");
            (StatusCode::OK, Json(RecordResponse { record })).into_response()
        }
        Err(e) => error_response(record_error(e)),
    }
}

/// `POST /records/decrypt` — decrypt the listed fields of a record and drop
/// their IV siblings.
pub async fn decrypt_record(
    State(state): State<AppState>,
    body: Result<Json<RecordRequest>, JsonRejection>,
) -> Response {
    let req = match parse_record_request(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match record::decrypt_fields(
        &req.record,
        &req.fields,
        &state.encryptor,
        &state.iv_field_suffix,
    ) {
        Ok(record) => {
            debug!(fields = req.fields.len(), "record decrypted");
            (StatusCode::OK, Json(RecordResponse { record })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "record decryption failed");
            error_response(record_error(e))
        }
    }
}

/// `GET /health` — liveness check.
///
/// The key is loaded before the server starts, so a responding instance is
/// always ready. The fingerprint lets operators confirm that every instance
/// holds the same key.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        key_fingerprint: state.encryptor.fingerprint(),
        version: env!("CARGO_PKG_VERSION").into(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Error mapping helpers
// ---------------------------------------------------------------------------

fn parse_record_request(
    body: Result<Json<RecordRequest>, JsonRejection>,
) -> Result<RecordRequest, Response> {
    let Json(req) = body.map_err(rejection_response)?;
    if !req.record.is_object() {
        return Err(error_response(ServiceError::BadRequest(
            "record must be a JSON object".into(),
        )));
    }
    Ok(req)
}

fn record_error(err: RecordError) -> ServiceError {
    match err {
        RecordError::InvalidPath { .. } | RecordError::IvConflict { .. } => {
            ServiceError::BadRequest(err.to_string())
        }
        RecordError::MissingIv { .. } | RecordError::Decrypt { .. } => {
            ServiceError::DecryptionFailure(err.to_string())
        }
    }
}

fn error_response(err: ServiceError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(ErrorResponse::from(&err))).into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let (status, code, message) = match status {
        StatusCode::PAYLOAD_TOO_LARGE => (
            status,
            "payload_too_large",
            "request body exceeds the configured limit",
        ),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => (
            status,
            "unsupported_media_type",
            "expected Content-Type: application/json",
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            "bad_request",
            "request body is not valid JSON of the expected shape",
        ),
    };
    debug!(status = status.as_u16(), "rejected request body");
    (status, Json(ErrorResponse::new(code, message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::post, Router};
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/encrypt", post(encrypt))
            .route("/decrypt", post(decrypt))
            .with_state(AppState::default())
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn encrypt_returns_hex_pair() {
        let resp = test_router()
            .oneshot(json_request("/encrypt", r#"{"plaintext":"hello@example.com"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["iv"].as_str().unwrap().len(), 32);
        assert_eq!(body["ciphertext"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn malformed_json_does_not_echo_input() {
        let resp = test_router()
            .oneshot(json_request("/encrypt", r#"{"plaintext": 12345678}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "bad_request");
        assert!(!body["message"].as_str().unwrap().contains("12345678"));
    }

    #[tokio::test]
    async fn decrypt_failure_is_422() {
        let resp = test_router()
            .oneshot(json_request(
                "/decrypt",
                r#"{"ciphertext":"00112233445566778899aabbccddeeff","iv":"00"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "decryption_failed");
    }

    #[test]
    fn record_errors_map_to_statuses() {
        let invalid = record_error(RecordError::InvalidPath {
            path: "a..b".into(),
            reason: "empty segment",
        });
        assert_eq!(invalid.http_status(), 400);

        let conflict = record_error(RecordError::IvConflict {
            path: "password".into(),
            iv_key: "password_iv".into(),
        });
        assert_eq!(conflict.http_status(), 400);

        let missing = record_error(RecordError::MissingIv {
            path: "password".into(),
            iv_key: "password_iv".into(),
        });
        assert_eq!(missing.http_status(), 422);
    }
}
