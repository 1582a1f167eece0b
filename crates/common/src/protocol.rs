//! Request and response types exchanged with the field encryption service.
//!
//! All bodies are JSON. Ciphertext and IV values are lowercase hexadecimal
//! strings and are always carried together.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Single-value endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// UTF-8 value to encrypt, e.g. a stored credential.
    pub plaintext: String,
}

/// An encrypted value as persisted next to a record.
///
/// Returned by `POST /encrypt` and accepted by `POST /decrypt`. The `iv` is
/// not secret but must accompany the ciphertext; decryption is impossible
/// without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Hex-encoded AES-256-CBC ciphertext (a whole number of 16-byte blocks).
    pub ciphertext: String,
    /// Hex-encoded 16-byte initialisation vector.
    pub iv: String,
}

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// The recovered UTF-8 value.
    pub plaintext: String,
}

// ---------------------------------------------------------------------------
// Record endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /records/encrypt` and `POST /records/decrypt`.
///
/// `fields` lists dot-notation paths into `record`. Array elements are
/// addressed with a `[]` suffix, e.g. `integrations[].password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    /// JSON document holding the fields to transform.
    pub record: serde_json::Value,
    /// Paths of the string fields to encrypt or decrypt.
    pub fields: Vec<String>,
}

/// Successful response body for the record endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    /// The transformed record.
    pub record: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status, always `"ok"` once the server is accepting requests.
    pub status: String,
    /// Truncated SHA-256 of the encryption key; identical across instances sharing a key.
    pub key_fingerprint: String,
    /// Service version.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encrypted_payload_field_names() {
        let p = EncryptedPayload {
            ciphertext: "00ff".into(),
            iv: "11ee".into(),
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v, json!({"ciphertext": "00ff", "iv": "11ee"}));
    }

    #[test]
    fn record_request_parses() {
        let req: RecordRequest = serde_json::from_value(json!({
            "record": {"email": "a@b.c", "smtp": {"password": "hunter2"}},
            "fields": ["smtp.password"]
        }))
        .unwrap();
        assert_eq!(req.fields, vec!["smtp.password".to_string()]);
        assert_eq!(req.record["smtp"]["password"], "hunter2");
    }

    #[test]
    fn error_response_from_service_error() {
        let e = crate::ServiceError::BadRequest("empty field path".into());
        let body = ErrorResponse::from(&e);
        assert_eq!(body.code, "bad_request");
        assert!(body.message.contains("empty field path"));
    }

    #[test]
    fn encrypt_request_rejects_missing_plaintext() {
        let res: Result<EncryptRequest, _> = serde_json::from_value(json!({}));
        assert!(res.is_err());
    }
}
