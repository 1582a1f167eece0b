//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::crypto::FieldEncryptor;

/// Application state shared across all request handlers.
///
/// All fields are `Arc`-wrapped so that Axum can clone the state for each
/// request without copying key material.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Encryptor holding the process-wide key, loaded once at startup.
    pub encryptor: Arc<FieldEncryptor>,
    /// Suffix naming the IV sibling of an encrypted record field.
    pub iv_field_suffix: Arc<String>,
}

impl AppState {
    /// Create a new [`AppState`] around an encryptor and IV suffix.
    pub fn new(encryptor: FieldEncryptor, iv_field_suffix: String) -> Self {
        Self {
            encryptor: Arc::new(encryptor),
            iv_field_suffix: Arc::new(iv_field_suffix),
        }
    }
}

#[cfg(test)]
impl Default for AppState {
    /// All-zero key and `_iv` suffix. Test use only.
    fn default() -> Self {
        use crate::crypto::{key::KEY_LEN, EncryptionKey};
        let key = EncryptionKey::parse(&"00".repeat(KEY_LEN)).unwrap();
        Self::new(FieldEncryptor::new(key), "_iv".into())
    }
}
