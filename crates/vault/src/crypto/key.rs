//! [`EncryptionKey`]: the 256-bit secret used by [`super::FieldEncryptor`].

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Number of hex characters kept from the SHA-256 digest in a key fingerprint.
const FINGERPRINT_HEX_LEN: usize = 16;

/// Configuration errors for the encryption key. Always fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// No key was configured.
    #[error("ENCRYPTION_KEY is not configured")]
    Missing,

    /// The configured value is neither 64 hex characters nor 32 raw bytes.
    #[error("encryption key has invalid length: expected {KEY_LEN} bytes or 64 hex characters, got {0}")]
    InvalidLength(usize),
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which plaintext key material lives in RAM.
#[derive(Clone)]
pub struct EncryptionKey(Box<[u8; KEY_LEN]>);

impl EncryptionKey {
    /// Build a key from an optional configured value.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] for `None` or an empty string, otherwise
    /// whatever [`EncryptionKey::parse`] returns.
    pub fn from_config(value: Option<&str>) -> Result<Self, KeyError> {
        match value {
            None => Err(KeyError::Missing),
            Some(v) if v.is_empty() => Err(KeyError::Missing),
            Some(v) => Self::parse(v),
        }
    }

    /// Parse a key from its configured string form.
    ///
    /// Two encodings are accepted:
    /// - 64 hexadecimal characters, decoded to 32 bytes;
    /// - exactly 32 bytes of any other text, used as the key verbatim. Older
    ///   deployments configured the key this way.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] for any other length.
    pub fn parse(value: &str) -> Result<Self, KeyError> {
        let mut buf = Box::new([0u8; KEY_LEN]);
        if value.len() == KEY_LEN * 2 && value.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode_to_slice(value, &mut buf[..])
                .map_err(|_| KeyError::InvalidLength(value.len()))?;
        } else if value.len() == KEY_LEN {
            buf.copy_from_slice(value.as_bytes());
        } else {
            return Err(KeyError::InvalidLength(value.len()));
        }
        Ok(Self(buf))
    }

    /// Raw key bytes, for the cipher layer only.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// First 16 hex characters of SHA-256 over the key.
    ///
    /// Safe to log; two instances report the same fingerprint only if they
    /// hold the same key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0[..]);
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_HEX_LEN);
        hex
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        // Zero the key material on drop.
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("EncryptionKey([REDACTED])")
    }
}
