//! AES-256-CBC encryption and decryption of individual string fields.
//!
//! **Mode choice:** the stored format predates this service. Values written by
//! earlier versions of the CRM are AES-256-CBC with PKCS#7 padding and a
//! random per-value IV, so this module reads and writes exactly that. There is
//! no authentication tag; see the module docs in [`crate::crypto`].
//!
//! **Never reuse an IV.** Every [`FieldEncryptor::encrypt`] call draws a fresh
//! IV from its [`IvSource`]. The production source is the OS CSPRNG.

use std::sync::Arc;

use aes::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut,
    KeyIvInit,
};
use common::protocol::EncryptedPayload;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use super::key::EncryptionKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Byte length of a CBC initialisation vector (one AES block).
pub const IV_LEN: usize = 16;

/// AES block size in bytes.
const BLOCK_LEN: usize = 16;

/// Errors produced when decrypting a stored value.
///
/// None of these carry the offending input; callers may log them freely.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    /// The ciphertext or IV is not valid hexadecimal.
    #[error("{0} is not valid hex")]
    MalformedHex(&'static str),

    /// The decoded IV is not [`IV_LEN`] bytes.
    #[error("invalid iv length: expected {IV_LEN} bytes, got {0}")]
    InvalidIvLength(usize),

    /// The decoded ciphertext is empty or not a whole number of blocks.
    #[error("invalid ciphertext length: {0} bytes is not a positive multiple of 16")]
    InvalidCiphertextLength(usize),

    /// PKCS#7 padding check failed: wrong key, wrong IV, or corrupted ciphertext.
    #[error("bad padding")]
    BadPadding,

    /// Decryption produced bytes that are not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Supplier of initialisation vectors.
#[cfg_attr(test, mockall::automock)]
pub trait IvSource: Send + Sync {
    /// Return a fresh IV. Must never repeat for the lifetime of a key.
    fn next_iv(&self) -> [u8; IV_LEN];
}

/// [`IvSource`] backed by the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsIvSource;

impl IvSource for OsIvSource {
    fn next_iv(&self) -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        iv
    }
}

/// Encrypts and decrypts short string fields under one injected key.
///
/// Cheap to clone and safe to share between tasks; each call is independent
/// and touches no shared mutable state.
#[derive(Clone)]
pub struct FieldEncryptor {
    key: EncryptionKey,
    ivs: Arc<dyn IvSource>,
}

impl FieldEncryptor {
    /// Create an encryptor drawing IVs from the OS CSPRNG.
    pub fn new(key: EncryptionKey) -> Self {
        Self::with_iv_source(key, Arc::new(OsIvSource))
    }

    /// Create an encryptor with a caller-supplied [`IvSource`].
    pub fn with_iv_source(key: EncryptionKey, ivs: Arc<dyn IvSource>) -> Self {
        Self { key, ivs }
    }

    /// Fingerprint of the key this encryptor holds.
    pub fn fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// Encrypt `plaintext`, returning hex ciphertext and the hex IV used.
    ///
    /// Infallible: a [`FieldEncryptor`] cannot be built without a valid key.
    pub fn encrypt(&self, plaintext: &str) -> EncryptedPayload {
        let iv = self.ivs.next_iv();
        let ciphertext = Aes256CbcEnc::new(
            GenericArray::from_slice(self.key.as_bytes()),
            GenericArray::from_slice(&iv),
        )
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        EncryptedPayload {
            ciphertext: hex::encode(ciphertext),
            iv: hex::encode(iv),
        }
    }

    /// Decrypt a hex ciphertext with the hex IV it was produced with.
    ///
    /// # Errors
    ///
    /// Returns a [`DecryptError`] if either input is malformed, if the padding
    /// check fails, or if the recovered bytes are not UTF-8. A wrong IV may
    /// instead return `Ok` with a different string.
    pub fn decrypt(&self, ciphertext_hex: &str, iv_hex: &str) -> Result<String, DecryptError> {
        let iv = hex::decode(iv_hex).map_err(|_| DecryptError::MalformedHex("iv"))?;
        if iv.len() != IV_LEN {
            return Err(DecryptError::InvalidIvLength(iv.len()));
        }

        let ciphertext =
            hex::decode(ciphertext_hex).map_err(|_| DecryptError::MalformedHex("ciphertext"))?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(DecryptError::InvalidCiphertextLength(ciphertext.len()));
        }

        let plaintext = Aes256CbcDec::new(
            GenericArray::from_slice(self.key.as_bytes()),
            GenericArray::from_slice(&iv),
        )
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| DecryptError::BadPadding)?;

        String::from_utf8(plaintext).map_err(|_| DecryptError::InvalidUtf8)
    }

    /// Decrypt a stored [`EncryptedPayload`].
    ///
    /// # Errors
    ///
    /// See [`FieldEncryptor::decrypt`].
    pub fn decrypt_payload(&self, payload: &EncryptedPayload) -> Result<String, DecryptError> {
        self.decrypt(&payload.ciphertext, &payload.iv)
    }
}

impl std::fmt::Debug for FieldEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEncryptor")
            .field("key_fingerprint", &self.key.fingerprint())
            .finish_non_exhaustive()
    }
}
