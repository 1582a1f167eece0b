//! AES-256-CBC field encryption primitives.
//!
//! This module is free of HTTP and configuration-loading dependencies. It
//! provides the key type and the encrypt/decrypt operations used by the record
//! codec and the request handlers.
//!
//! # Stored format
//!
//! An encrypted value is two lowercase hex strings persisted side by side:
//!
//! ```text
//! ciphertext = hex(AES-256-CBC(key, iv, PKCS#7(plaintext)))
//! iv         = hex(16 random bytes)
//! ```
//!
//! CBC carries no authentication tag. A wrong key or corrupted ciphertext is
//! usually caught by the padding check, but a wrong IV only garbles the first
//! block and can decrypt "successfully" to a different value.

pub mod cipher;
pub mod key;

pub use cipher::{DecryptError, FieldEncryptor};
pub use key::{EncryptionKey, KeyError};
