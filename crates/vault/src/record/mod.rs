//! Field-level encryption of JSON records.
//!
//! A record is any JSON document that carries sensitive string fields, e.g. a
//! CRM user with stored mailbox credentials. Each encrypted field keeps its
//! name and holds the hex ciphertext; the hex IV goes into a sibling key named
//! `<field><iv_suffix>` (default `_iv`):
//!
//! ```text
//! {"smtp": {"password": "hunter2"}}
//!   → {"smtp": {"password": "9f3c…", "password_iv": "a1b2…"}}
//! ```
//!
//! Both operations are atomic: they transform a copy and return it only if
//! every listed field succeeded.

pub mod path;

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::crypto::{DecryptError, FieldEncryptor};
use path::{FieldPath, PathSegment};

/// Errors from the record codec.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A field path could not be parsed.
    #[error("invalid field path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// The IV sibling key is already present, so the field is either already
    /// encrypted or the record uses that key for something else.
    #[error("field {path:?} already has a {iv_key:?} sibling")]
    IvConflict { path: String, iv_key: String },

    /// An encrypted field has no IV sibling to decrypt it with.
    #[error("field {path:?} has no {iv_key:?} sibling")]
    MissingIv { path: String, iv_key: String },

    /// A field failed to decrypt.
    #[error("field {path:?} could not be decrypted: {source}")]
    Decrypt {
        path: String,
        #[source]
        source: DecryptError,
    },
}

/// Encrypt every string field named in `fields`, returning the new record.
///
/// Missing fields and non-string values are left untouched.
///
/// # Errors
///
/// Returns [`RecordError::InvalidPath`] if any path is malformed and
/// [`RecordError::IvConflict`] if a string field already has an IV sibling.
/// `record` is never modified.
pub fn encrypt_fields(
    record: &Value,
    fields: &[String],
    encryptor: &FieldEncryptor,
    iv_suffix: &str,
) -> Result<Value, RecordError> {
    let paths = parse_all(fields)?;
    let mut out = record.clone();
    for (raw, path) in &paths {
        let iv_key = format!("{}{iv_suffix}", path.leaf);
        visit_parents(&mut out, &path.parents, &mut |map: &mut Map<String, Value>| {
            let payload = match map.get(&path.leaf) {
                Some(Value::String(plaintext)) => {
                    if map.contains_key(&iv_key) {
                        return Err(RecordError::IvConflict {
                            path: raw.clone(),
                            iv_key: iv_key.clone(),
                        });
                    }
                    encryptor.encrypt(plaintext)
                }
                _ => return Ok(()),
            };
            map.insert(path.leaf.clone(), Value::String(payload.ciphertext));
            map.insert(iv_key.clone(), Value::String(payload.iv));
            Ok(())
        })?;
        tracing::debug!(field = %raw, "field encrypted");
    }
    Ok(out)
}

/// Decrypt every string field named in `fields` and drop its IV sibling.
///
/// Missing fields and non-string values are left untouched.
///
/// # Errors
///
/// Returns [`RecordError::InvalidPath`] for malformed paths,
/// [`RecordError::MissingIv`] when a string field has no IV sibling, and
/// [`RecordError::Decrypt`] when decryption fails.
pub fn decrypt_fields(
    record: &Value,
    fields: &[String],
    encryptor: &FieldEncryptor,
    iv_suffix: &str,
) -> Result<Value, RecordError> {
    let paths = parse_all(fields)?;
    let mut out = record.clone();
    for (raw, path) in &paths {
        let iv_key = format!("{}{iv_suffix}", path.leaf);
        visit_parents(&mut out, &path.parents, &mut |map: &mut Map<String, Value>| {
            let ciphertext = match map.get(&path.leaf) {
                Some(Value::String(c)) => c,
                _ => return Ok(()),
            };
            let iv = match map.get(&iv_key) {
                Some(Value::String(iv)) => iv,
                _ => {
                    return Err(RecordError::MissingIv {
                        path: raw.clone(),
                        iv_key: iv_key.clone(),
                    })
                }
            };
            let plaintext =
                encryptor
                    .decrypt(ciphertext, iv)
                    .map_err(|source| RecordError::Decrypt {
                        path: raw.clone(),
                        source,
                    })?;
            map.insert(path.leaf.clone(), Value::String(plaintext));
            map.remove(&iv_key);
            Ok(())
        })?;
        tracing::debug!(field = %raw, "field decrypted");
    }
    Ok(out)
}

/// Parse and de-duplicate `fields` so no field is transformed twice.
fn parse_all(fields: &[String]) -> Result<Vec<(String, FieldPath)>, RecordError> {
    let unique: BTreeSet<&String> = fields.iter().collect();
    unique
        .into_iter()
        .map(|raw| FieldPath::parse(raw).map(|p| (raw.clone(), p)))
        .collect()
}

/// Recursively navigate `value` following `segments` and call `f` on every
/// object found at the end of the path.
fn visit_parents<F>(value: &mut Value, segments: &[PathSegment], f: &mut F) -> Result<(), RecordError>
where
    F: FnMut(&mut Map<String, Value>) -> Result<(), RecordError>,
{
    let Some((first, rest)) = segments.split_first() else {
        if let Value::Object(map) = value {
            f(map)?;
        }
        return Ok(());
    };

    match first {
        PathSegment::Key(key) => {
            if let Value::Object(map) = value {
                if let Some(child) = map.get_mut(key) {
                    visit_parents(child, rest, f)?;
                }
            }
        }
        PathSegment::ArrayItem => {
            if let Value::Array(arr) = value {
                for item in arr.iter_mut() {
                    visit_parents(item, rest, f)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{key::KEY_LEN, EncryptionKey};
    use serde_json::json;

    fn encryptor() -> FieldEncryptor {
        FieldEncryptor::new(EncryptionKey::parse(&"42".repeat(KEY_LEN)).unwrap())
    }

    fn fields(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn encrypts_flat_field_with_sibling_iv() {
        let enc = encryptor();
        let record = json!({"email": "a@b.c", "password": "hunter2"});
        let out = encrypt_fields(&record, &fields(&["password"]), &enc, "_iv").unwrap();

        assert_eq!(out["email"], "a@b.c");
        let ct = out["password"].as_str().unwrap();
        let iv = out["password_iv"].as_str().unwrap();
        assert_ne!(ct, "hunter2");
        assert_eq!(iv.len(), 32);
        assert_eq!(enc.decrypt(ct, iv).unwrap(), "hunter2");
    }

    #[test]
    fn encrypts_nested_and_array_fields() {
        let enc = encryptor();
        let record = json!({
            "settings": {"smtp": {"password": "p1"}},
            "integrations": [
                {"name": "mail", "token": "t1"},
                {"name": "cal", "token": "t2"}
            ]
        });
        let out = encrypt_fields(
            &record,
            &fields(&["settings.smtp.password", "integrations[].token"]),
            &enc,
            "Iv",
        )
        .unwrap();

        assert!(out["settings"]["smtp"]["passwordIv"].is_string());
        for item in out["integrations"].as_array().unwrap() {
            assert!(item["tokenIv"].is_string());
            assert_ne!(item["token"], "t1");
            assert_ne!(item["token"], "t2");
        }
    }

    #[test]
    fn round_trip_restores_record() {
        let enc = encryptor();
        let record = json!({
            "user": {"name": "Ada", "mailbox": {"password": "s3cret"}},
            "integrations": [{"token": "abc"}, {"token": "def"}]
        });
        let paths = fields(&["user.mailbox.password", "integrations[].token"]);
        let encrypted = encrypt_fields(&record, &paths, &enc, "_iv").unwrap();
        let decrypted = decrypt_fields(&encrypted, &paths, &enc, "_iv").unwrap();
        assert_eq!(decrypted, record);
    }

    #[test]
    fn missing_and_non_string_fields_are_noops() {
        let enc = encryptor();
        let record = json!({"name": "Bob", "pin": 1234, "token": null});
        let out = encrypt_fields(&record, &fields(&["ssn", "pin", "token"]), &enc, "_iv").unwrap();
        assert_eq!(out, record);
    }

    #[test]
    fn duplicate_paths_encrypt_once() {
        let enc = encryptor();
        let record = json!({"password": "hunter2"});
        let paths = fields(&["password", "password"]);
        let out = encrypt_fields(&record, &paths, &enc, "_iv").unwrap();
        let plain = decrypt_fields(&out, &fields(&["password"]), &enc, "_iv").unwrap();
        assert_eq!(plain["password"], "hunter2");
    }

    #[test]
    fn invalid_path_leaves_record_untouched() {
        let enc = encryptor();
        let record = json!({"password": "hunter2"});
        let err = encrypt_fields(&record, &fields(&["password", "a..b"]), &enc, "_iv").unwrap_err();
        assert!(matches!(err, RecordError::InvalidPath { .. }));
        assert_eq!(record["password"], "hunter2");
    }

    #[test]
    fn encrypting_twice_is_rejected_and_keeps_first_iv() {
        let enc = encryptor();
        let paths = fields(&["password"]);
        let once = encrypt_fields(&json!({"password": "hunter2"}), &paths, &enc, "_iv").unwrap();

        let err = encrypt_fields(&once, &paths, &enc, "_iv").unwrap_err();
        match err {
            RecordError::IvConflict { path, iv_key } => {
                assert_eq!(path, "password");
                assert_eq!(iv_key, "password_iv");
            }
            other => panic!("unexpected error: {other}"),
        }

        let plain = decrypt_fields(&once, &paths, &enc, "_iv").unwrap();
        assert_eq!(plain, json!({"password": "hunter2"}));
    }

    #[test]
    fn existing_sibling_field_is_not_clobbered() {
        let enc = encryptor();
        let record = json!({"token": "t", "token_iv": "user data"});
        let err = encrypt_fields(&record, &fields(&["token"]), &enc, "_iv").unwrap_err();
        assert!(matches!(err, RecordError::IvConflict { .. }));
        assert_eq!(record["token_iv"], "user data");
    }

    #[test]
    fn conflict_in_one_array_item_fails_whole_record() {
        let enc = encryptor();
        let record = json!({"items": [{"token": "a"}, {"token": "b", "token_iv": "x"}]});
        let err = encrypt_fields(&record, &fields(&["items[].token"]), &enc, "_iv").unwrap_err();
        assert!(matches!(err, RecordError::IvConflict { .. }));
    }

    #[test]
    fn decrypt_requires_iv_sibling() {
        let enc = encryptor();
        let record = json!({"password": "00112233445566778899aabbccddeeff"});
        let err = decrypt_fields(&record, &fields(&["password"]), &enc, "_iv").unwrap_err();
        match err {
            RecordError::MissingIv { path, iv_key } => {
                assert_eq!(path, "password");
                assert_eq!(iv_key, "password_iv");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decrypt_with_wrong_key_fails_or_differs() {
        let enc = encryptor();
        let other = FieldEncryptor::new(EncryptionKey::parse(&"07".repeat(KEY_LEN)).unwrap());
        let record = json!({"password": "hunter2"});
        let paths = fields(&["password"]);
        let encrypted = encrypt_fields(&record, &paths, &enc, "_iv").unwrap();
        match decrypt_fields(&encrypted, &paths, &other, "_iv") {
            Ok(out) => assert_ne!(out["password"], "hunter2"),
            Err(e) => assert!(matches!(e, RecordError::Decrypt { .. })),
        }
    }

    #[test]
    fn decrypt_error_names_field_not_value() {
        let enc = encryptor();
        let record = json!({"password": "zz", "password_iv": "00"});
        let err = decrypt_fields(&record, &fields(&["password"]), &enc, "_iv").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"password\""));
        assert!(!msg.contains("zz"));
    }
}
