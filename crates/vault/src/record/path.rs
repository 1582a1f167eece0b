//! Dot-notation field paths into a JSON record.

use super::RecordError;

/// One step from a record's root towards the object that holds a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

/// A parsed field path: the steps to the containing object plus the field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub parents: Vec<PathSegment>,
    pub leaf: String,
}

impl FieldPath {
    /// Parse a dot-notation path.
    ///
    /// Array fields use the `[]` suffix before the dot separator, e.g.
    /// `"integrations[].password"` → parents `[Key("integrations"), ArrayItem]`,
    /// leaf `"password"`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidPath`] for empty paths, empty segments,
    /// or a path whose last segment is an array expansion.
    pub fn parse(path: &str) -> Result<Self, RecordError> {
        let invalid = |reason: &'static str| RecordError::InvalidPath {
            path: path.to_owned(),
            reason,
        };

        if path.is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            let (key, is_array) = match part.strip_suffix("[]") {
                Some(key) => (key, true),
                None => (part, false),
            };
            if key.is_empty() {
                return Err(invalid("empty segment"));
            }
            segments.push(PathSegment::Key(key.to_owned()));
            if is_array {
                segments.push(PathSegment::ArrayItem);
            }
        }

        match segments.pop() {
            Some(PathSegment::Key(leaf)) => Ok(Self {
                parents: segments,
                leaf,
            }),
            _ => Err(invalid("path must end in a field name")),
        }
    }
}
