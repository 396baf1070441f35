//! Field name sanitization for MongoDB compatibility.
//!
//! MongoDB does not accept dots, dollar signs or null bytes in field names. Stored
//! documents may contain any of them, so field names are escaped on the way in and
//! restored on the way out. Values other than field names are stored untouched.
//!
//! Escapes are percent-style and `%` itself is escaped first, so every stored name
//! restores to exactly the name that was written.

use bson::Bson;


/// Escapes and restores field names inside BSON values.
pub(crate) struct FieldSanitizer;

impl FieldSanitizer {
    /// Applied in order when escaping, in reverse when restoring.
    const REPLACEMENTS: [(&'static str, &'static str); 4] = [
        ("%", "%25"),
        (".", "%2E"),
        ("$", "%24"),
        ("\0", "%00"),
    ];

    /// Recursively escapes every field name in `value`.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::sanitize_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::sanitize_string(k), Self::sanitize_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn sanitize_string(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    /// Escapes each segment of a dot-separated field path, keeping the separators.
    pub(crate) fn sanitize_path(path: &str) -> String {
        path.split('.')
            .map(Self::sanitize_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Inverse of [`sanitize_value`](Self::sanitize_value).
    pub(crate) fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::restore_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::restore_string(k), Self::restore_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn restore_string(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}
