//! Document values, CAS tokens and the result shapes returned by bucket operations.
//!
//! Documents are plain [`Bson`] values: an object, a string or a number stored under a
//! string key. No schema is enforced. Typed access goes through serde with
//! [`to_document`] and [`from_document`].

use std::fmt;

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{BucketError, BucketResult, StoreResult};

/// Opaque compare-and-swap token.
///
/// Every read and mutation returns the document's current CAS. Passing it back in
/// [`WriteOptions::cas`](crate::options::WriteOptions) makes a write conditional on the
/// document being unchanged since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cas(u64);

impl Cas {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A raw single-key read: the stored value together with its CAS.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResult {
    pub value: Bson,
    pub cas: Cas,
}

/// Result of insert, replace, upsert and remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationResult {
    /// CAS after the mutation. For a remove, the CAS the document had when removed.
    pub cas: Cas,
}

/// Result of a counter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterResult {
    /// Counter value after the operation.
    pub value: u64,
    pub cas: Cas,
}

/// Reads the counter stored under `key`. Only non-negative integers are counters.
pub fn counter_value(key: &str, value: &Bson) -> BucketResult<u64> {
    match value {
        Bson::Int32(n) if *n >= 0 => Ok(*n as u64),
        Bson::Int64(n) if *n >= 0 => Ok(*n as u64),
        _ => Err(BucketError::NotNumeric(key.to_string())),
    }
}

/// Adds `delta` to a counter, clamping at zero and at the largest storable value.
pub fn apply_counter_delta(current: u64, delta: i64) -> u64 {
    let next = if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    };

    next.min(i64::MAX as u64)
}

/// Raw per-key results of a multi-get, in the order the keys were requested.
///
/// A key the backend reported as missing maps to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiGetResult {
    entries: Vec<(String, Option<GetResult>)>,
}

impl MultiGetResult {
    pub fn new(entries: Vec<(String, Option<GetResult>)>) -> Self {
        Self { entries }
    }

    /// Looks up the result for `key`. The outer `Option` is `None` when the key was not
    /// part of the request.
    pub fn get(&self, key: &str) -> Option<Option<&GetResult>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, result)| result.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&GetResult>)> {
        self.entries
            .iter()
            .map(|(key, result)| (key.as_str(), result.as_ref()))
    }

    /// Keys the backend reported as missing.
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, result)| result.is_none())
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the CAS tokens and keeps only the values, in request order.
    pub fn into_values(self) -> Vec<Option<Bson>> {
        self.entries
            .into_iter()
            .map(|(_, result)| result.map(|r| r.value))
            .collect()
    }
}

/// How [`DocumentStore::update`](crate::store::DocumentStore::update) derives the new document
/// from the stored one.
pub enum Mutation {
    /// Replace the document with whatever the function returns.
    Apply(Box<dyn FnOnce(Bson) -> Bson + Send>),
    /// Copy the partial document's top-level keys over the stored document.
    Merge(Document),
}

impl Mutation {
    pub fn apply<F>(f: F) -> Self
    where
        F: FnOnce(Bson) -> Bson + Send + 'static,
    {
        Mutation::Apply(Box::new(f))
    }

    pub fn merge(partial: Document) -> Self {
        Mutation::Merge(partial)
    }

    /// Produces the new document.
    ///
    /// A merge is shallow: a nested document in `partial` replaces the stored field
    /// wholesale. Merging into a value that is not a document is rejected.
    pub fn into_document(self, key: &str, current: Bson) -> BucketResult<Bson> {
        match self {
            Mutation::Apply(f) => Ok(f(current)),
            Mutation::Merge(partial) => match current {
                Bson::Document(mut doc) => {
                    for (field, value) in partial {
                        doc.insert(field, value);
                    }
                    Ok(Bson::Document(doc))
                }
                other => Err(BucketError::InvalidArgument(format!(
                    "cannot merge fields into non-document value under key {key} ({:?})",
                    other.element_type()
                ))),
            },
        }
    }
}

impl From<Document> for Mutation {
    fn from(partial: Document) -> Self {
        Mutation::Merge(partial)
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Apply(_) => f.write_str("Mutation::Apply(<fn>)"),
            Mutation::Merge(partial) => f.debug_tuple("Mutation::Merge").field(partial).finish(),
        }
    }
}

/// Converts a serializable value into a stored document.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Bson> {
    Ok(serialize_to_bson(value)?)
}

/// Converts a stored document back into a typed value.
pub fn from_document<T: DeserializeOwned>(value: Bson) -> StoreResult<T> {
    Ok(deserialize_from_bson(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_counter_delta_clamps() {
        assert_eq!(apply_counter_delta(5, -3), 2);
        assert_eq!(apply_counter_delta(5, -30), 0);
        assert_eq!(apply_counter_delta(i64::MAX as u64, 1), i64::MAX as u64);
    }

    #[test]
    fn test_counter_value_rejects_non_counters() {
        assert_eq!(counter_value("k", &Bson::Int32(7)), Ok(7));
        assert_eq!(counter_value("k", &Bson::Int64(-1)), Err(BucketError::NotNumeric("k".to_string())));
        assert!(counter_value("k", &Bson::String("7".to_string())).is_err());
    }

    #[test]
    fn test_merge_is_shallow() {
        let current = Bson::Document(doc! { "a": 0, "b": 2, "nested": { "x": 1, "y": 2 } });
        let merged = Mutation::merge(doc! { "a": 1, "nested": { "x": 5 } })
            .into_document("k", current)
            .unwrap();

        assert_eq!(merged, Bson::Document(doc! { "a": 1, "b": 2, "nested": { "x": 5 } }));
    }

    #[test]
    fn test_merge_into_scalar_is_rejected() {
        let err = Mutation::from(doc! { "a": 1 })
            .into_document("k", Bson::String("plain".to_string()))
            .unwrap_err();

        assert!(matches!(err, BucketError::InvalidArgument(_)));
    }

    #[test]
    fn test_apply_replaces_document() {
        let result = Mutation::apply(|_| Bson::Int32(7))
            .into_document("k", Bson::Document(doc! { "a": 1 }))
            .unwrap();

        assert_eq!(result, Bson::Int32(7));
    }

    #[test]
    fn test_multi_get_values_keep_request_order() {
        let result = MultiGetResult::new(vec![
            ("b".to_string(), Some(GetResult { value: Bson::Int32(2), cas: Cas::new(2) })),
            ("missing".to_string(), None),
            ("a".to_string(), Some(GetResult { value: Bson::Int32(1), cas: Cas::new(1) })),
        ]);

        assert_eq!(result.missing(), vec!["missing"]);
        assert_eq!(result.get("a").flatten().map(|r| r.cas), Some(Cas::new(1)));
        assert!(result.get("other").is_none());
        assert_eq!(
            result.into_values(),
            vec![Some(Bson::Int32(2)), None, Some(Bson::Int32(1))]
        );
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Movie {
            title: String,
            year: i32,
        }

        let movie = Movie { title: "Heat".to_string(), year: 1995 };
        let stored = to_document(&movie).unwrap();
        let restored: Movie = from_document(stored).unwrap();

        assert_eq!(restored, movie);
    }
}
