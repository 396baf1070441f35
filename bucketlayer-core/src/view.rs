//! View (secondary index) queries.
//!
//! A view is identified by a design name and a view name. Its rows are produced by a
//! [`ViewDefinition`] installed in the bucket; a [`ViewQuery`] selects and orders them.
//!
//! # Query Building
//!
//! ```ignore
//! use bucketlayer::view::{ViewQuery, ViewOrder};
//!
//! let query = ViewQuery::from("users", "by_email")
//!     .range("a", "n", false)
//!     .order(ViewOrder::Descending)
//!     .limit(5);
//!
//! let rows = store.commit(query).await?;
//! ```
//!
//! The document store never looks inside a query; it hands it to the backend unchanged.

use bson::Bson;
use serde::{Deserialize, Serialize};

/// Row ordering by key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewOrder {
    #[default]
    Ascending,
    Descending,
}

/// Key range filter. Either bound may be open.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub start: Option<Bson>,
    pub end: Option<Bson>,
    /// Whether rows whose key equals `end` are included.
    pub inclusive_end: bool,
}

/// Declares how a view derives its rows from the stored documents.
///
/// Every document that has a value at `key_path` emits one row keyed by that value. When
/// `value_path` is set, the row value is the value found there, otherwise null. Paths are
/// dot-separated field names (`address.city`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub key_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_path: Option<String>,
}

impl ViewDefinition {
    /// A view keyed by the value at `key_path`.
    pub fn by_field(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            value_path: None,
        }
    }

    /// Emits the value at `value_path` as the row value.
    pub fn emit_value(mut self, value_path: impl Into<String>) -> Self {
        self.value_path = Some(value_path.into());
        self
    }
}

/// One row of a view result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Key of the document that emitted the row.
    pub id: String,
    pub key: Bson,
    pub value: Bson,
}

/// A lookup against a design/view pair.
///
/// Filters are applied in this order: `key`, `keys`, `range`. Ordering, `skip` and `limit`
/// are applied to what remains.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    pub design: String,
    pub view: String,
    pub key: Option<Bson>,
    pub keys: Option<Vec<Bson>>,
    pub range: Option<KeyRange>,
    pub order: ViewOrder,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl ViewQuery {
    /// Starts a query on the given design document and view.
    pub fn from(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            view: view.into(),
            key: None,
            keys: None,
            range: None,
            order: ViewOrder::default(),
            skip: None,
            limit: None,
        }
    }

    /// Only rows with exactly this key.
    pub fn key(mut self, key: impl Into<Bson>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Only rows whose key is one of `keys`.
    pub fn keys<K: Into<Bson>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Only rows with `start <= key < end` (`<= end` when `inclusive_end`).
    pub fn range(mut self, start: impl Into<Bson>, end: impl Into<Bson>, inclusive_end: bool) -> Self {
        self.range = Some(KeyRange {
            start: Some(start.into()),
            end: Some(end.into()),
            inclusive_end,
        });
        self
    }

    /// Only rows with `key >= start`.
    pub fn start_key(mut self, start: impl Into<Bson>) -> Self {
        let range = self.range.get_or_insert(KeyRange {
            start: None,
            end: None,
            inclusive_end: true,
        });
        range.start = Some(start.into());
        self
    }

    /// Only rows with `key <= end` (`< end` when not `inclusive_end`).
    pub fn end_key(mut self, end: impl Into<Bson>, inclusive_end: bool) -> Self {
        let range = self.range.get_or_insert(KeyRange {
            start: None,
            end: None,
            inclusive_end,
        });
        range.end = Some(end.into());
        range.inclusive_end = inclusive_end;
        self
    }

    pub fn order(mut self, order: ViewOrder) -> Self {
        self.order = order;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
