//! View evaluation for in-memory buckets.
//!
//! This module turns stored documents into view rows according to a
//! [`ViewDefinition`], then filters, orders and pages them as a [`ViewQuery`] asks.

use std::cmp::Ordering;
use bson::{Bson, datetime::DateTime};

use bucketlayer_core::view::{KeyRange, ViewDefinition, ViewOrder, ViewQuery, ViewRow};


/// Type-erased, comparable representation of BSON values.
///
/// Values of different kinds order as null < booleans < numbers < dates < strings <
/// arrays < documents. Integers and floats are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value, also used for types that have no ordering
    Null,
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Document fields in stored order
    Map(Vec<(&'a str, Comparable<'a>)>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
        }
    }

    /// Total order used for view keys.
    pub(crate) fn collate(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.collate(right) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                a.len().cmp(&b.len())
            },
            (Comparable::Map(a), Comparable::Map(b)) => {
                for ((left_key, left), (right_key, right)) in a.iter().zip(b.iter()) {
                    match left_key.cmp(right_key).then_with(|| left.collate(right)) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                a.len().cmp(&b.len())
            },
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Compares two view keys.
pub(crate) fn collate(left: &Bson, right: &Bson) -> Ordering {
    Comparable::from(left).collate(&Comparable::from(right))
}

/// Resolves a dot-separated field path inside a document.
pub(crate) fn resolve_path<'a>(document: &'a Bson, path: &str) -> Option<&'a Bson> {
    path.split('.')
        .try_fold(document, |value, segment| {
            value
                .as_document()
                .and_then(|doc| doc.get(segment))
        })
}


pub(crate) struct ViewEvaluator<'a> {
    definition: &'a ViewDefinition,
    query: &'a ViewQuery,
}

impl<'a> ViewEvaluator<'a> {
    pub fn new(definition: &'a ViewDefinition, query: &'a ViewQuery) -> Self {
        Self { definition, query }
    }

    /// Produces the rows of the view over `documents` (key, value pairs).
    pub fn rows<I>(&self, documents: I) -> Vec<ViewRow>
    where
        I: IntoIterator<Item = (&'a str, &'a Bson)>,
    {
        let mut rows = documents
            .into_iter()
            .filter_map(|(id, doc)| self.emit(id, doc))
            .filter(|row| self.matches(&row.key))
            .collect::<Vec<_>>();

        rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));

        if self.query.order == ViewOrder::Descending {
            rows.reverse();
        }

        rows
            .into_iter()
            .skip(self.query.skip.unwrap_or(0))
            .take(self.query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn emit(&self, id: &str, document: &Bson) -> Option<ViewRow> {
        let key = resolve_path(document, &self.definition.key_path)?;
        let value = self.definition
            .value_path
            .as_deref()
            .and_then(|path| resolve_path(document, path))
            .cloned()
            .unwrap_or(Bson::Null);

        Some(ViewRow {
            id: id.to_string(),
            key: key.clone(),
            value,
        })
    }

    fn matches(&self, key: &Bson) -> bool {
        if let Some(expected) = &self.query.key {
            if collate(key, expected) != Ordering::Equal {
                return false;
            }
        }

        if let Some(keys) = &self.query.keys {
            if !keys.iter().any(|expected| collate(key, expected) == Ordering::Equal) {
                return false;
            }
        }

        match &self.query.range {
            Some(range) => Self::in_range(key, range),
            None => true,
        }
    }

    fn in_range(key: &Bson, range: &KeyRange) -> bool {
        let above_start = range
            .start
            .as_ref()
            .is_none_or(|start| collate(key, start) != Ordering::Less);
        let below_end = range
            .end
            .as_ref()
            .is_none_or(|end| match collate(key, end) {
                Ordering::Less => true,
                Ordering::Equal => range.inclusive_end,
                Ordering::Greater => false,
            });

        above_start && below_end
    }
}
