//! Translation of view queries into MongoDB find filters.
//!
//! A view definition is stored next to the documents. Querying it becomes a `find` on
//! the stored values: the key path turns into a field path under `value`, and the key,
//! keys and range filters into comparison operators on that field.
//!
//! MongoDB compares values of different BSON types by type bracket, so a range only
//! matches keys of the same kind as its bounds. Its `$eq` and `$in` also match a key that
//! is an array containing the requested value, which the in-memory backend does not.
//!
//! `$exists` matches a key path through array-valued fields that the row builder cannot
//! resolve. Those documents are dropped on the client, so `skip` and `limit` are applied
//! there too, after the rows are built.

use bson::{Bson, Document, doc};

use bucketlayer_core::view::{ViewDefinition, ViewOrder, ViewQuery, ViewRow};

use crate::sanitizer::FieldSanitizer;


pub(crate) struct ViewTranslator<'a> {
    definition: &'a ViewDefinition,
    query: &'a ViewQuery,
}

impl<'a> ViewTranslator<'a> {
    pub(crate) fn new(definition: &'a ViewDefinition, query: &'a ViewQuery) -> Self {
        Self { definition, query }
    }

    fn key_field(&self) -> String {
        format!("value.{}", FieldSanitizer::sanitize_path(&self.definition.key_path))
    }

    /// Filter selecting the documents that emit a matching row.
    pub(crate) fn filter(&self) -> Document {
        let field = self.key_field();
        let mut clauses = vec![doc! { field.as_str(): { "$exists": true } }];

        if let Some(key) = &self.query.key {
            clauses.push(doc! { field.as_str(): { "$eq": key.clone() } });
        }

        if let Some(keys) = &self.query.keys {
            clauses.push(doc! { field.as_str(): { "$in": keys.clone() } });
        }

        if let Some(range) = &self.query.range {
            if let Some(start) = &range.start {
                clauses.push(doc! { field.as_str(): { "$gte": start.clone() } });
            }
            if let Some(end) = &range.end {
                let op = if range.inclusive_end { "$lte" } else { "$lt" };
                clauses.push(doc! { field.as_str(): { op: end.clone() } });
            }
        }

        doc! { "$and": clauses }
    }

    /// Sort by key, then by document key.
    pub(crate) fn sort(&self) -> Document {
        let direction = match self.query.order {
            ViewOrder::Ascending => 1,
            ViewOrder::Descending => -1,
        };

        doc! { self.key_field(): direction, "_id": direction }
    }

    /// Builds the rows of the page from documents returned by the filtered, sorted find.
    pub(crate) fn rows(&self, documents: Vec<Document>) -> Vec<ViewRow> {
        documents
            .into_iter()
            .filter_map(|stored| {
                let id = match stored.get("_id") {
                    Some(Bson::String(id)) => id.clone(),
                    _ => return None,
                };
                let value = FieldSanitizer::restore_value(stored.get("value")?);

                self.row(id, &value)
            })
            .skip(self.query.skip.unwrap_or(0))
            .take(self.query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Builds the row emitted by a stored value.
    pub(crate) fn row(&self, id: String, value: &Bson) -> Option<ViewRow> {
        let key = resolve_path(value, &self.definition.key_path)?.clone();
        let value = self.definition
            .value_path
            .as_deref()
            .and_then(|path| resolve_path(value, path))
            .cloned()
            .unwrap_or(Bson::Null);

        Some(ViewRow { id, key, value })
    }
}

fn resolve_path<'a>(document: &'a Bson, path: &str) -> Option<&'a Bson> {
    path.split('.')
        .try_fold(document, |value, segment| {
            value
                .as_document()
                .and_then(|doc| doc.get(segment))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_combines_key_and_range() {
        let definition = ViewDefinition::by_field("year");
        let query = ViewQuery::from("movies", "by_year")
            .key(1995)
            .range(1990, 2000, false);

        assert_eq!(
            ViewTranslator::new(&definition, &query).filter(),
            doc! {
                "$and": [
                    { "value.year": { "$exists": true } },
                    { "value.year": { "$eq": 1995 } },
                    { "value.year": { "$gte": 1990 } },
                    { "value.year": { "$lt": 2000 } },
                ]
            }
        );
    }

    #[test]
    fn test_descending_sort() {
        let definition = ViewDefinition::by_field("address.city");
        let query = ViewQuery::from("users", "by_city").order(ViewOrder::Descending);

        assert_eq!(
            ViewTranslator::new(&definition, &query).sort(),
            doc! { "value.address.city": -1, "_id": -1 }
        );
    }

    #[test]
    fn test_unresolvable_rows_do_not_shorten_page() {
        let definition = ViewDefinition::by_field("address.city");
        let query = ViewQuery::from("users", "by_city").skip(1).limit(2);
        let documents = vec![
            doc! { "_id": "ada", "value": { "address": { "city": "Bergen" } }, "cas": 1_i64 },
            doc! { "_id": "bob", "value": { "address": [{ "city": "Lima" }] }, "cas": 2_i64 },
            doc! { "_id": "cy", "value": { "address": { "city": "Oslo" } }, "cas": 3_i64 },
            doc! { "_id": "dee", "value": { "address": { "city": "Rome" } }, "cas": 4_i64 },
        ];

        let rows = ViewTranslator::new(&definition, &query).rows(documents);

        assert_eq!(
            rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(),
            vec!["cy", "dee"]
        );
    }

    #[test]
    fn test_row_emits_value_path() {
        let definition = ViewDefinition::by_field("year").emit_value("title");
        let query = ViewQuery::from("movies", "by_year");
        let stored = Bson::Document(doc! { "title": "Heat", "year": 1995 });

        let row = ViewTranslator::new(&definition, &query)
            .row("heat".to_string(), &stored)
            .unwrap();

        assert_eq!(row.key, Bson::Int32(1995));
        assert_eq!(row.value, Bson::String("Heat".to_string()));
    }
}
