//! MongoDB bucket implementation.
//!
//! A bucket is a database. Documents live in the `documents` collection as
//! `{ _id: <key>, value: <document>, cas: <int64> }`; view definitions live in `_views`.
//! Conditional writes put the expected CAS into the filter, so the server decides
//! atomically whether the write applies.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, de::deserialize_from_bson, doc, ser::serialize_to_bson};
use mongodb::{
    Collection as MongoCollection, Database,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::FindOptions,
};
use uuid::Uuid;

use bucketlayer_core::{
    backend::BucketBackend,
    document::{self, Cas, CounterResult, GetResult, MultiGetResult, MutationResult},
    error::{BucketError, BucketResult},
    options::{CounterOptions, WriteOptions},
    view::{ViewDefinition, ViewQuery, ViewRow},
};

use crate::{sanitizer::FieldSanitizer, view::ViewTranslator};

const DOCUMENTS: &str = "documents";
const VIEWS: &str = "_views";
const DUPLICATE_KEY: i32 = 11000;


/// A bucket backed by one MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoBucket {
    name: String,
    database: Database,
}

impl MongoBucket {
    pub fn new(name: impl Into<String>, database: Database) -> Self {
        Self {
            name: name.into(),
            database,
        }
    }

    fn documents(&self) -> MongoCollection<Document> {
        self.database.collection(DOCUMENTS)
    }

    fn views(&self) -> MongoCollection<Document> {
        self.database.collection(VIEWS)
    }

    /// Random positive CAS.
    fn next_cas() -> Cas {
        Cas::new(Uuid::new_v4().as_u64_pair().0 >> 1)
    }

    fn prepare_document(key: &str, value: &Bson, cas: Cas) -> Document {
        doc! {
            "_id": key,
            "value": FieldSanitizer::sanitize_value(value),
            "cas": cas.as_u64() as i64,
        }
    }

    fn restore_document(key: &str, document: &Document) -> BucketResult<GetResult> {
        let value = document
            .get("value")
            .map(FieldSanitizer::restore_value)
            .ok_or_else(|| BucketError::Backend(format!("stored document {key} has no value")))?;

        let cas = match document.get("cas") {
            Some(Bson::Int64(cas)) => Cas::new(*cas as u64),
            _ => return Err(BucketError::Backend(format!("stored document {key} has no CAS"))),
        };

        Ok(GetResult { value, cas })
    }

    fn filter(key: &str, cas: Option<Cas>) -> Document {
        match cas {
            Some(cas) => doc! { "_id": key, "cas": cas.as_u64() as i64 },
            None => doc! { "_id": key },
        }
    }

    /// Explains why a conditional write on `key` matched nothing.
    async fn missed_write(&self, key: &str) -> BucketError {
        match self.documents().find_one(doc! { "_id": key }).await {
            Ok(Some(_)) => BucketError::CasMismatch(key.to_string()),
            Ok(None) => BucketError::KeyNotFound(key.to_string()),
            Err(err) => backend_error(err),
        }
    }

    async fn find(&self, key: &str) -> BucketResult<Option<GetResult>> {
        self.documents()
            .find_one(doc! { "_id": key })
            .await
            .map_err(backend_error)?
            .map(|stored| Self::restore_document(key, &stored))
            .transpose()
    }
}

/// Lays out found documents in request order. A key requested twice is reported twice.
fn multi_get_result(keys: &[String], found: &HashMap<String, GetResult>) -> MultiGetResult {
    MultiGetResult::new(
        keys
            .iter()
            .map(|key| (key.clone(), found.get(key).cloned()))
            .collect(),
    )
}

fn backend_error(err: MongoError) -> BucketError {
    BucketError::Backend(err.to_string())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl BucketBackend for MongoBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, key: &str, value: Bson, _options: WriteOptions) -> BucketResult<MutationResult> {
        let cas = Self::next_cas();

        self.documents()
            .insert_one(Self::prepare_document(key, &value, cas))
            .await
            .map_err(|err| if is_duplicate_key(&err) {
                BucketError::KeyExists(key.to_string())
            } else {
                backend_error(err)
            })?;

        Ok(MutationResult { cas })
    }

    async fn get(&self, key: &str) -> BucketResult<GetResult> {
        self.find(key)
            .await?
            .ok_or_else(|| BucketError::KeyNotFound(key.to_string()))
    }

    async fn get_multi(&self, keys: &[String]) -> BucketResult<MultiGetResult> {
        let found = self.documents()
            .find(doc! { "_id": { "$in": keys.to_vec() } })
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .filter_map(|stored| match stored.get("_id") {
                Some(Bson::String(id)) => Some((id.clone(), stored)),
                _ => None,
            })
            .map(|(id, stored)| Self::restore_document(&id, &stored).map(|result| (id, result)))
            .collect::<BucketResult<HashMap<String, GetResult>>>()?;

        Ok(multi_get_result(keys, &found))
    }

    async fn replace(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        let cas = Self::next_cas();

        let result = self.documents()
            .replace_one(Self::filter(key, options.cas), Self::prepare_document(key, &value, cas))
            .await
            .map_err(backend_error)?;

        if result.matched_count == 0 {
            return Err(self.missed_write(key).await);
        }

        Ok(MutationResult { cas })
    }

    async fn upsert(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        if options.cas.is_some() {
            return self.replace(key, value, options).await;
        }

        let cas = Self::next_cas();

        self.documents()
            .replace_one(Self::filter(key, None), Self::prepare_document(key, &value, cas))
            .upsert(true)
            .await
            .map_err(backend_error)?;

        Ok(MutationResult { cas })
    }

    async fn remove(&self, key: &str, options: WriteOptions) -> BucketResult<MutationResult> {
        let removed = self.documents()
            .find_one_and_delete(Self::filter(key, options.cas))
            .await
            .map_err(backend_error)?;

        match removed {
            Some(stored) => Ok(MutationResult {
                cas: Self::restore_document(key, &stored)?.cas,
            }),
            None => Err(self.missed_write(key).await),
        }
    }

    async fn counter(&self, key: &str, delta: i64, options: CounterOptions) -> BucketResult<CounterResult> {
        if delta == 0 {
            return Err(BucketError::InvalidArgument("counter delta must be non-zero".to_string()));
        }

        // Compare-and-set until no other writer got in between.
        loop {
            let cas = Self::next_cas();

            match self.find(key).await? {
                Some(current) => {
                    let value = document::apply_counter_delta(document::counter_value(key, &current.value)?, delta);
                    let result = self.documents()
                        .replace_one(
                            Self::filter(key, Some(current.cas)),
                            Self::prepare_document(key, &Bson::Int64(value as i64), cas),
                        )
                        .await
                        .map_err(backend_error)?;

                    if result.matched_count == 1 {
                        return Ok(CounterResult { value, cas });
                    }
                }
                None => {
                    let Some(initial) = options.initial else {
                        return Err(BucketError::KeyNotFound(key.to_string()));
                    };
                    let value = initial.min(i64::MAX as u64);

                    match self.documents()
                        .insert_one(Self::prepare_document(key, &Bson::Int64(value as i64), cas))
                        .await
                    {
                        Ok(_) => return Ok(CounterResult { value, cas }),
                        Err(err) if is_duplicate_key(&err) => {}
                        Err(err) => return Err(backend_error(err)),
                    }
                }
            }

            tracing::trace!(bucket = %self.name, key, "counter raced with another writer, retrying");
        }
    }

    async fn query(&self, query: ViewQuery) -> BucketResult<Vec<ViewRow>> {
        let stored = self.views()
            .find_one(doc! { "_id": view_id(&query.design, &query.view) })
            .await
            .map_err(backend_error)?
            .and_then(|stored| stored.get("definition").cloned())
            .ok_or_else(|| BucketError::ViewNotFound(query.design.clone(), query.view.clone()))?;
        let definition: ViewDefinition = deserialize_from_bson(stored)?;

        let translator = ViewTranslator::new(&definition, &query);
        let mut options = FindOptions::default();
        options.sort = Some(translator.sort());

        let documents = self.documents()
            .find(translator.filter())
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?;

        Ok(translator.rows(documents))
    }

    async fn define_view(&self, design: &str, view: &str, definition: ViewDefinition) -> BucketResult<()> {
        let id = view_id(design, view);

        self.views()
            .replace_one(
                doc! { "_id": id.as_str() },
                doc! { "_id": id.as_str(), "definition": serialize_to_bson(&definition)? },
            )
            .upsert(true)
            .await
            .map_err(backend_error)?;

        tracing::debug!(bucket = %self.name, design, view, "defined view");

        Ok(())
    }
}

fn view_id(design: &str, view: &str) -> String {
    format!("{design}/{view}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_layout_round_trips() {
        let cas = Cas::new(42);
        let value = Bson::Document(doc! { "user.name": "ada", "tags": ["a", "b"] });
        let stored = MongoBucket::prepare_document("doc1", &value, cas);

        assert_eq!(stored.get("_id"), Some(&Bson::String("doc1".to_string())));
        assert_eq!(stored.get("cas"), Some(&Bson::Int64(42)));
        assert_eq!(
            MongoBucket::restore_document("doc1", &stored).unwrap(),
            GetResult { value, cas }
        );
    }

    #[test]
    fn test_multi_get_keeps_request_order_and_duplicates() {
        let found = HashMap::from([(
            "a".to_string(),
            GetResult { value: Bson::Int32(1), cas: Cas::new(3) },
        )]);
        let keys = ["a", "missing", "a"].map(String::from);

        let result = multi_get_result(&keys, &found);

        assert_eq!(result.missing(), vec!["missing"]);
        assert_eq!(
            result.into_values(),
            vec![Some(Bson::Int32(1)), None, Some(Bson::Int32(1))]
        );
    }

    #[test]
    fn test_conditional_filter() {
        assert_eq!(MongoBucket::filter("k", None), doc! { "_id": "k" });
        assert_eq!(
            MongoBucket::filter("k", Some(Cas::new(7))),
            doc! { "_id": "k", "cas": 7_i64 }
        );
    }

    #[test]
    fn test_generated_cas_fits_storage() {
        assert!(MongoBucket::next_cas().as_u64() <= i64::MAX as u64);
    }

    #[test]
    fn test_missing_cas_is_backend_error() {
        assert!(matches!(
            MongoBucket::restore_document("k", &doc! { "_id": "k", "value": 1 }),
            Err(BucketError::Backend(_))
        ));
    }
}
