//! In-memory bucket implementation.
//!
//! Documents live in a `HashMap` behind an async-aware read-write lock. Every mutation
//! takes the write lock for its whole check-then-write, which is what makes CAS checks
//! and counters atomic.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::Bson;

use bucketlayer_core::{
    backend::BucketBackend,
    document::{self, Cas, CounterResult, GetResult, MultiGetResult, MutationResult},
    error::{BucketError, BucketResult},
    options::{CounterOptions, WriteOptions},
    view::{ViewDefinition, ViewQuery, ViewRow},
};

use crate::evaluator::ViewEvaluator;

#[derive(Debug, Clone)]
struct StoredDocument {
    value: Bson,
    cas: Cas,
}

type DocumentMap = HashMap<String, StoredDocument>;
type ViewMap = HashMap<(String, String), ViewDefinition>;


/// Thread-safe in-memory bucket.
///
/// Clones share the same documents, so every handle opened on a bucket of an
/// [`InMemoryCluster`](crate::InMemoryCluster) sees the others' writes.
///
/// # CAS
///
/// CAS values come from a per-bucket counter and are never reused, so a document that is
/// removed and inserted again gets a CAS its old readers cannot match.
///
/// # Example
///
/// ```ignore
/// use bucketlayer_memory::InMemoryBucket;
/// use bucketlayer::backend::BucketBackend;
///
/// let bucket = InMemoryBucket::new("default");
/// let written = bucket.insert("doc1", Bson::Int32(1), WriteOptions::default()).await?;
/// let read = bucket.get("doc1").await?;
/// assert_eq!(read.cas, written.cas);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryBucket {
    name: String,
    documents: Arc<RwLock<DocumentMap>>,
    views: Arc<RwLock<ViewMap>>,
    next_cas: Arc<AtomicU64>,
}

impl InMemoryBucket {
    /// Creates a new empty bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(DocumentMap::new())),
            views: Arc::new(RwLock::new(ViewMap::new())),
            next_cas: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Number of documents currently stored.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn next_cas(&self) -> Cas {
        Cas::new(self.next_cas.fetch_add(1, Ordering::SeqCst))
    }

    /// Checks an optional expected CAS against the stored document.
    fn check_cas(key: &str, stored: &StoredDocument, expected: Option<Cas>) -> BucketResult<()> {
        match expected {
            Some(cas) if cas != stored.cas => Err(BucketError::CasMismatch(key.to_string())),
            _ => Ok(()),
        }
    }
}


#[async_trait]
impl BucketBackend for InMemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, key: &str, value: Bson, _options: WriteOptions) -> BucketResult<MutationResult> {
        let mut documents = self.documents.write().await;

        if documents.contains_key(key) {
            return Err(BucketError::KeyExists(key.to_string()));
        }

        let cas = self.next_cas();
        documents.insert(key.to_string(), StoredDocument { value, cas });

        Ok(MutationResult { cas })
    }

    async fn get(&self, key: &str) -> BucketResult<GetResult> {
        self.documents
            .read()
            .await
            .get(key)
            .map(|stored| GetResult {
                value: stored.value.clone(),
                cas: stored.cas,
            })
            .ok_or_else(|| BucketError::KeyNotFound(key.to_string()))
    }

    async fn get_multi(&self, keys: &[String]) -> BucketResult<MultiGetResult> {
        let documents = self.documents.read().await;

        Ok(MultiGetResult::new(
            keys
                .iter()
                .map(|key| {
                    let result = documents
                        .get(key)
                        .map(|stored| GetResult {
                            value: stored.value.clone(),
                            cas: stored.cas,
                        });
                    (key.clone(), result)
                })
                .collect()
        ))
    }

    async fn replace(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get_mut(key)
            .ok_or_else(|| BucketError::KeyNotFound(key.to_string()))?;

        Self::check_cas(key, stored, options.cas)?;

        stored.value = value;
        stored.cas = self.next_cas();

        Ok(MutationResult { cas: stored.cas })
    }

    async fn upsert(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        if options.cas.is_some() {
            return self.replace(key, value, options).await;
        }

        let cas = self.next_cas();
        self.documents
            .write()
            .await
            .insert(key.to_string(), StoredDocument { value, cas });

        Ok(MutationResult { cas })
    }

    async fn remove(&self, key: &str, options: WriteOptions) -> BucketResult<MutationResult> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get(key)
            .ok_or_else(|| BucketError::KeyNotFound(key.to_string()))?;

        Self::check_cas(key, stored, options.cas)?;

        let cas = stored.cas;
        documents.remove(key);

        Ok(MutationResult { cas })
    }

    async fn counter(&self, key: &str, delta: i64, options: CounterOptions) -> BucketResult<CounterResult> {
        if delta == 0 {
            return Err(BucketError::InvalidArgument("counter delta must be non-zero".to_string()));
        }

        let mut documents = self.documents.write().await;

        let value = match documents.get(key) {
            Some(stored) => document::apply_counter_delta(document::counter_value(key, &stored.value)?, delta),
            None => match options.initial {
                Some(initial) => initial.min(i64::MAX as u64),
                None => return Err(BucketError::KeyNotFound(key.to_string())),
            },
        };

        let cas = self.next_cas();
        documents.insert(
            key.to_string(),
            StoredDocument {
                value: Bson::Int64(value as i64),
                cas,
            },
        );

        Ok(CounterResult { value, cas })
    }

    async fn query(&self, query: ViewQuery) -> BucketResult<Vec<ViewRow>> {
        let definition = self.views
            .read()
            .await
            .get(&(query.design.clone(), query.view.clone()))
            .cloned()
            .ok_or_else(|| BucketError::ViewNotFound(query.design.clone(), query.view.clone()))?;

        let documents = self.documents.read().await;

        Ok(
            ViewEvaluator::new(&definition, &query)
                .rows(documents.iter().map(|(key, stored)| (key.as_str(), &stored.value)))
        )
    }

    async fn define_view(&self, design: &str, view: &str, definition: ViewDefinition) -> BucketResult<()> {
        tracing::debug!(bucket = %self.name, design, view, key_path = %definition.key_path, "defining view");

        self.views
            .write()
            .await
            .insert((design.to_string(), view.to_string()), definition);

        Ok(())
    }
}
