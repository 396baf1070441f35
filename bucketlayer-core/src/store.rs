//! Main document store interface.
//!
//! A [`DocumentStore`] wraps one opened bucket and exposes the data operations on it.
//! Every operation goes through a single executor which tags the call with its
//! [`Operation`] and flattens any backend failure into an
//! [`OperationError`](crate::error::OperationError) under the store's
//! [`ErrorCategory`].
//!
//! # Example
//!
//! ```ignore
//! use bucketlayer::prelude::*;
//! use bson::{Bson, doc};
//!
//! let store = DocumentStore::open(&ConnectionOptions::new("127.0.0.1", "default"), true, &connector).await?;
//! store.insert("doc1", Bson::Document(doc! { "color": "red" }), WriteOptions::default()).await?;
//! let doc = store.update("doc1", doc! { "color": "blue" }, true).await?;
//! ```

use std::{fmt, future::Future, sync::Arc};

use bson::Bson;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    backend::{BucketBackend, ClusterConnector},
    document::{self, CounterResult, GetResult, MultiGetResult, Mutation, MutationResult},
    error::{BucketError, BucketResult, ErrorCategory, OperationError, StoreError, StoreResult},
    options::{ConnectionOptions, CounterOptions, WriteOptions},
    view::{ViewDefinition, ViewQuery, ViewRow},
};

/// The bucket operations a store can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Get,
    GetMulti,
    Replace,
    Upsert,
    Remove,
    Counter,
    Query,
    DefineView,
}

impl Operation {
    /// Name of the backend call.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Get => "get",
            Operation::GetMulti => "getMulti",
            Operation::Replace => "replace",
            Operation::Upsert => "upsert",
            Operation::Remove => "remove",
            Operation::Counter => "counter",
            Operation::Query => "query",
            Operation::DefineView => "defineView",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handle on one opened bucket.
///
/// Cloning is cheap and every clone operates on the same bucket connection.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    bucket: Arc<dyn BucketBackend>,
    error_category: ErrorCategory,
}

impl DocumentStore {
    /// Wraps an already opened bucket.
    pub fn new(bucket: Arc<dyn BucketBackend>) -> Self {
        Self {
            bucket,
            error_category: ErrorCategory::default(),
        }
    }

    /// Connects to the cluster described by `options` and opens its bucket.
    ///
    /// With `mock` set the connector's in-process substitute is used. The `on_ready`
    /// callback, if any, sees the outcome before this returns. Failures are returned as
    /// [`StoreError::Connection`] and never retried.
    pub async fn open(
        options: &ConnectionOptions,
        mock: bool,
        connector: &dyn ClusterConnector,
    ) -> StoreResult<Self> {
        let address = options.address();

        tracing::debug!(bucket = %options.name, %address, mock, "opening bucket");

        let opened = Self::open_bucket(options, &address, mock, connector).await;

        if let Some(on_ready) = &options.on_ready {
            on_ready(opened.as_ref().map(|_| ()));
        }

        match opened {
            Ok(bucket) => Ok(Self::new(bucket)),
            Err(err) => {
                tracing::warn!(bucket = %options.name, %address, error = %err, "failed to open bucket");
                Err(StoreError::Connection(err))
            }
        }
    }

    async fn open_bucket(
        options: &ConnectionOptions,
        address: &str,
        mock: bool,
        connector: &dyn ClusterConnector,
    ) -> BucketResult<Arc<dyn BucketBackend>> {
        connector
            .connect(address, mock)
            .await?
            .open_bucket(&options.name, options.password.as_deref())
            .await
    }

    /// Sets the category failed operations are reported under.
    pub fn with_error_category(mut self, category: ErrorCategory) -> Self {
        self.error_category = category;
        self
    }

    pub fn error_category(&self) -> ErrorCategory {
        self.error_category
    }

    /// Name of the underlying bucket.
    pub fn name(&self) -> &str {
        self.bucket.name()
    }

    /// Whether both handles talk to the same bucket connection.
    pub fn shares_bucket_with(&self, other: &DocumentStore) -> bool {
        Arc::ptr_eq(&self.bucket, &other.bucket)
    }

    async fn exec<T>(
        &self,
        operation: Operation,
        call: impl Future<Output = BucketResult<T>>,
    ) -> StoreResult<T> {
        tracing::trace!(bucket = %self.name(), %operation, "executing");

        call.await.map_err(|err| self.normalize(operation, err))
    }

    fn normalize(&self, operation: Operation, err: BucketError) -> StoreError {
        tracing::debug!(
            bucket = %self.name(),
            %operation,
            category = %self.error_category,
            error = %err,
            "operation failed"
        );

        OperationError::new(self.error_category, operation, err.to_string()).into()
    }

    /// Creates a document. Fails if `key` already exists.
    pub async fn insert(&self, key: &str, doc: Bson, options: WriteOptions) -> StoreResult<MutationResult> {
        self.exec(Operation::Insert, self.bucket.insert(key, doc, options))
            .await
    }

    /// Serializes `value` and creates it under `key`.
    pub async fn insert_as<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<MutationResult> {
        self.insert(key, document::to_document(value)?, WriteOptions::default())
            .await
    }

    /// Returns only the value stored under `key`.
    pub async fn get(&self, key: &str) -> StoreResult<Bson> {
        Ok(self.get_raw(key).await?.value)
    }

    /// Returns the value stored under `key` together with its CAS.
    pub async fn get_raw(&self, key: &str) -> StoreResult<GetResult> {
        self.exec(Operation::Get, self.bucket.get(key))
            .await
    }

    /// Returns the value stored under `key` deserialized as `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        document::from_document(self.get(key).await?)
    }

    /// Returns the values stored under `keys`, in the same order. A key the backend reports
    /// as missing yields `None`.
    pub async fn get_multi<K: AsRef<str>>(&self, keys: &[K]) -> StoreResult<Vec<Option<Bson>>> {
        Ok(self.get_multi_raw(keys).await?.into_values())
    }

    /// Returns the raw per-key results of a multi-get.
    pub async fn get_multi_raw<K: AsRef<str>>(&self, keys: &[K]) -> StoreResult<MultiGetResult> {
        let keys = keys
            .iter()
            .map(|key| key.as_ref().to_string())
            .collect::<Vec<_>>();

        self.exec(Operation::GetMulti, self.bucket.get_multi(&keys))
            .await
    }

    /// Overwrites an existing document. Fails if `key` is absent, or if `options.cas` is
    /// set and the stored document has moved on.
    pub async fn replace(&self, key: &str, doc: Bson, options: WriteOptions) -> StoreResult<MutationResult> {
        self.exec(Operation::Replace, self.bucket.replace(key, doc, options))
            .await
    }

    /// Reads a document, derives a new one with `mutation` and replaces it.
    ///
    /// With `with_cas` set the replace is conditional on the CAS from the read, so a write
    /// that lands in between makes this call fail with a CAS mismatch. There is no retry:
    /// callers that want read-modify-write until success have to loop themselves.
    ///
    /// Returns the document that was written.
    pub async fn update(
        &self,
        key: &str,
        mutation: impl Into<Mutation>,
        with_cas: bool,
    ) -> StoreResult<Bson> {
        let current = self.get_raw(key).await?;
        let doc = mutation
            .into()
            .into_document(key, current.value)
            .map_err(|err| self.normalize(Operation::Replace, err))?;
        let options = if with_cas {
            WriteOptions::with_cas(current.cas)
        } else {
            WriteOptions::default()
        };

        self.replace(key, doc.clone(), options).await?;

        Ok(doc)
    }

    /// Stores a document whether or not `key` exists.
    pub async fn upsert(&self, key: &str, doc: Bson, options: WriteOptions) -> StoreResult<MutationResult> {
        self.exec(Operation::Upsert, self.bucket.upsert(key, doc, options))
            .await
    }

    /// Serializes `value` and stores it under `key`.
    pub async fn upsert_as<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<MutationResult> {
        self.upsert(key, document::to_document(value)?, WriteOptions::default())
            .await
    }

    /// Deletes a document. Fails if `key` is absent.
    pub async fn remove(&self, key: &str, options: WriteOptions) -> StoreResult<MutationResult> {
        self.exec(Operation::Remove, self.bucket.remove(key, options))
            .await
    }

    /// Atomically adds `delta` to the counter under `key`.
    ///
    /// An absent key fails unless `options.initial` is set, in which case the counter is
    /// created at `initial` and `initial` is returned.
    pub async fn counter(&self, key: &str, delta: i64, options: CounterOptions) -> StoreResult<CounterResult> {
        self.exec(Operation::Counter, self.bucket.counter(key, delta, options))
            .await
    }

    /// Starts a view query. Refine it with the [`ViewQuery`] builder and run it with
    /// [`commit`](Self::commit).
    pub fn query(&self, design: &str, view: &str) -> ViewQuery {
        ViewQuery::from(design, view)
    }

    /// Runs a view query and returns its rows.
    pub async fn commit(&self, query: ViewQuery) -> StoreResult<Vec<ViewRow>> {
        self.exec(Operation::Query, self.bucket.query(query))
            .await
    }

    /// Installs or replaces a view definition in the bucket.
    pub async fn define_view(&self, design: &str, view: &str, definition: ViewDefinition) -> StoreResult<()> {
        self.exec(Operation::DefineView, self.bucket.define_view(design, view, definition))
            .await
    }
}
