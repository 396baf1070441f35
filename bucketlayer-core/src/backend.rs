//! Storage capability abstraction.
//!
//! This module defines the boundary between the document store and the storage engine
//! behind it. A backend supplies three things:
//!
//! - [`ClusterConnector`]: turns an address into a connected [`ClusterBackend`], either a
//!   real one or an in-process mock.
//! - [`ClusterBackend`]: opens buckets by name.
//! - [`BucketBackend`]: the per-bucket operation set.
//!
//! All traits are object safe; the store keeps backends behind `Arc<dyn ...>` so one
//! opened bucket can be shared by every clone of a store.
//!
//! # Examples
//!
//! ```ignore
//! use bucketlayer::backend::{ClusterBackendBuilder, ClusterBackend};
//! use bucketlayer::memory::InMemoryCluster;
//!
//! let cluster = InMemoryCluster::builder().build().await?;
//! let bucket = cluster.open_bucket("default", None).await?;
//! bucket.upsert("doc1", Bson::Int32(1), WriteOptions::default()).await?;
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::Bson;

use crate::{
    document::{CounterResult, GetResult, MultiGetResult, MutationResult},
    error::BucketResult,
    options::{CounterOptions, WriteOptions},
    view::{ViewDefinition, ViewQuery, ViewRow},
};

/// Operation set of one opened bucket.
///
/// # Thread Safety
///
/// Implementations must tolerate concurrent calls from many tasks. Each call must be
/// atomic with respect to the key it touches; nothing beyond that is required. In
/// particular two conditional writes racing on one key must not both succeed.
///
/// # Error Handling
///
/// Backends report the cause with the matching [`BucketError`](crate::error::BucketError)
/// variant. The document store flattens these for its callers, so the message text is the
/// only part that survives.
#[async_trait]
pub trait BucketBackend: Send + Sync + Debug {
    /// Name of the bucket this handle was opened on.
    fn name(&self) -> &str;

    /// Stores `value` under `key`. Fails with `KeyExists` if the key is taken.
    async fn insert(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult>;

    /// Reads the value and CAS stored under `key`. Fails with `KeyNotFound`.
    async fn get(&self, key: &str) -> BucketResult<GetResult>;

    /// Reads several keys at once. Missing keys are reported per key, not as an error.
    async fn get_multi(&self, keys: &[String]) -> BucketResult<MultiGetResult>;

    /// Overwrites an existing document. Fails with `KeyNotFound`, or with `CasMismatch`
    /// when `options.cas` is set and differs from the stored CAS.
    async fn replace(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult>;

    /// Stores `value` whether or not the key exists. With `options.cas` set the write
    /// behaves like a conditional replace.
    async fn upsert(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult>;

    /// Deletes a document. Fails with `KeyNotFound`, or `CasMismatch` as for replace.
    async fn remove(&self, key: &str, options: WriteOptions) -> BucketResult<MutationResult>;

    /// Adds `delta` to an unsigned counter. A result below zero is clamped to zero.
    ///
    /// When the key is absent and `options.initial` is set, the counter is created with
    /// that value and the delta is not applied.
    async fn counter(&self, key: &str, delta: i64, options: CounterOptions) -> BucketResult<CounterResult>;

    /// Runs a view query and returns its rows.
    async fn query(&self, query: ViewQuery) -> BucketResult<Vec<ViewRow>>;

    /// Installs or replaces the definition of `design/view`.
    async fn define_view(&self, design: &str, view: &str, definition: ViewDefinition) -> BucketResult<()>;
}

/// A connected cluster that buckets can be opened on.
#[async_trait]
pub trait ClusterBackend: Send + Sync + Debug {
    /// Opens bucket `name`, authenticating with `password` when the bucket requires one.
    async fn open_bucket(&self, name: &str, password: Option<&str>) -> BucketResult<Arc<dyn BucketBackend>>;
}

/// Chooses and connects a cluster for an address.
///
/// `mock` selects the in-process substitute instead of a real cluster.
#[async_trait]
pub trait ClusterConnector: Send + Sync + Debug {
    async fn connect(&self, address: &str, mock: bool) -> BucketResult<Arc<dyn ClusterBackend>>;
}

/// Factory for cluster backends.
#[async_trait]
pub trait ClusterBackendBuilder {
    type Cluster: ClusterBackend;

    async fn build(self) -> BucketResult<Self::Cluster>;
}
