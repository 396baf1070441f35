//! Main bucketlayer crate: a thin layer over a document bucket.
//!
//! This crate is the entry point for users of bucketlayer. It re-exports the core types,
//! provides the storage backends and wires them together behind [`open`] and
//! [`registry`].
//!
//! # Features
//!
//! - **Key/value documents** - get, multi-get, insert, replace, upsert, remove and counters
//! - **CAS-aware updates** - read-modify-write with an optional compare-and-swap guard
//! - **Views** - define a view, build a query, commit it
//! - **Uniform errors** - every failed operation is reported as one [`OperationError`](error::OperationError)
//! - **Named instances** - an [`InstanceRegistry`](registry::InstanceRegistry) shares one
//!   opened bucket per logical name
//!
//! # Quick Start
//!
//! ```ignore
//! use bucketlayer::prelude::*;
//! use bson::{Bson, doc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StoreError> {
//!     let registry = bucketlayer::registry();
//!     let store = registry
//!         .create(&ConnectionOptions::new("127.0.0.1", "default"), true)
//!         .await?;
//!
//!     store.insert("doc1", Bson::Document(doc! { "a": 0, "b": 2 }), WriteOptions::default()).await?;
//!
//!     // Merge fields into the stored document, guarded by CAS
//!     let updated = store.update("doc1", doc! { "a": 1 }, true).await?;
//!     assert_eq!(updated, Bson::Document(doc! { "a": 1, "b": 2 }));
//!
//!     // Elsewhere in the application
//!     let same = registry.get("default").await?;
//!     let hits = same.counter("hits", 1, CounterOptions::with_initial(0)).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Views
//!
//! ```ignore
//! store.define_view("movies", "by_year", ViewDefinition::by_field("year").emit_value("title")).await?;
//!
//! let rows = store
//!     .commit(store.query("movies", "by_year").range(1990, 2000, false).limit(10))
//!     .await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-process cluster used for mock connections
//! - [`mongodb`] - MongoDB cluster used for real connections (requires `mongodb` feature)

pub mod connector;
pub mod prelude;

pub use bucketlayer_core::{backend, document, error, options, registry, store, view};

// Re-export BSON types for convenience
pub use bson;

use std::sync::Arc;

use bucketlayer_core::{
    error::StoreResult,
    options::ConnectionOptions,
    registry::InstanceRegistry,
    store::DocumentStore,
};

use crate::connector::DefaultConnector;

/// In-memory storage backend implementations.
pub mod memory {
    pub use bucketlayer_memory::{InMemoryBucket, InMemoryCluster, InMemoryClusterBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use bucketlayer_mongodb::{MongoBucket, MongoCluster, MongoClusterBuilder};
}

/// Creates an empty registry backed by a [`DefaultConnector`].
///
/// Mock instances created through the returned registry share one in-memory cluster.
pub fn registry() -> InstanceRegistry {
    InstanceRegistry::new(Arc::new(DefaultConnector::new()))
}

/// Opens a single store without registering it.
///
/// Each call uses a fresh [`DefaultConnector`], so two mock stores opened this way do not
/// share data. Use a [`registry`] for that.
pub async fn open(options: &ConnectionOptions, mock: bool) -> StoreResult<DocumentStore> {
    DocumentStore::open(options, mock, &DefaultConnector::new()).await
}
