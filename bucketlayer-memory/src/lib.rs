//! In-memory storage capability for bucketlayer.
//!
//! This crate provides the mock cluster used when a store is opened with `mock = true`:
//! the full bucket operation set with no network I/O. It is meant for development and
//! tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Real CAS semantics** - Conditional replace/upsert/remove with never-reused CAS values
//! - **Counters** - Unsigned counters with optional initial value
//! - **Views** - Field-keyed view definitions with key, keys and range filters
//! - **Buckets and passwords** - Buckets created on demand or declared up front, optionally
//!   protected by a password
//!
//! # Quick Start
//!
//! ```ignore
//! use bucketlayer::{prelude::*, memory::InMemoryCluster};
//! use bson::{Bson, doc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = InMemoryCluster::builder().bucket("default").build().await?;
//!     let store = DocumentStore::new(cluster.open_bucket("default", None).await?);
//!
//!     store.insert("doc1", Bson::Document(doc! { "color": "red" }), WriteOptions::default()).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as bucketlayer_memory;

pub mod bucket;
pub mod cluster;
mod evaluator;

pub use bucket::InMemoryBucket;
pub use cluster::{InMemoryCluster, InMemoryClusterBuilder};
