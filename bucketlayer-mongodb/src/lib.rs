//! MongoDB backend implementation for bucketlayer.
//!
//! This crate provides the real cluster used when a store is opened with `mock = false`.
//! Each bucket is a MongoDB database; documents, their CAS values and view definitions
//! are kept in ordinary collections.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! bucketlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Server-side CAS** - Conditional writes are decided by the server in one round trip
//! - **Views** - View queries run as sorted `find` calls on the stored values
//! - **Bucket passwords** - Protected buckets authenticate with their own credentials
//!
//! # Example
//!
//! ```ignore
//! use bucketlayer::{backend::{ClusterBackend, ClusterBackendBuilder}, mongodb::MongoCluster};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = MongoCluster::builder("localhost:27017").build().await?;
//!     let bucket = cluster.open_bucket("default", None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as bucketlayer_mongodb;

pub mod bucket;
pub mod cluster;
mod sanitizer;
mod view;

pub use bucket::MongoBucket;
pub use cluster::{MongoCluster, MongoClusterBuilder};
