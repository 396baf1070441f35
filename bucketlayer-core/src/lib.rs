//! A thin document bucket layer with a uniform asynchronous API.
//!
//! This crate is the core of the bucketlayer project and provides:
//!
//! - **Document store** ([`store`]) - The operation set on one opened bucket, including the
//!   CAS-aware read-modify-write `update`
//! - **Instance registry** ([`registry`]) - Named, shared document stores
//! - **Backend abstraction** ([`backend`]) - Traits a storage capability implements
//! - **Documents** ([`document`]) - CAS tokens, result shapes and update mutations
//! - **Views** ([`view`]) - View definitions and the query builder
//! - **Options** ([`options`]) - Connection and per-operation options
//! - **Error handling** ([`error`]) - Backend errors and their normalized form
//!
//! # Example
//!
//! ```ignore
//! use bucketlayer::prelude::*;
//! use bson::{Bson, doc};
//!
//! let registry = bucketlayer::registry();
//! let store = registry
//!     .create(&ConnectionOptions::new("127.0.0.1", "default"), true)
//!     .await?;
//!
//! store.insert("doc1", Bson::Document(doc! { "color": "red", "size": 3 }), WriteOptions::default()).await?;
//! let updated = store.update("doc1", doc! { "color": "blue" }, true).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as bucketlayer_core;

pub mod backend;
pub mod document;
pub mod error;
pub mod options;
pub mod registry;
pub mod store;
pub mod view;
