//! Convenient re-exports of commonly used types from bucketlayer.
//!
//! ```ignore
//! use bucketlayer::prelude::*;
//! ```

pub use bucketlayer_core::{
    backend::{BucketBackend, ClusterBackend, ClusterBackendBuilder, ClusterConnector},
    document::{Cas, CounterResult, GetResult, MultiGetResult, Mutation, MutationResult},
    error::{BucketError, ErrorCategory, OperationError, StoreError, StoreResult},
    options::{ConnectionOptions, CounterOptions, WriteOptions},
    registry::InstanceRegistry,
    store::{DocumentStore, Operation},
    view::{ViewDefinition, ViewOrder, ViewQuery, ViewRow},
};

pub use crate::connector::DefaultConnector;
