//! Error types and result types for bucket operations.
//!
//! Two layers of errors live here:
//!
//! - [`BucketError`] is what a storage backend reports. It keeps the cause (missing key,
//!   CAS mismatch, lost connection, ...) and is returned as-is when a bucket fails to open.
//! - [`OperationError`] is what a [`DocumentStore`](crate::store::DocumentStore) hands back
//!   for a failed data operation. Every cause is flattened into one [`ErrorCategory`] and the
//!   backend's message is kept as detail.
//!
//! Use [`StoreResult<T>`] as the return type for fallible store operations.

use std::fmt;

use bson::error::Error as BsonError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::store::Operation;

/// Errors reported by a storage backend.
///
/// Backends construct these; the document store only reads their message when it
/// normalizes them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    /// A document with the given key already exists in the bucket.
    #[error("Key {0} already exists")]
    KeyExists(String),
    /// No document is stored under the given key.
    #[error("Key {0} not found")]
    KeyNotFound(String),
    /// The supplied CAS does not match the stored document's current CAS.
    #[error("CAS mismatch for key {0}")]
    CasMismatch(String),
    /// A counter operation hit a value that is not an unsigned integer.
    #[error("Value stored under key {0} is not numeric")]
    NotNumeric(String),
    /// The arguments of an operation were rejected before reaching storage.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The requested design/view pair has no definition in the bucket.
    #[error("View {0}/{1} not found")]
    ViewNotFound(String, String),
    /// The bucket does not exist in the cluster.
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),
    /// The bucket exists but the supplied password was rejected.
    #[error("Authentication failed for bucket {0}")]
    AuthenticationFailed(String),
    /// The cluster could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A value could not be converted to or from its stored representation.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Any other failure inside the backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for backend calls.
pub type BucketResult<T> = Result<T, BucketError>;

/// The single category every failed data operation is reported under.
///
/// Which one applies is a deployment decision made once per store, see
/// [`DocumentStore::with_error_category`](crate::store::DocumentStore::with_error_category).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The storage service could not serve the request.
    #[default]
    ServiceUnavailable,
    /// The storage service did not answer in time.
    Timeout,
}

impl ErrorCategory {
    /// HTTP-style status code for the category.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::ServiceUnavailable => 503,
            ErrorCategory::Timeout => 504,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ServiceUnavailable => "Service Unavailable",
            ErrorCategory::Timeout => "Gateway Time-out",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized data operation failure.
///
/// The cause of the failure is not encoded in the type. Callers that need to tell a
/// missing key from a CAS mismatch have to look at [`OperationError::message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{category}: {message}")]
pub struct OperationError {
    category: ErrorCategory,
    operation: Operation,
    message: String,
}

impl OperationError {
    pub fn new(category: ErrorCategory, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            category,
            operation,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// The operation that failed.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The original backend message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.category.status_code()
    }
}

/// Represents all errors surfaced by the document store and the instance registry.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The bucket could not be opened. Not normalized.
    #[error("Connection error: {0}")]
    Connection(#[from] BucketError),
    /// A data operation failed.
    #[error(transparent)]
    Operation(#[from] OperationError),
    /// A typed document could not be converted to or from BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The registry refused a name or does not know it.
    #[error("Registry error: {0}")]
    Registry(String),
}

impl StoreError {
    /// Returns the normalized error if this is a failed data operation.
    pub fn as_operation(&self) -> Option<&OperationError> {
        match self {
            StoreError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<BsonError> for BucketError {
    fn from(err: BsonError) -> Self {
        BucketError::Serialization(err.to_string())
    }
}
