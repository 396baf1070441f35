//! In-memory cluster: the mock storage capability.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};
use async_trait::async_trait;
use mea::rwlock::RwLock;

use bucketlayer_core::{
    backend::{BucketBackend, ClusterBackend, ClusterBackendBuilder},
    error::{BucketError, BucketResult},
};

use crate::bucket::InMemoryBucket;

#[derive(Debug, Clone)]
struct BucketEntry {
    bucket: InMemoryBucket,
    password: Option<String>,
}

type BucketMap = HashMap<String, BucketEntry>;


/// Thread-safe in-memory cluster.
///
/// Buckets are created on first open unless the cluster is strict, in which case only
/// the buckets declared on the builder exist. A bucket created with a password rejects
/// later opens that present a different one.
///
/// Clones share the same buckets.
///
/// # Example
///
/// ```ignore
/// use bucketlayer_memory::InMemoryCluster;
/// use bucketlayer::backend::{ClusterBackend, ClusterBackendBuilder};
///
/// let cluster = InMemoryCluster::builder()
///     .protected_bucket("billing", "s3cret")
///     .strict(true)
///     .build()
///     .await?;
///
/// assert!(cluster.open_bucket("default", None).await.is_err());
/// let billing = cluster.open_bucket("billing", Some("s3cret")).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryCluster {
    buckets: Arc<RwLock<BucketMap>>,
    strict: bool,
}

impl InMemoryCluster {
    /// Creates an empty, non-strict cluster.
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(RwLock::new(BucketMap::new())),
            strict: false,
        }
    }

    pub fn builder() -> InMemoryClusterBuilder {
        InMemoryClusterBuilder::default()
    }

    /// Names of the buckets that exist, sorted.
    pub async fn bucket_names(&self) -> Vec<String> {
        let mut names = self.buckets
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }

    fn authenticate(name: &str, entry: &BucketEntry, password: Option<&str>) -> BucketResult<()> {
        match &entry.password {
            Some(expected) if Some(expected.as_str()) != password => {
                Err(BucketError::AuthenticationFailed(name.to_string()))
            }
            _ => Ok(()),
        }
    }
}


#[async_trait]
impl ClusterBackend for InMemoryCluster {
    async fn open_bucket(&self, name: &str, password: Option<&str>) -> BucketResult<Arc<dyn BucketBackend>> {
        let mut buckets = self.buckets.write().await;

        let entry = match buckets.entry(name.to_string()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(_) if self.strict => return Err(BucketError::BucketNotFound(name.to_string())),
            Entry::Vacant(vacant) => {
                tracing::debug!(bucket = name, protected = password.is_some(), "creating in-memory bucket");

                vacant.insert(BucketEntry {
                    bucket: InMemoryBucket::new(name),
                    password: password.map(str::to_string),
                })
            }
        };

        Self::authenticate(name, entry, password)?;

        Ok(Arc::new(entry.bucket.clone()))
    }
}


/// Builder for [`InMemoryCluster`] instances.
///
/// # Example
///
/// ```ignore
/// let cluster = InMemoryCluster::builder().bucket("default").build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryClusterBuilder {
    buckets: Vec<(String, Option<String>)>,
    strict: bool,
}

impl InMemoryClusterBuilder {
    /// Declares a bucket that needs no password.
    pub fn bucket(mut self, name: impl Into<String>) -> Self {
        self.buckets.push((name.into(), None));
        self
    }

    /// Declares a bucket that can only be opened with `password`.
    pub fn protected_bucket(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.buckets.push((name.into(), Some(password.into())));
        self
    }

    /// Refuses to open buckets that were not declared.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[async_trait]
impl ClusterBackendBuilder for InMemoryClusterBuilder {
    type Cluster = InMemoryCluster;

    async fn build(self) -> BucketResult<Self::Cluster> {
        let buckets = self.buckets
            .into_iter()
            .map(|(name, password)| {
                let entry = BucketEntry {
                    bucket: InMemoryBucket::new(name.clone()),
                    password,
                };
                (name, entry)
            })
            .collect::<BucketMap>();

        Ok(InMemoryCluster {
            buckets: Arc::new(RwLock::new(buckets)),
            strict: self.strict,
        })
    }
}
