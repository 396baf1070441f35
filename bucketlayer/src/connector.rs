//! Cluster selection for [`open`](crate::open) and [`registry`](crate::registry).

use std::sync::Arc;

use async_trait::async_trait;

use bucketlayer_core::{
    backend::{ClusterBackend, ClusterConnector},
    error::BucketResult,
};
use bucketlayer_memory::InMemoryCluster;

/// Connects to MongoDB for real connections and to an in-process cluster for mock ones.
///
/// Every mock connection made through one connector (or its clones) lands on the same
/// [`InMemoryCluster`], so mock stores opened on one bucket name share their data.
/// Without the `mongodb` feature, real connections fail.
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector {
    mock: InMemoryCluster,
}

impl DefaultConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `cluster` for mock connections.
    pub fn with_mock_cluster(cluster: InMemoryCluster) -> Self {
        Self { mock: cluster }
    }

    pub fn mock_cluster(&self) -> &InMemoryCluster {
        &self.mock
    }

    #[cfg(feature = "mongodb")]
    async fn connect_real(address: &str) -> BucketResult<Arc<dyn ClusterBackend>> {
        use bucketlayer_core::backend::ClusterBackendBuilder;

        let cluster = bucketlayer_mongodb::MongoCluster::builder(address)
            .build()
            .await?;

        Ok(Arc::new(cluster))
    }

    #[cfg(not(feature = "mongodb"))]
    async fn connect_real(address: &str) -> BucketResult<Arc<dyn ClusterBackend>> {
        Err(bucketlayer_core::error::BucketError::Connection(format!(
            "cannot connect to {address}: no cluster backend enabled (build with the mongodb feature)"
        )))
    }
}

#[async_trait]
impl ClusterConnector for DefaultConnector {
    async fn connect(&self, address: &str, mock: bool) -> BucketResult<Arc<dyn ClusterBackend>> {
        if mock {
            tracing::debug!(%address, "using in-memory cluster");
            return Ok(Arc::new(self.mock.clone()));
        }

        Self::connect_real(address).await
    }
}
