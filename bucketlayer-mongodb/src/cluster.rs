//! MongoDB cluster connection.

use std::sync::Arc;

use async_trait::async_trait;
use bson::doc;
use mongodb::{
    Client,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, Credential},
};

use bucketlayer_core::{
    backend::{BucketBackend, ClusterBackend, ClusterBackendBuilder},
    error::{BucketError, BucketResult},
};

use crate::bucket::MongoBucket;


/// A connected MongoDB deployment. Buckets map to databases.
///
/// Buckets opened without a password share the cluster's client. A password opens the
/// bucket with its own client, authenticating as a user named after the bucket against
/// the bucket's database.
#[derive(Debug, Clone)]
pub struct MongoCluster {
    client: Client,
    options: ClientOptions,
}

impl MongoCluster {
    pub fn new(client: Client, options: ClientOptions) -> Self {
        Self { client, options }
    }

    /// Starts a builder for `address`, either `host[:port]` or a full connection string.
    pub fn builder(address: &str) -> MongoClusterBuilder {
        MongoClusterBuilder::new(address)
    }

    fn client_for(&self, name: &str, password: Option<&str>) -> BucketResult<Client> {
        let Some(password) = password else {
            return Ok(self.client.clone());
        };

        let mut options = self.options.clone();
        options.credential = Some(
            Credential::builder()
                .username(name.to_string())
                .password(password.to_string())
                .source(name.to_string())
                .build()
        );

        Client::with_options(options).map_err(|err| BucketError::Connection(err.to_string()))
    }

    fn open_error(name: &str, err: MongoError) -> BucketError {
        match *err.kind {
            ErrorKind::Authentication { .. } => BucketError::AuthenticationFailed(name.to_string()),
            _ => BucketError::Connection(err.to_string()),
        }
    }
}

#[async_trait]
impl ClusterBackend for MongoCluster {
    async fn open_bucket(&self, name: &str, password: Option<&str>) -> BucketResult<Arc<dyn BucketBackend>> {
        let database = self.client_for(name, password)?.database(name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| Self::open_error(name, err))?;

        tracing::debug!(bucket = name, "opened mongodb bucket");

        Ok(Arc::new(MongoBucket::new(name, database)))
    }
}


pub struct MongoClusterBuilder {
    uri: String,
}

impl MongoClusterBuilder {
    pub fn new(address: &str) -> Self {
        Self { uri: connection_uri(address) }
    }
}

#[async_trait]
impl ClusterBackendBuilder for MongoClusterBuilder {
    type Cluster = MongoCluster;

    async fn build(self) -> BucketResult<Self::Cluster> {
        let options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|err| BucketError::Connection(err.to_string()))?;
        let client = Client::with_options(options.clone())
            .map_err(|err| BucketError::Connection(err.to_string()))?;

        Ok(MongoCluster::new(client, options))
    }
}

/// Turns a `host[:port]` address into a connection string. Connection strings pass
/// through unchanged.
fn connection_uri(address: &str) -> String {
    if address.starts_with("mongodb://") || address.starts_with("mongodb+srv://") {
        address.to_string()
    } else {
        format!("mongodb://{address}")
    }
}
