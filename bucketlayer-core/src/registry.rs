//! Named document store instances.
//!
//! An [`InstanceRegistry`] is built once at application start and handed to whatever
//! needs bucket access. Each logical name maps to one [`DocumentStore`]; asking for a
//! name a second time returns the handle opened the first time.
//!
//! ```ignore
//! // setup
//! let registry = InstanceRegistry::new(connector);
//! registry.create(&ConnectionOptions::new("127.0.0.1", "default"), false).await?;
//! registry.create(&ConnectionOptions::new("127.0.0.1", "analytics"), false).await?;
//!
//! // elsewhere
//! let analytics = registry.get("analytics").await?;
//! analytics.insert("doc1", Bson::Document(doc! { "total_hits": 10 }), WriteOptions::default()).await?;
//! ```

use std::{collections::HashMap, sync::Arc};

use mea::{mutex::Mutex, rwlock::RwLock};

use crate::{
    backend::ClusterConnector,
    error::{ErrorCategory, StoreError, StoreResult},
    options::ConnectionOptions,
    store::DocumentStore,
};

type InstanceMap = HashMap<String, DocumentStore>;
type GateMap = HashMap<String, Arc<Mutex<()>>>;

/// Process-wide mapping from logical bucket name to an opened [`DocumentStore`].
///
/// The registry is cheap to clone; clones share the same instances. A store is only
/// inserted once its bucket is open, so a lookup never observes a half-opened entry.
/// Opens are serialized per name: concurrent `create` calls for one name open a single
/// connection, while lookups and opens of other names proceed.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    connector: Arc<dyn ClusterConnector>,
    instances: Arc<RwLock<InstanceMap>>,
    opening: Arc<Mutex<GateMap>>,
    fixed_name: Option<String>,
    error_category: ErrorCategory,
}

impl InstanceRegistry {
    /// Creates an empty registry that opens buckets through `connector`.
    pub fn new(connector: Arc<dyn ClusterConnector>) -> Self {
        Self {
            connector,
            instances: Arc::new(RwLock::new(InstanceMap::new())),
            opening: Arc::new(Mutex::new(GateMap::new())),
            fixed_name: None,
            error_category: ErrorCategory::default(),
        }
    }

    /// Creates a registry that only ever holds the instance called `name`.
    pub fn single(name: impl Into<String>, connector: Arc<dyn ClusterConnector>) -> Self {
        Self {
            fixed_name: Some(name.into()),
            ..Self::new(connector)
        }
    }

    /// Category applied to every store this registry opens.
    pub fn with_error_category(mut self, category: ErrorCategory) -> Self {
        self.error_category = category;
        self
    }

    /// Returns the instance registered under `options.name`, opening and registering it
    /// first if there is none.
    ///
    /// An existing entry is returned as is; `options` and `mock` are not compared with the
    /// ones it was opened with. Open failures are returned and nothing is registered.
    pub async fn create(&self, options: &ConnectionOptions, mock: bool) -> StoreResult<DocumentStore> {
        if let Some(fixed) = self.fixed_name.as_ref().filter(|fixed| **fixed != options.name) {
            return Err(StoreError::Registry(format!(
                "registry only holds instance {fixed}, cannot create {}",
                options.name
            )));
        }

        if let Some(existing) = self.lookup(&options.name).await {
            tracing::debug!(name = %options.name, "instance already registered");
            return Ok(existing);
        }

        let gate = self.opening
            .lock()
            .await
            .entry(options.name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _opening = gate.lock().await;

        // Another create may have finished while we waited for the gate.
        if let Some(existing) = self.lookup(&options.name).await {
            return Ok(existing);
        }

        let store = DocumentStore::open(options, mock, self.connector.as_ref())
            .await?
            .with_error_category(self.error_category);

        self.instances
            .write()
            .await
            .insert(options.name.clone(), store.clone());
        self.opening
            .lock()
            .await
            .remove(&options.name);

        tracing::debug!(name = %options.name, mock, "registered instance");

        Ok(store)
    }

    /// Returns the instance registered under `name`, if any.
    pub async fn lookup(&self, name: &str) -> Option<DocumentStore> {
        self.instances
            .read()
            .await
            .get(name)
            .cloned()
    }

    /// Like [`lookup`](Self::lookup) but reports absence as an error.
    pub async fn get(&self, name: &str) -> StoreResult<DocumentStore> {
        self.lookup(name)
            .await
            .ok_or_else(|| StoreError::Registry(format!("no instance registered under {name}")))
    }

    /// The instance of a single-instance registry.
    pub async fn default_instance(&self) -> StoreResult<DocumentStore> {
        match &self.fixed_name {
            Some(name) => self.get(name).await,
            None => Err(StoreError::Registry("registry holds named instances only".to_string())),
        }
    }

    /// Whether an instance is registered under `name`. Opens in progress do not count.
    pub async fn contains(&self, name: &str) -> bool {
        self.instances
            .read()
            .await
            .contains_key(name)
    }

    /// Names of all registered instances, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names = self.instances
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }

    /// Number of registered instances.
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Whether no instance has been registered yet.
    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }
}
