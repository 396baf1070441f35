//! Connection and per-operation options.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    document::Cas,
    error::{BucketError, StoreResult},
};

/// Callback invoked once with the outcome of opening a bucket.
pub type ReadyCallback = Arc<dyn Fn(Result<(), &BucketError>) + Send + Sync>;

/// Where and how to open a bucket.
///
/// `name` is both the bucket to open and the name the instance is registered under.
/// Options can be built in code or loaded from a configuration file:
///
/// ```ignore
/// use bucketlayer::options::ConnectionOptions;
///
/// let options = ConnectionOptions::new("127.0.0.1", "default").with_port(8091);
/// let loaded = ConnectionOptions::from_json(r#"{ "host": "db", "name": "analytics" }"#)?;
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip)]
    pub on_ready: Option<ReadyCallback>,
}

impl ConnectionOptions {
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            name: name.into(),
            password: None,
            on_ready: None,
        }
    }

    pub fn from_json(input: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn on_ready<F>(mut self, callback: F) -> Self
    where
        F: Fn(Result<(), &BucketError>) + Send + Sync + 'static,
    {
        self.on_ready = Some(Arc::new(callback));
        self
    }

    /// `host:port` when a port is set, otherwise `host` verbatim.
    pub fn address(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("on_ready", &self.on_ready.is_some())
            .finish()
    }
}

/// Options for insert, replace, upsert and remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Only write if the stored document still has this CAS. Ignored by insert.
    pub cas: Option<Cas>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cas(cas: Cas) -> Self {
        Self { cas: Some(cas) }
    }
}

/// Options for counter operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOptions {
    /// Value to create the counter with when the key is absent.
    pub initial: Option<u64>,
}

impl CounterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(initial: u64) -> Self {
        Self { initial: Some(initial) }
    }
}
