//! Synchronous surface over the async client.
//!
//! Owns a private current-thread runtime and drives the shared async
//! machinery to completion, so both surfaces run the exact same domain
//! logic; only the scheduling differs.

use serde_json::Value;

use crate::client::{GrafanaClient, RequestEnvelope};
use crate::datasource::{Datasource, DatasourceIdentifier};
use crate::error::{GrafanaError, Result};
use crate::health::HealthResponse;
use crate::version::ServerVersion;

/// Blocking counterpart of [`GrafanaClient`].
pub struct BlockingGrafanaClient {
    runtime: tokio::runtime::Runtime,
    client: GrafanaClient,
}

impl BlockingGrafanaClient {
    /// Wrap an async client. Each wrapper owns its runtime; do not construct
    /// one inside an async context.
    pub fn new(client: GrafanaClient) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GrafanaError::Config(format!("failed to start blocking runtime: {e}")))?;
        Ok(Self { runtime, client })
    }

    /// The wrapped async client.
    pub fn as_async(&self) -> &GrafanaClient {
        &self.client
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        self.runtime.block_on(self.client.get(path))
    }

    pub fn send(&self, envelope: &RequestEnvelope) -> Result<Value> {
        self.runtime.block_on(self.client.send(envelope))
    }

    pub fn version(&self) -> Result<ServerVersion> {
        self.runtime.block_on(self.client.version())
    }

    pub fn resolve_datasource(&self, identifier: &DatasourceIdentifier) -> Result<Datasource> {
        self.runtime
            .block_on(self.client.datasources().resolve(identifier))
    }

    pub fn smart_query(&self, datasource: &Datasource, expression: &str) -> Result<Value> {
        self.runtime
            .block_on(self.client.datasources().smart_query(datasource, expression))
    }

    pub fn health_inquiry(&self, uid: &str) -> Result<HealthResponse> {
        self.runtime
            .block_on(self.client.datasources().health_inquiry(uid))
    }

    pub fn health_check(&self, datasource: &Datasource) -> Result<HealthResponse> {
        self.runtime
            .block_on(self.client.datasources().health_check(datasource))
    }
}

impl std::fmt::Debug for BlockingGrafanaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingGrafanaClient")
            .field("client", &self.client)
            .finish()
    }
}
