//! Expression routing: compose Transport, Registry, and Knowledgebase into a
//! single "run this expression against that data source" call.

use serde_json::Value;

use crate::client::RequestEnvelope;
use crate::datasource::{Datasource, DatasourceApi, DatasourceIdentifier};
use crate::error::{GrafanaError, Result};
use crate::knowledgebase;

impl DatasourceApi {
    /// Run `expression` against a data source, routing through the correct
    /// server endpoint for its backend kind, and return the decoded payload.
    ///
    /// HTTP failures are logged and rethrown; the health inquiry engine is
    /// responsible for catching them where a verdict is wanted instead.
    pub async fn smart_query(&self, datasource: &Datasource, expression: &str) -> Result<Value> {
        if expression.trim().is_empty() {
            return Err(GrafanaError::Value("expression must not be empty".into()));
        }
        let version = self.client.version().await?;
        let envelope = knowledgebase::query_envelope(datasource, expression, version, true)?;
        self.dispatch(datasource, envelope).await
    }

    /// Resolve `identifier` first, then [`smart_query`](Self::smart_query).
    pub async fn smart_query_by(
        &self,
        identifier: &DatasourceIdentifier,
        expression: &str,
    ) -> Result<Value> {
        let datasource = self.resolve(identifier).await?;
        self.smart_query(&datasource, expression).await
    }

    /// Issue a caller-built request envelope against a data source, skipping
    /// the synthesizer entirely.
    pub async fn smart_query_with(
        &self,
        datasource: &Datasource,
        envelope: RequestEnvelope,
    ) -> Result<Value> {
        self.dispatch(datasource, envelope).await
    }

    async fn dispatch(&self, datasource: &Datasource, envelope: RequestEnvelope) -> Result<Value> {
        match self.client.send(&envelope).await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                if err.status().is_some() {
                    tracing::warn!(
                        datasource = %datasource.uid,
                        kind = %datasource.kind,
                        error = %err,
                        "data source query failed"
                    );
                }
                Err(err)
            }
        }
    }
}
