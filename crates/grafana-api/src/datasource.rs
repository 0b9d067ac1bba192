use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::GrafanaClient;
use crate::error::{GrafanaError, Result};

/// Reference to a data source by any of the identifiers the server accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceIdentifier {
    /// Numeric id (`/datasources/{id}`).
    Id(i64),
    /// Opaque uid (`/datasources/uid/{uid}`).
    Uid(String),
    /// Display name (`/datasources/name/{name}`).
    Name(String),
}

impl From<i64> for DatasourceIdentifier {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

/// Data-source descriptor as returned by the server.
///
/// Only the attributes the query and health machinery depend on are typed;
/// everything else is retained verbatim in `extra`. Every descriptor the
/// server hands out carries at least `id` and `uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    pub id: i64,
    pub uid: String,
    #[serde(default)]
    pub name: String,
    /// Backend kind, e.g. `prometheus` or `elasticsearch`. Open set: vendor
    /// plugin ids appear here too.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Access mode; only `proxy` and `server` are supported by the query
    /// machinery.
    #[serde(default)]
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Backend-specific options. For influx-family sources the query dialect
    /// lives under `version`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub json_data: Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Datasource {
    /// Query-language dialect for influx-family sources (`jsonData.version`).
    pub fn dialect(&self) -> Option<&str> {
        self.json_data.get("version").and_then(Value::as_str)
    }
}

/// Read-only slice of the data-source registry, plus the query and health
/// machinery built on top of it (see the `smartquery` and `health` modules).
#[derive(Debug, Clone)]
pub struct DatasourceApi {
    pub(crate) client: GrafanaClient,
}

impl GrafanaClient {
    /// Access the data-source API.
    pub fn datasources(&self) -> DatasourceApi {
        DatasourceApi {
            client: self.clone(),
        }
    }
}

impl DatasourceApi {
    /// Resolve a full descriptor from any identifier.
    pub async fn resolve(&self, identifier: &DatasourceIdentifier) -> Result<Datasource> {
        let payload = match identifier {
            DatasourceIdentifier::Id(id) => self.client.get(&format!("/datasources/{id}")).await?,
            DatasourceIdentifier::Uid(uid) => {
                self.client.get(&format!("/datasources/uid/{uid}")).await?
            }
            DatasourceIdentifier::Name(name) => {
                self.client.get(&format!("/datasources/name/{name}")).await?
            }
        };
        decode_descriptor(payload)
    }

    /// List all data sources visible to the caller.
    pub async fn list(&self) -> Result<Vec<Datasource>> {
        let payload = self.client.get("/datasources").await?;
        serde_json::from_value(payload)
            .map_err(|e| GrafanaError::Value(format!("malformed datasource list: {e}")))
    }
}

fn decode_descriptor(payload: Value) -> Result<Datasource> {
    serde_json::from_value(payload)
        .map_err(|e| GrafanaError::Value(format!("malformed datasource descriptor: {e}")))
}
