//! Typed client for the Grafana HTTP API.
//!
//! The centerpiece is the data-source health inquiry engine: for any
//! registered data source it asks the server's native per-data-source health
//! endpoint when the server is recent enough, and otherwise synthesizes a
//! lightweight backend-specific probe query, routes it through the right
//! proxy or query endpoint, and normalizes the wildly divergent backend
//! responses into a single structured verdict.
//!
//! # Example
//!
//! ```no_run
//! use grafana_api::{Credential, GrafanaClient};
//!
//! # async fn example() -> grafana_api::Result<()> {
//! let client = GrafanaClient::builder()
//!     .base_url("https://grafana.example.org")
//!     .credential(Credential::Token("glsa_...".into()))
//!     .build()?;
//!
//! let verdict = client.datasources().health_inquiry("39mf288en").await?;
//! println!("{}: {}", verdict.status, verdict.message);
//! # Ok(())
//! # }
//! ```
//!
//! Clients can also be built [from a URL](GrafanaClient::from_url) with
//! embedded credentials, or [from the environment](GrafanaClient::from_env)
//! (`GRAFANA_URL`, `GRAFANA_TOKEN`, `GRAFANA_TIMEOUT`). Enable the
//! `blocking` feature for a synchronous surface over the same machinery.

mod client;
mod datasource;
mod error;
mod health;
mod knowledgebase;
mod normalize;
mod smartquery;
mod version;

#[cfg(feature = "blocking")]
mod blocking;

pub use client::{Credential, GrafanaClient, GrafanaClientBuilder, RequestEnvelope};
pub use datasource::{Datasource, DatasourceApi, DatasourceIdentifier};
pub use error::{GrafanaError, Result};
pub use health::{HealthResponse, HealthStatus};
pub use knowledgebase::{health_probe_expression, query_envelope};
pub use version::{ServerVersion, NATIVE_HEALTH_MIN_VERSION};

#[cfg(feature = "blocking")]
pub use blocking::BlockingGrafanaClient;
