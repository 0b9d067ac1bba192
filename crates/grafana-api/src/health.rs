//! Data-source health inquiry: the two-tier probe (server-native check with
//! client-side fallback) and the structured verdict it produces.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::datasource::{Datasource, DatasourceApi, DatasourceIdentifier};
use crate::error::{GrafanaError, Result};
use crate::knowledgebase;
use crate::normalize;
use crate::version::{ServerVersion, NATIVE_HEALTH_MIN_VERSION};

/// Probe status. `Ok` if and only if the probe genuinely succeeded; `Fatal`
/// is reserved for server 5xx during the native probe and for normalizer
/// decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Error,
    Fatal,
}

impl HealthStatus {
    /// Parse a status string from a server payload. Unknown values are
    /// treated as failures.
    fn from_wire(raw: &str) -> Self {
        match raw {
            "OK" => Self::Ok,
            "FATAL" => Self::Fatal,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// Structured health verdict for a single data source.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub uid: String,
    /// Backend kind; `None` when the descriptor could not be resolved.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub success: bool,
    pub status: HealthStatus,
    /// Human-readable outcome; never empty on failure.
    pub message: String,
    /// Probe duration in seconds (monotonic clock, 4 decimal places);
    /// `None` only when no probe was attempted.
    pub duration: Option<f64>,
    /// Raw probe payload, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl HealthResponse {
    /// Full verdict as a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Like [`to_json`](Self::to_json) but without the raw `response`
    /// payload.
    pub fn to_json_compact(&self) -> Value {
        let mut value = self.to_json();
        if let Some(map) = value.as_object_mut() {
            map.remove("response");
        }
        value
    }
}

impl DatasourceApi {
    /// Probe the health of the data source identified by `uid`.
    ///
    /// Prefers the server-native health endpoint when the server is recent
    /// enough to provide it, falling back to a client-side probe query
    /// otherwise. Timeouts and connection failures are returned as errors;
    /// every other outcome is rendered into a verdict.
    pub async fn health_inquiry(&self, uid: &str) -> Result<HealthResponse> {
        let identifier = DatasourceIdentifier::Uid(uid.to_string());
        let datasource = match self.resolve(&identifier).await {
            Ok(datasource) => datasource,
            Err(GrafanaError::Client {
                status: 404,
                message,
                ..
            }) => {
                return Ok(HealthResponse {
                    uid: uid.to_string(),
                    kind: None,
                    success: false,
                    status: HealthStatus::Error,
                    message: non_empty(message),
                    duration: None,
                    response: None,
                });
            }
            Err(err) => return Err(err),
        };

        let version = self.client.version().await?;
        let started = Instant::now();

        let native = if version >= NATIVE_HEALTH_MIN_VERSION {
            self.native_probe(&datasource).await?
        } else {
            None
        };
        let mut verdict = match native {
            Some(verdict) => verdict,
            None => self.fallback_probe(&datasource, version).await?,
        };
        verdict.duration = Some(round4(started.elapsed().as_secs_f64()));
        Ok(verdict)
    }

    /// Client-side probe, bypassing the native health endpoint entirely.
    ///
    /// This is the forced-fallback path: useful against old servers and
    /// plugins that do not implement native health.
    pub async fn health_check(&self, datasource: &Datasource) -> Result<HealthResponse> {
        let version = self.client.version().await?;
        let started = Instant::now();
        let mut verdict = self.fallback_probe(datasource, version).await?;
        verdict.duration = Some(round4(started.elapsed().as_secs_f64()));
        Ok(verdict)
    }

    /// `GET /datasources/uid/{uid}/health`. `None` means the server or the
    /// plugin does not provide native health and the caller must fall back.
    async fn native_probe(&self, datasource: &Datasource) -> Result<Option<HealthResponse>> {
        let path = format!("/datasources/uid/{}/health", datasource.uid);
        match self.client.get(&path).await {
            Ok(payload) => {
                let status = payload
                    .get("status")
                    .and_then(Value::as_str)
                    .map(HealthStatus::from_wire)
                    .unwrap_or(HealthStatus::Error);
                let message = payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Some(verdict(datasource, status, message, Some(payload))))
            }
            // 400 is a structured failure from the health plugin
            Err(GrafanaError::BadInput { body, message }) => {
                let status = match body
                    .get("status")
                    .and_then(Value::as_str)
                    .map(HealthStatus::from_wire)
                {
                    Some(HealthStatus::Ok) | None => HealthStatus::Error,
                    Some(other) => other,
                };
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(message);
                Ok(Some(verdict(datasource, status, message, Some(body))))
            }
            // server too old or plugin without native health
            Err(GrafanaError::Client { status: 404, .. })
            | Err(GrafanaError::Server { status: 503, .. }) => {
                tracing::debug!(
                    uid = %datasource.uid,
                    "native health endpoint unavailable, using client-side probe"
                );
                Ok(None)
            }
            Err(err @ GrafanaError::Server { .. }) => {
                let code = err
                    .body()
                    .and_then(|body| body.get("code"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let mut message = format!("{}: {}", err.kind_name(), err);
                if let Some(code) = code {
                    message = format!("[{code}] {message}");
                }
                Ok(Some(verdict(
                    datasource,
                    HealthStatus::Fatal,
                    message,
                    err.body().cloned(),
                )))
            }
            Err(err) => Err(err),
        }
    }

    /// Knowledgebase expression → SmartQuery → normalizer. Anything but a
    /// transport-level failure becomes a verdict.
    async fn fallback_probe(
        &self,
        datasource: &Datasource,
        version: ServerVersion,
    ) -> Result<HealthResponse> {
        match self.run_fallback(datasource, version).await {
            Ok(verdict) => Ok(verdict),
            Err(err @ (GrafanaError::Timeout(_) | GrafanaError::Transport(_))) => Err(err),
            Err(err) => Ok(verdict(
                datasource,
                HealthStatus::Error,
                err.to_string(),
                None,
            )),
        }
    }

    async fn run_fallback(
        &self,
        datasource: &Datasource,
        version: ServerVersion,
    ) -> Result<HealthResponse> {
        let expression =
            knowledgebase::health_probe_expression(&datasource.kind, datasource.dialect(), version)?;
        let payload = self.smart_query(datasource, &expression).await?;
        let outcome = normalize::parse_health_response(datasource, &payload, version);
        let status = if outcome.success {
            HealthStatus::Ok
        } else if outcome.message.starts_with("FATAL:") {
            HealthStatus::Fatal
        } else {
            HealthStatus::Error
        };
        Ok(verdict(datasource, status, outcome.message, Some(payload)))
    }
}

fn verdict(
    datasource: &Datasource,
    status: HealthStatus,
    message: String,
    response: Option<Value>,
) -> HealthResponse {
    let success = status == HealthStatus::Ok;
    let message = if success { message } else { non_empty(message) };
    HealthResponse {
        uid: datasource.uid.clone(),
        kind: Some(datasource.kind.clone()),
        success,
        status,
        message,
        duration: None,
        response,
    }
}

fn non_empty(message: String) -> String {
    if message.is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

fn round4(seconds: f64) -> f64 {
    (seconds * 10_000.0).round() / 10_000.0
}
