//! Static knowledge about how each backend kind is queried and probed.
//!
//! Two pure tables: the canonical health-probe expression per backend kind,
//! and the query synthesizer that turns an expression into a request
//! envelope. Both must stay exhaustive over the backend set the crate claims
//! to support.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Method;
use serde_json::json;

use crate::client::RequestEnvelope;
use crate::datasource::Datasource;
use crate::error::{GrafanaError, Result};
use crate::version::ServerVersion;

/// First server release with the generic `/ds/query` endpoint; prometheus
/// and loki expressions are routed through the legacy per-backend endpoints
/// below this.
const GENERIC_QUERY_MIN_VERSION: ServerVersion = ServerVersion::new(8, 0, 0);

const LOKI_V7_MIN: ServerVersion = ServerVersion::new(7, 0, 0);

/// Canonical "is it alive?" expression for a backend kind.
///
/// `url://`-prefixed entries resolve to plain GETs after placeholder
/// substitution (`{datasource_id}`, `{datasource_uid}`, `{database_name}`);
/// everything else goes through the query synthesizer. The influx entry is
/// selected by dialect, the loki entry by server version.
pub fn health_probe_expression(
    kind: &str,
    dialect: Option<&str>,
    version: ServerVersion,
) -> Result<String> {
    let expression = match kind {
        "elasticsearch" => "url:///datasources/proxy/{datasource_id}/{database_name}/_mapping",
        "fetzerch-sunandmoondatasource" => "url:///datasources/uid/{datasource_uid}",
        "graphite" => "random-walk.count;dc=asia-1;app=collector;server=000",
        "influxdb" => match dialect {
            Some("Flux") => "buckets()",
            _ => "SHOW RETENTION POLICIES on _internal",
        },
        "jaeger" => "url:///datasources/proxy/{datasource_id}/api/services",
        "loki" => {
            if version >= LOKI_V7_MIN && version < GENERIC_QUERY_MIN_VERSION {
                "url:///datasources/proxy/{datasource_id}/loki/api/v1/label"
            } else {
                "{job=~\".+\"}"
            }
        }
        "opentsdb" => "url:///datasources/proxy/{datasource_id}/api/suggest?type=metrics&max=1",
        "postgres" | "mysql" | "mssql" => "SELECT 1;",
        "prometheus" => "1+1",
        "simpod-json-datasource" => "url:///datasources/proxy/{datasource_id}",
        "tempo" => "url:///datasources/proxy/{datasource_id}/api/echo",
        "testdata" => "url:///datasources/uid/{datasource_uid}",
        "zipkin" => "url:///datasources/proxy/{datasource_id}/api/v2/services",
        _ => {
            return Err(GrafanaError::NotImplemented(format!(
                "no health probe known for data source type '{kind}'"
            )));
        }
    };
    Ok(expression.to_string())
}

/// Build the request envelope for running `expression` against a data source.
///
/// `instant` selects between the instant and range endpoints where the
/// legacy per-backend routes distinguish them; health probes are always
/// instant.
pub fn query_envelope(
    datasource: &Datasource,
    expression: &str,
    version: ServerVersion,
    instant: bool,
) -> Result<RequestEnvelope> {
    // url:// expressions resolve to plain GETs after placeholder substitution.
    if let Some(template) = expression.strip_prefix("url://") {
        let path = template
            .replace("{datasource_id}", &datasource.id.to_string())
            .replace("{datasource_uid}", &datasource.uid)
            .replace(
                "{database_name}",
                datasource.database.as_deref().unwrap_or_default(),
            );
        return Ok(RequestEnvelope {
            method: Method::GET,
            path,
            ..Default::default()
        });
    }

    match datasource.kind.as_str() {
        // InfluxQL travels over the legacy proxy query endpoint as form data.
        "influxdb" if datasource.dialect() != Some("Flux") => {
            let mut query = vec![("q".to_string(), expression.to_string())];
            if let Some(database) = &datasource.database {
                query.push(("db".to_string(), database.clone()));
            }
            Ok(RequestEnvelope {
                method: Method::POST,
                path: format!("/datasources/proxy/{}/query", datasource.id),
                form: vec![("q".to_string(), expression.to_string())],
                query,
                ..Default::default()
            })
        }
        "graphite" => Ok(RequestEnvelope {
            method: Method::POST,
            path: format!("/datasources/proxy/{}/render", datasource.id),
            form: vec![
                ("target".to_string(), expression.to_string()),
                ("from".to_string(), "-5m".to_string()),
                ("until".to_string(), "now".to_string()),
                ("format".to_string(), "json".to_string()),
                ("maxDataPoints".to_string(), "100".to_string()),
            ],
            ..Default::default()
        }),
        "prometheus" | "loki" if version < GENERIC_QUERY_MIN_VERSION => {
            legacy_instant_envelope(datasource, expression, instant)
        }
        _ => generic_envelope(datasource, expression, instant),
    }
}

/// Legacy `/api/v1/query[_range]` routes used before the generic query
/// endpoint existed.
fn legacy_instant_envelope(
    datasource: &Datasource,
    expression: &str,
    instant: bool,
) -> Result<RequestEnvelope> {
    let access = checked_access(datasource)?;
    let now = unix_seconds();
    let (endpoint, form) = if instant {
        (
            "query",
            vec![
                ("query".to_string(), expression.to_string()),
                ("time".to_string(), now.to_string()),
            ],
        )
    } else {
        (
            "query_range",
            vec![
                ("query".to_string(), expression.to_string()),
                ("start".to_string(), now.saturating_sub(300).to_string()),
                ("end".to_string(), now.to_string()),
                ("step".to_string(), "15".to_string()),
            ],
        )
    };
    Ok(RequestEnvelope {
        method: Method::POST,
        path: format!(
            "/datasources/{access}/{}/api/v1/{endpoint}",
            datasource.id
        ),
        form,
        ..Default::default()
    })
}

/// Generic `/ds/query` envelope: a single query with `refId: "test"`, the
/// backend metadata, and the expression under the backend-appropriate key.
fn generic_envelope(
    datasource: &Datasource,
    expression: &str,
    instant: bool,
) -> Result<RequestEnvelope> {
    checked_access(datasource)?;

    let mut query = json!({
        "refId": "test",
        "datasource": {
            "type": datasource.kind,
            "uid": datasource.uid,
        },
        "datasourceId": datasource.id,
        "intervalMs": 1000,
        "maxDataPoints": 100,
    });
    let key = expression_key(&datasource.kind, datasource.dialect());
    query[key] = json!(expression);
    if matches!(datasource.kind.as_str(), "prometheus" | "loki") {
        query["instant"] = json!(instant);
    }

    Ok(RequestEnvelope {
        method: Method::POST,
        path: "/ds/query".to_string(),
        json: Some(json!({
            "queries": [query],
            "from": "now-5m",
            "to": "now",
        })),
        ..Default::default()
    })
}

fn expression_key(kind: &str, dialect: Option<&str>) -> &'static str {
    match kind {
        "prometheus" | "loki" => "expr",
        "postgres" | "mysql" | "mssql" => "rawSql",
        "influxdb" if dialect != Some("Flux") => "q",
        _ => "query",
    }
}

/// Only `proxy` and `server` access modes are supported; anything else fails
/// closed.
fn checked_access(datasource: &Datasource) -> Result<&str> {
    match datasource.access.as_str() {
        access @ ("proxy" | "server") => Ok(access),
        other => Err(GrafanaError::NotImplemented(format!(
            "unknown access mode '{other}' for data source '{}'",
            datasource.uid
        ))),
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
