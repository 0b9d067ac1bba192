//! Backend-specific response classification for client-side health probes.
//!
//! Every function here is pure: given the decoded probe payload, produce a
//! success flag and a human-readable message. The health engine turns these
//! into verdicts; messages prefixed with `FATAL:` mark decode failures and
//! are promoted to the `FATAL` status.

use serde_json::Value;

use crate::client::json_type_name;
use crate::datasource::Datasource;
use crate::version::ServerVersion;

const GENERIC_KEYS_MISSING: &str = "Response lacks expected keys 'results' or 'data'";

/// Classification outcome for a probe payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Classify a probe payload according to the data source's backend kind.
pub(crate) fn parse_health_response(
    datasource: &Datasource,
    response: &Value,
    version: ServerVersion,
) -> Outcome {
    match datasource.kind.as_str() {
        "elasticsearch" => parse_elasticsearch(datasource, response),
        "fetzerch-sunandmoondatasource" => parse_descriptor_echo(response, true),
        "testdata" => parse_descriptor_echo(response, false),
        "graphite" => parse_graphite(response),
        "loki" => parse_loki(response, version),
        // any body that made it through a 2xx is proof of life for these
        "opentsdb" | "tempo" => Outcome::success("Success"),
        "zipkin" => parse_zipkin(response),
        _ => parse_generic(response),
    }
}

/// Success iff `response[database].mappings.properties` exists.
fn parse_elasticsearch(datasource: &Datasource, response: &Value) -> Outcome {
    if let Some(error) = response.get("error") {
        let status = response.get("status").cloned().unwrap_or(Value::Null);
        let message = match error.pointer("/root_cause/0") {
            Some(root_cause) => format!(
                "{}: {}, status: {}",
                root_cause.get("type").and_then(Value::as_str).unwrap_or("unknown"),
                root_cause.get("reason").and_then(Value::as_str).unwrap_or(""),
                status
            ),
            None => error.to_string(),
        };
        return Outcome::failure(message);
    }

    let database = datasource.database.as_deref().unwrap_or_default();
    let Some(entry) = response.get(database) else {
        return Outcome::failure(format!("No response for database '{database}'"));
    };
    let Some(mappings) = entry.get("mappings") else {
        return Outcome::failure("Invalid response. KeyError: 'mappings'");
    };
    if mappings.get("properties").is_none() {
        return Outcome::failure("Invalid response. KeyError: 'properties'");
    }
    Outcome::success("Success")
}

/// Probes that echo the descriptor back: success iff the payload looks like
/// the data source itself.
fn parse_descriptor_echo(response: &Value, require_coordinates: bool) -> Outcome {
    for key in ["id", "uid"] {
        if response.get(key).is_none() {
            return Outcome::failure(format!("Invalid response. KeyError: '{key}'"));
        }
    }
    if require_coordinates {
        for key in ["latitude", "longitude"] {
            if response.pointer(&format!("/jsonData/{key}")).is_none() {
                return Outcome::failure(format!("Invalid response. KeyError: '{key}'"));
            }
        }
    }
    Outcome::success("Success")
}

fn parse_graphite(response: &Value) -> Outcome {
    let Some(first) = response.get(0) else {
        return Outcome::failure(format!("Invalid response: {response}"));
    };
    if first.get("target").is_some() && first.get("datapoints").is_some() {
        Outcome::success("Success")
    } else {
        Outcome::failure(format!("Invalid response: {first}"))
    }
}

/// Loki changed probe shape across server versions: 7.x label listings carry
/// a `status` field, newer servers answer through the generic query endpoint.
fn parse_loki(response: &Value, version: ServerVersion) -> Outcome {
    let seven_x = version >= ServerVersion::new(7, 0, 0) && version < ServerVersion::new(8, 0, 0);
    if seven_x {
        if response.get("status").and_then(Value::as_str) == Some("success") {
            return Outcome::success("Success");
        }
        return Outcome::failure(body_message(response));
    }
    if response.pointer("/results/test").is_some() {
        return Outcome::success("Success");
    }
    Outcome::failure(body_message(response))
}

fn parse_zipkin(response: &Value) -> Outcome {
    if response.is_array() {
        Outcome::success("Success")
    } else {
        Outcome::failure(format!("Invalid response: {response}"))
    }
}

/// Generic backends (prometheus, the SQL family, influxdb, plugin sources):
/// delegate on the `results` or `data` envelope.
fn parse_generic(response: &Value) -> Outcome {
    if let Some(results) = response.get("results") {
        parse_results(results)
    } else if response.get("data").is_some() {
        parse_data(response)
    } else {
        Outcome::failure(GENERIC_KEYS_MISSING)
    }
}

fn parse_results(results: &Value) -> Outcome {
    match results {
        Value::Object(map) => {
            let Some(test) = map.get("test") else {
                return Outcome::failure("Invalid response format");
            };
            if let Some(frames) = test.get("frames") {
                let Some(frames) = frames.as_array() else {
                    return Outcome::failure(format!(
                        "FATAL: Invalid response. TypeError: 'frames' must be a list, got {}",
                        json_type_name(frames)
                    ));
                };
                let message = frames
                    .first()
                    .and_then(|frame| frame.pointer("/schema/meta/executedQueryString"))
                    .and_then(Value::as_str)
                    .unwrap_or("Success");
                return Outcome::success(message);
            }
            if test.get("refId").is_some() {
                let message = test
                    .pointer("/meta/executedQueryString")
                    .and_then(Value::as_str)
                    .unwrap_or("Success");
                return Outcome::success(message);
            }
            Outcome::failure("Invalid response format")
        }
        Value::Array(list) => {
            let Some(first) = list.first() else {
                return Outcome::failure(
                    "FATAL: Invalid response. IndexError: empty results list",
                );
            };
            if let Some(error) = first.get("error") {
                return Outcome::failure(
                    error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string()),
                );
            }
            for key in ["statement_id", "series"] {
                if first.get(key).is_none() {
                    return Outcome::failure(format!(
                        "FATAL: Invalid response. KeyError: '{key}'"
                    ));
                }
            }
            Outcome::success("Success")
        }
        other => Outcome::failure(format!(
            "FATAL: Unknown response type '{}'",
            json_type_name(other)
        )),
    }
}

/// Success iff `errors` is absent or falsy; the message is the string form
/// of `data` (or of `errors` on failure).
fn parse_data(response: &Value) -> Outcome {
    let errors = response.get("errors").filter(|e| !is_falsy(e));
    match errors {
        Some(errors) => Outcome::failure(errors.to_string()),
        None => Outcome::success(
            response
                .get("data")
                .map(Value::to_string)
                .unwrap_or_else(|| "Success".to_string()),
        ),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn body_message(response: &Value) -> String {
    response
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Invalid response: {response}"))
}
