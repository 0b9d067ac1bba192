use grafana_api::{Datasource, GrafanaClient, GrafanaError, HealthStatus};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GrafanaClient {
    GrafanaClient::builder()
        .base_url(server.uri())
        .build()
        .unwrap()
}

async fn mount_settings(server: &MockServer, version: &str) {
    Mock::given(method("GET"))
        .and(path("/api/frontend/settings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"buildInfo": {"version": version}})),
        )
        .mount(server)
        .await;
}

async fn mount_descriptor(server: &MockServer, descriptor: Value) {
    let uid = descriptor["uid"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path(format!("/api/datasources/uid/{uid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(descriptor))
        .mount(server)
        .await;
}

fn prometheus_descriptor(uid: &str) -> Value {
    json!({
        "id": 7,
        "uid": uid,
        "name": "Prometheus",
        "type": "prometheus",
        "access": "server",
    })
}

fn elasticsearch_descriptor() -> Datasource {
    serde_json::from_value(json!({
        "id": 44,
        "uid": "34inf2sdc",
        "name": "Elastic",
        "type": "elasticsearch",
        "access": "proxy",
        "database": "bazqux",
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Native probe
// ---------------------------------------------------------------------------

mod native_probe {
    use super::*;

    #[tokio::test]
    async fn healthy_native_response_is_passed_through() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "message": "Excellent!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.status, HealthStatus::Ok);
        assert_eq!(verdict.message, "Excellent!");
        assert_eq!(verdict.kind.as_deref(), Some("prometheus"));
        assert!(verdict.duration.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn unhealthy_native_response_keeps_server_message() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ERROR",
                "message": "scrape target down"
            })))
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Error);
        assert_eq!(verdict.message, "scrape target down");
    }

    #[tokio::test]
    async fn server_error_becomes_fatal_verdict_with_code_prefix() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("h8KkCLt7z")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/h8KkCLt7z/health"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "status": "ERROR",
                "message": "Something failed",
                "code": "foobar"
            })))
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("h8KkCLt7z")
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Fatal);
        assert_eq!(
            verdict.message,
            "[foobar] GrafanaServerError: Server Error 500: Something failed"
        );
    }

    #[tokio::test]
    async fn bad_request_becomes_structured_failure() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "ERROR",
                "message": "bad credentials"
            })))
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Error);
        assert_eq!(verdict.message, "bad credentials");
    }

    #[tokio::test]
    async fn teapot_surfaces_as_client_error() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(418).set_body_json(json!({"message": "I'm a teapot"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap_err();
        assert!(matches!(err, GrafanaError::Client { status: 418, .. }));
    }
}

// ---------------------------------------------------------------------------
// Version gating and fallback triggering
// ---------------------------------------------------------------------------

mod version_gating {
    use super::*;

    async fn mount_prometheus_query_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/ds/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"test": {"frames": []}}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn below_native_minimum_skips_native_probe() {
        let server = MockServer::start().await;
        mount_settings(&server, "8.5.27").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
            .expect(0)
            .mount(&server)
            .await;
        mount_prometheus_query_ok(&server).await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert!(verdict.success);
    }

    #[tokio::test]
    async fn exactly_at_native_minimum_tries_native_first() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.0").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "message": "native"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert_eq!(verdict.message, "native");
    }

    #[tokio::test]
    async fn native_404_falls_back_to_client_probe() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"message": "plugin has no health endpoint"})),
            )
            .mount(&server)
            .await;
        mount_prometheus_query_ok(&server).await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.status, HealthStatus::Ok);
    }

    #[tokio::test]
    async fn native_503_falls_back_to_client_probe() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        mount_prometheus_query_ok(&server).await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("39mf288en")
            .await
            .unwrap();
        assert!(verdict.success);
    }
}

// ---------------------------------------------------------------------------
// Resolution failures
// ---------------------------------------------------------------------------

mod resolution {
    use super::*;

    #[tokio::test]
    async fn resolver_404_becomes_error_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"message": "Data source not found"})),
            )
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("missing")
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Error);
        assert_eq!(verdict.message, "Data source not found");
        assert_eq!(verdict.kind, None);
        assert_eq!(verdict.duration, None);
    }

    #[tokio::test]
    async fn resolver_401_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/locked"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .datasources()
            .health_inquiry("locked")
            .await
            .unwrap_err();
        assert!(matches!(err, GrafanaError::Unauthorized { .. }));
    }
}

// ---------------------------------------------------------------------------
// Client-side probes (forced fallback)
// ---------------------------------------------------------------------------

mod client_probe {
    use super::*;

    #[tokio::test]
    async fn elasticsearch_mapping_probe_succeeds() {
        let server = MockServer::start().await;
        mount_settings(&server, "8.5.0").await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/proxy/44/bazqux/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bazqux": {"mappings": {"properties": "something"}}
            })))
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_check(&elasticsearch_descriptor())
            .await
            .unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.status, HealthStatus::Ok);
        assert_eq!(verdict.message, "Success");
        assert!(verdict.duration.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn elasticsearch_missing_mappings_is_key_error() {
        let server = MockServer::start().await;
        mount_settings(&server, "8.5.0").await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/proxy/44/bazqux/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bazqux": {}})))
            .mount(&server)
            .await;

        let verdict = client_for(&server)
            .datasources()
            .health_check(&elasticsearch_descriptor())
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Error);
        assert_eq!(verdict.message, "Invalid response. KeyError: 'mappings'");
    }

    #[tokio::test]
    async fn prometheus_dataframe_probe_reports_executed_query() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        Mock::given(method("POST"))
            .and(path("/api/ds/query"))
            .and(body_partial_json(json!({"queries": [{"expr": "1+1"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"test": {"frames": [
                    {"schema": {"meta": {"executedQueryString": "Expr: 1+1\nStep: 15s"}}}
                ]}}
            })))
            .mount(&server)
            .await;

        let ds: Datasource = serde_json::from_value(prometheus_descriptor("39mf288en")).unwrap();
        let verdict = client_for(&server)
            .datasources()
            .health_check(&ds)
            .await
            .unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.message, "Expr: 1+1\nStep: 15s");
    }

    #[tokio::test]
    async fn foreign_results_type_is_fatal() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        Mock::given(method("POST"))
            .and(path("/api/ds/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": "WRONG!"})),
            )
            .mount(&server)
            .await;

        let ds: Datasource = serde_json::from_value(json!({
            "id": 12,
            "uid": "pg1",
            "type": "postgres",
            "access": "server",
        }))
        .unwrap();
        let verdict = client_for(&server)
            .datasources()
            .health_check(&ds)
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Fatal);
        assert!(verdict.message.starts_with("FATAL: Unknown response type"));
    }

    #[tokio::test]
    async fn tempo_echo_probe_accepts_plain_text() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/proxy/9/api/echo"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("echo", "text/plain"))
            .mount(&server)
            .await;

        let ds: Datasource = serde_json::from_value(json!({
            "id": 9,
            "uid": "tempo1",
            "type": "tempo",
            "access": "proxy",
        }))
        .unwrap();
        let verdict = client_for(&server)
            .datasources()
            .health_check(&ds)
            .await
            .unwrap();
        assert!(verdict.success);
    }

    #[tokio::test]
    async fn loki_seven_x_uses_label_listing_probe() {
        let server = MockServer::start().await;
        mount_settings(&server, "7.5.0").await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/proxy/3/loki/api/v1/label"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": ["job", "instance"]
            })))
            .mount(&server)
            .await;

        let ds: Datasource = serde_json::from_value(json!({
            "id": 3,
            "uid": "loki1",
            "type": "loki",
            "access": "proxy",
        }))
        .unwrap();
        let verdict = client_for(&server)
            .datasources()
            .health_check(&ds)
            .await
            .unwrap();
        assert!(verdict.success);
    }

    #[tokio::test]
    async fn unknown_backend_kind_becomes_failure_verdict() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/acme1/health"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_descriptor(
            &server,
            json!({
                "id": 77,
                "uid": "acme1",
                "type": "acme-custom-datasource",
                "access": "proxy",
            }),
        )
        .await;

        let verdict = client_for(&server)
            .datasources()
            .health_inquiry("acme1")
            .await
            .unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.status, HealthStatus::Error);
        assert!(verdict.message.contains("not implemented"), "got: {}", verdict.message);
    }

    #[tokio::test]
    async fn query_failure_becomes_failure_verdict() {
        let server = MockServer::start().await;
        mount_settings(&server, "9.0.1").await;
        Mock::given(method("POST"))
            .and(path("/api/ds/query"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "no such table"})),
            )
            .mount(&server)
            .await;

        let ds: Datasource = serde_json::from_value(json!({
            "id": 12,
            "uid": "pg1",
            "type": "postgres",
            "access": "server",
        }))
        .unwrap();
        let verdict = client_for(&server)
            .datasources()
            .health_check(&ds)
            .await
            .unwrap();
        assert!(!verdict.success);
        assert!(verdict.message.contains("no such table"), "got: {}", verdict.message);
    }
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

mod idempotence {
    use super::*;

    #[tokio::test]
    async fn repeated_inquiries_share_one_build_info_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/frontend/settings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"buildInfo": {"version": "9.0.1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_descriptor(&server, prometheus_descriptor("39mf288en")).await;
        Mock::given(method("GET"))
            .and(path("/api/datasources/uid/39mf288en/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "message": "Excellent!"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.datasources().health_inquiry("39mf288en").await.unwrap();
        let second = client.datasources().health_inquiry("39mf288en").await.unwrap();
        assert!(first.success && second.success);
        assert_eq!(first.status, second.status);
        assert_eq!(first.message, second.message);
    }
}
