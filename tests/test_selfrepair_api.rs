// tests/test_selfrepair_api.rs


use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use test_helpers::{create_test_state, RecordingProvider, StubProbe, ADMIN_KEY};
use vigil::alert::Severity;
use vigil::server::create_router;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_unauthorized_request_never_reaches_probes() {
    let dir = tempfile::TempDir::new().unwrap();
    let probe = StubProbe::new(Severity::Ok);
    let app = create_router(create_test_state(
        dir.path(),
        probe.clone(),
        RecordingProvider::new(),
    ));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/selfrepair")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("access key"));
    assert_eq!(probe.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dry_run_reports_and_logs_with_fingerprint() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        RecordingProvider::new(),
    ));

    let response = app
        .clone()
        .oneshot(authed("POST", "/api/selfrepair?dryrun=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["report"]["mode"], "dry-run");
    assert_eq!(body["report"]["overall"], "ok");
    assert_eq!(body["fixes"]["dry_run"], true);

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/logs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    let entry = &body["entries"][0];
    assert_eq!(entry["source_address"], "203.0.113.7");
    // One-way fingerprint, never the raw credential.
    let fingerprint = entry["caller_key_fingerprint"].as_str().unwrap();
    assert_eq!(fingerprint.len(), 16);
    assert_ne!(fingerprint, ADMIN_KEY);
}

#[tokio::test]
async fn test_read_only_run_returns_no_fixes() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        RecordingProvider::new(),
    ));

    let response = app.oneshot(authed("POST", "/api/selfrepair")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["report"]["mode"], "read-only");
    assert!(body["fixes"].is_null());
}

#[tokio::test]
async fn test_logs_are_newest_first() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        RecordingProvider::new(),
    ));

    for _ in 0..2 {
        let response = app.clone().oneshot(authed("POST", "/api/selfrepair")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/logs"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    let first = body["entries"][0]["id"].as_i64().unwrap();
    let second = body["entries"][1]["id"].as_i64().unwrap();
    assert!(first > second);
}

#[tokio::test]
async fn test_cron_hourly_alerts_and_caches_on_failure() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = RecordingProvider::new();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Error),
        provider.clone(),
    ));

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/cron/hourly"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["hourly"]["overall"], "error");
    assert_eq!(body["hourly"]["alert"]["sent"], true);
    assert_eq!(provider.call_count(), 1);

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/alerts/last"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["alert"]["level"], "error");
    assert_eq!(body["alert"]["provider"], "recording");
}

#[tokio::test]
async fn test_healthy_hourly_updates_health_state_without_alert() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = RecordingProvider::new();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        provider.clone(),
    ));

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/cron/hourly"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.call_count(), 0);

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/health-state"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["health"]["level"], "ok");
    assert_eq!(body["health"]["message"], "everything looks good");
}

#[tokio::test]
async fn test_trend_defaults_to_seven_days() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        RecordingProvider::new(),
    ));

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/trend"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["days"], 7);
    assert_eq!(body["points"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_trend_rejects_out_of_range_days() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        RecordingProvider::new(),
    ));

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/selfrepair/trend?days=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("between 1 and 90"));

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/trend?days=91"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rollup_endpoint_reports_confidence() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = create_router(create_test_state(
        dir.path(),
        StubProbe::new(Severity::Ok),
        RecordingProvider::new(),
    ));

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/cron/hourly"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed("GET", "/api/selfrepair/rollup"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["rollup"]["this_week"]["total"], 1);
    assert_eq!(body["rollup"]["confidence"], 100);
}
