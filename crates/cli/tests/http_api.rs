use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use base64::Engine as _;
use chrono::{Duration, SecondsFormat, Utc};
use pretty_assertions::assert_eq;
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use scout_auth::{canonical_payload, SignatureVerifier};
use scout_cli::{router, HttpState, ToolEvent};
use scout_mcp::{MemoryAudit, ScoutConfig, ToolContext};
use scout_search::SearchEngine;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tower::ServiceExt;

fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

fn verifier() -> SignatureVerifier {
    let pem = private_key()
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    SignatureVerifier::from_pem(&pem).unwrap()
}

fn sign(method: &str, path: &str, timestamp: &str) -> String {
    let key = BlindedSigningKey::<Sha256>::new(private_key().clone());
    let signature = key.sign_with_rng(
        &mut OsRng,
        canonical_payload(method, path, timestamp).as_bytes(),
    );
    base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
}

fn timestamp(offset_secs: i64) -> String {
    (Utc::now() + Duration::seconds(offset_secs)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct Server {
    _tmp: TempDir,
    state: HttpState,
    audit: Arc<MemoryAudit>,
}

impl Server {
    fn app(&self) -> Router {
        router(self.state.clone())
    }
}

fn server_with(verifier: Option<SignatureVerifier>) -> Server {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("a")).unwrap();
    std::fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
    std::fs::write(tmp.path().join("a/b.txt"), "needle\n").unwrap();
    std::fs::write(tmp.path().join("node_modules/x.js"), "needle\n").unwrap();

    let config = ScoutConfig::for_workspace(tmp.path());
    let sandbox = Arc::new(config.sandbox().unwrap());
    let engine = SearchEngine::without_native_tool(Arc::clone(&sandbox));
    let audit = Arc::new(MemoryAudit::default());
    let tools = ToolContext::with_engine(config, sandbox, engine, audit.clone());
    Server {
        _tmp: tmp,
        state: HttpState::new(tools, verifier),
        audit,
    }
}

fn server() -> Server {
    server_with(Some(verifier()))
}

fn signed_request(method: &str, uri: &str, signed_path: &str, ts: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header("x-timestamp", ts)
        .header("x-signature", sign(method, signed_path, ts))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn signed_post(uri: &str, body: Value) -> Request<Body> {
    signed_request("POST", uri, uri, &timestamp(0), body)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let server = server();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(server.app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn unsigned_tool_call_is_rejected_before_dispatch() {
    let server = server();
    let request = Request::builder()
        .method("POST")
        .uri("/api/tools/repo_list")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(server.app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Missing authentication headers" }));
    assert!(server.audit.entries().is_empty());
}

#[tokio::test]
async fn signed_search_returns_only_sandboxed_matches() {
    let server = server();
    let (status, body) = send(
        server.app(),
        signed_post("/api/tools/code_search", json!({ "query": "needle" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert!(matches[0]["path"].as_str().unwrap().ends_with("a/b.txt"));
    assert_eq!(server.audit.entries().len(), 1);
}

#[tokio::test]
async fn stale_and_future_timestamps_are_expired() {
    let server = server();
    for offset in [-61, 61] {
        let ts = timestamp(offset);
        let request = signed_request(
            "POST",
            "/api/tools/repo_list",
            "/api/tools/repo_list",
            &ts,
            json!({}),
        );
        let (status, body) = send(server.app(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "offset {offset}");
        assert_eq!(body, json!({ "error": "Request expired or timestamp invalid" }));
    }
}

#[tokio::test]
async fn signature_for_another_path_is_invalid() {
    let server = server();
    let request = signed_request(
        "POST",
        "/api/tools/file_read",
        "/api/tools/repo_list",
        &timestamp(0),
        json!({ "path": "a/b.txt" }),
    );
    let (status, body) = send(server.app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Invalid signature" }));
}

#[tokio::test]
async fn query_string_is_part_of_the_signed_path() {
    let server = server();
    let (status, _) = send(
        server.app(),
        signed_post("/api/tools/repo_list?verbose=1", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let request = signed_request(
        "POST",
        "/api/tools/repo_list?verbose=1",
        "/api/tools/repo_list",
        &timestamp(0),
        json!({}),
    );
    let (status, _) = send(server.app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tool_errors_use_envelopes_and_status_codes() {
    let server = server();
    let (status, body) = send(
        server.app(),
        signed_post("/api/tools/file_read", json!({ "path": "../etc/passwd" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "access_denied");

    let (status, body) = send(server.app(), signed_post("/api/tools/nope", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(
        server.app(),
        signed_post("/api/tools/code_search", json!({ "query": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn missing_public_key_is_a_server_error() {
    let server = server_with(None);
    let (status, body) = send(
        server.app(),
        signed_post("/api/tools/repo_list", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Server authentication is not configured" })
    );
}

#[tokio::test]
async fn tool_calls_are_published_to_stream_subscribers() {
    let server = server();
    let mut events = server.state.hub().subscribe();

    send(server.app(), signed_post("/api/tools/repo_list", json!({}))).await;
    send(
        server.app(),
        signed_post("/api/tools/file_read", json!({ "path": "missing.txt" })),
    )
    .await;

    assert_eq!(
        events.recv().await.unwrap(),
        ToolEvent {
            tool: "repo_list".to_string(),
            result_count: 1,
            is_error: false,
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        ToolEvent {
            tool: "file_read".to_string(),
            result_count: 0,
            is_error: true,
        }
    );
}

#[tokio::test]
async fn event_stream_requires_a_signature_and_speaks_sse() {
    let server = server();
    let unsigned = Request::builder()
        .uri("/api/stream")
        .body(Body::empty())
        .unwrap();
    let response = server.app().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let ts = timestamp(0);
    let signed = Request::builder()
        .uri("/api/stream")
        .header("x-timestamp", &ts)
        .header("x-signature", sign("GET", "/api/stream", &ts))
        .body(Body::empty())
        .unwrap();
    let response = server.app().oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );
}
