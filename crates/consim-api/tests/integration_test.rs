use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use consim_api::{build_router, config::Config, state::AppState};
use consim_dialogue::{Character, Choice, DialogueController, DialogueGraph, DialogueNode};

fn test_config(provider: &str) -> Config {
    let toml = format!(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0

        [cors]
        enabled = false
        origins = []

        [generation]
        provider = "{provider}"
        timeout_secs = 5

        [dialogue]
        graph_path = "data/dialogue_graph.json"
        start_node = "M1-01"

        [logging]
        level = "warn"
        format = "pretty"
    "#
    );
    toml::from_str(&toml).unwrap()
}

fn test_node(character: Character, goal: &str, examples: &[&str], next: &str) -> DialogueNode {
    DialogueNode {
        character,
        goal: goal.to_string(),
        examples: examples.iter().map(|s| s.to_string()).collect(),
        choices: vec![Choice {
            text: None,
            next_node: next.to_string(),
        }],
    }
}

fn test_app() -> axum::Router {
    test_app_with_provider("gemini")
}

fn test_app_with_provider(provider: &str) -> axum::Router {
    let mut nodes = HashMap::new();
    nodes.insert(
        "M1-01".to_string(),
        test_node(Character::Counselor, "open the session", &["Hello, please sit down."], "M1-02"),
    );
    nodes.insert(
        "M1-02".to_string(),
        test_node(Character::Client, "respond to the greeting", &["Thank you."], "END"),
    );
    let graph = Arc::new(DialogueGraph::from_nodes(nodes));
    let state = AppState::new(test_config(provider), DialogueController::new(graph));
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_with_sid(uri: &str, body: Value, sid: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("sid={}", sid))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn missing_session_cookie_is_minted() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("sid="));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn existing_session_cookie_is_kept() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::COOKIE, "sid=existing-session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn start_returns_opening_node() {
    let app = test_app();
    let response = app
        .oneshot(post_json("/start", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["node_info"]["id"], "M1-01");
    assert_eq!(body["node_info"]["options"][0], "Hello, please sit down.");
}

#[tokio::test]
async fn start_with_unknown_node_is_404() {
    let app = test_app();
    let response = app
        .oneshot(post_json("/start", json!({"node_id": "Z-99"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Z-99"));
}

#[tokio::test]
async fn start_twice_with_same_sid_resumes() {
    let app = test_app();

    let first = app
        .clone()
        .oneshot(post_json_with_sid("/start", json!({}), "s-resume"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json_with_sid("/start", json!({}), "s-resume"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body = body_json(second).await;
    assert_eq!(body["resuming"], true);
    assert!(body["history"].is_array());
}

#[tokio::test]
async fn counselor_turn_requires_active_dialogue() {
    let app = test_app();
    let response = app
        .oneshot(post_json("/counselor_turn", json!({"dialogue": "hi"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn counselor_turn_rejects_empty_dialogue() {
    let app = test_app();

    app.clone()
        .oneshot(post_json_with_sid("/start", json!({}), "s-turn"))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json_with_sid("/counselor_turn", json!({"dialogue": "   "}), "s-turn"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn counselor_turn_records_line() {
    let app = test_app();

    app.clone()
        .oneshot(post_json_with_sid("/start", json!({}), "s-line"))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json_with_sid(
            "/counselor_turn",
            json!({"dialogue": "Hello, please sit down."}),
            "s-line",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["speaker"], "counselor");
    assert_eq!(body["dialogue"], "Hello, please sit down.");
    assert_eq!(body["node_info"]["id"], "M1-01");
}

#[tokio::test]
async fn generation_without_any_key_reports_need_api_key() {
    // A provider tag with no key source resolves to no default client,
    // so generation fails with the retry hint. The unknown tag keeps the
    // test independent of whatever keys the host environment carries.
    let app = test_app_with_provider("unconfigured");

    app.clone()
        .oneshot(post_json_with_sid("/start", json!({}), "s-nokey"))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json_with_sid(
            "/counselor_turn",
            json!({"dialogue": "Hello"}),
            "s-nokey",
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json_with_sid("/generate_client_response", json!({}), "s-nokey"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["need_api_key"], true);
}

#[tokio::test]
async fn provider_catalog_lists_all_providers() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/get_api_providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 4);
    let ids: Vec<&str> = providers
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"gemini"));
    assert!(ids.contains(&"siliconflow"));
    assert_eq!(body["current"], "gemini");
}

#[tokio::test]
async fn set_api_key_rejects_empty_key() {
    let app = test_app();
    let response = app
        .oneshot(post_json("/set_api_key", json!({"api_key": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn set_api_key_switches_session_provider() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post_json_with_sid(
            "/set_api_key",
            json!({"api_key": "sk-test", "provider": "siliconflow"}),
            "s-override",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["provider"], "siliconflow");

    let catalog = app
        .oneshot(
            Request::builder()
                .uri("/get_api_providers")
                .header(header::COOKIE, "sid=s-override")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(catalog).await;
    assert_eq!(body["current"], "siliconflow");
}

#[tokio::test]
async fn test_api_key_rejects_unknown_provider() {
    let app = test_app();
    let response = app
        .oneshot(post_json(
            "/test_api_key",
            json!({"api_key": "sk-test", "provider": "acme-llm"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
