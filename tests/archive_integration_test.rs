// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! `POST /avalie?zip=1` streams the analysis as a ZIP archive.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use seo_gateway::app::{create_router, AppState};
use seo_gateway::config::ProxyConfig;
use seo_gateway::services::orchestrator::Orchestrator;
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipArchive;

async fn engine_with(payload: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(&server)
        .await;
    server
}

fn gateway(server: &MockServer) -> Router {
    let config = ProxyConfig::new(format!("{}/analyze", server.uri()));
    let orchestrator = Orchestrator::from_config(Arc::new(config)).unwrap();
    create_router(AppState::new(orchestrator))
}

fn analyze_request(query: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/avalie{query}"))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"url":"https://example.com"}"#))
        .unwrap()
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut entry = archive.by_name(name).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

#[tokio::test]
async fn test_zip_download() {
    let server = engine_with(json!({
        "summary": "Resumo da pagina",
        "files": [{"filename": "a.json", "data": {"x": 1}}]
    }))
    .await;

    let response = gateway(&server)
        .oneshot(analyze_request("?zip=1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/zip");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"analysis.zip\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();

    let names: Vec<&str> = archive.file_names().collect();
    assert_eq!(names.len(), 3);
    for expected in ["content.txt", "engineResponse.json", "a.json"] {
        assert!(names.contains(&expected), "missing {expected}");
    }

    assert_eq!(read_entry(&mut archive, "content.txt"), "Resumo da pagina");
    assert_eq!(
        read_entry(&mut archive, "a.json"),
        serde_json::to_string_pretty(&json!({"x": 1})).unwrap()
    );

    let payload: Value =
        serde_json::from_str(&read_entry(&mut archive, "engineResponse.json")).unwrap();
    assert_eq!(payload["summary"], "Resumo da pagina");
}

#[tokio::test]
async fn test_zip_true_is_accepted() {
    let server = engine_with(json!({"summary": "S"})).await;

    let response = gateway(&server)
        .oneshot(analyze_request("?zip=true"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/zip");
}

#[tokio::test]
async fn test_other_zip_values_return_json() {
    let server = engine_with(json!({"summary": "S"})).await;

    let response = gateway(&server)
        .oneshot(analyze_request("?zip=0"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_zip_errors_stay_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let response = gateway(&server)
        .oneshot(analyze_request("?zip=1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_repeated_zip_parameter_returns_json() {
    let server = engine_with(json!({"summary": "S"})).await;

    let response = gateway(&server)
        .oneshot(analyze_request("?zip=1&zip=true"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["content"], "S");
}
