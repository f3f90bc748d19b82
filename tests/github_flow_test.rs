use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::path::PathBuf;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pageforge::github::GitHubClient;
use pageforge::llm::LlmClient;
use pageforge::session::SessionState;
use pageforge::web_server::{build_router, AppState};

fn test_server(github_base: &str, session: SessionState, session_file: PathBuf) -> TestServer {
    let llm = LlmClient::new(
        format!("{}/v1/chat/completions", github_base),
        "test-key".to_string(),
        "gpt-3.5-turbo".to_string(),
    );
    let github = GitHubClient::new(
        github_base.to_string(),
        format!("{}/login", github_base),
        "test-client-id".to_string(),
        "test-client-secret".to_string(),
        "http://localhost:8700/auth/github/callback".to_string(),
    );
    let state = AppState::new(session, session_file, llm, github).unwrap();
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn test_auth_redirects_to_authorize_url() {
    let mock = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(
        &mock.uri(),
        SessionState::default(),
        dir.path().join("session.json"),
    );

    let response = server.get("/auth/github").await;
    assert_eq!(response.status_code(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.header("location");
    let location = location.to_str().unwrap();
    assert!(location.contains("/login/oauth/authorize"));
    assert!(location.contains("client_id=test-client-id"));
    assert!(location.contains("scope=repo"));
}

#[tokio::test]
async fn test_auth_without_configuration_fails() {
    let mock = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let llm = LlmClient::new(
        format!("{}/v1/chat/completions", mock.uri()),
        "test-key".to_string(),
        "gpt-3.5-turbo".to_string(),
    );
    let github = GitHubClient::new(
        mock.uri(),
        format!("{}/login", mock.uri()),
        String::new(),
        String::new(),
        String::new(),
    );
    let state = AppState::new(
        SessionState::default(),
        dir.path().join("session.json"),
        llm,
        github,
    )
    .unwrap();
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server.get("/auth/github").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "GitHub client configuration missing");
}

#[tokio::test]
async fn test_callback_without_code_is_rejected() {
    let mock = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(
        &mock.uri(),
        SessionState::default(),
        dir.path().join("session.json"),
    );

    let response = server.get("/auth/github/callback").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "no code provided");
}

#[tokio::test]
async fn test_callback_exchanges_code_and_stores_token() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_partial_json(json!({
            "client_id": "test-client-id",
            "code": "oauth-code-123",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_testtoken",
            "token_type": "bearer",
            "scope": "repo",
        })))
        .mount(&mock)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    let server = test_server(&mock.uri(), SessionState::default(), session_file.clone());

    let response = server
        .get("/auth/github/callback")
        .add_query_param("code", "oauth-code-123")
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location").to_str().unwrap(), "/");

    // The token lives in the server-side session, not in the redirect.
    let saved = SessionState::load(&session_file).unwrap();
    assert_eq!(saved.github_token.as_deref(), Some("gho_testtoken"));
}

#[tokio::test]
async fn test_callback_with_rejected_code_fails() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code"
        })))
        .mount(&mock)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(
        &mock.uri(),
        SessionState::default(),
        dir.path().join("session.json"),
    );

    let response = server
        .get("/auth/github/callback")
        .add_query_param("code", "stale")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "failed to exchange code for token");
}

#[tokio::test]
async fn test_export_without_token_is_unauthorized() {
    let mock = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(
        &mock.uri(),
        SessionState::default(),
        dir.path().join("session.json"),
    );

    let response = server.post("/api/github/export").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "GitHub token not provided");
}

#[test_log::test(tokio::test)]
async fn test_export_creates_repository_with_files() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .and(body_partial_json(json!({
            "description": "Generated using AI Code Generator",
            "private": false,
            "auto_init": true,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "ai-generated-code-1",
            "html_url": "https://github.com/me/ai-generated-code-1",
            "owner": { "login": "me" },
        })))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(
            r"^/repos/me/ai-generated-code-1/contents/.+$",
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "content": { "path": "x" }
        })))
        .expect(4) // index.html, styles.css, script.js, README.md
        .mount(&mock)
        .await;

    let mut session = SessionState::default();
    session.code.markup = "<h1>Hello</h1>".to_string();
    session.code.stylesheet = "h1{color:red}".to_string();
    session.code.script = "console.log('hi');".to_string();
    session.github_token = Some("gho_testtoken".to_string());
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(&mock.uri(), session, dir.path().join("session.json"));

    let response = server.post("/api/github/export").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["url"], "https://github.com/me/ai-generated-code-1");
    assert_eq!(body["message"], "Repository created successfully");
}

#[tokio::test]
async fn test_export_failure_surfaces_generic_error() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
        .mount(&mock)
        .await;

    let mut session = SessionState::default();
    session.github_token = Some("gho_testtoken".to_string());
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(&mock.uri(), session, dir.path().join("session.json"));

    let response = server.post("/api/github/export").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "failed to create repository");
}
