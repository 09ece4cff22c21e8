#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vault_api::auth::{AppState, AppStateInner};
use vault_api::identity::IdentityMode;
use vault_api::router;
use vault_db::{Database, MemoryStore, ScriptRepository};

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn state_with_memory(mode: IdentityMode) -> AppState {
    let store = Arc::new(MemoryStore::new());
    Arc::new(AppStateInner {
        scripts: ScriptRepository::new(store.clone()),
        users: store,
        jwt_secret: TEST_SECRET.into(),
        token_ttl_days: 1,
        identity_mode: mode,
        ping_message: "ping".into(),
    })
}

pub fn state_with_sqlite(mode: IdentityMode) -> AppState {
    let db = Arc::new(Database::open_in_memory().expect("in-memory sqlite"));
    Arc::new(AppStateInner {
        scripts: ScriptRepository::new(db.clone()),
        users: db,
        jwt_secret: TEST_SECRET.into(),
        token_ttl_days: 1,
        identity_mode: mode,
        ping_message: "ping".into(),
    })
}

pub fn app(mode: IdentityMode) -> Router {
    router(state_with_memory(mode))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("response body is UTF-8")
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(req).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("valid request")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Protect a script under an asserted owner and return its id.
pub async fn protect_as(app: &Router, owner: &str, name: &str, code: &str) -> String {
    let res = send(
        app,
        json_request(
            Method::POST,
            "/api/protect",
            None,
            serde_json::json!({ "code": code, "owner": owner, "name": name }),
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "protect failed: {}", res.text());
    res.json()["scriptId"].as_str().expect("scriptId").to_string()
}

/// Sign up and return (user id, token).
pub async fn signup(app: &Router, email: &str, username: &str) -> (String, String) {
    let res = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            serde_json::json!({ "email": email, "username": username, "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "signup failed: {}", res.text());
    let body = res.json();
    (
        body["user"]["id"].as_str().expect("user id").to_string(),
        body["token"].as_str().expect("token").to_string(),
    )
}
