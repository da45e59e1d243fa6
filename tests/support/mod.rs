// Stub upstream servers for the Google and Firebase clients.
#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const API_KEY: &str = "test-api-key";

// Bind an ephemeral port so tests never collide with local services.
pub async fn bind() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    (listener, format!("http://{addr}"))
}

pub fn serve(listener: tokio::net::TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server failed");
    });
}

#[derive(Clone, Default)]
pub struct StubLog {
    pub discovery_hits: Arc<Mutex<usize>>,
    pub exchange_bodies: Arc<Mutex<Vec<Value>>>,
    pub exchange_keys: Arc<Mutex<Vec<Option<String>>>>,
}

impl StubLog {
    pub fn discovery_hits(&self) -> usize {
        *self.discovery_hits.lock().expect("log mutex poisoned")
    }

    pub fn exchange_bodies(&self) -> Vec<Value> {
        self.exchange_bodies.lock().expect("log mutex poisoned").clone()
    }

    pub fn exchange_keys(&self) -> Vec<Option<String>> {
        self.exchange_keys.lock().expect("log mutex poisoned").clone()
    }
}

#[derive(Clone)]
struct StubState {
    base_url: String,
    log: StubLog,
    identities: Arc<HashMap<String, Value>>,
}

#[derive(Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

async fn discovery(State(state): State<StubState>) -> Json<Value> {
    *state.log.discovery_hits.lock().expect("log mutex poisoned") += 1;
    Json(json!({
        "issuer": "https://accounts.google.com",
        "authorization_endpoint": format!("{}/o/oauth2/v2/auth", state.base_url),
    }))
}

async fn sign_in_with_idp(
    State(state): State<StubState>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state
        .log
        .exchange_bodies
        .lock()
        .expect("log mutex poisoned")
        .push(body.clone());
    state
        .log
        .exchange_keys
        .lock()
        .expect("log mutex poisoned")
        .push(query.key.clone());

    if query.key.as_deref() != Some(API_KEY) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": "API_KEY_INVALID" } })),
        );
    }

    let token = body["postBody"]
        .as_str()
        .and_then(|post_body| {
            url::form_urlencoded::parse(post_body.as_bytes())
                .find(|(key, _)| key == "id_token")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default();

    match state.identities.get(&token) {
        Some(user) => (StatusCode::OK, Json(user.clone())),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": "INVALID_IDP_RESPONSE" } })),
        ),
    }
}

// Serves both the discovery document and `accounts:signInWithIdp`.
pub async fn spawn_upstream(identities: HashMap<String, Value>) -> (String, StubLog) {
    let (listener, base_url) = bind().await;
    let log = StubLog::default();
    let state = StubState {
        base_url: base_url.clone(),
        log: log.clone(),
        identities: Arc::new(identities),
    };
    let app = Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/v1/accounts:signInWithIdp", post(sign_in_with_idp))
        .with_state(state);
    serve(listener, app);
    (base_url, log)
}

// Upstream that fails every request with the given status.
pub async fn spawn_failing_upstream(status: StatusCode) -> String {
    let (listener, base_url) = bind().await;
    let app = Router::new().fallback(move || async move { (status, "upstream down") });
    serve(listener, app);
    base_url
}

pub fn ana() -> HashMap<String, Value> {
    HashMap::from([(
        "tok-1".to_string(),
        json!({
            "localId": "u1",
            "displayName": "Ana",
            "idToken": "firebase-id-token",
            "refreshToken": "firebase-refresh-token",
            "providerId": "google.com"
        }),
    )])
}
