#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use inquiry_desk::{
    AppState,
    audit::{AuditEntry, AuditQuery},
    auth::{AdminCredentials, AdminIdentity, PasswordSecret, TokenSettings},
    build_router,
    inquiries::{Inquiry, InquiryPage, ListQuery, ValidInquiry},
    notify::{DynNotifier, NoopNotifier, Notifier, NotifyError},
    store::{Audited, DynInquiryStore, InquiryStore, MemoryInquiryStore, StoreError},
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "s3cret-pass";
pub const TOKEN_SECRET: &[u8] = b"integration-secret";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryInquiryStore>,
}

pub fn tokens() -> TokenSettings {
    TokenSettings::new(TOKEN_SECRET.to_vec())
}

fn credentials() -> AdminCredentials {
    AdminCredentials::new(ADMIN_USERNAME, PasswordSecret::Plain(ADMIN_PASSWORD.to_string()))
}

pub fn app_with_notifier(notifier: DynNotifier) -> TestApp {
    let store = Arc::new(MemoryInquiryStore::new());
    let state = AppState::from_parts(store.clone(), notifier, credentials(), tokens());
    TestApp {
        router: build_router(state),
        store,
    }
}

pub fn app() -> TestApp {
    app_with_notifier(Arc::new(NoopNotifier))
}

pub fn app_with_store(store: DynInquiryStore) -> Router {
    let state = AppState::from_parts(store, Arc::new(NoopNotifier), credentials(), tokens());
    build_router(state)
}

pub fn app_with_cors(origins: &str) -> Router {
    let store = Arc::new(MemoryInquiryStore::new());
    let state = AppState::from_parts(store, Arc::new(NoopNotifier), credentials(), tokens())
        .with_cors_origins(origins);
    build_router(state)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

pub async fn read_body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub async fn read_json(response: Response) -> Value {
    let body = read_body(response).await;
    serde_json::from_slice(&body).expect("json payload")
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request builds")
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub fn inquiry_body(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "location": "Ibadan",
        "message": "Please send pricing for a two-storey build.",
    })
}

pub async fn submit(router: &Router, name: &str, email: &str) -> Value {
    let response = send(
        router,
        json_request("POST", "/inquiries", None, &inquiry_body(name, email)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

pub async fn login(router: &Router) -> String {
    let response = send(
        router,
        json_request(
            "POST",
            "/admin/login",
            None,
            &json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    body["token"].as_str().expect("token string").to_string()
}

/// Every inquiry currently held by `store`, newest first.
pub async fn stored(store: &MemoryInquiryStore) -> Vec<Inquiry> {
    store.stream_all().try_collect().await.expect("read stored inquiries")
}

pub fn token_issued_at(issued_at: DateTime<Utc>) -> String {
    tokens()
        .issue(&AdminIdentity::new(ADMIN_USERNAME), issued_at)
        .expect("issue token")
        .token
}

/// Forwards every notification to a channel, optionally failing afterwards.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<i64>,
    fail: bool,
}

impl ChannelNotifier {
    pub fn new(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<i64>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender, fail }), receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn inquiry_received(&self, inquiry: &Inquiry) -> Result<(), NotifyError> {
        let _ = self.sender.send(inquiry.id);
        if self.fail {
            return Err(NotifyError::Unavailable("relay offline".to_string()));
        }
        Ok(())
    }
}

/// A store whose backend is always down.
pub struct UnavailableStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl InquiryStore for UnavailableStore {
    async fn create(&self, _fields: &ValidInquiry) -> Result<Inquiry, StoreError> {
        Err(down())
    }

    async fn list(&self, _query: &ListQuery) -> Result<InquiryPage, StoreError> {
        Err(down())
    }

    async fn get(&self, _id: i64) -> Result<Inquiry, StoreError> {
        Err(down())
    }

    async fn update(
        &self,
        _id: i64,
        _fields: &ValidInquiry,
        _admin: &AdminIdentity,
    ) -> Result<Audited<Inquiry>, StoreError> {
        Err(down())
    }

    async fn delete(
        &self,
        _id: i64,
        _admin: &AdminIdentity,
    ) -> Result<Audited<Inquiry>, StoreError> {
        Err(down())
    }

    fn stream_all(&self) -> BoxStream<'_, Result<Inquiry, StoreError>> {
        stream::iter([Err(down())]).boxed()
    }

    async fn audit_entries(&self, _query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        Err(down())
    }
}
