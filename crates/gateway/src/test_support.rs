//! Router fixtures: in-memory database, file store and notifier

use crate::{create_router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use ideabox_common::{
    auth::{hash_password, SessionManager},
    config::{AppConfig, CategorySeed},
    db::models::ModeratorActiveModel,
    db::{schema, seed},
    notify::MemoryNotifier,
    storage::MemoryFileStore,
    DbPool,
};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Moderator allowed to manage categories
pub const MANAGER: &str = "olga";
/// Moderator without the category capability
pub const MODERATOR: &str = "ivan";
pub const PASSWORD: &str = "correct horse";

pub const BOUNDARY: &str = "ideabox-test-boundary";

pub struct TestContext {
    pub state: AppState,
    pub store: MemoryFileStore,
    pub notifier: MemoryNotifier,
}

impl TestContext {
    /// Two moderators and the categories "Общее" and "Транспорт"
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.listing.page_size = 2;
        config.bootstrap.categories = ["Общее", "Транспорт"]
            .into_iter()
            .map(|name| CategorySeed {
                name: name.to_string(),
                description: None,
            })
            .collect();

        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opts).await.unwrap();
        schema::create_tables(&conn).await.unwrap();
        let db = DbPool::from_connection(conn);

        seed::bootstrap(&db, &config.bootstrap).await.unwrap();

        let password_hash = hash_password(PASSWORD).unwrap();
        for (username, can_manage) in [(MANAGER, true), (MODERATOR, false)] {
            ModeratorActiveModel {
                username: Set(username.to_string()),
                password_hash: Set(password_hash.clone()),
                first_name: Set(username.to_uppercase()),
                last_name: Set("Test".to_string()),
                is_super_moderator: Set(false),
                can_manage_categories: Set(can_manage),
                ..Default::default()
            }
            .insert(db.conn())
            .await
            .unwrap();
        }

        let store = MemoryFileStore::new();
        let notifier = MemoryNotifier::new();
        let sessions = SessionManager::new(b"gateway-test-secret", &config.auth);

        let state = AppState::new(
            Arc::new(config),
            db,
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
            sessions,
        );

        Self {
            state,
            store,
            notifier,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// `Cookie` header value for a logged-in moderator
    pub async fn session_cookie(&self, username: &str) -> String {
        let moderator = self
            .state
            .repo
            .find_moderator_by_username(username)
            .await
            .unwrap()
            .unwrap();
        let token = self.state.sessions.issue(moderator.id).unwrap();
        format!("{}={}", self.state.sessions.cookie_name(), token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    /// Send and decode a JSON body
    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

/// JSON request, optionally carrying a session cookie
pub fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Multipart body from text fields and `(field, filename, bytes)` files
pub fn multipart_body<S: AsRef<str>>(fields: &[(&str, S)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        let value = value.as_ref();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// Valid submission fields for the given title
pub fn submission_fields(title: &str) -> Vec<(&'static str, String)> {
    vec![
        ("title", title.to_string()),
        ("essence", "Не хватает мест для велосипедов".to_string()),
        ("solution", "Поставить стойки у входа".to_string()),
        ("author_name", "Иван".to_string()),
        ("contact_email", "ivan@example.com".to_string()),
        ("category", "Транспорт".to_string()),
    ]
}
