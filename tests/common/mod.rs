#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use diagana_school_backend::config::AppConfig;
use diagana_school_backend::entities::registration_keys;
use diagana_school_backend::infrastructure::database;
use diagana_school_backend::services::storage::StorageService;
use diagana_school_backend::{AppState, create_app};
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub struct MockStorageService;

#[async_trait::async_trait]
impl StorageService for MockStorageService {
    async fn upload_file(&self, _key: &str, _data: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn delete_file(&self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn presigned_url(&self, key: &str, _expires_in_secs: u64) -> anyhow::Result<String> {
        Ok(format!("https://storage.test/{}", key))
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

pub async fn setup_app() -> (Router, DatabaseConnection) {
    let db = setup_test_db().await;
    let state = AppState::new(
        db.clone(),
        Arc::new(MockStorageService),
        AppConfig::development(),
    );
    (create_app(state), db)
}

pub async fn seed_key(db: &DatabaseConnection, key_value: &str, role: &str) {
    registration_keys::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        key_value: Set(key_value.to_string()),
        role: Set(role.to_string()),
        is_used: Set(false),
        used_by: Set(None),
        used_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Seeds a fresh key, registers a user against it and returns (user_id, token).
pub async fn register_user(
    app: &Router,
    db: &DatabaseConnection,
    email: &str,
    role: &str,
) -> (String, String) {
    let key_value = format!("KEY_{}", Uuid::new_v4());
    seed_key(db, &key_value, role).await;

    let mut payload = json!({
        "keyValue": key_value,
        "email": email,
        "password": "motdepasse123",
        "nom": "Diagana",
        "prenom": "Test",
    });
    if role == "eleve" {
        payload["classe"] = json!("3ème A");
    } else {
        payload["matiere"] = json!("Mathématiques");
    }

    let (status, body) = send_json(app, "POST", "/api/auth/register", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

pub const MULTIPART_BOUNDARY: &str = "---------------------------9f3a1c2b7d5e";

/// Builds a multipart body from (name, value) text fields plus an optional
/// (filename, content_type, bytes) file part.
pub fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn send_multipart(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Creates a public link-type ressource and returns its id.
pub async fn create_ressource(app: &Router, token: &str, titre: &str, is_public: bool) -> String {
    let public = if is_public { "true" } else { "false" };
    let body = multipart_body(
        &[
            ("titre", titre),
            ("type", "lien"),
            ("contenu", r#"{"url": "https://exemple.fr/cours"}"#),
            ("is_public", public),
        ],
        None,
    );
    let (status, json) = send_multipart(app, "POST", "/api/ressources", token, body).await;
    assert_eq!(status, StatusCode::CREATED, "create ressource failed: {}", json);
    json["data"]["id"].as_str().unwrap().to_string()
}
