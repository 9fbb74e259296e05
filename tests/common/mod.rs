#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use plant_registry::config::AppConfig;
use plant_registry::entities::users::{self, Role};
use plant_registry::infrastructure::database;
use plant_registry::services::accounts::{AccountService, NewAccount};
use plant_registry::services::storage::{LocalFolderStorage, StorageService};
use plant_registry::{AppState, create_app};
use sea_orm::Database;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----plant-registry-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::development()).await
    }

    pub async fn with_config(mut config: AppConfig) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        config.uploads_dir = uploads.path().to_path_buf();

        let storage: Arc<dyn StorageService> = Arc::new(LocalFolderStorage::new(
            uploads.path(),
            config.max_files_per_folder,
            config.max_storage_folders,
        ));
        Self::with_storage(config, storage, uploads).await
    }

    pub async fn with_storage(
        config: AppConfig,
        storage: Arc<dyn StorageService>,
        uploads: TempDir,
    ) -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        database::run_migrations(&db).await.unwrap();

        Self {
            state: AppState::new(db, storage, config),
            uploads,
        }
    }

    pub fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    /// Creates an account whose password is its TE ID (the default).
    pub async fn account(&self, username: &str, role: Role, plant: &str) -> users::Model {
        AccountService::create(
            &self.state.db,
            NewAccount {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                full_name: format!("{} Admin", username),
                te_id: format!("TE-{}", username),
                plant: plant.to_string(),
                role,
                password: None,
            },
        )
        .await
        .unwrap()
    }

    pub fn token(&self, user: &users::Model) -> String {
        self.state.credentials.issue_token(user).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> axum::response::Response {
        self.app().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub struct Upload<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub data: &'a [u8],
}

pub fn multipart(fields: &[(&str, &str)], files: &[Upload<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY, file.field, file.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn submission_fields<'a>(plant: &'a str, cin: &'a str, grey_card: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("first_name", "Jane"),
        ("last_name", "Doe"),
        ("cin", cin),
        ("te_id", "TE100"),
        ("date_of_birth", "1990-01-01"),
        ("grey_card_number", grey_card),
        ("plant", plant),
    ]
}

pub fn standard_files() -> Vec<Upload<'static>> {
    vec![
        Upload {
            field: "cin_file",
            filename: "AB123.jpg",
            data: b"cin-bytes",
        },
        Upload {
            field: "picture_file",
            filename: "AB123_i.png",
            data: b"picture-bytes",
        },
        Upload {
            field: "grey_card_file",
            filename: "123-A-456.jpeg",
            data: b"grey-card-bytes",
        },
    ]
}

pub fn submission_request(token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submissions")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Posts a valid submission for `plant` and returns its id.
pub async fn submit(app: &TestApp, token: &str, plant: &str) -> i64 {
    let body = multipart(&submission_fields(plant, "AB123", "123-A-456"), &standard_files());
    let (status, json) = app.send(submission_request(token, body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    json["id"].as_i64().unwrap()
}

pub fn count_files(root: &std::path::Path) -> usize {
    let mut count = 0;
    if let Ok(entries) = std::fs::read_dir(root) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                count += count_files(&path);
            } else {
                count += 1;
            }
        }
    }
    count
}
