mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TestApp, get, json};
use plant_registry::entities::users::Role;
use serde_json::{Value, json};

fn new_user(username: &str, email: &str, te_id: &str) -> Value {
    json!({
        "username": username,
        "email": email,
        "full_name": "Test User",
        "te_id": te_id,
        "plant": "P1"
    })
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_account_management_requires_super_admin() {
    let app = TestApp::new().await;
    let regular = app.account("reg", Role::RegularAdmin, "P1").await;
    let token = app.token(&regular);

    let (status, body) = app.send(get("/admin/users", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not enough permissions");

    let (status, _) = app
        .send(json(
            "POST",
            "/admin/users",
            Some(&token),
            new_user("x", "x@example.com", "TX"),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_defaults_and_duplicates() {
    let app = TestApp::new().await;
    let root = app.account("root", Role::SuperAdmin, "HQ").await;
    let token = app.token(&root);

    let (status, body) = app
        .send(json(
            "POST",
            "/admin/users",
            Some(&token),
            new_user("u1", "u1@example.com", "T1"),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role"], "regular_admin");
    assert_eq!(body["is_active"], true);
    assert!(body["updated_at"].is_null());

    for duplicate in [
        new_user("u1", "other@example.com", "T2"),
        new_user("u2", "u1@example.com", "T2"),
        new_user("u2", "u2@example.com", "T1"),
    ] {
        let (status, body) = app
            .send(json("POST", "/admin/users", Some(&token), duplicate))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username, email, or TE ID already registered");
    }
}

#[tokio::test]
async fn test_create_rejects_invalid_fields() {
    let app = TestApp::new().await;
    let root = app.account("root", Role::SuperAdmin, "HQ").await;
    let token = app.token(&root);

    let (status, _) = app
        .send(json(
            "POST",
            "/admin/users",
            Some(&token),
            new_user("u1", "not-an-email", "T1"),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut bad_plant = new_user("u1", "u1@example.com", "T1");
    bad_plant["plant"] = json!("../etc");
    let (status, _) = app
        .send(json("POST", "/admin/users", Some(&token), bad_plant))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_is_paginated_with_total() {
    let app = TestApp::new().await;
    let root = app.account("root", Role::SuperAdmin, "HQ").await;
    for i in 0..4 {
        app.account(&format!("user{}", i), Role::RegularAdmin, "P1")
            .await;
    }
    let token = app.token(&root);

    let (status, body) = app.send(get("/admin/users?skip=1&limit=2", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    assert_eq!(body["skip"], 1);
    assert_eq!(body["limit"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["username"], "user0");
    assert_eq!(items[1]["username"], "user1");

    let (_, body) = app.send(get("/admin/users", &token)).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 5);
    assert_eq!(body["limit"], 100);
}

#[tokio::test]
async fn test_oversized_skip_is_clamped() {
    let app = TestApp::new().await;
    let root = app.account("root", Role::SuperAdmin, "HQ").await;
    let token = app.token(&root);

    for skip in ["9223372036854775808", "18446744073709551615"] {
        let (status, body) = app
            .send(get(&format!("/admin/users?skip={}", skip), &token))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["total"], 1);
        assert_eq!(body["skip"], i64::MAX);
        assert!(body["items"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_get_and_partial_update() {
    let app = TestApp::new().await;
    let root = app.account("root", Role::SuperAdmin, "HQ").await;
    let target = app.account("target", Role::RegularAdmin, "P1").await;
    app.account("other", Role::RegularAdmin, "P1").await;
    let token = app.token(&root);

    let (status, body) = app.send(get("/admin/users/999", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");

    let uri = format!("/admin/users/{}", target.id);
    let (status, body) = app
        .send(json(
            "PUT",
            &uri,
            Some(&token),
            json!({ "full_name": "Renamed", "plant": "P2" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["full_name"], "Renamed");
    assert_eq!(body["plant"], "P2");
    assert_eq!(body["username"], "target");
    assert_eq!(body["email"], "target@example.com");
    assert!(!body["updated_at"].is_null());

    let (status, body) = app
        .send(json(
            "PUT",
            &uri,
            Some(&token),
            json!({ "email": "other@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username, email, or TE ID already registered");

    // Keeping one's own username is not a conflict
    let (status, _) = app
        .send(json("PUT", &uri, Some(&token), json!({ "username": "target" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plant"], "P2");
}

#[tokio::test]
async fn test_delete_with_self_guard() {
    let app = TestApp::new().await;
    let root = app.account("root", Role::SuperAdmin, "HQ").await;
    let target = app.account("target", Role::RegularAdmin, "P1").await;
    let token = app.token(&root);

    let (status, body) = app
        .send(delete(&format!("/admin/users/{}", root.id), &token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete your own account");

    let (status, _) = app
        .send(delete(&format!("/admin/users/{}", target.id), &token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(get(&format!("/admin/users/{}", target.id), &token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(delete(&format!("/admin/users/{}", target.id), &token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
