use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::admin::UserResponse;
use crate::api::middleware::rate_limit::extract_client_ip;
use crate::entities::users::{self, Role};
use crate::services::access::Identity;
use crate::services::accounts::AccountService;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, header},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub plant: String,
    pub must_reset_password: bool,
}

impl From<&users::Model> for UserInfo {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            plant: user.plant.clone(),
            must_reset_password: user.must_reset_password,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserInfo,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserEnvelope {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserResponse,
}

/// Login bodies arrive either as JSON or as an urlencoded form.
fn parse_login(headers: &HeaderMap, body: &[u8]) -> Result<LoginRequest, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let parsed = if content_type.starts_with("application/json") {
        serde_json::from_slice::<LoginRequest>(body).ok()
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        serde_urlencoded::from_bytes::<LoginRequest>(body).ok()
    } else {
        serde_json::from_slice::<LoginRequest>(body)
            .ok()
            .or_else(|| serde_urlencoded::from_bytes::<LoginRequest>(body).ok())
    };

    parsed.ok_or_else(|| AppError::BadRequest("Invalid login payload".to_string()))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Incorrect username or password"),
        (status = 429, description = "Too many login attempts")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokenResponse>, AppError> {
    state.rate_limiter.check(
        "login",
        &extract_client_ip(&headers, peer.as_ref()),
        state.config.login_rate_limit,
    )?;

    let request = parse_login(&headers, &body)?;
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    };
    if username.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let user = AccountService::authenticate(&state.db, &username, &password).await?;
    let access_token = state.credentials.issue_token(&user)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserInfo::from(&user),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Password updated", body = UserEnvelope),
        (status = 400, description = "Current password is incorrect"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "New password does not meet the policy")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<UserEnvelope>, AppError> {
    state.rate_limiter.check(
        "reset-password",
        &extract_client_ip(&headers, peer.as_ref()),
        state.config.password_reset_rate_limit,
    )?;

    let user = AccountService::reset_password(
        &state.db,
        identity.id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;

    Ok(Json(UserEnvelope {
        status: "success".to_string(),
        message: Some("Password updated successfully".to_string()),
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current account", body = UserEnvelope),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = AccountService::get(&state.db, identity.id).await?;

    Ok(Json(UserEnvelope {
        status: "success".to_string(),
        message: None,
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_parse_login_json_and_form() {
        let json = parse_login(
            &with_content_type("application/json"),
            br#"{"username":"a","password":"T1"}"#,
        )
        .unwrap();
        assert_eq!(json.username.as_deref(), Some("a"));

        let form = parse_login(
            &with_content_type("application/x-www-form-urlencoded"),
            b"username=a&password=T%201",
        )
        .unwrap();
        assert_eq!(form.password.as_deref(), Some("T 1"));

        let sniffed = parse_login(&HeaderMap::new(), b"username=a").unwrap();
        assert!(sniffed.password.is_none());

        assert!(parse_login(&with_content_type("application/json"), b"{nope").is_err());
    }
}
