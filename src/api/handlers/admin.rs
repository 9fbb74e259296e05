use crate::AppState;
use crate::api::error::AppError;
use crate::entities::users::{self, Role};
use crate::services::access::{Identity, require_admin, require_super_admin};
use crate::services::accounts::{AccountService, AccountUpdate, NewAccount};
use crate::services::reports::{ReportFormat, XLSX_CONTENT_TYPE, build_report};
use crate::services::submissions::SubmissionService;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 1000;
/// Largest offset the database drivers accept.
pub const MAX_SKIP: u64 = i64::MAX as u64;

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub te_id: String,
    pub role: Role,
    pub plant: String,
    pub is_active: bool,
    pub must_reset_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            te_id: user.te_id,
            role: user.role,
            plant: user.plant,
            is_active: user.is_active,
            must_reset_password: user.must_reset_password,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Pagination {
    pub fn resolve(&self) -> (u64, u64) {
        (
            self.skip.unwrap_or(0).min(MAX_SKIP),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        )
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<UserResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

#[derive(Deserialize, IntoParams)]
pub struct ReportQuery {
    /// 1 = employee data, 2 = grey cards
    #[param(value_type = u8)]
    pub format: ReportFormat,
    pub plant: Option<String>,
}

#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = NewAccount,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Username, email, or TE ID already registered"),
        (status = 403, description = "Not enough permissions"),
        (status = 422, description = "Invalid field")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<NewAccount>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    require_super_admin(&identity)?;
    payload.validate()?;

    let user = AccountService::create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    params(Pagination),
    responses(
        (status = 200, description = "Accounts", body = UserList),
        (status = 403, description = "Not enough permissions")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(page): Query<Pagination>,
) -> Result<Json<UserList>, AppError> {
    require_super_admin(&identity)?;

    let (skip, limit) = page.resolve();
    let (items, total) = AccountService::list(&state.db, skip, limit).await?;

    Ok(Json(UserList {
        items: items.into_iter().map(UserResponse::from).collect(),
        total,
        skip,
        limit,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = i32, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    require_super_admin(&identity)?;
    Ok(Json(AccountService::get(&state.db, id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = i32, Path, description = "Account id")),
    request_body = AccountUpdate,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Username, email, or TE ID already registered"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
    Json(payload): Json<AccountUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    require_super_admin(&identity)?;
    payload.validate()?;

    let user = AccountService::update(&state.db, id, payload).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = i32, Path, description = "Account id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Cannot delete your own account"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_super_admin(&identity)?;
    AccountService::delete(&state.db, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Spreadsheet attachment", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Unknown format")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn generate_report(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    require_admin(&identity)?;

    let rows = SubmissionService::export(&state.db, &identity, query.plant.as_deref()).await?;
    let report = build_report(query.format, &rows, Utc::now())?;

    tracing::info!(
        "📊 {} exported {} rows as {}",
        identity.username,
        rows.len(),
        report.filename
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", report.filename),
            ),
        ],
        report.content,
    )
        .into_response())
}
