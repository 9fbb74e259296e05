pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::middleware::{auth::auth_middleware, rate_limit::RateLimiter};
use crate::config::AppConfig;
use crate::services::credentials::CredentialStore;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::root,
        api::handlers::health::health_check,
        api::handlers::auth::login,
        api::handlers::auth::reset_password,
        api::handlers::auth::me,
        api::handlers::admin::create_user,
        api::handlers::admin::list_users,
        api::handlers::admin::get_user,
        api::handlers::admin::update_user,
        api::handlers::admin::delete_user,
        api::handlers::admin::generate_report,
        api::handlers::submissions::create_submission,
        api::handlers::submissions::list_submissions,
        api::handlers::submissions::get_submission,
        api::handlers::submissions::download_document,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::health::WelcomeResponse,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::UserInfo,
            api::handlers::auth::TokenResponse,
            api::handlers::auth::PasswordResetRequest,
            api::handlers::auth::UserEnvelope,
            api::handlers::admin::UserResponse,
            api::handlers::admin::UserList,
            api::handlers::submissions::SubmissionResponse,
            api::handlers::submissions::SubmissionCreated,
            api::handlers::submissions::SubmissionList,
            services::accounts::NewAccount,
            services::accounts::AccountUpdate,
            entities::users::Role,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and session endpoints"),
        (name = "admin", description = "Account management and reports"),
        (name = "submissions", description = "Employee identity submissions"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub credentials: Arc<CredentialStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        Self {
            db,
            storage,
            credentials: Arc::new(CredentialStore::from_config(&config)),
            rate_limiter: Arc::new(RateLimiter::new()),
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let protected = || from_fn_with_state(state.clone(), auth_middleware);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get(&api::middleware::request_id::REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri().path());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/login", post(api::handlers::auth::login))
        .route(
            "/auth/reset-password",
            post(api::handlers::auth::reset_password).layer(protected()),
        )
        .route("/auth/me", get(api::handlers::auth::me).layer(protected()))
        .route(
            "/admin/users",
            get(api::handlers::admin::list_users)
                .post(api::handlers::admin::create_user)
                .layer(protected()),
        )
        .route(
            "/admin/users/:id",
            get(api::handlers::admin::get_user)
                .put(api::handlers::admin::update_user)
                .delete(api::handlers::admin::delete_user)
                .layer(protected()),
        )
        .route(
            "/admin/reports",
            get(api::handlers::admin::generate_report).layer(protected()),
        )
        .route(
            "/submissions",
            get(api::handlers::submissions::list_submissions)
                .post(api::handlers::submissions::create_submission)
                .layer(protected()),
        )
        .route(
            "/submissions/:id",
            get(api::handlers::submissions::get_submission).layer(protected()),
        )
        .route(
            "/submissions/:id/files/:category",
            get(api::handlers::submissions::download_document).layer(protected()),
        )
        // The id must exist before the trace span is built.
        .layer(trace_layer)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_upload_size,
        ))
        .with_state(state)
}
