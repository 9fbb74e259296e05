use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::admin::Pagination;
use crate::api::middleware::rate_limit::extract_client_ip;
use crate::entities::submissions;
use crate::services::access::{Identity, require_admin};
use crate::services::storage::DocumentCategory;
use crate::services::submissions::{
    SubmissionDocuments, SubmissionFields, SubmissionService, UploadedDocument,
};
use crate::utils::validation::parse_date_of_birth;
use axum::{
    Extension, Json,
    extract::{ConnectInfo, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct SubmissionResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub cin: String,
    pub te_id: String,
    pub date_of_birth: NaiveDate,
    pub grey_card_number: String,
    pub plant: String,
    pub cin_file_path: String,
    pub picture_file_path: String,
    pub grey_card_file_path: String,
    pub admin_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<submissions::Model> for SubmissionResponse {
    fn from(s: submissions::Model) -> Self {
        Self {
            id: s.id,
            first_name: s.first_name,
            last_name: s.last_name,
            cin: s.cin,
            te_id: s.te_id,
            date_of_birth: s.date_of_birth,
            grey_card_number: s.grey_card_number,
            plant: s.plant,
            cin_file_path: s.cin_file_path,
            picture_file_path: s.picture_file_path,
            grey_card_file_path: s.grey_card_file_path,
            admin_id: s.admin_id,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubmissionCreated {
    pub id: i32,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct SubmissionList {
    pub items: Vec<SubmissionResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

#[derive(Deserialize, IntoParams)]
pub struct PlantFilter {
    /// Ignored for regular admins, who always see their own plant
    pub plant: Option<String>,
}

const FILE_FIELDS: [&str; 3] = ["cin_file", "picture_file", "grey_card_file"];

/// Text and file parts of a submission form.
#[derive(Default)]
struct SubmissionForm {
    text: HashMap<String, String>,
    files: HashMap<String, UploadedDocument>,
}

impl SubmissionForm {
    fn text(&self, name: &str) -> Result<String, AppError> {
        self.text
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::BadRequest(format!("Missing field: {}", name)))
    }

    fn file(&mut self, name: &str) -> Result<UploadedDocument, AppError> {
        self.files
            .remove(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing file: {}", name)))
    }

    fn into_parts(mut self) -> Result<(SubmissionFields, SubmissionDocuments), AppError> {
        let date_of_birth = parse_date_of_birth(&self.text("date_of_birth")?).map_err(|e| {
            AppError::BadRequest(format!("Invalid submission data: {}", e.message))
        })?;

        let fields = SubmissionFields {
            first_name: self.text("first_name")?,
            last_name: self.text("last_name")?,
            cin: self.text("cin")?,
            te_id: self.text("te_id")?,
            date_of_birth,
            grey_card_number: self.text("grey_card_number")?,
            plant: self.text("plant")?,
        };

        let documents = SubmissionDocuments {
            cin: self.file("cin_file")?,
            picture: self.file("picture_file")?,
            grey_card: self.file("grey_card_file")?,
        };

        Ok((fields, documents))
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

async fn read_form(multipart: &mut Multipart) -> Result<SubmissionForm, AppError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if FILE_FIELDS.contains(&name.as_str()) {
            let filename = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| AppError::BadRequest(format!("{} must be a file", name)))?;
            let data = field.bytes().await.map_err(multipart_error)?;
            form.files.insert(
                name,
                UploadedDocument {
                    filename,
                    data: data.to_vec(),
                },
            );
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            form.text.insert(name, text.trim().to_string());
        }
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/submissions",
    request_body(content = Object, description = "Text fields plus cin_file, picture_file and grey_card_file", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Submission created", body = SubmissionCreated),
        (status = 400, description = "Invalid submission data or file name"),
        (status = 403, description = "Plant outside the caller's scope"),
        (status = 429, description = "Too many submissions"),
        (status = 500, description = "Storage capacity reached")
    ),
    security(("jwt" = [])),
    tag = "submissions"
)]
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionCreated>), AppError> {
    require_admin(&identity)?;
    state.rate_limiter.check(
        "submissions",
        &extract_client_ip(&headers, peer.as_ref()),
        state.config.submission_rate_limit,
    )?;

    let form = read_form(&mut multipart).await?;
    let (fields, documents) = form.into_parts()?;

    let created = SubmissionService::create(
        &state.db,
        state.storage.as_ref(),
        &identity,
        fields,
        documents,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionCreated {
            id: created.id,
            message: "Submission created successfully".to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/submissions",
    params(Pagination, PlantFilter),
    responses(
        (status = 200, description = "Submissions visible to the caller", body = SubmissionList)
    ),
    security(("jwt" = [])),
    tag = "submissions"
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(page): Query<Pagination>,
    Query(filter): Query<PlantFilter>,
) -> Result<Json<SubmissionList>, AppError> {
    require_admin(&identity)?;

    let (skip, limit) = page.resolve();
    let (items, total) =
        SubmissionService::list(&state.db, &identity, filter.plant.as_deref(), skip, limit)
            .await?;

    Ok(Json(SubmissionList {
        items: items.into_iter().map(SubmissionResponse::from).collect(),
        total,
        skip,
        limit,
    }))
}

#[utoipa::path(
    get,
    path = "/submissions/{id}",
    params(("id" = i32, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission", body = SubmissionResponse),
        (status = 403, description = "Not authorized to access this submission"),
        (status = 404, description = "Submission not found")
    ),
    security(("jwt" = [])),
    tag = "submissions"
)]
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<SubmissionResponse>, AppError> {
    require_admin(&identity)?;
    Ok(Json(SubmissionService::get(&state.db, &identity, id).await?.into()))
}

fn image_content_type(path: &str) -> mime::Mime {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[utoipa::path(
    get,
    path = "/submissions/{id}/files/{category}",
    params(
        ("id" = i32, Path, description = "Submission id"),
        ("category" = String, Path, description = "cin, pic or grey_card")
    ),
    responses(
        (status = 200, description = "Stored document image"),
        (status = 400, description = "Unknown document category"),
        (status = 403, description = "Not authorized to access this submission"),
        (status = 404, description = "Submission or file not found")
    ),
    security(("jwt" = [])),
    tag = "submissions"
)]
pub async fn download_document(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, category)): Path<(i32, String)>,
) -> Result<Response, AppError> {
    require_admin(&identity)?;
    let category: DocumentCategory = category.parse()?;

    let (path, data) =
        SubmissionService::document(&state.db, state.storage.as_ref(), &identity, id, category)
            .await?;
    let filename = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();

    Ok((
        [
            (header::CONTENT_TYPE, image_content_type(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
        ],
        data,
    )
        .into_response())
}
