use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::api::error::AppError;
use crate::entities::{prelude::*, submissions};
use crate::services::access::{Identity, can_access_plant, can_access_submission, scope_submissions};
use crate::services::storage::{DocumentCategory, StorageService};
use crate::utils::validation::{validate_cin, validate_grey_card, validate_plant_name};

/// Text fields of a new submission, already parsed from the request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmissionFields {
    pub first_name: String,
    pub last_name: String,
    pub cin: String,
    pub te_id: String,
    pub date_of_birth: NaiveDate,
    pub grey_card_number: String,
    pub plant: String,
}

impl SubmissionFields {
    fn check(&self) -> Result<(), String> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("te_id", &self.te_id),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("{} must not be empty", name));
        }
        validate_cin(&self.cin).map_err(|e| e.message)?;
        validate_grey_card(&self.grey_card_number).map_err(|e| e.message)?;
        validate_plant_name(&self.plant).map_err(|e| e.message)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SubmissionDocuments {
    pub cin: UploadedDocument,
    pub picture: UploadedDocument,
    pub grey_card: UploadedDocument,
}

impl SubmissionDocuments {
    fn in_storage_order(&self) -> [(DocumentCategory, &UploadedDocument); 3] {
        [
            (DocumentCategory::Cin, &self.cin),
            (DocumentCategory::Picture, &self.picture),
            (DocumentCategory::GreyCard, &self.grey_card),
        ]
    }
}

pub struct SubmissionService;

impl SubmissionService {
    /// Stores the three documents, then inserts the row. Files written for this call are
    /// removed again if a later file or the insert fails.
    pub async fn create(
        db: &DatabaseConnection,
        storage: &dyn StorageService,
        identity: &Identity,
        fields: SubmissionFields,
        documents: SubmissionDocuments,
    ) -> Result<submissions::Model, AppError> {
        fields
            .check()
            .map_err(|msg| AppError::BadRequest(format!("Invalid submission data: {}", msg)))?;

        if !can_access_plant(identity, &fields.plant) {
            return Err(AppError::Forbidden(
                "Not authorized to create submissions for this plant".into(),
            ));
        }

        for (category, document) in documents.in_storage_order() {
            category
                .validate_filename(&document.filename)
                .map_err(|e| AppError::BadRequest(format!("File upload error: {}", e)))?;
        }

        let mut stored: Vec<String> = Vec::with_capacity(3);
        for (category, document) in documents.in_storage_order() {
            match storage
                .store(&document.data, &document.filename, &fields.plant, category)
                .await
            {
                Ok(path) => stored.push(path),
                Err(e) => {
                    Self::discard(storage, &stored).await;
                    return Err(e.into());
                }
            }
        }

        let (cin_path, picture_path, grey_card_path) =
            (stored[0].clone(), stored[1].clone(), stored[2].clone());

        let submission = submissions::ActiveModel {
            first_name: Set(fields.first_name),
            last_name: Set(fields.last_name),
            cin: Set(fields.cin),
            te_id: Set(fields.te_id),
            date_of_birth: Set(fields.date_of_birth),
            grey_card_number: Set(fields.grey_card_number),
            plant: Set(fields.plant),
            cin_file_path: Set(cin_path),
            picture_file_path: Set(picture_path),
            grey_card_file_path: Set(grey_card_path),
            admin_id: Set(Some(identity.id)),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };

        match submission.insert(db).await {
            Ok(created) => {
                info!(
                    "📝 Submission {} created by {} for plant {}",
                    created.id, identity.username, created.plant
                );
                Ok(created)
            }
            Err(e) => {
                Self::discard(storage, &stored).await;
                Err(e.into())
            }
        }
    }

    async fn discard(storage: &dyn StorageService, paths: &[String]) {
        for path in paths {
            if let Err(e) = storage.delete(path).await {
                warn!("Failed to remove orphaned upload {}: {}", path, e);
            }
        }
    }

    fn scoped(plant: Option<&str>) -> Select<Submissions> {
        let query = Submissions::find().order_by_asc(submissions::Column::Id);
        match plant {
            Some(plant) => query.filter(submissions::Column::Plant.eq(plant)),
            None => query,
        }
    }

    pub async fn list(
        db: &DatabaseConnection,
        identity: &Identity,
        requested_plant: Option<&str>,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<submissions::Model>, u64), AppError> {
        let plant = scope_submissions(identity, requested_plant);
        let total = Self::scoped(plant.as_deref()).count(db).await?;
        let items = Self::scoped(plant.as_deref())
            .offset(skip)
            .limit(limit)
            .all(db)
            .await?;
        Ok((items, total))
    }

    /// Every row visible to `identity`, for report export.
    pub async fn export(
        db: &DatabaseConnection,
        identity: &Identity,
        requested_plant: Option<&str>,
    ) -> Result<Vec<submissions::Model>, AppError> {
        let plant = scope_submissions(identity, requested_plant);
        Ok(Self::scoped(plant.as_deref()).all(db).await?)
    }

    pub async fn get(
        db: &DatabaseConnection,
        identity: &Identity,
        id: i32,
    ) -> Result<submissions::Model, AppError> {
        let submission = Submissions::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

        if !can_access_submission(identity, &submission) {
            return Err(AppError::Forbidden(
                "Not authorized to access this submission".into(),
            ));
        }
        Ok(submission)
    }

    /// Reads one stored document of a submission. Returns the stored path and its bytes.
    pub async fn document(
        db: &DatabaseConnection,
        storage: &dyn StorageService,
        identity: &Identity,
        id: i32,
        category: DocumentCategory,
    ) -> Result<(String, Vec<u8>), AppError> {
        let submission = Self::get(db, identity, id).await?;
        let path = match category {
            DocumentCategory::Cin => submission.cin_file_path,
            DocumentCategory::Picture => submission.picture_file_path,
            DocumentCategory::GreyCard => submission.grey_card_file_path,
        };
        let data = storage.read(&path).await?;
        Ok((path, data))
    }
}
