use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::error::AppError;
use crate::entities::{prelude::*, users, users::Role};
use crate::services::access::{Identity, can_delete_account};
use crate::services::credentials::CredentialStore;
use crate::utils::validation::{validate_password_strength, validate_plant_name};

const DUPLICATE_ACCOUNT: &str = "Username, email, or TE ID already registered";
const BAD_CREDENTIALS: &str = "Incorrect username or password";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 1, max = 50))]
    pub te_id: String,
    #[validate(length(min = 1, max = 100))]
    pub plant: String,
    #[serde(default)]
    pub role: Role,
    /// Defaults to the TE ID when omitted.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AccountUpdate {
    #[validate(length(min = 1, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub plant: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

fn map_unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::BadRequest(DUPLICATE_ACCOUNT.into()),
        _ => AppError::Database(err),
    }
}

pub struct AccountService;

impl AccountService {
    pub async fn authenticate(
        db: &DatabaseConnection,
        username: &str,
        password: &str,
    ) -> Result<users::Model, AppError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?;

        let Some(user) = user else {
            warn!("🔒 Login failed for unknown user {}", username);
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        };

        if !CredentialStore::verify_password(password, &user.password_hash) {
            warn!("🔒 Login failed for {}: wrong password", username);
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        }

        if !user.is_active {
            warn!("🔒 Login refused for inactive user {}", username);
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        }

        info!("🔑 {} logged in", username);
        Ok(user)
    }

    /// True when another account already holds one of the identifying values.
    async fn is_taken(
        db: &DatabaseConnection,
        username: Option<&str>,
        email: Option<&str>,
        te_id: Option<&str>,
        exclude_id: Option<i32>,
    ) -> Result<bool, DbErr> {
        if username.is_none() && email.is_none() && te_id.is_none() {
            return Ok(false);
        }

        let any = Condition::any()
            .add_option(username.map(|v| users::Column::Username.eq(v)))
            .add_option(email.map(|v| users::Column::Email.eq(v)))
            .add_option(te_id.map(|v| users::Column::TeId.eq(v)));

        let mut condition = Condition::all().add(any);
        if let Some(id) = exclude_id {
            condition = condition.add(users::Column::Id.ne(id));
        }

        Ok(Users::find().filter(condition).count(db).await? > 0)
    }

    pub async fn create(
        db: &DatabaseConnection,
        new: NewAccount,
    ) -> Result<users::Model, AppError> {
        validate_plant_name(&new.plant)?;

        if Self::is_taken(
            db,
            Some(&new.username),
            Some(&new.email),
            Some(&new.te_id),
            None,
        )
        .await?
        {
            return Err(AppError::BadRequest(DUPLICATE_ACCOUNT.into()));
        }

        let initial_password = new
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&new.te_id);
        let password_hash = CredentialStore::hash_password(initial_password)?;

        let account = users::ActiveModel {
            username: Set(new.username),
            email: Set(new.email),
            full_name: Set(new.full_name),
            password_hash: Set(password_hash),
            te_id: Set(new.te_id),
            role: Set(new.role),
            plant: Set(new.plant),
            must_reset_password: Set(true),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };

        let created = account.insert(db).await.map_err(map_unique_violation)?;
        info!(
            "👤 Created {:?} account {} for plant {}",
            created.role, created.username, created.plant
        );
        Ok(created)
    }

    pub async fn list(
        db: &DatabaseConnection,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<users::Model>, u64), AppError> {
        let total = Users::find().count(db).await?;
        let items = Users::find()
            .order_by_asc(users::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(db)
            .await?;
        Ok((items, total))
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<users::Model, AppError> {
        Users::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        changes: AccountUpdate,
    ) -> Result<users::Model, AppError> {
        let existing = Self::get(db, id).await?;

        if let Some(plant) = &changes.plant {
            validate_plant_name(plant)?;
        }

        if Self::is_taken(
            db,
            changes.username.as_deref(),
            changes.email.as_deref(),
            None,
            Some(id),
        )
        .await?
        {
            return Err(AppError::BadRequest(DUPLICATE_ACCOUNT.into()));
        }

        let mut account = existing.into_active_model();
        if let Some(username) = changes.username {
            account.username = Set(username);
        }
        if let Some(email) = changes.email {
            account.email = Set(email);
        }
        if let Some(full_name) = changes.full_name {
            account.full_name = Set(full_name);
        }
        if let Some(plant) = changes.plant {
            account.plant = Set(plant);
        }
        if let Some(role) = changes.role {
            account.role = Set(role);
        }
        if let Some(is_active) = changes.is_active {
            account.is_active = Set(is_active);
        }
        account.updated_at = Set(Some(Utc::now()));

        let updated = account.update(db).await.map_err(map_unique_violation)?;
        info!("✏️ Updated account {} ({})", updated.id, updated.username);
        Ok(updated)
    }

    pub async fn delete(db: &DatabaseConnection, actor: &Identity, id: i32) -> Result<(), AppError> {
        let target = Self::get(db, id).await?;

        if !can_delete_account(actor, &target) {
            return Err(AppError::BadRequest("Cannot delete your own account".into()));
        }

        Users::delete_by_id(target.id).exec(db).await?;
        info!("🗑️ {} deleted account {}", actor.username, target.username);
        Ok(())
    }

    /// The new password is checked against the policy before anything else, so a weak
    /// password never touches the stored hash.
    pub async fn reset_password(
        db: &DatabaseConnection,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<users::Model, AppError> {
        validate_password_strength(new_password)?;

        let user = Self::get(db, user_id).await?;
        if !CredentialStore::verify_password(current_password, &user.password_hash) {
            return Err(AppError::BadRequest("Current password is incorrect".into()));
        }

        let password_hash = CredentialStore::hash_password(new_password)?;
        let mut account = user.into_active_model();
        account.password_hash = Set(password_hash);
        account.must_reset_password = Set(false);
        account.updated_at = Set(Some(Utc::now()));

        let updated = account.update(db).await?;
        info!("🔐 Password updated for {}", updated.username);
        Ok(updated)
    }
}
