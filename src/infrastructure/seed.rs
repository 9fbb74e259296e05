use crate::config::BootstrapAdmin;
use crate::entities::{prelude::*, users, users::Role};
use crate::services::credentials::CredentialStore;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::info;

/// Creates the first super-admin unless an account with that username already exists.
/// Returns whether a row was inserted.
pub async fn seed_super_admin(
    db: &DatabaseConnection,
    admin: &BootstrapAdmin,
) -> anyhow::Result<bool> {
    let exists = Users::find()
        .filter(users::Column::Username.eq(admin.username.as_str()))
        .one(db)
        .await?;

    if exists.is_some() {
        info!("🌱 Super-admin '{}' already present", admin.username);
        return Ok(false);
    }

    let explicit = admin.password.as_deref().filter(|p| !p.is_empty());
    let password_hash = CredentialStore::hash_password(explicit.unwrap_or(&admin.te_id))?;

    users::ActiveModel {
        username: Set(admin.username.clone()),
        email: Set(admin.email.clone()),
        full_name: Set("Super Admin".to_string()),
        password_hash: Set(password_hash),
        te_id: Set(admin.te_id.clone()),
        role: Set(Role::SuperAdmin),
        plant: Set(admin.plant.clone()),
        must_reset_password: Set(explicit.is_none()),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("🌱 Seeded super-admin '{}'", admin.username);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::Database;

    fn bootstrap(password: Option<&str>) -> BootstrapAdmin {
        BootstrapAdmin {
            username: "root".into(),
            password: password.map(str::to_owned),
            email: "root@example.com".into(),
            te_id: "TE0".into(),
            plant: "HQ".into(),
        }
    }

    #[tokio::test]
    async fn test_seed_once() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();

        assert!(seed_super_admin(&db, &bootstrap(None)).await.unwrap());
        assert!(!seed_super_admin(&db, &bootstrap(None)).await.unwrap());

        let root = Users::find()
            .filter(users::Column::Username.eq("root"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(root.role, Role::SuperAdmin);
        assert!(root.must_reset_password);
        assert!(CredentialStore::verify_password("TE0", &root.password_hash));
    }

    #[tokio::test]
    async fn test_seed_with_explicit_password() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();

        seed_super_admin(&db, &bootstrap(Some("Str0ngPass")))
            .await
            .unwrap();
        let root = Users::find().one(&db).await.unwrap().unwrap();
        assert!(!root.must_reset_password);
        assert!(CredentialStore::verify_password("Str0ngPass", &root.password_hash));
    }

    #[tokio::test]
    async fn test_seed_with_empty_password_uses_te_id() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();

        seed_super_admin(&db, &bootstrap(Some(""))).await.unwrap();
        let root = Users::find().one(&db).await.unwrap().unwrap();
        assert!(root.must_reset_password);
        assert!(CredentialStore::verify_password("TE0", &root.password_hash));
    }
}
