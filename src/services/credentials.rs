use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, errors::ErrorKind};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::entities::{prelude::*, users};
use crate::utils::auth::{Claims, create_jwt, validate_jwt};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Token has expired")]
    Expired,

    #[error("Could not validate credentials")]
    UnknownSubject,

    #[error("Inactive user")]
    Inactive,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Hashes passwords and issues/validates the signed session tokens.
#[derive(Clone)]
pub struct CredentialStore {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl CredentialStore {
    pub fn new(secret: &str, algorithm: Algorithm, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_algorithm, config.token_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// A malformed stored hash verifies as `false`.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn issue_token(&self, user: &users::Model) -> Result<String, AuthError> {
        self.issue_token_with_ttl(user, self.ttl)
    }

    pub fn issue_token_with_ttl(
        &self,
        user: &users::Model,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        create_jwt(&user.username, user.role, ttl, &self.encoding, self.algorithm)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        validate_jwt(token, &self.decoding, self.algorithm).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Verifies the token and loads the live account. The role claim is not trusted;
    /// the stored role and active flag decide.
    pub async fn resolve_token(
        &self,
        db: &DatabaseConnection,
        token: &str,
    ) -> Result<users::Model, AuthError> {
        let claims = self.decode_token(token)?;

        let user = Users::find()
            .filter(users::Column::Username.eq(claims.sub.as_str()))
            .one(db)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        if !user.is_active {
            debug!("Rejected token for inactive user {}", user.username);
            return Err(AuthError::Inactive);
        }

        Ok(user)
    }
}
