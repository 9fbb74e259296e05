use jsonwebtoken::Algorithm;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Unsupported token algorithm: {0} (expected HS256, HS384 or HS512)")]
    UnsupportedAlgorithm(String),

    #[error("Failed to prepare uploads directory {path}: {source}")]
    UploadsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Optional super-admin created at startup when no account with that username exists.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    /// Falls back to `te_id` (and a forced password reset) when absent.
    pub password: Option<String>,
    pub email: String,
    pub te_id: String,
    pub plant: String,
}

/// Application configuration, passed explicitly into every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,

    /// sea-orm connection string (sqlite or postgres)
    pub database_url: String,

    /// HMAC secret used to sign session tokens
    pub jwt_secret: String,

    /// Token signing algorithm (HS256, HS384 or HS512)
    pub jwt_algorithm: Algorithm,

    /// Session token lifetime in minutes (default: 30)
    pub access_token_expire_minutes: i64,

    /// Root of the uploaded document tree (default: "uploads")
    pub uploads_dir: PathBuf,

    /// Capacity of a single numbered storage folder (default: 100)
    pub max_files_per_folder: usize,

    /// Upper bound on numbered folders probed per plant/category (default: 10000)
    pub max_storage_folders: u32,

    /// Request body limit for uploads in bytes (default: 32 MB)
    pub max_upload_size: usize,

    /// Requests per minute per client
    pub login_rate_limit: u32,
    pub password_reset_rate_limit: u32,
    pub submission_rate_limit: u32,

    /// Allowed CORS origins ("*" allows any)
    pub allowed_origins: Vec<String>,

    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Plant Registry".to_string(),
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_algorithm: Algorithm::HS256,
            access_token_expire_minutes: 30,
            uploads_dir: PathBuf::from("uploads"),
            max_files_per_folder: 100,
            max_storage_folders: 10_000,
            max_upload_size: 32 * 1024 * 1024, // 32 MB
            login_rate_limit: 5,
            password_reset_rate_limit: 3,
            submission_rate_limit: 10,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = lookup("SECRET_KEY")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("SECRET_KEY"))?;

        let jwt_algorithm = match lookup("ALGORITHM") {
            Some(v) => parse_algorithm(&v)?,
            None => default.jwt_algorithm,
        };

        let config = Self {
            app_name: lookup("APP_NAME").unwrap_or(default.app_name),
            database_url,
            jwt_secret,
            jwt_algorithm,
            access_token_expire_minutes: parse_or(
                &lookup,
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                default.access_token_expire_minutes,
            )?,
            uploads_dir: lookup("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.uploads_dir),
            max_files_per_folder: parse_or(
                &lookup,
                "MAX_FILES_PER_FOLDER",
                default.max_files_per_folder,
            )?,
            max_storage_folders: parse_or(
                &lookup,
                "MAX_STORAGE_FOLDERS",
                default.max_storage_folders,
            )?,
            max_upload_size: parse_or(&lookup, "MAX_UPLOAD_SIZE", default.max_upload_size)?,
            login_rate_limit: parse_or(&lookup, "LOGIN_RATE_LIMIT", default.login_rate_limit)?,
            password_reset_rate_limit: parse_or(
                &lookup,
                "PASSWORD_RESET_RATE_LIMIT",
                default.password_reset_rate_limit,
            )?,
            submission_rate_limit: parse_or(
                &lookup,
                "SUBMISSION_RATE_LIMIT",
                default.submission_rate_limit,
            )?,
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
            bootstrap_admin: lookup("BOOTSTRAP_ADMIN_USERNAME")
                .filter(|v| !v.trim().is_empty())
                .map(|username| BootstrapAdmin {
                    password: lookup("BOOTSTRAP_ADMIN_PASSWORD").filter(|v| !v.is_empty()),
                    email: lookup("BOOTSTRAP_ADMIN_EMAIL")
                        .unwrap_or_else(|| format!("{}@localhost", username)),
                    te_id: lookup("BOOTSTRAP_ADMIN_TE_ID").unwrap_or_else(|| "SA000".to_string()),
                    plant: lookup("BOOTSTRAP_ADMIN_PLANT").unwrap_or_else(|| "HQ".to_string()),
                    username,
                }),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create config for development and tests (in-memory database, relaxed limits)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "development-secret".to_string(),
            login_rate_limit: 1000,
            password_reset_rate_limit: 1000,
            submission_rate_limit: 1000,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_expire_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "ACCESS_TOKEN_EXPIRE_MINUTES",
                value: self.access_token_expire_minutes.to_string(),
            });
        }
        if self.max_files_per_folder == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_FILES_PER_FOLDER",
                value: "0".to_string(),
            });
        }
        if self.max_storage_folders == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_STORAGE_FOLDERS",
                value: "0".to_string(),
            });
        }
        if self.uploads_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "UPLOADS_DIR",
                value: String::new(),
            });
        }
        Ok(())
    }

    /// Creates the uploads root if it does not exist yet.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.uploads_dir).map_err(|source| ConfigError::UploadsDir {
            path: self.uploads_dir.clone(),
            source,
        })
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expire_minutes)
    }
}

fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    match Algorithm::from_str(value.trim()) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
        _ => Err(ConfigError::UnsupportedAlgorithm(value.to_string())),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
