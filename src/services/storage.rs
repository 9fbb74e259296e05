use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::validation::validate_plant_name;

static CIN_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{1,2}[0-9]+\.(jpg|jpeg|png)$").expect("valid cin filename regex")
});

static PICTURE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{1,2}[0-9]+_i\.(jpg|jpeg|png)$").expect("valid picture filename regex")
});

static GREY_CARD_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+-[A-Za-z]-[0-9]+\.(jpg|jpeg|png)$")
        .expect("valid grey card filename regex")
});

/// The three kinds of uploaded document. Each maps to its own subtree and filename rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum DocumentCategory {
    #[serde(rename = "cin")]
    Cin,
    #[serde(rename = "pic")]
    Picture,
    #[serde(rename = "grey_card")]
    GreyCard,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 3] = [
        DocumentCategory::Cin,
        DocumentCategory::Picture,
        DocumentCategory::GreyCard,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            DocumentCategory::Cin => "cin",
            DocumentCategory::Picture => "pic",
            DocumentCategory::GreyCard => "grey_card",
        }
    }

    fn filename_pattern(self) -> &'static Regex {
        match self {
            DocumentCategory::Cin => &CIN_FILENAME,
            DocumentCategory::Picture => &PICTURE_FILENAME,
            DocumentCategory::GreyCard => &GREY_CARD_FILENAME,
        }
    }

    pub fn validate_filename(self, filename: &str) -> Result<(), StorageError> {
        if self.filename_pattern().is_match(filename) {
            Ok(())
        } else {
            Err(StorageError::InvalidFilename {
                category: self,
                filename: filename.to_string(),
            })
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for DocumentCategory {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.dir_name() == s)
            .ok_or_else(|| StorageError::UnknownCategory(s.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid {category} filename format: {filename}")]
    InvalidFilename {
        category: DocumentCategory,
        filename: String,
    },

    #[error("Unknown document category: {0}")]
    UnknownCategory(String),

    #[error("Invalid plant name: {0}")]
    InvalidPlant(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage capacity reached for {plant}/{category}")]
    CapacityExhausted {
        plant: String,
        category: DocumentCategory,
    },

    #[error("Stored file not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Picks the numbered folder under `<root>/<plant>/<category>` that has room for one more file.
    async fn allocate(&self, plant: &str, category: DocumentCategory)
    -> Result<PathBuf, StorageError>;

    /// Validates the filename, writes the bytes under a generated name and returns the path
    /// relative to the storage root.
    async fn store(
        &self,
        data: &[u8],
        original_filename: &str,
        plant: &str,
        category: DocumentCategory,
    ) -> Result<String, StorageError>;

    async fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, relative_path: &str) -> Result<(), StorageError>;
    async fn is_available(&self) -> bool;
}

/// Filesystem storage that shards each plant/category into bounded numbered folders.
///
/// The capacity check and the write are not serialized across requests, so concurrent
/// uploads into the same plant/category may overshoot a folder's capacity slightly.
pub struct LocalFolderStorage {
    root: PathBuf,
    max_files_per_folder: usize,
    max_folders: u32,
}

impl LocalFolderStorage {
    pub fn new(root: impl Into<PathBuf>, max_files_per_folder: usize, max_folders: u32) -> Self {
        Self {
            root: root.into(),
            max_files_per_folder,
            max_folders,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative_path);
        let well_formed = !relative_path.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidPath(relative_path.to_string()));
        }
        Ok(self.root.join(path))
    }

    fn relative_to_root(&self, path: &Path) -> Result<String, StorageError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath(path.display().to_string()))?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()
            .ok_or_else(|| StorageError::InvalidPath(relative.display().to_string()))?;
        Ok(parts.join("/"))
    }
}

/// Counts visible regular files; in-flight `.part` files are hidden.
async fn count_files(folder: &Path) -> Result<usize, StorageError> {
    let mut entries = fs::read_dir(folder).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[async_trait]
impl StorageService for LocalFolderStorage {
    async fn allocate(
        &self,
        plant: &str,
        category: DocumentCategory,
    ) -> Result<PathBuf, StorageError> {
        validate_plant_name(plant).map_err(|_| StorageError::InvalidPlant(plant.to_string()))?;

        let base = self.root.join(plant).join(category.dir_name());
        fs::create_dir_all(&base).await?;

        for index in 1..=self.max_folders {
            let folder = base.join(index.to_string());

            match fs::create_dir(&folder).await {
                Ok(()) => {
                    info!("📁 Created storage folder {}", folder.display());
                    return Ok(folder);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            if !fs::metadata(&folder).await?.is_dir() {
                continue;
            }

            let count = count_files(&folder).await?;
            if count < self.max_files_per_folder {
                debug!("Using {} ({} files)", folder.display(), count);
                return Ok(folder);
            }
        }

        warn!(
            "🚫 Storage capacity reached for {}/{} after {} folders",
            plant, category, self.max_folders
        );
        Err(StorageError::CapacityExhausted {
            plant: plant.to_string(),
            category,
        })
    }

    async fn store(
        &self,
        data: &[u8],
        original_filename: &str,
        plant: &str,
        category: DocumentCategory,
    ) -> Result<String, StorageError> {
        category.validate_filename(original_filename)?;

        let extension = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| StorageError::InvalidFilename {
                category,
                filename: original_filename.to_string(),
            })?;

        let folder = self.allocate(plant, category).await?;
        let stored_name = format!("{}.{}", Uuid::new_v4().simple(), extension);
        let final_path = folder.join(&stored_name);
        let partial_path = folder.join(format!(".{}.part", stored_name));

        if let Err(e) = fs::write(&partial_path, data).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&partial_path, &final_path).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(e.into());
        }

        let relative = self.relative_to_root(&final_path)?;
        info!(
            "💾 Stored {} ({} bytes) as {}",
            original_filename,
            data.len(),
            relative
        );
        Ok(relative)
    }

    async fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative_path)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(relative_path.to_string()),
            _ => StorageError::Io(e),
        })
    }

    async fn delete(&self, relative_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(relative_path.to_string()),
            _ => StorageError::Io(e),
        })
    }

    async fn is_available(&self) -> bool {
        fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}
