use crate::config::AppConfig;
use crate::services::storage::{LocalFolderStorage, StorageService};
use std::sync::Arc;
use tracing::info;

pub fn setup_storage(config: &AppConfig) -> Arc<dyn StorageService> {
    info!(
        "🗄️  Local storage: {} ({} files/folder, {} folders max)",
        config.uploads_dir.display(),
        config.max_files_per_folder,
        config.max_storage_folders
    );

    Arc::new(LocalFolderStorage::new(
        config.uploads_dir.clone(),
        config.max_files_per_folder,
        config.max_storage_folders,
    ))
}
