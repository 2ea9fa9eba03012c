//! Storage factory

use std::sync::Arc;

use tracing::info;
use zrata_core::{CacheStorage, MemoryCacheStorage};
use zrata_domain::{CacheError, Result, StorageBackend, StorageSettings};

use crate::database::SqliteCacheStorage;
use crate::filesystem::FsCacheStorage;

/// Build the backend selected by `settings`
///
/// # Errors
/// `InvalidRequest` for settings that fail validation, `StorageUnavailable`
/// if the medium cannot be opened.
pub async fn open_storage(settings: &StorageSettings) -> Result<Arc<dyn CacheStorage>> {
    settings.validate().map_err(|e| CacheError::invalid_request(e.to_string()))?;

    let storage: Arc<dyn CacheStorage> = match settings.backend {
        StorageBackend::Memory => Arc::new(MemoryCacheStorage::new()),
        StorageBackend::Sqlite => {
            let settings = settings.clone();
            let storage = tokio::task::spawn_blocking(move || SqliteCacheStorage::open(&settings))
                .await
                .map_err(crate::errors::map_join_error)??;
            Arc::new(storage)
        }
        StorageBackend::Filesystem => Arc::new(FsCacheStorage::open(&settings.path).await?),
    };

    info!(backend = storage.backend_name(), path = %settings.path.display(), "cache storage ready");
    Ok(storage)
}
