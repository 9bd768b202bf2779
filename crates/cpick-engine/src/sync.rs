use chrono::{DateTime, Utc};
use cpick_catalog::DirectoryCache;
use cpick_core::{CatalogClient, FetchError};
use cpick_storage::{MovieStore, StorageError};
use thiserror::Error;

pub const SYNC_CHUNK_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub discovered: usize,
    pub inserted: usize,
}

/// Inserts tags the store has not seen yet. Existing rows are never touched.
pub fn sync_tags<S: AsRef<str>>(
    store: &MovieStore,
    tags: &[S],
    now: DateTime<Utc>,
) -> Result<SyncReport, StorageError> {
    let mut report = SyncReport {
        discovered: tags.len(),
        inserted: 0,
    };
    for chunk in tags.chunks(SYNC_CHUNK_SIZE) {
        report.inserted += store.insert_tags(chunk, now)?;
    }
    tracing::info!(
        discovered = report.discovered,
        inserted = report.inserted,
        "synced directory tags"
    );
    Ok(report)
}

/// Pulls the (possibly cached) directory listing and merges its tags into the store.
pub fn sync_from_directory(
    store: &MovieStore,
    cache: &DirectoryCache,
    client: &dyn CatalogClient,
    now: DateTime<Utc>,
) -> Result<SyncReport, SyncError> {
    let html = cache.get_directory(client)?;
    let tags = client.extract_tags(&html)?;
    Ok(sync_tags(store, &tags, now)?)
}
