//! Metadata store for shared files and their download audit trail

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::files::models::{DownloadEvent, File, NewDownloadEvent, NewFile, OwnerStats};

mod pg;

#[cfg(test)]
mod memory;

pub use pg::PgFileRegistry;

#[cfg(test)]
pub use memory::MemoryFileRegistry;

/// Keyset position `(expires_at, id)` for paging through expired files
pub type ExpiryCursor = (DateTime<Utc>, Uuid);

#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Insert a new row. A taken slug yields `AppError::Conflict`.
    async fn create(&self, file: NewFile) -> Result<File>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<File>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>>;

    /// Newest first
    async fn list_by_owner(&self, owner_user_id: Uuid) -> Result<Vec<File>>;

    /// Returns the renamed row, or `None` when it no longer exists
    async fn rename(&self, id: Uuid, new_name: &str) -> Result<Option<File>>;

    /// Atomically bump `download_count` and stamp `last_downloaded_at`.
    /// Fails with `AppError::NotFound` when the row is gone.
    async fn record_download(&self, id: Uuid) -> Result<()>;

    async fn insert_download_event(&self, event: NewDownloadEvent) -> Result<DownloadEvent>;

    async fn delete_download_events(&self, file_id: Uuid) -> Result<u64>;

    /// Remove the row together with any remaining events. Returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Files whose `expires_at` lies strictly before `now`, ordered by
    /// `(expires_at, id)` and starting after `after` when given
    async fn find_expired_before(
        &self,
        now: DateTime<Utc>,
        after: Option<ExpiryCursor>,
        limit: i64,
    ) -> Result<Vec<File>>;

    async fn owner_stats(&self, owner_user_id: Uuid) -> Result<OwnerStats>;
}
