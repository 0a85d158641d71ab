use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for a shared file
#[derive(Debug, Clone, FromRow)]
pub struct File {
    pub id: Uuid,
    pub original_name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub download_slug: String,
    pub is_public: bool,
    /// argon2 PHC string; `None` when the link has no password
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_user_id: Option<Uuid>,
    pub download_count: i64,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl File {
    /// Expired once `now` has reached `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Fields supplied when registering a freshly stored object
#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub download_slug: String,
    pub is_public: bool,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_user_id: Option<Uuid>,
}

/// Audit record of one authorized download
#[derive(Debug, Clone, FromRow)]
pub struct DownloadEvent {
    pub id: Uuid,
    pub file_id: Uuid,
    pub requester_user_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDownloadEvent {
    pub file_id: Uuid,
    pub requester_user_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
}

/// Aggregate usage for one owner
#[derive(Debug, Clone, Default, FromRow)]
pub struct OwnerStats {
    pub total_files: i64,
    pub total_bytes: i64,
    pub total_downloads: i64,
}
