use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::{ExpiryCursor, FileRegistry};
use crate::core::error::{AppError, Result};
use crate::features::files::models::{DownloadEvent, File, NewDownloadEvent, NewFile, OwnerStats};

#[derive(Default)]
struct Inner {
    files: HashMap<Uuid, File>,
    events: Vec<DownloadEvent>,
    fail_creates: bool,
    fail_event_inserts: bool,
    failing_deletes: HashSet<Uuid>,
}

/// In-process registry for tests, with failure injection
#[derive(Default)]
pub struct MemoryFileRegistry {
    inner: Mutex<Inner>,
}

impl MemoryFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_expires_at(&self, id: Uuid, expires_at: Option<DateTime<Utc>>) {
        if let Some(file) = self.inner.lock().unwrap().files.get_mut(&id) {
            file.expires_at = expires_at;
        }
    }

    pub fn event_count(&self, file_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.file_id == file_id)
            .count()
    }

    pub fn total_events(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    pub fn file_count(&self) -> usize {
        self.inner.lock().unwrap().files.len()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_creates = fail;
    }

    pub fn fail_event_inserts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_event_inserts = fail;
    }

    /// Make every row delete of `id` fail until cleared
    pub fn fail_deletes_for(&self, id: Uuid) {
        self.inner.lock().unwrap().failing_deletes.insert(id);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_deletes.clear();
        inner.fail_creates = false;
        inner.fail_event_inserts = false;
    }
}

#[async_trait]
impl FileRegistry for MemoryFileRegistry {
    async fn create(&self, file: NewFile) -> Result<File> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_creates {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        if inner
            .files
            .values()
            .any(|f| f.download_slug == file.download_slug)
        {
            return Err(AppError::Conflict(format!(
                "Slug '{}' is already taken",
                file.download_slug
            )));
        }

        let created = File {
            id: Uuid::now_v7(),
            original_name: file.original_name,
            storage_path: file.storage_path,
            file_size: file.file_size,
            content_type: file.content_type,
            download_slug: file.download_slug,
            is_public: file.is_public,
            password_hash: file.password_hash,
            expires_at: file.expires_at,
            owner_user_id: file.owner_user_id,
            download_count: 0,
            last_downloaded_at: None,
            created_at: Utc::now(),
        };
        inner.files.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<File>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .files
            .values()
            .find(|f| f.download_slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>> {
        Ok(self.inner.lock().unwrap().files.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_user_id: Uuid) -> Result<Vec<File>> {
        let mut files: Vec<File> = self
            .inner
            .lock()
            .unwrap()
            .files
            .values()
            .filter(|f| f.owner_user_id == Some(owner_user_id))
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(files)
    }

    async fn rename(&self, id: Uuid, new_name: &str) -> Result<Option<File>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.files.get_mut(&id).map(|file| {
            file.original_name = new_name.to_string();
            file.clone()
        }))
    }

    async fn record_download(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let file = inner
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        file.download_count += 1;
        file.last_downloaded_at = Some(Utc::now());

        Ok(())
    }

    async fn insert_download_event(&self, event: NewDownloadEvent) -> Result<DownloadEvent> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_event_inserts {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }

        let created = DownloadEvent {
            id: Uuid::now_v7(),
            file_id: event.file_id,
            requester_user_id: event.requester_user_id,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            created_at: Utc::now(),
        };
        inner.events.push(created.clone());

        Ok(created)
    }

    async fn delete_download_events(&self, file_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.events.len();
        inner.events.retain(|e| e.file_id != file_id);

        Ok((before - inner.events.len()) as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_deletes.contains(&id) {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        inner.events.retain(|e| e.file_id != id);

        Ok(inner.files.remove(&id).is_some())
    }

    async fn find_expired_before(
        &self,
        now: DateTime<Utc>,
        after: Option<ExpiryCursor>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let mut files: Vec<(ExpiryCursor, File)> = self
            .inner
            .lock()
            .unwrap()
            .files
            .values()
            .filter_map(|f| {
                f.expires_at
                    .filter(|at| *at < now)
                    .map(|at| ((at, f.id), f.clone()))
            })
            .filter(|(cursor, _)| after.is_none_or(|after| *cursor > after))
            .collect();
        files.sort_by_key(|(cursor, _)| *cursor);
        files.truncate(limit.max(0) as usize);

        Ok(files.into_iter().map(|(_, f)| f).collect())
    }

    async fn owner_stats(&self, owner_user_id: Uuid) -> Result<OwnerStats> {
        let inner = self.inner.lock().unwrap();
        let owned: Vec<&File> = inner
            .files
            .values()
            .filter(|f| f.owner_user_id == Some(owner_user_id))
            .collect();
        let total_downloads = inner
            .events
            .iter()
            .filter(|e| owned.iter().any(|f| f.id == e.file_id))
            .count() as i64;

        Ok(OwnerStats {
            total_files: owned.len() as i64,
            total_bytes: owned.iter().map(|f| f.file_size).sum(),
            total_downloads,
        })
    }
}
