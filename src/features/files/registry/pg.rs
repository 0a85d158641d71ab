use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ExpiryCursor, FileRegistry};
use crate::core::database::is_unique_violation;
use crate::core::error::{AppError, Result};
use crate::features::files::models::{DownloadEvent, File, NewDownloadEvent, NewFile, OwnerStats};

/// Postgres-backed file registry
#[derive(Clone)]
pub struct PgFileRegistry {
    pool: PgPool,
}

impl PgFileRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRegistry for PgFileRegistry {
    async fn create(&self, file: NewFile) -> Result<File> {
        let created = sqlx::query_as::<_, File>(
            r#"
            INSERT INTO files (
                id, original_name, storage_path, file_size, content_type,
                download_slug, is_public, password_hash, expires_at, owner_user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&file.original_name)
        .bind(&file.storage_path)
        .bind(file.file_size)
        .bind(&file.content_type)
        .bind(&file.download_slug)
        .bind(file.is_public)
        .bind(&file.password_hash)
        .bind(file.expires_at)
        .bind(file.owner_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Slug '{}' is already taken", file.download_slug))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(created)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>(
            r#"
            SELECT * FROM files WHERE download_slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>(
            r#"
            SELECT * FROM files WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    async fn list_by_owner(&self, owner_user_id: Uuid) -> Result<Vec<File>> {
        let files = sqlx::query_as::<_, File>(
            r#"
            SELECT * FROM files
            WHERE owner_user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    async fn rename(&self, id: Uuid, new_name: &str) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>(
            r#"
            UPDATE files SET original_name = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    async fn record_download(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET download_count = download_count + 1, last_downloaded_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        Ok(())
    }

    async fn insert_download_event(&self, event: NewDownloadEvent) -> Result<DownloadEvent> {
        let created = sqlx::query_as::<_, DownloadEvent>(
            r#"
            INSERT INTO download_events (id, file_id, requester_user_id, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(event.file_id)
        .bind(event.requester_user_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn delete_download_events(&self, file_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM download_events WHERE file_id = $1
            "#,
        )
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Events recorded after an earlier purge of the audit trail
        sqlx::query("DELETE FROM download_events WHERE file_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_expired_before(
        &self,
        now: DateTime<Utc>,
        after: Option<ExpiryCursor>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let (after_expires_at, after_id) = after.unzip();

        let files = sqlx::query_as::<_, File>(
            r#"
            SELECT * FROM files
            WHERE expires_at IS NOT NULL AND expires_at < $1
              AND ($2::TIMESTAMPTZ IS NULL OR (expires_at, id) > ($2, $3))
            ORDER BY expires_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(now)
        .bind(after_expires_at)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    async fn owner_stats(&self, owner_user_id: Uuid) -> Result<OwnerStats> {
        let stats = sqlx::query_as::<_, OwnerStats>(
            r#"
            SELECT
                COUNT(*)::BIGINT AS total_files,
                COALESCE(SUM(f.file_size), 0)::BIGINT AS total_bytes,
                (
                    SELECT COUNT(*)::BIGINT
                    FROM download_events e
                    JOIN files owned ON owned.id = e.file_id
                    WHERE owned.owner_user_id = $1
                ) AS total_downloads
            FROM files f
            WHERE f.owner_user_id = $1
            "#,
        )
        .bind(owner_user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
