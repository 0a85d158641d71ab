use chrono::{Duration, Utc};
use image::{DynamicImage, ImageOutputFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::{Config, ShareConfig};
use crate::core::error::{AppError, Result};
use crate::features::files::dtos::{FileResponseDto, FileStatsDto, UploadResponseDto};
use crate::features::files::models::{File, NewFile};
use crate::features::files::registry::FileRegistry;
use crate::features::files::services::slug::{create_with_unique_slug, generate_slug};
use crate::modules::storage::StorageGateway;
use crate::shared::password::hash_password;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const QR_SIZE: u32 = 256;

/// Settings the file lifecycle needs from the global configuration
#[derive(Debug, Clone)]
pub struct FileServiceSettings {
    pub share: ShareConfig,
    pub key_prefix: String,
    pub public_base_url: String,
    pub qr_base_url: String,
}

impl FileServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            share: config.share.clone(),
            key_prefix: config.storage.key_prefix.clone(),
            public_base_url: config.app.public_base_url.clone(),
            qr_base_url: config.app.qr_base_url.clone(),
        }
    }
}

/// A parsed upload form
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub data: Vec<u8>,
    pub original_name: String,
    pub content_type: Option<String>,
    pub password: Option<String>,
    pub is_public: bool,
    pub expires_in_hours: Option<i64>,
}

/// Result of removing every file an owner holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeOutcome {
    Clean { deleted: usize },
    CompletedWithWarnings { deleted: usize, failed_keys: Vec<String> },
}

/// Service for file operations
pub struct FileService {
    registry: Arc<dyn FileRegistry>,
    storage: Arc<dyn StorageGateway>,
    settings: FileServiceSettings,
}

impl FileService {
    pub fn new(
        registry: Arc<dyn FileRegistry>,
        storage: Arc<dyn StorageGateway>,
        settings: FileServiceSettings,
    ) -> Self {
        Self {
            registry,
            storage,
            settings,
        }
    }

    pub fn max_upload_size(&self) -> usize {
        self.settings.share.max_upload_size
    }

    /// Store the bytes, then register the file under a fresh slug.
    /// A failed registration removes the stored object again.
    pub async fn upload(&self, request: UploadRequest, owner: Uuid) -> Result<UploadResponseDto> {
        if request.data.len() > self.max_upload_size() {
            return Err(AppError::BadRequest(format!(
                "File too large. Maximum size is {} bytes",
                self.max_upload_size()
            )));
        }

        let original_name = request.original_name.trim();
        let original_name = if original_name.is_empty() {
            "unnamed"
        } else {
            original_name
        };

        let content_type = request
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(original_name)
                    .first_raw()
                    .unwrap_or(FALLBACK_CONTENT_TYPE)
                    .to_string()
            });

        let password_hash = match request.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let hours = self.clamp_expiry_hours(request.expires_in_hours);
        let expires_at = Duration::try_hours(hours)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::BadRequest(format!("Expiry of {} hours is out of range", hours))
            })?;

        let storage_path = self.storage_key(original_name);
        let file_size = request.data.len() as i64;

        let storage_url = self
            .storage
            .put(&storage_path, request.data, &content_type)
            .await?;
        debug!("Stored object '{}' ({} bytes)", storage_path, file_size);

        let new_file = NewFile {
            original_name: original_name.to_string(),
            storage_path: storage_path.clone(),
            file_size,
            content_type,
            download_slug: String::new(),
            is_public: request.is_public,
            password_hash,
            expires_at: Some(expires_at),
            owner_user_id: Some(owner),
        };

        let file = match create_with_unique_slug(
            self.registry.as_ref(),
            new_file,
            self.settings.share.slug_max_attempts,
            generate_slug,
        )
        .await
        {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&storage_path).await {
                    warn!(
                        "Failed to remove orphaned object '{}' after registration failure: {}",
                        storage_path, cleanup
                    );
                }
                return Err(e);
            }
        };

        info!(
            "File uploaded: id={}, slug={}, size={}, expires_at={}",
            file.id, file.download_slug, file.file_size, expires_at
        );

        let qr_url = format!(
            "{}/api/files/{}/qr",
            self.settings.public_base_url, file.download_slug
        );

        Ok(UploadResponseDto {
            file: self.to_dto(file),
            storage_url,
            qr_url,
        })
    }

    pub async fn list(&self, owner: Uuid) -> Result<Vec<FileResponseDto>> {
        let files = self.registry.list_by_owner(owner).await?;
        Ok(files.into_iter().map(|f| self.to_dto(f)).collect())
    }

    pub async fn rename(&self, owner: Uuid, id: Uuid, new_name: &str) -> Result<FileResponseDto> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(AppError::Validation("newName must not be empty".to_string()));
        }

        self.find_owned(owner, id).await?;

        let file = self
            .registry
            .rename(id, new_name)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        info!("File renamed: id={}, name={}", file.id, file.original_name);
        Ok(self.to_dto(file))
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let file = self.find_owned(owner, id).await?;
        self.remove(&file).await?;

        info!("File deleted: id={}, key={}", file.id, file.storage_path);
        Ok(())
    }

    /// Remove every file `owner` holds. Objects the backend refused to
    /// delete keep their rows and are reported back.
    pub async fn purge_owner(&self, owner: Uuid) -> Result<PurgeOutcome> {
        let files = self.registry.list_by_owner(owner).await?;
        let mut deleted = 0;
        let mut failed_keys = Vec::new();

        for file in files {
            match self.remove(&file).await {
                Ok(()) => deleted += 1,
                Err(AppError::Storage(e)) => {
                    warn!("Purge kept file {}: {}", file.id, e);
                    failed_keys.push(file.storage_path);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Purged files for owner {}: deleted={}, failed={}",
            owner,
            deleted,
            failed_keys.len()
        );

        if failed_keys.is_empty() {
            Ok(PurgeOutcome::Clean { deleted })
        } else {
            Ok(PurgeOutcome::CompletedWithWarnings {
                deleted,
                failed_keys,
            })
        }
    }

    pub async fn stats(&self, owner: Uuid) -> Result<FileStatsDto> {
        Ok(self.registry.owner_stats(owner).await?.into())
    }

    /// PNG QR code pointing at the file's share link
    pub async fn qr_png(&self, slug: &str) -> Result<Vec<u8>> {
        let file = self
            .registry
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let target = format!("{}/d/{}", self.settings.qr_base_url, file.download_slug);
        encode_qr_png(&target)
    }

    /// Events first, then the object, then the row
    async fn remove(&self, file: &File) -> Result<()> {
        self.registry.delete_download_events(file.id).await?;
        self.storage.delete(&file.storage_path).await?;
        self.registry.delete(file.id).await?;
        Ok(())
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<File> {
        self.registry
            .find_by_id(id)
            .await?
            .filter(|file| file.owner_user_id == Some(owner))
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    fn clamp_expiry_hours(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.settings.share.default_expiry_hours)
            .clamp(1, self.settings.share.max_expiry_hours)
    }

    /// `<prefix>/<uuid>_<sanitized name>`
    fn storage_key(&self, original_name: &str) -> String {
        let sanitized: String = original_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let sanitized = sanitized.trim_start_matches('.');

        format!("{}/{}_{}", self.settings.key_prefix, Uuid::new_v4(), sanitized)
    }

    fn to_dto(&self, file: File) -> FileResponseDto {
        FileResponseDto::from_file(file, &self.settings.public_base_url)
    }
}

fn encode_qr_png(target: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(target, EcLevel::M)
        .map_err(|e| AppError::Internal(format!("QR generation failed: {}", e)))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {}", e)))?;

    Ok(png)
}
