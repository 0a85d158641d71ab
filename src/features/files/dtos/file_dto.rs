use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::files::models::{File, OwnerStats};

/// Upload file request DTO for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadFileDto {
    /// The file to upload
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// Optional password required to download the file
    pub password: Option<String>,
    /// Whether anyone holding the link may download (default: true)
    #[schema(example = true)]
    pub is_public: Option<bool>,
    /// Link lifetime in hours (default: 168, clamped to the configured maximum)
    #[schema(example = 24)]
    pub expires_in_hours: Option<i64>,
}

/// File metadata as exposed to clients. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponseDto {
    pub id: Uuid,
    pub original_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub download_slug: String,
    /// Shareable link (`/d/<slug>`)
    pub share_url: String,
    pub is_public: bool,
    pub password_protected: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub download_count: i64,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FileResponseDto {
    pub fn from_file(file: File, public_base_url: &str) -> Self {
        Self {
            share_url: format!("{}/d/{}", public_base_url, file.download_slug),
            password_protected: file.is_password_protected(),
            id: file.id,
            original_name: file.original_name,
            content_type: file.content_type,
            file_size: file.file_size,
            download_slug: file.download_slug,
            is_public: file.is_public,
            expires_at: file.expires_at,
            download_count: file.download_count,
            last_downloaded_at: file.last_downloaded_at,
            created_at: file.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponseDto {
    pub file: FileResponseDto,
    /// Object URL in the storage backend
    pub storage_url: String,
    /// Authenticated endpoint serving the share link as a QR code
    pub qr_url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameFileDto {
    #[serde(rename = "newName")]
    #[validate(length(min = 1, max = 255, message = "newName must be 1-255 characters"))]
    pub new_name: String,
}

/// Optional body of a download request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DownloadPasswordDto {
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Serve inline instead of as an attachment
    #[serde(default)]
    pub preview: bool,
}

/// Response DTO for delete operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponseDto {
    /// Confirmation that the file was deleted
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponseDto {
    pub deleted_files: usize,
    /// Storage keys that could not be removed; their files were kept for a retry
    pub failed_keys: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileStatsDto {
    pub total_files: i64,
    pub total_downloads: i64,
    pub total_bytes: i64,
}

impl From<OwnerStats> for FileStatsDto {
    fn from(stats: OwnerStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_downloads: stats.total_downloads,
            total_bytes: stats.total_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_body_uses_camel_case_field() {
        let dto: RenameFileDto = serde_json::from_str(r#"{"newName": "b.txt"}"#).unwrap();
        assert_eq!(dto.new_name, "b.txt");
        assert!(dto.validate().is_ok());

        let empty: RenameFileDto = serde_json::from_str(r#"{"newName": ""}"#).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_response_never_serializes_password_hash() {
        let file = File {
            id: Uuid::new_v4(),
            original_name: "a.txt".to_string(),
            storage_path: "files/a.txt".to_string(),
            file_size: 3,
            content_type: "text/plain".to_string(),
            download_slug: "slug123".to_string(),
            is_public: true,
            password_hash: Some("$argon2id$v=19$secret".to_string()),
            expires_at: None,
            owner_user_id: None,
            download_count: 0,
            last_downloaded_at: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&FileResponseDto::from_file(file, "http://gw")).unwrap();

        assert!(!json.contains("argon2"));
        assert!(json.contains("\"password_protected\":true"));
        assert!(json.contains("http://gw/d/slug123"));
    }
}
