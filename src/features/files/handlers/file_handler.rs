use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::AppError;
use crate::core::extractor::AppJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::dtos::{
    DeleteFileResponseDto, FileResponseDto, FileStatsDto, PurgeResponseDto, RenameFileDto,
    UploadFileDto, UploadResponseDto,
};
use crate::features::files::services::{FileService, PurgeOutcome, UploadRequest};
use crate::shared::types::{ApiResponse, Meta};

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read {} field: {}", name, e)))
}

/// Upload a file
///
/// Accepts multipart/form-data with:
/// - `file`: The file to upload (required)
/// - `password`: Optional download password
/// - `is_public`: "true" (default) or "false"
/// - `expires_in_hours`: Optional link lifetime
#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "files",
    request_body(
        content = UploadFileDto,
        content_type = "multipart/form-data",
        description = "File upload form with optional password, visibility and expiry fields",
    ),
    responses(
        (status = 200, description = "File uploaded successfully", body = ApiResponse<UploadResponseDto>),
        (status = 400, description = "No file or invalid form field"),
        (status = 401, description = "Authentication required"),
        (status = 500, description = "Storage or database failure")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_file(
    user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponseDto>>, AppError> {
    let mut request = UploadRequest {
        is_public: true,
        ..UploadRequest::default()
    };
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                request.content_type = field.content_type().map(|s| s.to_string());
                request.original_name = field.file_name().unwrap_or("unnamed").to_string();

                let data = field.bytes().await.map_err(|e| {
                    debug!("Failed to read file bytes: {}", e);
                    AppError::BadRequest(format!("Failed to read file data: {}", e))
                })?;
                request.data = data.to_vec();
                has_file = true;
            }
            "password" => {
                let text = read_text_field(field, "password").await?;
                request.password = Some(text).filter(|p| !p.is_empty());
            }
            "is_public" => {
                let text = read_text_field(field, "is_public").await?;
                request.is_public = match text.trim().to_lowercase().as_str() {
                    "" | "true" | "1" | "yes" => true,
                    "false" | "0" | "no" => false,
                    other => {
                        return Err(AppError::BadRequest(format!(
                            "is_public must be true or false, got '{}'",
                            other
                        )))
                    }
                };
            }
            "expires_in_hours" => {
                let text = read_text_field(field, "expires_in_hours").await?;
                let hours = text.trim().parse::<i64>().map_err(|_| {
                    AppError::BadRequest("expires_in_hours must be a whole number".to_string())
                })?;
                request.expires_in_hours = Some(hours);
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    if !has_file {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }

    let response = service.upload(request, user.user_id).await?;

    Ok(Json(ApiResponse::success(
        Some(response),
        Some("File uploaded successfully".to_string()),
        None,
    )))
}

/// List the caller's files
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    responses(
        (status = 200, description = "Files retrieved successfully", body = ApiResponse<Vec<FileResponseDto>>),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_files(
    user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
) -> Result<Json<ApiResponse<Vec<FileResponseDto>>>, AppError> {
    let files = service.list(user.user_id).await?;
    let total = files.len() as i64;

    Ok(Json(ApiResponse::success(
        Some(files),
        None,
        Some(Meta { total }),
    )))
}

#[utoipa::path(
    put,
    path = "/api/files/{id}/rename",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    request_body = RenameFileDto,
    responses(
        (status = 200, description = "File renamed successfully", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Invalid body"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn rename_file(
    user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<RenameFileDto>,
) -> Result<Json<ApiResponse<FileResponseDto>>, AppError> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let file = service.rename(user.user_id, id, &dto.new_name).await?;

    Ok(Json(ApiResponse::success(
        Some(file),
        Some("File renamed successfully".to_string()),
        None,
    )))
}

/// Delete a file
///
/// Only the owner of the file can delete it.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted successfully", body = ApiResponse<DeleteFileResponseDto>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Storage or database failure")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_file(
    user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeleteFileResponseDto>>, AppError> {
    service.delete(user.user_id, id).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteFileResponseDto { deleted: true }),
        Some("File deleted successfully".to_string()),
        None,
    )))
}

/// Delete every file the caller owns
#[utoipa::path(
    delete,
    path = "/api/files",
    tag = "files",
    responses(
        (status = 200, description = "Purge finished; failed_keys lists objects that were kept", body = ApiResponse<PurgeResponseDto>),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn purge_files(
    user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
) -> Result<Json<ApiResponse<PurgeResponseDto>>, AppError> {
    let (dto, message) = match service.purge_owner(user.user_id).await? {
        PurgeOutcome::Clean { deleted } => (
            PurgeResponseDto {
                deleted_files: deleted,
                failed_keys: Vec::new(),
            },
            "All files deleted".to_string(),
        ),
        PurgeOutcome::CompletedWithWarnings {
            deleted,
            failed_keys,
        } => (
            PurgeResponseDto {
                deleted_files: deleted,
                failed_keys,
            },
            "Some files could not be removed from storage".to_string(),
        ),
    };

    Ok(Json(ApiResponse::success(Some(dto), Some(message), None)))
}

#[utoipa::path(
    get,
    path = "/api/files/stats",
    tag = "files",
    responses(
        (status = 200, description = "Usage statistics", body = ApiResponse<FileStatsDto>),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_stats(
    user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
) -> Result<Json<ApiResponse<FileStatsDto>>, AppError> {
    let stats = service.stats(user.user_id).await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}

/// QR code for a file's share link
#[utoipa::path(
    get,
    path = "/api/files/{id}/qr",
    tag = "files",
    params(("id" = String, Path, description = "Download slug")),
    responses(
        (status = 200, description = "PNG image", content_type = "image/png"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_qr_code(
    _user: AuthenticatedUser,
    State(service): State<Arc<FileService>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let png = service.qr_png(&slug).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
