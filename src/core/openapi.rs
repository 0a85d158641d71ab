use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::files::{dtos as files_dtos, handlers as files_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Files (owner)
        files_handlers::upload_file,
        files_handlers::list_files,
        files_handlers::rename_file,
        files_handlers::delete_file,
        files_handlers::purge_files,
        files_handlers::get_stats,
        files_handlers::get_qr_code,
        // Files (shared links)
        files_handlers::download_file,
        files_handlers::share_link,
    ),
    components(
        schemas(
            Meta,
            files_dtos::UploadFileDto,
            files_dtos::FileResponseDto,
            files_dtos::UploadResponseDto,
            files_dtos::RenameFileDto,
            files_dtos::DownloadPasswordDto,
            files_dtos::DeleteFileResponseDto,
            files_dtos::PurgeResponseDto,
            files_dtos::FileStatsDto,
            ApiResponse<files_dtos::UploadResponseDto>,
            ApiResponse<files_dtos::FileResponseDto>,
            ApiResponse<Vec<files_dtos::FileResponseDto>>,
            ApiResponse<files_dtos::DeleteFileResponseDto>,
            ApiResponse<files_dtos::PurgeResponseDto>,
            ApiResponse<files_dtos::FileStatsDto>,
        )
    ),
    tags(
        (name = "files", description = "Upload, share and download files"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Fileshare Gateway API",
        version = "0.1.0",
        description = "API documentation for the file-sharing gateway",
    )
)]
pub struct ApiDoc;

/// Adds the Bearer JWT security scheme to the OpenAPI document
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
