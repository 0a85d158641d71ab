use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::core::error::AppError;
use crate::core::middleware::ClientAddr;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::dtos::{DownloadPasswordDto, DownloadQuery};
use crate::features::files::services::{Delivery, DownloadRequest, DownloadService};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Password from an optional `{"password": "..."}` body. Anything else reads as no password.
fn presented_password(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<DownloadPasswordDto>(body)
        .ok()
        .and_then(|dto| dto.password)
        .filter(|p| !p.is_empty())
}

fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}

/// Download a shared file
///
/// Private files need the owner's bearer token. Password-protected files need
/// a JSON body `{"password": "..."}`. Add `?preview=true` to serve inline.
#[utoipa::path(
    get,
    path = "/api/files/download/{slug}",
    tag = "files",
    params(
        ("slug" = String, Path, description = "Download slug"),
        DownloadQuery
    ),
    request_body(content = DownloadPasswordDto, description = "Password for protected files"),
    responses(
        (status = 200, description = "File bytes"),
        (status = 307, description = "Redirect to a presigned storage URL"),
        (status = 401, description = "Password required"),
        (status = 403, description = "Private file or wrong password"),
        (status = 404, description = "File not found"),
        (status = 410, description = "Link expired"),
        (status = 500, description = "Storage fetch failed")
    ),
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn download_file(
    State(service): State<Arc<DownloadService>>,
    Path(slug): Path<String>,
    Query(query): Query<DownloadQuery>,
    user: Option<AuthenticatedUser>,
    ClientAddr(ip_address): ClientAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let password = presented_password(&body);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let download = service
        .download(DownloadRequest {
            slug: &slug,
            password: password.as_deref(),
            user: user.as_ref(),
            ip_address,
            user_agent,
        })
        .await?;

    let object = match download.delivery {
        Delivery::Redirect(url) => return Ok(Redirect::temporary(&url).into_response()),
        Delivery::Stream(object) => object,
    };

    let content_type = object
        .content_type
        .unwrap_or_else(|| download.file.content_type.clone());
    let content_type = if content_type.is_empty() {
        FALLBACK_CONTENT_TYPE.to_string()
    } else {
        content_type
    };

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(length) = object.content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }
    if !query.preview {
        response = response.header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.file.original_name),
        );
    }

    response
        .body(Body::from_stream(object.body))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}

/// Short share link; forwards to the download endpoint keeping the query string
#[utoipa::path(
    get,
    path = "/d/{slug}",
    tag = "files",
    params(("slug" = String, Path, description = "Download slug")),
    responses(
        (status = 307, description = "Redirect to /api/files/download/{slug}"),
        (status = 403, description = "File is not public"),
        (status = 404, description = "File not found")
    )
)]
pub async fn share_link(
    State(service): State<Arc<DownloadService>>,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Redirect, AppError> {
    service.resolve_share_link(&slug).await?;

    let target = match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("/api/files/download/{}?{}", slug, query),
        None => format!("/api/files/download/{}", slug),
    };

    Ok(Redirect::temporary(&target))
}
