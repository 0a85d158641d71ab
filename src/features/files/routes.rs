use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::middleware::{auth_middleware, optional_auth_middleware};
use crate::features::auth::JwtValidator;
use crate::features::files::handlers::{
    delete_file, download_file, get_qr_code, get_stats, list_files, purge_files, rename_file,
    share_link, upload_file,
};
use crate::features::files::services::{DownloadService, FileService};

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create routes for the files feature
pub fn routes(
    file_service: Arc<FileService>,
    download_service: Arc<DownloadService>,
    jwt_validator: Arc<JwtValidator>,
) -> Router {
    let upload_limit = file_service.max_upload_size() + MULTIPART_OVERHEAD;

    // Owner-only management (require JWT authentication)
    let managed = Router::new()
        .route(
            "/api/files/upload",
            post(upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/files", get(list_files).delete(purge_files))
        .route("/api/files/stats", get(get_stats))
        .route("/api/files/{id}/rename", put(rename_file))
        .route("/api/files/{id}", delete(delete_file))
        // `{id}` carries the download slug here
        .route("/api/files/{id}/qr", get(get_qr_code))
        .with_state(file_service)
        .route_layer(from_fn_with_state(
            Arc::clone(&jwt_validator),
            auth_middleware,
        ));

    // Anyone with the link; a bearer token unlocks the owner's private files
    let download = Router::new()
        .route("/api/files/download/{slug}", get(download_file))
        .with_state(Arc::clone(&download_service))
        .route_layer(from_fn_with_state(jwt_validator, optional_auth_middleware));

    let share = Router::new()
        .route("/d/{slug}", get(share_link))
        .with_state(download_service);

    Router::new().merge(managed).merge(download).merge(share)
}

#[cfg(test)]
mod tests {
    use crate::core::config::{DeliveryMode, RateLimitConfig};
    use crate::features::files::registry::FileRegistry;
    use crate::shared::test_helpers::{TestApp, TestAppOptions, TEST_PRESIGN_TTL};
    use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use uuid::Uuid;

    const CONTENT: &[u8] = b"quarterly numbers";

    fn file_form(name: &str) -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(CONTENT.to_vec())
                .file_name(name)
                .mime_type("text/plain"),
        )
    }

    async fn upload(app: &TestApp, owner: Uuid, form: MultipartForm) -> Value {
        let response = app
            .server
            .post("/api/files/upload")
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .multipart(form)
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"].clone()
    }

    fn slug_of(data: &Value) -> String {
        data["file"]["download_slug"].as_str().unwrap().to_string()
    }

    fn id_of(data: &Value) -> Uuid {
        data["file"]["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_share_link_download_then_expiry() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();

        let first = upload(&app, owner, file_form("numbers.txt")).await;
        let second = upload(&app, owner, file_form("numbers.txt")).await;
        let slug = slug_of(&first);
        assert_ne!(slug, slug_of(&second));
        assert!(first["file"].get("password_hash").is_none());
        assert_eq!(
            first["file"]["share_url"],
            format!("http://gateway.test/d/{}", slug)
        );

        let redirect = app.server.get(&format!("/d/{}", slug)).await;
        redirect.assert_status(StatusCode::TEMPORARY_REDIRECT);
        let location = redirect.header(LOCATION).to_str().unwrap().to_string();
        assert_eq!(location, format!("/api/files/download/{}", slug));

        let download = app.server.get(&location).await;
        download.assert_status_ok();
        assert_eq!(download.as_bytes().as_ref(), CONTENT);
        assert_eq!(
            download.header(CONTENT_DISPOSITION).to_str().unwrap(),
            "attachment; filename=\"numbers.txt\"; filename*=UTF-8''numbers.txt"
        );

        app.registry
            .set_expires_at(id_of(&first), Some(Utc::now() - Duration::minutes(1)));

        let redirect = app.server.get(&format!("/d/{}", slug)).await;
        redirect.assert_status(StatusCode::TEMPORARY_REDIRECT);
        app.server
            .get(&location)
            .await
            .assert_status(StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_password_protected_download() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let data = upload(
            &app,
            owner,
            file_form("secret.txt").add_text("password", "open sesame"),
        )
        .await;
        let path = format!("/api/files/download/{}", slug_of(&data));
        assert_eq!(data["file"]["password_protected"], true);

        app.server
            .get(&path)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .get(&path)
            .json(&json!({ "password": "guess" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let ok = app
            .server
            .get(&path)
            .json(&json!({ "password": "open sesame" }))
            .await;
        ok.assert_status_ok();
        assert_eq!(ok.as_bytes().as_ref(), CONTENT);

        let stored = app.registry.find_by_id(id_of(&data)).await.unwrap().unwrap();
        assert_eq!(stored.download_count, 1);
        assert_eq!(app.registry.event_count(stored.id), 1);
    }

    #[tokio::test]
    async fn test_private_file_visibility() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let data = upload(
            &app,
            owner,
            file_form("private.txt").add_text("is_public", "false"),
        )
        .await;
        let slug = slug_of(&data);
        let path = format!("/api/files/download/{}", slug);

        app.server
            .get(&format!("/d/{}", slug))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.server
            .get(&path)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.server
            .get(&path)
            .add_header(AUTHORIZATION, app.bearer_for(Uuid::new_v4()))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let owner_download = app
            .server
            .get(&path)
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .await;
        owner_download.assert_status_ok();

        let stored = app.registry.find_by_id(id_of(&data)).await.unwrap().unwrap();
        assert_eq!(stored.download_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let app = TestApp::new();

        app.server
            .get("/d/nope")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .get("/api/files/download/nope")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        assert_eq!(app.registry.total_events(), 0);
    }

    #[tokio::test]
    async fn test_preview_keeps_query_and_skips_attachment() {
        let app = TestApp::new();
        let slug = slug_of(&upload(&app, Uuid::new_v4(), file_form("a.txt")).await);

        let redirect = app.server.get(&format!("/d/{}?preview=true", slug)).await;
        let location = redirect.header(LOCATION).to_str().unwrap().to_string();
        assert_eq!(location, format!("/api/files/download/{}?preview=true", slug));

        let preview = app.server.get(&location).await;
        preview.assert_status_ok();
        assert!(preview.maybe_header(CONTENT_DISPOSITION).is_none());
        assert_eq!(preview.header(CONTENT_TYPE).to_str().unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_redirect_delivery_points_at_presigned_url() {
        let app = TestApp::with_delivery(DeliveryMode::Redirect);
        let data = upload(&app, Uuid::new_v4(), file_form("a.txt")).await;

        let response = app
            .server
            .get(&format!("/api/files/download/{}", slug_of(&data)))
            .await;

        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        let location = response.header(LOCATION).to_str().unwrap().to_string();
        assert!(location.ends_with(&format!("?expires={}", TEST_PRESIGN_TTL.as_secs())));
        assert_eq!(app.storage.presigned_ttls(), vec![TEST_PRESIGN_TTL]);
    }

    #[tokio::test]
    async fn test_upload_requires_auth_and_file() {
        let app = TestApp::new();

        app.server
            .post("/api/files/upload")
            .multipart(file_form("a.txt"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        app.server
            .post("/api/files/upload")
            .add_header(AUTHORIZATION, app.bearer_for(Uuid::new_v4()))
            .multipart(MultipartForm::new().add_text("password", "x"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(app.storage.len(), 0);
    }

    #[tokio::test]
    async fn test_manage_own_files() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let data = upload(&app, owner, file_form("draft.txt")).await;
        let id = id_of(&data);

        let list = app
            .server
            .get("/api/files")
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .await;
        list.assert_status_ok();
        let body = list.json::<Value>();
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["original_name"], "draft.txt");

        app.server
            .put(&format!("/api/files/{}/rename", id))
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .json(&json!({ "name": "missing camel case" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.server
            .put(&format!("/api/files/{}/rename", id))
            .add_header(AUTHORIZATION, app.bearer_for(stranger))
            .json(&json!({ "newName": "stolen.txt" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let renamed = app
            .server
            .put(&format!("/api/files/{}/rename", id))
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .json(&json!({ "newName": "final.txt" }))
            .await;
        renamed.assert_status_ok();
        assert_eq!(renamed.json::<Value>()["data"]["original_name"], "final.txt");

        let stats = app
            .server
            .get("/api/files/stats")
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .await
            .json::<Value>();
        assert_eq!(stats["data"]["total_files"], 1);
        assert_eq!(stats["data"]["total_bytes"], CONTENT.len());

        let qr = app
            .server
            .get(&format!("/api/files/{}/qr", slug_of(&data)))
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .await;
        qr.assert_status_ok();
        assert_eq!(qr.header(CONTENT_TYPE).to_str().unwrap(), "image/png");

        app.server
            .delete(&format!("/api/files/{}", id))
            .add_header(AUTHORIZATION, app.bearer_for(stranger))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .delete(&format!("/api/files/{}", id))
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .await
            .assert_status_ok();

        assert_eq!(app.registry.file_count(), 0);
        assert_eq!(app.storage.len(), 0);
    }

    #[tokio::test]
    async fn test_purge_reports_kept_objects() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let kept = upload(&app, owner, file_form("kept.txt")).await;
        upload(&app, owner, file_form("gone.txt")).await;
        let kept_file = app.registry.find_by_id(id_of(&kept)).await.unwrap().unwrap();
        app.storage.fail_deletes_for(&kept_file.storage_path);

        let response = app
            .server
            .delete("/api/files")
            .add_header(AUTHORIZATION, app.bearer_for(owner))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["data"]["deleted_files"], 1);
        assert_eq!(body["data"]["failed_keys"], json!([kept_file.storage_path]));
        assert_eq!(app.registry.file_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_sixth_burst_request() {
        let app = TestApp::with_options(TestAppOptions {
            rate_limit: RateLimitConfig::default(),
            ..TestAppOptions::default()
        });

        let mut statuses = Vec::new();
        for _ in 0..6 {
            statuses.push(app.server.get("/d/unknown").await.status_code());
        }

        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == StatusCode::NOT_FOUND)
                .count(),
            5
        );
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_managed_routes_require_valid_bearer_token() {
        let app = TestApp::new();

        app.server
            .get("/api/files")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .get("/api/files")
            .add_header(AUTHORIZATION, "Bearer not-a-jwt".to_string())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .get("/api/files")
            .add_header(AUTHORIZATION, "Basic dXNlcjpwYXNz".to_string())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = app
            .server
            .get("/api/files")
            .add_header(AUTHORIZATION, app.bearer_for(Uuid::new_v4()))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["meta"]["total"], 0);
    }
}
