use axum::{middleware::from_fn_with_state, Router};
use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::config::{DeliveryMode, RateLimitConfig, ShareConfig};
use crate::core::middleware::rate_limit_middleware;
use crate::features::auth::JwtValidator;
use crate::features::files::registry::MemoryFileRegistry;
use crate::features::files::{routes as files_routes, DownloadService, FileService, FileServiceSettings};
use crate::features::rate_limits::AdmissionController;
use crate::modules::storage::InMemoryStorage;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-testing-only";
pub const TEST_BASE_URL: &str = "http://gateway.test";
pub const TEST_PRESIGN_TTL: Duration = Duration::from_secs(900);

pub struct TestAppOptions {
    pub share: ShareConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            share: ShareConfig::default(),
            rate_limit: RateLimitConfig {
                per_second: 1000,
                burst: 1000,
                ..RateLimitConfig::default()
            },
        }
    }
}

/// Full router over in-memory collaborators
pub struct TestApp {
    pub server: TestServer,
    pub registry: Arc<MemoryFileRegistry>,
    pub storage: Arc<InMemoryStorage>,
    pub jwt_validator: Arc<JwtValidator>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(TestAppOptions::default())
    }

    pub fn with_delivery(delivery: DeliveryMode) -> Self {
        Self::with_options(TestAppOptions {
            share: ShareConfig {
                delivery,
                ..ShareConfig::default()
            },
            ..TestAppOptions::default()
        })
    }

    pub fn with_options(options: TestAppOptions) -> Self {
        let registry = Arc::new(MemoryFileRegistry::new());
        let storage = Arc::new(InMemoryStorage::new());
        let jwt_validator = Arc::new(JwtValidator::new(
            TEST_JWT_SECRET,
            Duration::from_secs(0),
            Duration::from_secs(300),
        ));

        let file_service = Arc::new(FileService::new(
            registry.clone(),
            storage.clone(),
            FileServiceSettings {
                share: options.share.clone(),
                key_prefix: "files".to_string(),
                public_base_url: TEST_BASE_URL.to_string(),
                qr_base_url: TEST_BASE_URL.to_string(),
            },
        ));
        let download_service = Arc::new(DownloadService::new(
            registry.clone(),
            storage.clone(),
            TEST_PRESIGN_TTL,
            options.share.delivery,
        ));
        let admission = Arc::new(AdmissionController::new(&options.rate_limit));

        let app = Router::new()
            .merge(files_routes::routes(
                file_service,
                download_service,
                jwt_validator.clone(),
            ))
            .layer(from_fn_with_state(admission, rate_limit_middleware));

        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            registry,
            storage,
            jwt_validator,
        }
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.jwt_validator
            .issue_access_token(user_id)
            .expect("Failed to issue test token")
    }

    pub fn bearer_for(&self, user_id: Uuid) -> String {
        format!("Bearer {}", self.token_for(user_id))
    }
}
