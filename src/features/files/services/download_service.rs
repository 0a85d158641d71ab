use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::DeliveryMode;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::models::{File, NewDownloadEvent};
use crate::features::files::registry::FileRegistry;
use crate::features::files::services::access_policy::{evaluate, AccessContext};
use crate::modules::storage::{ObjectStream, StorageGateway};

/// One incoming download attempt
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub slug: &'a str,
    pub password: Option<&'a str>,
    pub user: Option<&'a AuthenticatedUser>,
    pub ip_address: String,
    pub user_agent: String,
}

pub enum Delivery {
    /// Send the client to the presigned URL
    Redirect(String),
    /// Relay the backend's bytes
    Stream(ObjectStream),
}

/// A download that passed every check and has been counted
pub struct AuthorizedDownload {
    pub file: File,
    pub delivery: Delivery,
}

/// Authorizes, counts and dispatches downloads
pub struct DownloadService {
    registry: Arc<dyn FileRegistry>,
    storage: Arc<dyn StorageGateway>,
    presign_ttl: Duration,
    delivery: DeliveryMode,
}

impl DownloadService {
    pub fn new(
        registry: Arc<dyn FileRegistry>,
        storage: Arc<dyn StorageGateway>,
        presign_ttl: Duration,
        delivery: DeliveryMode,
    ) -> Self {
        Self {
            registry,
            storage,
            presign_ttl,
            delivery,
        }
    }

    /// Gate for the short `/d/<slug>` link: the file must exist and be public
    pub async fn resolve_share_link(&self, slug: &str) -> Result<()> {
        let file = self
            .registry
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if !file.is_public {
            return Err(AppError::Forbidden("This file is not public".to_string()));
        }

        Ok(())
    }

    /// Rejections leave no trace. An authorized download is counted before
    /// any byte is served, so an aborted transfer still counts.
    pub async fn download(&self, request: DownloadRequest<'_>) -> Result<AuthorizedDownload> {
        let file = self.registry.find_by_slug(request.slug).await?;

        let ctx = AccessContext {
            presented_password: request.password,
            user: request.user,
            now: Utc::now(),
        };
        evaluate(file.as_ref(), &ctx)?;
        let file = file.ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        self.registry.record_download(file.id).await?;

        let event = NewDownloadEvent {
            file_id: file.id,
            requester_user_id: request.user.map(|u| u.user_id),
            ip_address: request.ip_address,
            user_agent: request.user_agent,
        };
        if let Err(e) = self.registry.insert_download_event(event).await {
            warn!("Failed to record download event for file {}: {}", file.id, e);
        }

        let presigned_url = self
            .storage
            .presign(&file.storage_path, self.presign_ttl)
            .await?;

        let delivery = match self.delivery {
            DeliveryMode::Redirect => Delivery::Redirect(presigned_url),
            DeliveryMode::Stream => {
                Delivery::Stream(self.storage.fetch(&file.storage_path, &presigned_url).await?)
            }
        };

        info!("Download authorized: file={}, slug={}", file.id, file.download_slug);

        Ok(AuthorizedDownload { file, delivery })
    }
}
