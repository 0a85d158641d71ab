//! MinIO/S3-compatible storage client
//!
//! Uses rust-s3 for object operations and reqwest to relay presigned GETs.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ObjectStream, StorageError, StorageGateway};
use crate::core::config::StorageConfig;

/// Longest expiry S3 accepts for a presigned URL (7 days)
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 3600;

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    public_endpoint: String,
    /// HTTP client used to relay presigned downloads
    http_client: Client,
}

impl MinIOClient {
    /// Create a new client from configuration and make sure the bucket exists
    pub async fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Configuration(format!("invalid credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| StorageError::Configuration(format!("invalid bucket: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let http_client = Client::builder()
            .build()
            .map_err(|e| StorageError::Configuration(format!("HTTP client: {}", e)))?;

        let client = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
            public_endpoint: config.public_endpoint,
            http_client,
        };

        client.ensure_bucket_exists().await;

        info!(
            "Storage client initialized for endpoint: {}, bucket: {}",
            client.endpoint,
            client.bucket.name()
        );

        Ok(client)
    }

    /// Ensure the bucket exists, create if not
    async fn ensure_bucket_exists(&self) {
        let created = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match created {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }

    /// Direct object URL on the public endpoint (not authenticated)
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_endpoint, self.bucket.name(), key)
    }
}

#[async_trait]
impl StorageGateway for MinIOClient {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| StorageError::backend(key, e))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::backend(
                key,
                format!("upload rejected with status {}", status),
            ));
        }

        debug!("Uploaded '{}' to bucket '{}'", key, self.bucket.name());
        Ok(self.object_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .map_err(|e| StorageError::backend(key, e))?;

        match response.status_code() {
            200..=299 => {
                debug!("Deleted '{}' from bucket '{}'", key, self.bucket.name());
                Ok(())
            }
            404 => {
                debug!("Object '{}' already absent", key);
                Ok(())
            }
            status => Err(StorageError::backend(
                key,
                format!("delete rejected with status {}", status),
            )),
        }
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let expiry_secs = ttl.as_secs().clamp(1, MAX_PRESIGN_SECS) as u32;

        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| StorageError::backend(key, e))
    }

    async fn fetch(&self, key: &str, presigned_url: &str) -> Result<ObjectStream, StorageError> {
        let response = self
            .http_client
            .get(presigned_url)
            .send()
            .await
            .map_err(|e| StorageError::fetch(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::fetch(
                key,
                format!("upstream responded with {}", status),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = response.content_length();

        let owned_key = key.to_string();
        let body = response
            .bytes_stream()
            .map_err(move |e| StorageError::fetch(&owned_key, e))
            .boxed();

        Ok(ObjectStream {
            content_type,
            content_length,
            body,
        })
    }
}
