//! Storage module for shared objects
//!
//! Defines the backend-agnostic [`StorageGateway`] capability (put, delete,
//! presigned GET, relay fetch) and its MinIO/S3-compatible implementation.

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

mod minio_client;

#[cfg(test)]
mod memory;

pub use minio_client::MinIOClient;

#[cfg(test)]
pub use memory::InMemoryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failed for '{key}': {message}")]
    Backend { key: String, message: String },

    #[error("fetching '{key}' from storage failed: {message}")]
    Fetch { key: String, message: String },

    #[error("storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn backend(key: &str, message: impl ToString) -> Self {
        StorageError::Backend {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn fetch(key: &str, message: impl ToString) -> Self {
        StorageError::Fetch {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

/// Object bytes relayed from the backend
pub struct ObjectStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, StorageError>>,
}

/// Uniform object-store capability consumed by the file lifecycle.
///
/// Retries are not handled here; failures propagate as [`StorageError`].
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Store `data` under `key`, overwriting any existing object. Returns the object URL.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    /// Remove `key`. An already absent object counts as success.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Time-limited, backend-authenticated GET URL for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Open a presigned URL for relaying. Dropping the stream releases the upstream fetch.
    async fn fetch(&self, key: &str, presigned_url: &str) -> Result<ObjectStream, StorageError>;
}
