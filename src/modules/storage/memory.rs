use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{ObjectStream, StorageError, StorageGateway};

const URL_SCHEME: &str = "memory://";

#[derive(Default)]
struct Inner {
    objects: HashMap<String, (Vec<u8>, String)>,
    failing_deletes: HashSet<String>,
    fail_puts: bool,
    presigned: Vec<(String, Duration)>,
}

/// In-process object store for tests
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().objects.contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|(data, _)| data.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    /// Make every delete of `key` fail until cleared
    pub fn fail_deletes_for(&self, key: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_deletes
            .insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_deletes.clear();
        inner.fail_puts = false;
    }

    pub fn fail_puts(&self) {
        self.inner.lock().unwrap().fail_puts = true;
    }

    pub fn remove_silently(&self, key: &str) {
        self.inner.lock().unwrap().objects.remove(key);
    }

    pub fn presigned_ttls(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap()
            .presigned
            .iter()
            .map(|(_, ttl)| *ttl)
            .collect()
    }
}

#[async_trait]
impl StorageGateway for InMemoryStorage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_puts {
            return Err(StorageError::backend(key, "simulated put failure"));
        }
        inner
            .objects
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(format!("{}{}", URL_SCHEME, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_deletes.contains(key) {
            return Err(StorageError::backend(key, "simulated delete failure"));
        }
        inner.objects.remove(key);
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.presigned.push((key.to_string(), ttl));
        Ok(format!("{}{}?expires={}", URL_SCHEME, key, ttl.as_secs()))
    }

    async fn fetch(&self, key: &str, presigned_url: &str) -> Result<ObjectStream, StorageError> {
        let path = presigned_url
            .strip_prefix(URL_SCHEME)
            .and_then(|rest| rest.split('?').next())
            .ok_or_else(|| StorageError::fetch(key, "not a presigned memory URL"))?;

        let (data, content_type) = self
            .inner
            .lock()
            .unwrap()
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::fetch(key, "upstream responded with 404 Not Found"))?;

        let content_length = Some(data.len() as u64);
        let body = futures::stream::once(async move { Ok(Bytes::from(data)) }).boxed();

        Ok(ObjectStream {
            content_type: Some(content_type),
            content_length,
            body,
        })
    }
}
