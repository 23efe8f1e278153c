//! Content and media stores.
//!
//! Node outputs are persisted to the [`ContentStore`] and referenced from
//! execution records by key, so the ledger never carries raw payloads.
//! The [`MediaStore`] is the external object-storage collaborator consumed
//! for generated media (upload/fetch/resize/presign).

use crate::error::StoreError;
use amber_relay_workflow::{ContentValue, MediaRef, OutputRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use ulid::Ulid;

/// Store for node output values.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persists a value and returns its reference.
    async fn put(&self, value: &ContentValue) -> Result<OutputRef, StoreError>;

    /// Resolves a reference back to its value.
    async fn get(&self, output: &OutputRef) -> Result<ContentValue, StoreError>;
}

/// The external media-storage collaborator.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads raw bytes, returning a media reference.
    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<MediaRef, StoreError>;

    /// Fetches the bytes behind a media reference.
    async fn fetch(&self, media: &MediaRef) -> Result<Vec<u8>, StoreError>;

    /// Produces a resized variant of an image.
    async fn resize(
        &self,
        media: &MediaRef,
        width: u32,
        height: u32,
    ) -> Result<MediaRef, StoreError>;

    /// Returns a short-lived public URL for a media object.
    async fn presign(&self, media: &MediaRef) -> Result<String, StoreError>;
}

/// In-memory content store.
#[derive(Default)]
pub struct MemoryContentStore {
    data: Mutex<HashMap<String, ContentValue>>,
}

impl MemoryContentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, value: &ContentValue) -> Result<OutputRef, StoreError> {
        let key = format!("out_{}", Ulid::new());
        self.data
            .lock()
            .unwrap()
            .insert(key.clone(), value.clone());
        Ok(OutputRef::new(key))
    }

    async fn get(&self, output: &OutputRef) -> Result<ContentValue, StoreError> {
        self.data
            .lock()
            .unwrap()
            .get(&output.key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: output.key.clone(),
            })
    }
}

/// In-memory media store.
///
/// Resizing records the requested dimensions in a derived key, which keeps
/// the operation deterministic and lets tests assert on the transform.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryMediaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<MediaRef, StoreError> {
        let key = format!("media_{}", Ulid::new());
        self.objects
            .lock()
            .unwrap()
            .insert(key.clone(), (data, content_type.to_string()));
        Ok(MediaRef::new(key, content_type))
    }

    async fn fetch(&self, media: &MediaRef) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&media.key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: media.key.clone(),
            })
    }

    async fn resize(
        &self,
        media: &MediaRef,
        width: u32,
        height: u32,
    ) -> Result<MediaRef, StoreError> {
        let mut objects = self.objects.lock().unwrap();
        let (data, content_type) =
            objects
                .get(&media.key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    key: media.key.clone(),
                })?;

        let key = format!("{}@{width}x{height}", media.key);
        objects.insert(key.clone(), (data, content_type.clone()));
        Ok(MediaRef::new(key, content_type))
    }

    async fn presign(&self, media: &MediaRef) -> Result<String, StoreError> {
        if !self.objects.lock().unwrap().contains_key(&media.key) {
            return Err(StoreError::NotFound {
                key: media.key.clone(),
            });
        }
        Ok(format!("https://media.invalid/{}", media.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn content_store_roundtrip() {
        let store = MemoryContentStore::new();
        let value = ContentValue::Text("stored".to_string());

        let output = store.put(&value).await.unwrap();
        assert!(output.key.starts_with("out_"));
        assert_eq!(store.get(&output).await.unwrap(), value);
    }

    #[tokio::test]
    async fn content_store_misses_unknown_keys() {
        let store = MemoryContentStore::new();
        let result = store.get(&OutputRef::new("out_nonexistent")).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn media_upload_fetch_roundtrip() {
        let store = MemoryMediaStore::new();
        let media = store.upload(vec![1, 2, 3], "image/png").await.unwrap();

        assert_eq!(store.fetch(&media).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(media.content_type, "image/png");
    }

    #[tokio::test]
    async fn resize_produces_a_derived_object() {
        let store = MemoryMediaStore::new();
        let media = store.upload(vec![0; 16], "image/png").await.unwrap();

        let resized = store.resize(&media, 1200, 628).await.unwrap();
        assert!(resized.key.ends_with("@1200x628"));
        assert!(store.fetch(&resized).await.is_ok());
    }

    #[tokio::test]
    async fn resize_of_unknown_media_fails() {
        let store = MemoryMediaStore::new();
        let result = store
            .resize(&MediaRef::new("media_missing", "image/png"), 100, 100)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn presign_returns_a_url() {
        let store = MemoryMediaStore::new();
        let media = store.upload(vec![9], "image/jpeg").await.unwrap();
        let url = store.presign(&media).await.unwrap();
        assert!(url.contains(&media.key));
    }
}
