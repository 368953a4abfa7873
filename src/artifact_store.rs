//! Object-storage write/delete + public URL composition (spec.md §4.6, §3).
//!
//! Backed by the `object_store` crate's generic `ObjectStore` trait so the
//! concrete backend (local filesystem here, S3/GCS/R2 in a real deployment)
//! is a one-line swap behind `ArtifactStore::new`.

use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore as ObjectStoreTrait, PutPayload};
use std::sync::Arc;

#[derive(Clone)]
pub struct ArtifactStore {
    backend: Arc<dyn ObjectStoreTrait>,
    cdn_host: String,
}

impl ArtifactStore {
    pub fn new(backend: Arc<dyn ObjectStoreTrait>, cdn_host: String) -> Self {
        Self { backend, cdn_host }
    }

    pub async fn put(&self, object_key: &str, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        let path = ObjectPath::from(object_key);
        self.backend.put(&path, PutPayload::from(bytes)).await?;
        Ok(())
    }

    pub async fn delete(&self, object_key: &str) -> anyhow::Result<()> {
        let path = ObjectPath::from(object_key);
        self.backend.delete(&path).await?;
        Ok(())
    }

    pub fn public_url(&self, object_key: &str) -> String {
        crate::ids::public_url(&self.cdn_host, object_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::local::LocalFileSystem;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_delete_round_trips() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(LocalFileSystem::new_with_prefix(dir.path()).unwrap());
        let store = ArtifactStore::new(backend, "cdn.example.com".to_string());

        store.put("screenshots/abc/file.png", vec![1, 2, 3], "image/png").await.unwrap();
        assert_eq!(store.public_url("screenshots/abc/file.png"), "https://cdn.example.com/screenshots/abc/file.png");
        store.delete("screenshots/abc/file.png").await.unwrap();
    }
}
