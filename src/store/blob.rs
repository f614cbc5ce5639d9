//! Content-addressed blob storage.
//!
//! Bytes are hashed with SHA-256 and written to `<data_dir>/blobs/<xx>/<hash><ext>`
//! where `xx` is the first two hex characters of the hash (spec.md §6), mirroring the
//! teacher's two-level CAS sharding (`library::Library::thumbnail_path`) generalized
//! from a fixed `.webp` thumbnail extension to an arbitrary mime-derived extension.

use super::entities::{blob, media};
use super::error::{StoreError, StoreResult};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, hash: &str, mime_type: &str) -> PathBuf {
        let shard = &hash[0..2];
        let ext = extension_for_mime(mime_type);
        self.root.join(shard).join(format!("{hash}{ext}"))
    }

    /// Stores `bytes` under its SHA-256 hash, writing the file only if not already
    /// present. Returns `(hash, is_new)` where `is_new=false` means the bytes were
    /// already present under that hash (dedup).
    pub async fn store_blob<C: ConnectionTrait>(
        &self,
        conn: &C,
        bytes: &[u8],
        mime_type: &str,
    ) -> StoreResult<(String, bool)> {
        let hash = hex::encode(Sha256::digest(bytes));

        if blob::Entity::find_by_id(hash.clone()).one(conn).await?.is_some() {
            return Ok((hash, false));
        }

        let path = self.path_for(&hash, mime_type);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        let model = blob::ActiveModel {
            blob_hash: Set(hash.clone()),
            path: Set(path.to_string_lossy().to_string()),
            mime_type: Set(mime_type.to_string()),
            size_bytes: Set(bytes.len() as i64),
            width: Set(None),
            height: Set(None),
        };
        model.insert(conn).await?;

        Ok((hash, true))
    }

    /// Reads the bytes for `hash` back off disk.
    pub async fn get_blob<C: ConnectionTrait>(&self, conn: &C, hash: &str) -> StoreResult<Vec<u8>> {
        let row = blob::Entity::find_by_id(hash.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("blob {hash}")))?;
        Ok(tokio::fs::read(Path::new(&row.path)).await?)
    }

    /// Deletes a blob, refusing while any media row still references it.
    pub async fn delete_blob<C: ConnectionTrait>(&self, conn: &C, hash: &str) -> StoreResult<()> {
        let refs = media::Entity::find()
            .filter(media::Column::BlobHash.eq(hash))
            .count(conn)
            .await?;
        if refs > 0 {
            return Err(StoreError::Constraint {
                key: format!("blob {hash} still referenced by {refs} media row(s)"),
            });
        }

        let row = blob::Entity::find_by_id(hash.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("blob {hash}")))?;
        let path = row.path.clone();
        blob::Entity::delete_by_id(hash.to_string()).exec(conn).await?;
        let _ = tokio::fs::remove_file(path).await;
        Ok(())
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "application/pdf" => ".pdf",
        _ => ".bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn store_blob_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("test.db"), dir.path().join("blobs"))
            .await
            .unwrap();

        let (hash1, new1) = store.blobs().store_blob(store.conn(), b"hello", "text/plain").await.unwrap();
        let (hash2, new2) = store.blobs().store_blob(store.conn(), b"hello", "text/plain").await.unwrap();

        assert_eq!(hash1, hash2);
        assert!(new1);
        assert!(!new2);

        let shard_dir = dir.path().join("blobs").join(&hash1[0..2]);
        let files: Vec<_> = std::fs::read_dir(&shard_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn delete_refused_while_referenced() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("test.db"), dir.path().join("blobs"))
            .await
            .unwrap();
        let (hash, _) = store.blobs().store_blob(store.conn(), b"data", "text/plain").await.unwrap();

        store
            .create_person("p1", "Test Person")
            .await
            .unwrap();
        let m = media::ActiveModel {
            media_id: Set("m1".to_string()),
            person_id: Set("p1".to_string()),
            blob_hash: Set(hash.clone()),
            source: Set("test".to_string()),
            is_primary: Set(true),
            caption: Set(None),
        };
        m.insert(store.conn()).await.unwrap();

        let result = store.blobs().delete_blob(store.conn(), &hash).await;
        assert!(result.is_err());
    }
}
