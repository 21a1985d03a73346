use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{info, warn};
use uuid::Uuid;

use rapport_core::ports::{BlobStore, StoredBlob};

/// Photo storage on the local disk.
///
/// Each upload lands at `{dir}/{public_id}` and is served back under
/// `{base_url}/{public_id}`. Calls block, so run them off the async runtime.
pub struct DiskBlobStore {
    dir: PathBuf,
    base_url: String,
}

impl DiskBlobStore {
    pub fn new(dir: PathBuf, base_url: &str) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        info!("Photo storage directory: {}", dir.display());
        Ok(Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, public_id: &str) -> Result<PathBuf> {
        // Only ids we minted ourselves; keeps callers inside `dir`.
        if Uuid::parse_str(public_id).is_err() {
            bail!("Invalid blob id: {}", public_id);
        }
        Ok(self.dir.join(public_id))
    }
}

impl BlobStore for DiskBlobStore {
    fn upload(&self, bytes: &[u8]) -> Result<StoredBlob> {
        let public_id = Uuid::new_v4().to_string();
        let path = self.path_for(&public_id)?;
        fs::write(&path, bytes)?;

        Ok(StoredBlob {
            url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    fn delete(&self, public_id: &str) -> Result<bool> {
        let path = self.path_for(public_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            // Already gone counts as released so the record can still go.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Blob {} was already gone", public_id);
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_writes_file_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path().join("photos"), "http://localhost:3000/uploads/")
            .unwrap();

        let blob = store.upload(b"jpeg bytes").unwrap();

        assert_eq!(
            blob.url,
            format!("http://localhost:3000/uploads/{}", blob.public_id)
        );
        let written = fs::read(dir.path().join("photos").join(&blob.public_id)).unwrap();
        assert_eq!(written, b"jpeg bytes");
    }

    #[test]
    fn delete_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path().to_path_buf(), "/uploads").unwrap();
        let blob = store.upload(b"x").unwrap();

        assert!(store.delete(&blob.public_id).unwrap());
        assert!(!dir.path().join(&blob.public_id).exists());
        // A second release finds nothing and still succeeds.
        assert!(store.delete(&blob.public_id).unwrap());
    }

    #[test]
    fn delete_rejects_foreign_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path().to_path_buf(), "/uploads").unwrap();

        assert!(store.delete("../etc/passwd").is_err());
    }
}
