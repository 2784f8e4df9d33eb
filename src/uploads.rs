use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};

/// Binary payload storage for avatars and signatures. Rows in the `files`
/// table point at entries here by their generated storage name.
#[async_trait]
pub trait UploadStorage: Send + Sync {
    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<()>;
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Storage name for an upload: 16 random bytes hex-encoded, keeping the
/// original file's extension so served bytes get a sensible content type.
pub fn storage_name(original: &str) -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    let stem = hex::encode(bytes);
    match Path::new(original).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl UploadStorage for DiskStorage {
    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload dir {}", self.root.display()))?;
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write upload {}", path.display()))?;
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read upload {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_name_keeps_the_extension() {
        let name = storage_name("signature.png");
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 32 + ".png".len());
    }

    #[test]
    fn storage_name_without_extension() {
        let name = storage_name("README");
        assert_eq!(name.len(), 32);
    }

    #[test]
    fn storage_names_do_not_collide() {
        assert_ne!(storage_name("a.jpg"), storage_name("a.jpg"));
    }

    #[tokio::test]
    async fn disk_storage_round_trips_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());

        storage.save("abc.png", b"bytes".to_vec()).await.unwrap();
        assert_eq!(
            storage.load("abc.png").await.unwrap(),
            Some(b"bytes".to_vec())
        );
        assert_eq!(storage.load("missing.png").await.unwrap(), None);
    }
}
