use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Durable storage for text and audio artifacts.
///
/// The compositing engine works on local paths, so every artifact is
/// addressed by the path it lives at.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Directory where new artifacts and intermediates are placed
    fn work_dir(&self) -> &Path;

    fn path_for(&self, name: &str) -> PathBuf {
        self.work_dir().join(name)
    }

    async fn exists(&self, path: &Path) -> bool;

    /// Write `data` under `name`, returning its path
    async fn write(&self, name: &str, data: &[u8]) -> Result<PathBuf>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    async fn remove(&self, path: &Path) -> Result<()>;
}
