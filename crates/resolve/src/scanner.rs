use crate::error::Result;
use async_trait::async_trait;
use hubsync_models::ScanResult;
use std::path::PathBuf;

/// Produces fingerprints for installed addon folders.
///
/// Implemented outside this crate (hashing folder contents is not the
/// resolution layer's business). A failure aborts the whole scan pass;
/// implementations should report it as
/// [`Scanner`](crate::error::ErrorKind::Scanner).
#[async_trait]
pub trait FolderScanner: Send + Sync {
    /// One [`ScanResult`] per folder in `paths`.
    async fn scan(&self, paths: &[PathBuf]) -> Result<Vec<ScanResult>>;
}
