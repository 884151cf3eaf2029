use crate::remote::FingerprintMatch;
use std::path::PathBuf;

/// One locally discovered addon folder, as reported by the folder scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Absolute path of the folder on disk.
    pub path: PathBuf,
    /// Opaque content fingerprint; compared by equality only.
    pub fingerprint: String,
    pub folder_name: String,
}
impl ScanResult {
    pub fn new(path: impl Into<PathBuf>, fingerprint: impl Into<String>, folder_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            folder_name: folder_name.into(),
        }
    }
}

/// A [`ScanResult`] paired with the remote match chosen for it (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScanResult {
    pub scan: ScanResult,
    pub exact_match: Option<FingerprintMatch>,
}
impl ResolvedScanResult {
    pub fn is_resolved(&self) -> bool {
        self.exact_match.is_some()
    }
}
