//! The provider abstraction and the registry that selects between providers.

use crate::error::{Error, ErrorKind, Result};
use crate::scanner::FolderScanner;
use async_trait::async_trait;
use exn::ResultExt;
use hubsync_models::{AddonSearchResult, Channel, ClientType, ResolvedAddon, ScanResult};
use std::path::PathBuf;
use std::sync::Arc;

pub type ProviderHandle = Arc<dyn AddonProvider + Send + Sync>;

/// Outcome of a batch lookup: whatever could be found, plus one error per
/// identifier that couldn't.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub results: Vec<AddonSearchResult>,
    pub errors: Vec<Error>,
}

/// A catalog that installed addons can be resolved against.
///
/// Lookups that are merely informative ([`get_release_changelog`] and
/// [`get_description`]) never fail: they return an empty string instead.
///
/// [`get_release_changelog`]: AddonProvider::get_release_changelog
/// [`get_description`]: AddonProvider::get_description
#[async_trait]
pub trait AddonProvider: Send + Sync {
    /// Name of the provider; unique within a [`ProviderRegistry`].
    fn name(&self) -> &str;

    /// Whether `addon_id` is shaped like an identifier of this provider.
    fn is_valid_addon_id(&self, addon_id: &str) -> bool;

    /// Look up many catalog entries at once.
    ///
    /// Identifiers that are malformed or unknown upstream are reported in
    /// [`BatchResult::errors`] without affecting the others.
    async fn get_all(&self, client_type: ClientType, addon_ids: &[String]) -> Result<BatchResult>;

    async fn get_featured_addons(&self, client_type: ClientType) -> Result<Vec<AddonSearchResult>>;

    async fn search_by_query(&self, query: &str, client_type: ClientType) -> Result<Vec<AddonSearchResult>>;

    /// `None` when the entry exists but has nothing for `client_type`.
    async fn get_by_id(&self, addon_id: &str, client_type: ClientType) -> Result<Option<AddonSearchResult>>;

    async fn get_release_changelog(&self, addon_id: &str, release_id: &str) -> String;

    async fn get_description(&self, addon_id: &str) -> String;

    /// Resolve already-fingerprinted folders into addons. Folders without a
    /// match are silently left out.
    async fn scan(
        &self,
        client_type: ClientType,
        channel_preference: Channel,
        scan_results: Vec<ScanResult>,
    ) -> Result<Vec<ResolvedAddon>>;

    /// Fingerprint `paths` with `scanner`, then [`scan`](Self::scan) them.
    async fn scan_folders(
        &self,
        scanner: &dyn FolderScanner,
        client_type: ClientType,
        channel_preference: Channel,
        paths: &[PathBuf],
    ) -> Result<Vec<ResolvedAddon>> {
        let scan_results = scanner.scan(paths).await.or_raise(|| ErrorKind::Scanner)?;
        self.scan(client_type, channel_preference, scan_results).await
    }
}

/// Providers by name, in registration order.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderHandle>,
}
impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider`, replacing any provider with the same name.
    pub fn register(&mut self, provider: ProviderHandle) {
        match self.providers.iter().position(|p| p.name() == provider.name()) {
            Some(position) => {
                tracing::debug!(provider = provider.name(), "Replacing registered provider");
                self.providers[position] = provider;
            },
            None => self.providers.push(provider),
        }
    }

    pub fn with(mut self, provider: ProviderHandle) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<ProviderHandle> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
