//! The addon hub provider.
//!
//! Every lookup goes through the shared [`ResponseCache`] (except batch
//! lookups, which are always fresh) and then through the [`ResilientClient`],
//! so concurrent identical lookups cost one request and a hub that has gone
//! away is noticed once rather than once per caller.

#[cfg(test)]
mod tests;

use crate::error::{Error, ErrorKind, Result};
use crate::provider::{AddonProvider, BatchResult};
use crate::reconcile::{BuildContext, build_addon, group_by_match, match_scan_results};
use crate::search::to_search_result;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use hubsync_cache::ResponseCache;
use hubsync_client::error::ErrorKind as ClientErrorKind;
use hubsync_client::transport::ReqwestTransport;
use hubsync_client::{ClientOptions, ResilientClient, build_url};
use hubsync_config::{CacheConfig, Config};
use hubsync_models::{
    AddonEnvelope, AddonSearchResult, AddonsEnvelope, BatchRequest, Channel, ClientType, FingerprintMatch,
    FingerprintRequest, FingerprintResponse, GameVariant, Lenient, ReleaseEnvelope, RemoteAddon, ResolvedAddon,
    ResolvedScanResult, ScanResult,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

pub const NAME: &str = "WowUpHub";

const FEATURED_COUNT: &str = "60";
const SEARCH_LIMIT: &str = "10";

/// Breaker names, one per hub route.
mod endpoint {
    pub(super) const BATCH: &str = "hub.batch";
    pub(super) const FEATURED: &str = "hub.featured";
    pub(super) const SEARCH: &str = "hub.search";
    pub(super) const ADDON: &str = "hub.addon";
    pub(super) const RELEASE: &str = "hub.release";
    pub(super) const FINGERPRINT: &str = "hub.fingerprint";
}

/// How long each kind of hub response stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub featured: Duration,
    pub search: Duration,
    /// Single addon, release changelog and fingerprint lookups.
    pub lookup: Duration,
}
impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}
impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            featured: config.featured_ttl(),
            search: config.search_ttl(),
            lookup: config.lookup_ttl(),
        }
    }
}

/// Strictly digits, positive and within `u64`.
pub(crate) fn parse_addon_id(addon_id: &str) -> Option<u64> {
    if addon_id.is_empty() || !addon_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    addon_id.parse::<u64>().ok().filter(|id| *id > 0)
}

/// Cache key of a fingerprint lookup: independent of the order (and
/// repetition) of the fingerprints in the set.
fn fingerprint_set_key(fingerprints: &BTreeSet<&str>) -> String {
    let mut hasher = blake3::Hasher::new();
    for fingerprint in fingerprints {
        hasher.update(&(fingerprint.len() as u64).to_le_bytes());
        hasher.update(fingerprint.as_bytes());
    }
    format!("fingerprint:{}", hasher.finalize().to_hex())
}

/// The entries of a list response that decoded; the others are logged and dropped.
fn valid_entries<T>(entries: &[Lenient<T>]) -> impl Iterator<Item = &T> {
    entries.iter().filter_map(|entry| {
        if let Lenient::Invalid { reason, .. } = entry {
            tracing::warn!(id = ?entry.raw_id(), %reason, "Skipping unreadable entry in hub response");
        }
        entry.as_valid()
    })
}

/// Browsing results, without the addons that have nothing for `variant`.
fn to_search_results(addons: &[Lenient<RemoteAddon>], variant: GameVariant) -> Vec<AddonSearchResult> {
    valid_entries(addons)
        .map(|addon| to_search_result(addon, variant, NAME))
        .filter(|result| !result.files.is_empty())
        .collect()
}

pub struct HubProvider {
    client: Arc<ResilientClient>,
    cache: Arc<ResponseCache>,
    base_url: String,
    ttls: CacheTtls,
}

impl HubProvider {
    pub fn new(
        client: Arc<ResilientClient>,
        cache: Arc<ResponseCache>,
        base_url: impl Into<String>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            client,
            cache,
            base_url: base_url.into(),
            ttls,
        }
    }

    /// A provider talking to the configured hub over HTTP, with a cache of
    /// its own.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.api.user_agent).or_raise(|| ErrorKind::Remote)?;
        let options = ClientOptions {
            request_timeout: config.api.request_timeout(),
            failure_threshold: config.breaker.failure_threshold,
            reset_timeout: config.breaker.reset_timeout(),
        };
        let client = ResilientClient::new(Arc::new(transport), options);
        Ok(Self::new(
            Arc::new(client),
            Arc::new(ResponseCache::new()),
            config.api.base_url.clone(),
            CacheTtls::from(&config.cache),
        ))
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        build_url(&self.base_url, path, query).or_raise(|| ErrorKind::Remote)
    }

    /// `GET url` through the cache. Errors come back as bare client error
    /// kinds so every waiter of a shared fetch gets its own copy.
    async fn cached_get<T>(
        &self,
        key: String,
        ttl: Duration,
        endpoint: &'static str,
        url: String,
    ) -> std::result::Result<Arc<T>, ClientErrorKind>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let client = Arc::clone(&self.client);
        self.cache
            .transaction(key, ttl, move || async move {
                client.get_json::<T>(endpoint, &url).await.map(Arc::new).map_err(|err| (*err).clone())
            })
            .await
    }

    async fn cached_post<T, B>(
        &self,
        key: String,
        ttl: Duration,
        endpoint: &'static str,
        url: String,
        body: B,
    ) -> std::result::Result<Arc<T>, ClientErrorKind>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        B: Serialize + Send + Sync + 'static,
    {
        let client = Arc::clone(&self.client);
        self.cache
            .transaction(key, ttl, move || async move {
                client.post_json::<T, B>(endpoint, &url, &body).await.map(Arc::new).map_err(|err| (*err).clone())
            })
            .await
    }

    async fn fetch_addons(
        &self,
        key: String,
        ttl: Duration,
        endpoint: &'static str,
        url: String,
    ) -> Result<Arc<AddonsEnvelope>> {
        self.cached_get(key, ttl, endpoint, url).await.map_err(ErrorKind::remote)
    }

    /// A single catalog entry; a `404` means it was removed upstream.
    async fn fetch_addon(&self, addon_id: u64) -> Result<Arc<AddonEnvelope>> {
        let url = self.url(&format!("/addons/{addon_id}"), &[])?;
        let lookup = self.cached_get(format!("addon:{addon_id}"), self.ttls.lookup, endpoint::ADDON, url).await;
        lookup.map_err(|kind| match kind {
            ClientErrorKind::Status(404) => {
                tracing::debug!(addon_id, "Addon not found upstream");
                exn::Exn::from(kind).raise(ErrorKind::SourceRemoved(addon_id.to_string()))
            },
            kind => ErrorKind::remote(kind),
        })
    }

    async fn fetch_changelog(&self, addon_id: &str, release_id: &str) -> Result<String> {
        let addon = parse_addon_id(addon_id).ok_or_raise(|| ErrorKind::MalformedInput(addon_id.to_string()))?;
        let release = parse_addon_id(release_id).ok_or_raise(|| ErrorKind::MalformedInput(release_id.to_string()))?;
        let url = self.url(&format!("/addons/{addon}/releases/{release}"), &[])?;
        let envelope: Arc<ReleaseEnvelope> = self
            .cached_get(format!("release:{addon}:{release}"), self.ttls.lookup, endpoint::RELEASE, url)
            .await
            .map_err(ErrorKind::remote)?;
        Ok(envelope.release.body.clone().unwrap_or_default())
    }

    async fn fetch_fingerprint_matches(&self, scan_results: &[ScanResult]) -> Result<Arc<FingerprintResponse>> {
        let fingerprints: BTreeSet<&str> = scan_results.iter().map(|scan| scan.fingerprint.as_str()).collect();
        let key = fingerprint_set_key(&fingerprints);
        let body = FingerprintRequest {
            fingerprints: fingerprints.into_iter().map(str::to_string).collect(),
        };
        let url = self.url("/addons/fingerprint", &[])?;
        self.cached_post(key, self.ttls.lookup, endpoint::FINGERPRINT, url, body).await.map_err(ErrorKind::remote)
    }

    /// Match every folder against a single fingerprint lookup.
    ///
    /// Folders without a match come back with no `exact_match`.
    #[instrument(
        level = "debug",
        skip(self, client_type, scan_results),
        fields(%client_type, folders = scan_results.len())
    )]
    pub async fn resolve_scan_results(
        &self,
        client_type: ClientType,
        scan_results: Vec<ScanResult>,
    ) -> Result<Vec<ResolvedScanResult>> {
        if scan_results.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.fetch_fingerprint_matches(&scan_results).await?;
        let matches: Vec<FingerprintMatch> = valid_entries(&response.exact_matches).cloned().collect();
        tracing::debug!(matches = matches.len(), "Fingerprint lookup answered");
        Ok(match_scan_results(scan_results, &matches, client_type.game_variant()))
    }
}

#[async_trait]
impl AddonProvider for HubProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_valid_addon_id(&self, addon_id: &str) -> bool {
        parse_addon_id(addon_id).is_some()
    }

    #[instrument(
        level = "debug",
        skip(self, client_type, addon_ids),
        fields(%client_type, requested = addon_ids.len())
    )]
    async fn get_all(&self, client_type: ClientType, addon_ids: &[String]) -> Result<BatchResult> {
        let variant = client_type.game_variant();
        let mut errors: Vec<Error> = Vec::new();
        let mut ids: Vec<u64> = Vec::with_capacity(addon_ids.len());
        for addon_id in addon_ids {
            match parse_addon_id(addon_id) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {},
                None => errors.push(Error::from(ErrorKind::MalformedInput(addon_id.clone()))),
            }
        }
        if ids.is_empty() {
            return Ok(BatchResult { results: Vec::new(), errors });
        }

        let url = self.url(&format!("/addons/batch/{variant}"), &[])?;
        let request = BatchRequest { addon_ids: ids.clone() };
        let response: AddonsEnvelope =
            self.client.post_json(endpoint::BATCH, &url, &request).await.map_err(ErrorKind::from_client)?;

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(addon) = response.addons.iter().filter_map(Lenient::as_valid).find(|addon| addon.id == id) {
                results.push(to_search_result(addon, variant, NAME));
                continue;
            }
            match response.addons.iter().find(|entry| entry.raw_id() == Some(id)) {
                Some(Lenient::Invalid { reason, .. }) => {
                    tracing::warn!(addon_id = id, %reason, "Batch response entry could not be decoded");
                    errors.push(Error::from(ErrorKind::InvalidEntry(id.to_string())));
                },
                _ => {
                    tracing::info!(addon_id = id, "Addon missing from batch response; removed upstream");
                    errors.push(Error::from(ErrorKind::SourceRemoved(id.to_string())));
                },
            }
        }
        Ok(BatchResult { results, errors })
    }

    #[instrument(level = "debug", skip(self, client_type), fields(%client_type))]
    async fn get_featured_addons(&self, client_type: ClientType) -> Result<Vec<AddonSearchResult>> {
        let variant = client_type.game_variant();
        let url = self.url(&format!("/addons/featured/{variant}"), &[("count", FEATURED_COUNT)])?;
        let key = format!("featured:{variant}");
        let response = self.fetch_addons(key, self.ttls.featured, endpoint::FEATURED, url).await?;
        Ok(to_search_results(&response.addons, variant))
    }

    #[instrument(level = "debug", skip(self, client_type), fields(%client_type))]
    async fn search_by_query(&self, query: &str, client_type: ClientType) -> Result<Vec<AddonSearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let variant = client_type.game_variant();
        let url = self.url(&format!("/addons/search/{variant}"), &[("query", query), ("limit", SEARCH_LIMIT)])?;
        let key = format!("search:{variant}:{query}");
        let response = self.fetch_addons(key, self.ttls.search, endpoint::SEARCH, url).await?;
        Ok(to_search_results(&response.addons, variant))
    }

    #[instrument(level = "debug", skip(self, client_type), fields(%client_type))]
    async fn get_by_id(&self, addon_id: &str, client_type: ClientType) -> Result<Option<AddonSearchResult>> {
        let id = parse_addon_id(addon_id).ok_or_raise(|| ErrorKind::MalformedInput(addon_id.to_string()))?;
        let envelope = self.fetch_addon(id).await?;
        let result = to_search_result(&envelope.addon, client_type.game_variant(), NAME);
        if result.files.is_empty() {
            tracing::debug!(addon_id, "Addon has no release for this game variant");
            return Ok(None);
        }
        Ok(Some(result))
    }

    async fn get_release_changelog(&self, addon_id: &str, release_id: &str) -> String {
        self.fetch_changelog(addon_id, release_id).await.unwrap_or_else(|err| {
            let kind: &ErrorKind = &err;
            tracing::warn!(addon_id, release_id, error = %kind, "Could not fetch release changelog");
            String::new()
        })
    }

    async fn get_description(&self, addon_id: &str) -> String {
        let Some(id) = parse_addon_id(addon_id) else {
            tracing::warn!(addon_id, "Not fetching description of malformed addon identifier");
            return String::new();
        };
        match self.fetch_addon(id).await {
            Ok(envelope) => envelope.addon.description.clone().unwrap_or_default(),
            Err(err) => {
                let kind: &ErrorKind = &err;
                tracing::warn!(addon_id, error = %kind, "Could not fetch addon description");
                String::new()
            },
        }
    }

    #[instrument(
        skip(self, client_type, channel_preference, scan_results),
        fields(provider = NAME, %client_type, folders = scan_results.len())
    )]
    async fn scan(
        &self,
        client_type: ClientType,
        channel_preference: Channel,
        scan_results: Vec<ScanResult>,
    ) -> Result<Vec<ResolvedAddon>> {
        let resolved = self.resolve_scan_results(client_type, scan_results).await?;
        let context = BuildContext {
            provider_name: NAME,
            client_type,
            channel_preference,
            now: OffsetDateTime::now_utc(),
        };
        let mut addons = Vec::new();
        for group in group_by_match(resolved) {
            match build_addon(&group, &context) {
                Ok(addon) => addons.push(addon),
                Err(err) => {
                    let kind: &ErrorKind = &err;
                    tracing::warn!(
                        addon_id = group.matched.source_addon_id,
                        release_id = group.matched.matched_release.id,
                        error = %kind,
                        "Skipping addon that could not be resolved"
                    );
                },
            }
        }
        tracing::info!(resolved = addons.len(), "Scan complete");
        Ok(addons)
    }
}
