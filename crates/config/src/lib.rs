//! Layered configuration for hubsync.
//!
//! Sources are merged in order, later sources winning:
//! 1. Built-in defaults ([`Config::default`]),
//! 2. A configuration file (`hubsync.toml`, `.yaml`/`.yml` or `.json`),
//! 3. Environment variables prefixed `HUBSYNC_`, nested with `__`
//!    (e.g. `HUBSYNC_BREAKER__FAILURE_THRESHOLD=3`).
//!
//! Nothing in the resolution layer hard-codes the hub location or any
//! timeout; they all come from here.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "HUBSYNC_";
const FILE_STEM: &str = "hubsync";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
}

/// Where the hub lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the hub API, without a trailing slash.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}
impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hub.wowup.io".to_string(),
            request_timeout_secs: 10,
            user_agent: concat!("hubsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before an endpoint's breaker opens.
    pub failure_threshold: u32,
    /// How long an open breaker waits before letting a probe through.
    pub reset_timeout_secs: u64,
}
impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
        }
    }
}
impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

/// Validity windows of cached hub responses. Zero disables caching for
/// that kind of request (concurrent duplicates are still collapsed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub featured_ttl_secs: u64,
    pub search_ttl_secs: u64,
    /// Single addon, release changelog and fingerprint lookups.
    pub lookup_ttl_secs: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            featured_ttl_secs: 30 * 60,
            search_ttl_secs: 5,
            lookup_ttl_secs: 5 * 60,
        }
    }
}
impl CacheConfig {
    pub fn featured_ttl(&self) -> Duration {
        Duration::from_secs(self.featured_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn lookup_ttl(&self) -> Duration {
        Duration::from_secs(self.lookup_ttl_secs)
    }
}

impl Config {
    /// Load from the platform configuration directory (if a `hubsync.*` file
    /// exists there) and the environment.
    pub fn load() -> Result<Self> {
        let file = Self::default_file();
        match &file {
            Some(path) => tracing::debug!(path = %path.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file found; using defaults and environment"),
        }
        Self::extract(Self::figment(file.as_deref())?)
    }

    /// Load from an explicit file (which must exist) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::Load);
        }
        Self::extract(Self::figment(Some(path))?)
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn default_file() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", FILE_STEM)?;
        ["toml", "yaml", "yml", "json"]
            .into_iter()
            .map(|ext| dirs.config_dir().join(format!("{FILE_STEM}.{ext}")))
            .find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            exn::bail!(ErrorKind::Invalid("api.base_url"));
        }
        if self.api.request_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("api.request_timeout_secs"));
        }
        if self.breaker.failure_threshold == 0 {
            exn::bail!(ErrorKind::Invalid("breaker.failure_threshold"));
        }
        Ok(())
    }
}
