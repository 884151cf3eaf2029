//! Records exchanged with the hub API.
//!
//! Everything here mirrors the hub's camelCase JSON. Fields the hub is known
//! to omit or send as `null` are defaulted rather than rejected; a catalog
//! entry with a missing description is still a usable catalog entry.
//! Entries of list responses are decoded one by one (see [`Lenient`]).

use crate::lenient::Lenient;
use crate::variant::GameVariant;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A catalog entry. Fetched, never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAddon {
    pub id: u64,
    pub repository_name: String,
    #[serde(default)]
    pub owner_name: String,
    /// Canonical URL of the upstream repository.
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub owner_image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_download_count: u64,
    #[serde(default)]
    pub funding_links: Vec<FundingLink>,
    #[serde(default)]
    pub releases: Vec<RemoteRelease>,
}
impl RemoteAddon {
    /// Thumbnail for display: the addon's own image, else its owner's avatar.
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.image_url.as_deref().or(self.owner_image_url.as_deref())
    }
}

/// One published version of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRelease {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub download_url: String,
    /// Release notes (markdown); used as the changelog.
    #[serde(default)]
    pub body: Option<String>,
    /// At most one entry per [`GameVariant`].
    #[serde(default)]
    pub game_versions: Vec<GameVersion>,
    #[serde(default)]
    pub addon_folders: Vec<AddonFolder>,
}
impl RemoteRelease {
    /// The game version entry declared for `variant`, if any.
    pub fn game_version(&self, variant: GameVariant) -> Option<&GameVersion> {
        self.game_versions.iter().find(|gv| gv.game_type == variant)
    }

    pub fn declares(&self, variant: GameVariant) -> bool {
        self.game_version(variant).is_some()
    }

    /// Whether any folder shipped by this release carries `fingerprint`.
    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.addon_folders.iter().any(|folder| folder.fingerprint == fingerprint)
    }
}

/// Variant-scoped metadata of a release (taken from the addon's TOC file upstream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameVersion {
    pub game_type: GameVariant,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub interface_version: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonFolder {
    pub folder_name: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingLink {
    pub platform: String,
    pub url: String,
}

/// A release whose folder fingerprints matched something installed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintMatch {
    pub matched_release: RemoteRelease,
    pub source_addon_id: u64,
    pub repository_name: String,
    #[serde(default)]
    pub owner_name: String,
    /// Canonical URL of the upstream repository.
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub owner_image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_download_count: Option<u64>,
    #[serde(default)]
    pub funding_links: Vec<FundingLink>,
}
impl FingerprintMatch {
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.image_url.as_deref().or(self.owner_image_url.as_deref())
    }
}

/// `POST /addons/batch/{variant}` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub addon_ids: Vec<u64>,
}

/// `POST /addons/fingerprint` request body.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintRequest {
    pub fingerprints: Vec<String>,
}

/// Response of every endpoint returning a list of catalog entries.
#[derive(Debug, Clone, Deserialize)]
pub struct AddonsEnvelope {
    #[serde(default)]
    pub addons: Vec<Lenient<RemoteAddon>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddonEnvelope {
    pub addon: RemoteAddon,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseEnvelope {
    pub release: RemoteRelease,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintResponse {
    #[serde(default)]
    pub exact_matches: Vec<Lenient<FingerprintMatch>>,
}
