use crate::remote::FundingLink;
use crate::variant::ClientType;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;
use uuid::Uuid;

/// Stability tier of a release.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    #[display("stable")]
    Stable,
    #[display("beta")]
    Beta,
}
impl Channel {
    pub fn from_prerelease(prerelease: bool) -> Self {
        if prerelease { Self::Beta } else { Self::Stable }
    }
}

/// The final product of a reconciliation pass: one installed addon, fully
/// described by catalog metadata.
///
/// Ownership passes to the caller as soon as it is built; the resolution
/// layer keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddon {
    /// Freshly generated for every resolution.
    pub id: Uuid,
    pub name: String,
    pub author: String,
    /// Derived from the installed release's prerelease flag.
    pub channel: Channel,
    /// The caller's preferred channel for future update checks.
    pub auto_update_channel: Channel,
    pub download_url: String,
    pub external_id: String,
    pub external_release_id: String,
    pub external_url: String,
    pub provider_name: String,
    /// Folder names joined with `", "`, for display.
    pub installed_folders: String,
    pub installed_folder_list: Vec<String>,
    /// Paths of the scanned folders this addon was resolved from.
    pub installed_paths: Vec<PathBuf>,
    pub installed_version: String,
    pub latest_version: String,
    /// Interface version declared for the resolved variant, if any.
    pub game_version: Option<u32>,
    pub client_type: ClientType,
    pub changelog: Option<String>,
    pub funding_links: Vec<FundingLink>,
    pub thumbnail_url: Option<String>,
    pub summary: Option<String>,
    pub download_count: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub release_published_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub installed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A catalog entry shaped for browsing (search, featured list, batch lookup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonSearchResult {
    pub external_id: String,
    pub name: String,
    pub author: String,
    pub summary: Option<String>,
    pub thumbnail_url: Option<String>,
    pub external_url: String,
    pub provider_name: String,
    pub download_count: u64,
    pub funding_links: Vec<FundingLink>,
    /// Releases for the requested variant, newest first.
    pub files: Vec<AddonSearchResultFile>,
}
impl AddonSearchResult {
    /// The newest release on `channel` (a beta preference accepts stable releases too).
    pub fn latest_file(&self, channel: Channel) -> Option<&AddonSearchResultFile> {
        self.files.iter().find(|file| channel == Channel::Beta || file.channel == Channel::Stable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonSearchResultFile {
    pub external_id: String,
    pub channel: Channel,
    pub version: String,
    pub download_url: String,
    pub folders: Vec<String>,
    pub game_version: Option<u32>,
    #[serde(with = "time::serde::rfc3339")]
    pub release_date: OffsetDateTime,
    pub changelog: Option<String>,
}
