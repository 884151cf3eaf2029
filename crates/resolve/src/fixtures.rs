//! Builders for test data shared by the unit tests in this crate.

use hubsync_models::{AddonFolder, FingerprintMatch, GameVariant, GameVersion, RemoteAddon, RemoteRelease, ScanResult};
use time::macros::datetime;

pub(crate) fn scan(folder_name: &str, fingerprint: &str) -> ScanResult {
    ScanResult::new(format!("/wow/_retail_/Interface/AddOns/{folder_name}"), fingerprint, folder_name)
}

pub(crate) fn game_version(variant: GameVariant) -> GameVersion {
    GameVersion {
        game_type: variant,
        version: None,
        interface_version: None,
        title: None,
        authors: None,
    }
}

pub(crate) fn release(id: u64, folders: &[(&str, &str)], variants: &[GameVariant]) -> RemoteRelease {
    RemoteRelease {
        id,
        tag_name: format!("v{id}"),
        prerelease: false,
        published_at: datetime!(2024-01-01 0:00 UTC) + time::Duration::days(id as i64),
        download_url: format!("https://example.com/releases/{id}.zip"),
        body: Some(format!("Changes in {id}")),
        game_versions: variants.iter().copied().map(game_version).collect(),
        addon_folders: folders
            .iter()
            .map(|(folder_name, fingerprint)| AddonFolder {
                folder_name: folder_name.to_string(),
                fingerprint: fingerprint.to_string(),
            })
            .collect(),
    }
}

pub(crate) fn fingerprint_match(addon_id: u64, matched_release: RemoteRelease) -> FingerprintMatch {
    FingerprintMatch {
        matched_release,
        source_addon_id: addon_id,
        repository_name: format!("repo-{addon_id}"),
        owner_name: format!("owner-{addon_id}"),
        repository: format!("https://github.com/owner-{addon_id}/repo-{addon_id}"),
        image_url: None,
        owner_image_url: None,
        description: None,
        total_download_count: None,
        funding_links: Vec::new(),
    }
}

pub(crate) fn remote_addon(id: u64, releases: Vec<RemoteRelease>) -> RemoteAddon {
    RemoteAddon {
        id,
        repository_name: format!("repo-{id}"),
        owner_name: format!("owner-{id}"),
        repository: format!("https://github.com/owner-{id}/repo-{id}"),
        image_url: None,
        owner_image_url: None,
        description: Some(format!("Description of {id}")),
        total_download_count: 100 * id,
        funding_links: Vec::new(),
        releases,
    }
}
