use hubsync_models::{AddonSearchResult, AddonSearchResultFile, Channel, GameVariant, RemoteAddon, RemoteRelease};

/// Shape a catalog entry for browsing, keeping only releases published for
/// `variant` (newest first).
pub(crate) fn to_search_result(addon: &RemoteAddon, variant: GameVariant, provider_name: &str) -> AddonSearchResult {
    let mut releases: Vec<&RemoteRelease> = addon.releases.iter().filter(|r| r.declares(variant)).collect();
    releases.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    AddonSearchResult {
        external_id: addon.id.to_string(),
        name: addon.repository_name.clone(),
        author: addon.owner_name.clone(),
        summary: addon.description.clone(),
        thumbnail_url: addon.thumbnail_url().map(str::to_string),
        external_url: addon.repository.clone(),
        provider_name: provider_name.to_string(),
        download_count: addon.total_download_count,
        funding_links: addon.funding_links.clone(),
        files: releases.into_iter().map(|release| to_search_result_file(release, variant)).collect(),
    }
}

fn to_search_result_file(release: &RemoteRelease, variant: GameVariant) -> AddonSearchResultFile {
    let game_version = release.game_version(variant);
    AddonSearchResultFile {
        external_id: release.id.to_string(),
        channel: Channel::from_prerelease(release.prerelease),
        version: game_version.and_then(|gv| gv.version.clone()).unwrap_or_else(|| release.tag_name.clone()),
        download_url: release.download_url.clone(),
        folders: release.addon_folders.iter().map(|folder| folder.folder_name.clone()).collect(),
        game_version: game_version.and_then(|gv| gv.interface_version),
        release_date: release.published_at,
        changelog: release.body.clone(),
    }
}
