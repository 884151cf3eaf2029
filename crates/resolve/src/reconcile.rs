//! Fingerprint reconciliation: from one batched lookup response to one
//! resolved addon per matched release.
//!
//! Everything here is synchronous and works on a single snapshot of the hub's
//! answer, so every folder in a pass is judged against the same data.

use crate::error::{ErrorKind, Result};
use hubsync_models::{
    Channel, ClientType, FingerprintMatch, GameVariant, GameVersion, RemoteRelease, ResolvedAddon, ResolvedScanResult,
    ScanResult,
};
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Pick the best match for one local folder.
///
/// Only matches whose release ships a folder with the exact same fingerprint
/// are candidates. Among those, the first one declaring `variant` wins; if
/// none does, the first candidate is used anyway (and logged), since a
/// version for the wrong game is still better than no information at all.
pub(crate) fn select_match<'a>(
    scan: &ScanResult,
    matches: &'a [FingerprintMatch],
    variant: GameVariant,
) -> Option<&'a FingerprintMatch> {
    let mut candidates =
        matches.iter().filter(|m| m.matched_release.contains_fingerprint(&scan.fingerprint)).peekable();
    let first = *candidates.peek()?;
    if let Some(preferred) = candidates.find(|m| m.matched_release.declares(variant)) {
        return Some(preferred);
    }
    tracing::warn!(
        folder = %scan.folder_name,
        addon_id = first.source_addon_id,
        release_id = first.matched_release.id,
        %variant,
        "No fingerprint match declares the target game variant; falling back to the first match"
    );
    Some(first)
}

pub(crate) fn match_scan_results(
    scan_results: Vec<ScanResult>,
    matches: &[FingerprintMatch],
    variant: GameVariant,
) -> Vec<ResolvedScanResult> {
    scan_results
        .into_iter()
        .map(|scan| {
            let exact_match = select_match(&scan, matches, variant).cloned();
            if exact_match.is_none() {
                tracing::debug!(folder = %scan.folder_name, "No fingerprint match");
            }
            ResolvedScanResult { scan, exact_match }
        })
        .collect()
}

/// Local folders that all resolved to the same remote release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MatchGroup {
    pub(crate) matched: FingerprintMatch,
    pub(crate) folders: Vec<ScanResult>,
}

/// Group resolved folders by the release they matched, in first-seen order.
/// Unresolved folders are dropped.
pub(crate) fn group_by_match(resolved: Vec<ResolvedScanResult>) -> Vec<MatchGroup> {
    let mut groups: Vec<MatchGroup> = Vec::new();
    let mut index: HashMap<(u64, u64), usize> = HashMap::new();
    for ResolvedScanResult { scan, exact_match } in resolved {
        let Some(matched) = exact_match else {
            continue;
        };
        let key = (matched.source_addon_id, matched.matched_release.id);
        match index.get(&key) {
            Some(&position) => groups[position].folders.push(scan),
            None => {
                index.insert(key, groups.len());
                groups.push(MatchGroup { matched, folders: vec![scan] });
            },
        }
    }
    groups
}

/// The release's metadata for `variant`, else its first declared game
/// version (logged), else nothing.
pub(crate) fn resolve_game_version(release: &RemoteRelease, variant: GameVariant) -> Option<&GameVersion> {
    if let Some(game_version) = release.game_version(variant) {
        return Some(game_version);
    }
    let fallback = release.game_versions.first()?;
    tracing::warn!(
        release_id = release.id,
        %variant,
        fallback = %fallback.game_type,
        "Release declares no game version for the target variant; using its first declared game version"
    );
    Some(fallback)
}

/// Everything about a scan pass that isn't specific to one group.
pub(crate) struct BuildContext<'a> {
    pub(crate) provider_name: &'a str,
    pub(crate) client_type: ClientType,
    pub(crate) channel_preference: Channel,
    pub(crate) now: OffsetDateTime,
}

pub(crate) fn build_addon(group: &MatchGroup, context: &BuildContext<'_>) -> Result<ResolvedAddon> {
    let matched = &group.matched;
    let release = &matched.matched_release;
    if release.download_url.trim().is_empty() {
        exn::bail!(ErrorKind::Unresolvable(matched.source_addon_id.to_string()));
    }
    let game_version = resolve_game_version(release, context.client_type.game_variant());
    let non_empty = |value: Option<&String>| value.filter(|v| !v.trim().is_empty()).cloned();
    let version =
        non_empty(game_version.and_then(|gv| gv.version.as_ref())).unwrap_or_else(|| release.tag_name.clone());
    let name =
        non_empty(game_version.and_then(|gv| gv.title.as_ref())).unwrap_or_else(|| matched.repository_name.clone());
    let author =
        non_empty(game_version.and_then(|gv| gv.authors.as_ref())).unwrap_or_else(|| matched.owner_name.clone());
    let installed_folder_list: Vec<String> = group.folders.iter().map(|scan| scan.folder_name.clone()).collect();
    Ok(ResolvedAddon {
        id: Uuid::new_v4(),
        name,
        author,
        channel: Channel::from_prerelease(release.prerelease),
        auto_update_channel: context.channel_preference,
        download_url: release.download_url.clone(),
        external_id: matched.source_addon_id.to_string(),
        external_release_id: release.id.to_string(),
        external_url: matched.repository.clone(),
        provider_name: context.provider_name.to_string(),
        installed_folders: installed_folder_list.join(", "),
        installed_folder_list,
        installed_paths: group.folders.iter().map(|scan| scan.path.clone()).collect(),
        installed_version: version.clone(),
        latest_version: version,
        game_version: game_version.and_then(|gv| gv.interface_version),
        client_type: context.client_type,
        changelog: release.body.clone(),
        funding_links: matched.funding_links.clone(),
        thumbnail_url: matched.thumbnail_url().map(str::to_string),
        summary: matched.description.clone(),
        download_count: matched.total_download_count,
        release_published_at: release.published_at,
        installed_at: context.now,
        updated_at: context.now,
    })
}
