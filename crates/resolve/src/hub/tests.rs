use super::*;
use crate::fixtures::{fingerprint_match, release, remote_addon, scan};
use crate::scanner::FolderScanner;
use hubsync_client::CircuitState;
use hubsync_client::transport::{Method, MockReply, MockTransport};
use rstest::rstest;
use serde_json::json;
use std::path::PathBuf;

const BASE: &str = "http://mock";
const FINGERPRINT_URL: &str = "http://mock/addons/fingerprint";

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Fingerprints every folder as `fp-{folder name}`.
struct NameScanner;

#[async_trait]
impl FolderScanner for NameScanner {
    async fn scan(&self, paths: &[PathBuf]) -> Result<Vec<ScanResult>> {
        let scans = paths
            .iter()
            .map(|path| {
                let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
                ScanResult::new(path.clone(), format!("fp-{name}"), name)
            })
            .collect();
        Ok(scans)
    }
}

fn provider(transport: MockTransport) -> (Arc<MockTransport>, HubProvider) {
    let transport = Arc::new(transport);
    let options = ClientOptions {
        request_timeout: Duration::from_secs(5),
        failure_threshold: 2,
        reset_timeout: Duration::from_secs(60),
    };
    let client = ResilientClient::new(transport.clone(), options);
    let provider = HubProvider::new(Arc::new(client), Arc::new(ResponseCache::new()), BASE, CacheTtls::default());
    (transport, provider)
}

#[rstest]
#[case("1", true)]
#[case("123456", true)]
#[case("0", false)]
#[case("", false)]
#[case("abc", false)]
#[case("+5", false)]
#[case("-5", false)]
#[case(" 5", false)]
#[case("99999999999999999999999", false)]
fn test_addon_id_validation(#[case] addon_id: &str, #[case] valid: bool) {
    let (_, provider) = provider(MockTransport::default());
    assert_eq!(provider.is_valid_addon_id(addon_id), valid);
}

#[test]
fn test_fingerprint_set_key_ignores_order_and_repetition() {
    let a: BTreeSet<&str> = ["fp-b", "fp-a", "fp-a"].into_iter().collect();
    let b: BTreeSet<&str> = ["fp-a", "fp-b"].into_iter().collect();
    let c: BTreeSet<&str> = ["fp-a", "fp-c"].into_iter().collect();
    assert_eq!(fingerprint_set_key(&a), fingerprint_set_key(&b));
    assert_ne!(fingerprint_set_key(&a), fingerprint_set_key(&c));
}

#[tokio::test]
async fn test_scan_resolves_fingerprint_matches() {
    let matched = fingerprint_match(
        1,
        release(10, &[("Addon", "fp-a"), ("Addon_Options", "fp-b")], &[GameVariant::Retail]),
    );
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": vec![matched] })),
    );
    let (transport, provider) = provider(transport);

    let scans = vec![scan("Addon", "fp-a"), scan("Addon_Options", "fp-b"), scan("Unknown", "fp-z")];
    let addons = provider.scan(ClientType::Retail, Channel::Beta, scans).await.unwrap();

    assert_eq!(addons.len(), 1);
    let addon = &addons[0];
    assert_eq!(addon.external_id, "1");
    assert_eq!(addon.external_release_id, "10");
    assert_eq!(addon.provider_name, NAME);
    assert_eq!(addon.installed_folders, "Addon, Addon_Options");
    assert_eq!(addon.installed_folder_list, ["Addon", "Addon_Options"]);
    assert_eq!(addon.channel, Channel::Stable);
    assert_eq!(addon.auto_update_channel, Channel::Beta);
    assert_eq!(addon.latest_version, "v10");
    assert_eq!(addon.download_url, "https://example.com/releases/10.zip");

    let requests = transport.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, Some(json!({ "fingerprints": ["fp-a", "fp-b", "fp-z"] })));
}

#[rstest]
#[case(ClientType::Retail, "11")]
#[case(ClientType::ClassicEra, "10")]
#[tokio::test]
async fn test_scan_prefers_release_for_client_variant(#[case] client_type: ClientType, #[case] expected: &str) {
    let matches = vec![
        fingerprint_match(1, release(10, &[("Addon", "fp")], &[GameVariant::Classic])),
        fingerprint_match(1, release(11, &[("Addon", "fp")], &[GameVariant::Retail])),
    ];
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": matches })),
    );
    let (_, provider) = provider(transport);
    let addons = provider.scan(client_type, Channel::Stable, vec![scan("Addon", "fp")]).await.unwrap();
    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].external_release_id, expected);
    assert_eq!(addons[0].client_type, client_type);
}

#[tokio::test]
async fn test_scan_falls_back_when_no_release_declares_variant() {
    let matches = vec![fingerprint_match(1, release(10, &[("Addon", "fp")], &[GameVariant::Classic]))];
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": matches })),
    );
    let (_, provider) = provider(transport);
    let addons = provider.scan(ClientType::Retail, Channel::Stable, vec![scan("Addon", "fp")]).await.unwrap();
    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].external_release_id, "10");
}

#[tokio::test]
async fn test_scan_skips_unresolvable_addons() {
    let mut broken = release(20, &[("Broken", "fp-broken")], &[GameVariant::Retail]);
    broken.download_url = String::new();
    let matches = vec![
        fingerprint_match(1, release(10, &[("Addon", "fp")], &[GameVariant::Retail])),
        fingerprint_match(2, broken),
    ];
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": matches })),
    );
    let (_, provider) = provider(transport);
    let scans = vec![scan("Broken", "fp-broken"), scan("Addon", "fp")];
    let addons = provider.scan(ClientType::Retail, Channel::Stable, scans).await.unwrap();
    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].external_id, "1");
}

#[tokio::test]
async fn test_scan_reuses_cached_fingerprint_lookup() {
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": [] })),
    );
    let (transport, provider) = provider(transport);
    let first = vec![scan("A", "fp-a"), scan("B", "fp-b")];
    let second = vec![scan("B", "fp-b"), scan("A", "fp-a"), scan("A2", "fp-a")];
    assert!(provider.scan(ClientType::Retail, Channel::Stable, first).await.unwrap().is_empty());
    assert!(provider.scan(ClientType::Retail, Channel::Stable, second).await.unwrap().is_empty());
    assert_eq!(transport.request_count().await, 1);
}

#[tokio::test]
async fn test_scan_folders_resolves_scanned_paths() {
    let matched = fingerprint_match(4, release(40, &[("Addon", "fp-Addon")], &[GameVariant::Retail]));
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": [matched] })),
    );
    let (transport, provider) = provider(transport);
    let paths = [
        PathBuf::from("/wow/_retail_/Interface/AddOns/Other"),
        PathBuf::from("/wow/_retail_/Interface/AddOns/Addon"),
    ];
    let addons = provider.scan_folders(&NameScanner, ClientType::Retail, Channel::Stable, &paths).await.unwrap();

    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].external_id, "4");
    assert_eq!(addons[0].installed_folders, "Addon");
    assert_eq!(addons[0].installed_paths, [paths[1].clone()]);
    let requests = transport.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, Some(json!({ "fingerprints": ["fp-Addon", "fp-Other"] })));
}

#[tokio::test]
async fn test_scan_skips_unreadable_matches() {
    let good = fingerprint_match(1, release(10, &[("Addon", "fp-a")], &[GameVariant::Retail]));
    let unreadable = json!({ "sourceAddonId": 2, "repositoryName": "repo-2" });
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": [unreadable, serde_json::to_value(good).unwrap()] })),
    );
    let (_, provider) = provider(transport);
    let addons = provider.scan(ClientType::Retail, Channel::Stable, vec![scan("Addon", "fp-a")]).await.unwrap();
    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].external_id, "1");
}

#[tokio::test]
async fn test_scan_without_folders_sends_nothing() {
    let (transport, provider) = provider(MockTransport::default());
    assert!(provider.scan(ClientType::Retail, Channel::Stable, Vec::new()).await.unwrap().is_empty());
    assert_eq!(transport.request_count().await, 0);
}

#[tokio::test]
async fn test_resolve_scan_results_keeps_unmatched_folders() {
    let matches = vec![fingerprint_match(1, release(10, &[("Addon", "fp")], &[GameVariant::Retail]))];
    let transport = MockTransport::default().with_reply(
        Method::Post,
        FINGERPRINT_URL,
        MockReply::json(json!({ "exactMatches": matches })),
    );
    let (_, provider) = provider(transport);
    let resolved = provider
        .resolve_scan_results(ClientType::Retail, vec![scan("Addon", "fp"), scan("Other", "fp-other")])
        .await
        .unwrap();
    assert_eq!(resolved.len(), 2);
    assert!(resolved[0].is_resolved());
    assert!(!resolved[1].is_resolved());
}

#[tokio::test]
async fn test_open_circuit_fails_scan_without_request() {
    let transport = MockTransport::default().with_reply(Method::Post, FINGERPRINT_URL, MockReply::Fail("reset".into()));
    let (transport, provider) = provider(transport);
    for _ in 0..2 {
        let err = provider.scan(ClientType::Retail, Channel::Stable, vec![scan("Addon", "fp")]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Remote);
    }
    let err = provider.scan(ClientType::Retail, Channel::Stable, vec![scan("Addon", "fp")]).await.unwrap_err();
    assert_eq!(*err, ErrorKind::CircuitOpen);
    assert!(!err.is_retryable());
    assert_eq!(transport.request_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_half_open_search_still_closes_circuit() {
    let search_a = "http://mock/addons/search/retail?query=a&limit=10";
    let search_b = "http://mock/addons/search/retail?query=b&limit=10";
    let transport = MockTransport::default()
        .with_delay(Duration::from_secs(1))
        .with_reply(Method::Get, search_a, MockReply::Fail("reset".into()));
    let (transport, provider) = provider(transport);
    for _ in 0..2 {
        let err = provider.search_by_query("a", ClientType::Retail).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Remote);
    }
    assert_eq!(provider.client().circuit_state(endpoint::SEARCH), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(60)).await;
    transport.set_reply(Method::Get, search_a, MockReply::json(json!({ "addons": [] }))).await;
    transport.set_reply(Method::Get, search_b, MockReply::json(json!({ "addons": [] }))).await;

    // The caller gives up on the half-open request; the request itself carries on.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), provider.search_by_query("a", ClientType::Retail)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.client().circuit_state(endpoint::SEARCH), CircuitState::Closed);
    assert!(provider.search_by_query("b", ClientType::Retail).await.unwrap().is_empty());
    assert_eq!(transport.request_count().await, 4);
}

#[tokio::test]
async fn test_get_all_reports_removed_and_malformed_ids() {
    let addons = vec![
        remote_addon(1, vec![release(10, &[("A", "a")], &[GameVariant::Retail])]),
        remote_addon(3, vec![release(30, &[("C", "c")], &[GameVariant::Retail])]),
    ];
    let transport = MockTransport::default().with_reply(
        Method::Post,
        "http://mock/addons/batch/retail",
        MockReply::json(json!({ "addons": addons })),
    );
    let (transport, provider) = provider(transport);
    let ids: Vec<String> = ["1", "2", "3", "abc"].into_iter().map(String::from).collect();
    let batch = provider.get_all(ClientType::Retail, &ids).await.unwrap();

    let found: Vec<_> = batch.results.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(found, ["1", "3"]);
    let errors: Vec<ErrorKind> = batch.errors.iter().map(|err| (**err).clone()).collect();
    assert_eq!(errors, [ErrorKind::MalformedInput("abc".to_string()), ErrorKind::SourceRemoved("2".to_string())]);

    let requests = transport.requests().await;
    assert_eq!(requests[0].body, Some(json!({ "addonIds": [1, 2, 3] })));
}

#[tokio::test]
async fn test_get_all_tolerates_unknown_game_type() {
    let mut addons = serde_json::to_value(vec![
        remote_addon(1, vec![release(10, &[("A", "a")], &[GameVariant::Retail])]),
        remote_addon(3, vec![release(30, &[("C", "c")], &[GameVariant::Retail])]),
    ])
    .unwrap();
    addons[1]["releases"][0]["gameVersions"][0]["gameType"] = json!("wrath");
    let transport = MockTransport::default().with_reply(
        Method::Post,
        "http://mock/addons/batch/retail",
        MockReply::json(json!({ "addons": addons })),
    );
    let (_, provider) = provider(transport);
    let batch = provider.get_all(ClientType::Retail, &ids(&["1", "3"])).await.unwrap();

    let found: Vec<_> = batch.results.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(found, ["1", "3"]);
    assert!(batch.errors.is_empty());
    // Nothing published for retail as far as this build can tell.
    assert!(batch.results[1].files.is_empty());
}

#[tokio::test]
async fn test_get_all_reports_unreadable_entry() {
    let mut addons = serde_json::to_value(vec![
        remote_addon(1, vec![release(10, &[("A", "a")], &[GameVariant::Retail])]),
        remote_addon(2, vec![release(20, &[("B", "b")], &[GameVariant::Retail])]),
    ])
    .unwrap();
    addons[1]["releases"][0].as_object_mut().unwrap().remove("downloadUrl");
    let transport = MockTransport::default().with_reply(
        Method::Post,
        "http://mock/addons/batch/retail",
        MockReply::json(json!({ "addons": addons })),
    );
    let (_, provider) = provider(transport);
    let batch = provider.get_all(ClientType::Retail, &ids(&["1", "2"])).await.unwrap();

    let found: Vec<_> = batch.results.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(found, ["1"]);
    let errors: Vec<ErrorKind> = batch.errors.iter().map(|err| (**err).clone()).collect();
    assert_eq!(errors, [ErrorKind::InvalidEntry("2".to_string())]);
    assert!(!batch.errors[0].is_retryable());
}

#[tokio::test]
async fn test_get_all_with_only_malformed_ids_sends_nothing() {
    let (transport, provider) = provider(MockTransport::default());
    let batch = provider.get_all(ClientType::Retail, &["x".to_string()]).await.unwrap();
    assert!(batch.results.is_empty());
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(transport.request_count().await, 0);
}

#[tokio::test]
async fn test_get_all_transport_failure_fails_call() {
    let transport = MockTransport::default().with_reply(
        Method::Post,
        "http://mock/addons/batch/burningCrusade",
        MockReply::status(502),
    );
    let (_, provider) = provider(transport);
    let err = provider.get_all(ClientType::Classic, &["1".to_string()]).await.unwrap_err();
    assert_eq!(*err, ErrorKind::Remote);
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_search_is_cached_briefly() {
    let addons = vec![remote_addon(1, vec![release(10, &[("A", "a")], &[GameVariant::Retail])])];
    let transport = MockTransport::default().with_reply(
        Method::Get,
        "http://mock/addons/search/retail?query=boss+mods&limit=10",
        MockReply::json(json!({ "addons": addons })),
    );
    let (transport, provider) = provider(transport);

    let results = provider.search_by_query("boss mods", ClientType::Retail).await.unwrap();
    assert_eq!(results.len(), 1);
    provider.search_by_query("boss mods", ClientType::Retail).await.unwrap();
    assert_eq!(transport.request_count().await, 1);

    tokio::time::advance(Duration::from_secs(5)).await;
    provider.search_by_query("boss mods", ClientType::Retail).await.unwrap();
    assert_eq!(transport.request_count().await, 2);
}

#[tokio::test]
async fn test_search_skips_unreadable_entries() {
    let mut addons = serde_json::to_value(vec![
        remote_addon(1, vec![release(10, &[("A", "a")], &[GameVariant::Retail])]),
        remote_addon(2, vec![release(20, &[("B", "b")], &[GameVariant::Retail])]),
    ])
    .unwrap();
    addons[0]["releases"][0]["publishedAt"] = json!("yesterday");
    let transport = MockTransport::default().with_reply(
        Method::Get,
        "http://mock/addons/search/retail?query=bags&limit=10",
        MockReply::json(json!({ "addons": addons })),
    );
    let (_, provider) = provider(transport);
    let results = provider.search_by_query("bags", ClientType::Retail).await.unwrap();
    let found: Vec<_> = results.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(found, ["2"]);
}

#[tokio::test]
async fn test_empty_search_sends_nothing() {
    let (transport, provider) = provider(MockTransport::default());
    assert!(provider.search_by_query("   ", ClientType::Retail).await.unwrap().is_empty());
    assert_eq!(transport.request_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_featured_addons_cached_and_filtered_by_variant() {
    let addons = vec![
        remote_addon(1, vec![release(10, &[("A", "a")], &[GameVariant::Retail])]),
        remote_addon(2, vec![release(20, &[("B", "b")], &[GameVariant::Classic])]),
    ];
    let transport = MockTransport::default().with_reply(
        Method::Get,
        "http://mock/addons/featured/retail?count=60",
        MockReply::json(json!({ "addons": addons })),
    );
    let (transport, provider) = provider(transport);

    let featured = provider.get_featured_addons(ClientType::RetailPtr).await.unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].external_id, "1");

    tokio::time::advance(Duration::from_secs(29 * 60)).await;
    provider.get_featured_addons(ClientType::Retail).await.unwrap();
    assert_eq!(transport.request_count().await, 1);

    tokio::time::advance(Duration::from_secs(60)).await;
    provider.get_featured_addons(ClientType::Retail).await.unwrap();
    assert_eq!(transport.request_count().await, 2);
}

#[tokio::test]
async fn test_get_by_id() {
    let retail = remote_addon(5, vec![release(50, &[("A", "a")], &[GameVariant::Retail])]);
    let classic = remote_addon(6, vec![release(60, &[("B", "b")], &[GameVariant::Classic])]);
    let transport = MockTransport::default()
        .with_reply(Method::Get, "http://mock/addons/5", MockReply::json(json!({ "addon": retail })))
        .with_reply(Method::Get, "http://mock/addons/6", MockReply::json(json!({ "addon": classic })));
    let (transport, provider) = provider(transport);

    let found = provider.get_by_id("5", ClientType::Retail).await.unwrap().unwrap();
    assert_eq!(found.external_id, "5");
    assert_eq!(found.files[0].external_id, "50");
    assert!(provider.get_by_id("6", ClientType::Retail).await.unwrap().is_none());

    let err = provider.get_by_id("7", ClientType::Retail).await.unwrap_err();
    assert_eq!(*err, ErrorKind::SourceRemoved("7".to_string()));
    let err = provider.get_by_id("abc", ClientType::Retail).await.unwrap_err();
    assert_eq!(*err, ErrorKind::MalformedInput("abc".to_string()));

    // The description comes from the same cached lookup.
    assert_eq!(provider.get_description("5").await, "Description of 5");
    assert_eq!(transport.request_count().await, 3);
}

#[tokio::test]
async fn test_description_failure_is_empty() {
    let (_, provider) = provider(MockTransport::default());
    assert_eq!(provider.get_description("7").await, "");
    assert_eq!(provider.get_description("nope").await, "");
}

#[tokio::test]
async fn test_release_changelog() {
    let transport = MockTransport::default()
        .with_reply(
            Method::Get,
            "http://mock/addons/1/releases/10",
            MockReply::json(json!({ "release": release(10, &[("A", "a")], &[GameVariant::Retail]) })),
        )
        .with_reply(Method::Get, "http://mock/addons/1/releases/11", MockReply::status(500));
    let (transport, provider) = provider(transport);

    assert_eq!(provider.get_release_changelog("1", "10").await, "Changes in 10");
    assert_eq!(provider.get_release_changelog("1", "10").await, "Changes in 10");
    assert_eq!(transport.request_count().await, 1);

    assert_eq!(provider.get_release_changelog("1", "11").await, "");
    assert_eq!(provider.get_release_changelog("1", "x").await, "");
    assert_eq!(transport.request_count().await, 2);
}

#[tokio::test]
async fn test_failed_lookup_is_not_cached() {
    let url = "http://mock/addons/1/releases/10";
    let transport = MockTransport::default().with_reply(Method::Get, url, MockReply::status(500));
    let (transport, provider) = provider(transport);
    assert_eq!(provider.get_release_changelog("1", "10").await, "");

    transport.set_reply(Method::Get, url, MockReply::json(json!({ "release": release(10, &[], &[]) }))).await;
    assert_eq!(provider.get_release_changelog("1", "10").await, "Changes in 10");
    assert_eq!(transport.request_count().await, 2);
}
