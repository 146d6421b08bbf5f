// tests/query.rs

//! Integration tests for listing, info and search over a fake source

mod common;

use common::TestEnv;
use modman::{CompareOp, ModuleKey, SearchFilter, SearchQuery, search};
use std::collections::BTreeMap;

#[test]
fn test_list_modules_fills_available_cache() {
    let env = TestEnv::httpd();

    let catalog = env.registry.list_modules(false).unwrap();
    assert_eq!(catalog.len(), 5);
    assert_eq!(catalog.names(), ["core", "apr", "httpd"]);

    let cached = env.registry.load_cached().unwrap();
    assert_eq!(cached.len(), 5);
    assert!(cached.is_cache_valid(None));
    assert!(
        env.registry
            .caches()
            .available
            .is_cached(&ModuleKey::new("httpd", "2.4.18", "1"))
    );
}

#[test]
fn test_refresh_prunes_modules_no_longer_offered() {
    let env = TestEnv::httpd();
    env.registry.list_modules(false).unwrap();

    let gone = ModuleKey::new("nginx", "1.10", "1");
    let mut stale = modman::ModuleEntry::new(
        modman::ModuleDescriptor::new("nginx", "1.10", "1"),
        "file:///srv/modules/nginx-1.10-1",
    );
    stale.cache = env.registry.caches().available.store(&stale, false).unwrap();
    assert!(env.registry.caches().available.is_cached(&gone));

    env.registry.refresh().unwrap();
    assert!(!env.registry.caches().available.is_cached(&gone));
}

#[test]
fn test_info_describes_every_record() {
    let env = TestEnv::httpd();

    let catalog = env.registry.info_modules("httpd").unwrap();
    let text = catalog.full_description("httpd").unwrap();

    assert_eq!(text.matches("Name: httpd").count(), 3);
    let older = text.find("Version: 2.2.15").unwrap();
    let newer = text.find("Version: 2.4.18").unwrap();
    assert!(older < newer);
    assert!(text.contains("    - default: Default list of packages."));
}

#[test]
fn test_info_unknown_module() {
    let env = TestEnv::httpd();
    let catalog = env.registry.info_modules("nginx").unwrap();
    let err = catalog.full_description("nginx").unwrap_err();
    assert_eq!(err.to_string(), "Unknown module nginx");
}

#[test]
fn test_search_by_version_and_name() {
    let env = TestEnv::httpd();
    let catalog = env.registry.list_modules(false).unwrap();

    let query = SearchQuery::new()
        .with(SearchFilter::Name(vec!["h*".to_string()]))
        .with(SearchFilter::Version(CompareOp::Ge, "2.4".to_string()));
    let found = search(&catalog, &query).unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(
        found.entries("httpd")[0].key(),
        ModuleKey::new("httpd", "2.4.18", "1")
    );
}

#[test]
fn test_search_requires_matches_whole_map() {
    let env = TestEnv::httpd();
    let catalog = env.registry.list_modules(false).unwrap();

    let only_apr: BTreeMap<String, String> =
        [("apr".to_string(), "1.5".to_string())].into_iter().collect();
    let found = search(&catalog, &SearchQuery::new().with(SearchFilter::Requires(only_apr)))
        .unwrap();
    assert!(found.is_empty());

    let core: BTreeMap<String, String> =
        [("core".to_string(), "1.0".to_string())].into_iter().collect();
    let found = search(&catalog, &SearchQuery::new().with(SearchFilter::Requires(core))).unwrap();
    assert_eq!(found.names(), ["apr"]);
}

#[test]
fn test_search_json_query() {
    let env = TestEnv::httpd();
    let catalog = env.registry.list_modules(false).unwrap();

    let query =
        SearchQuery::from_json(r#"{"license": ["MIT"], "release": ["==", "2"]}"#).unwrap();
    let found = search(&catalog, &query).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.entries("httpd")[0].release(), "2");
}

#[test]
fn test_empty_source_lists_nothing() {
    let env = TestEnv::new(Vec::new());
    assert!(env.registry.list_modules(false).unwrap().is_empty());
    assert!(env.registry.load_cached().unwrap().is_empty());
}
