use toolhub::config::AppConfig;
use toolhub::error::Error;
use toolhub::shorturl::{JsonFileUrlStore, ShortUrlService, UrlStore};

#[test]
fn json_store_persists_across_service_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/data/urls.json");

    let first = ShortUrlService::new(JsonFileUrlStore::new(&path), 6, "https://s.test");
    let created = first.shorten("https://example.com/long/path?q=1").expect("shorten");
    assert!(!created.is_existing);
    assert!(path.exists());

    let second = ShortUrlService::new(JsonFileUrlStore::new(&path), 6, "https://s.test");
    let again = second.shorten("https://example.com/long/path?q=1").expect("shorten");
    assert!(again.is_existing);
    assert_eq!(again.code, created.code);
    assert_eq!(again.short_url, format!("https://s.test/s/{}", created.code));

    assert_eq!(
        second.resolve(&created.code).expect("resolve"),
        "https://example.com/long/path?q=1"
    );
    assert_eq!(first.lookup(&created.code).expect("lookup").clicks, 1);
}

#[test]
fn json_layout_matches_urls_map() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("urls.json");
    std::fs::write(
        &path,
        r#"{"urls":{"abc123":{"url":"https://old.test","createdAt":"2024-01-02T03:04:05.000Z","clicks":7}}}"#,
    )
    .expect("seed");

    let store = JsonFileUrlStore::new(&path);
    assert_eq!(
        store.find_by_url("https://old.test").expect("find").as_deref(),
        Some("abc123")
    );
    assert!(store.increment_clicks("abc123").expect("inc"));
    let entry = store.get("abc123").expect("get").expect("present");
    assert_eq!(entry.clicks, 8);
    assert_eq!(entry.created_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
}

#[test]
fn invalid_urls_leave_store_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("urls.json");
    let svc = ShortUrlService::new(JsonFileUrlStore::new(&path), 6, "https://s.test");
    assert!(matches!(svc.shorten(""), Err(Error::InvalidUrl(_))));
    assert!(matches!(svc.shorten("example"), Err(Error::InvalidUrl(_))));
    assert!(!path.exists());
}

#[test]
fn configured_service_uses_memory_backend() {
    let cfg: AppConfig = toml::from_str(
        r#"
[shorturl]
backend = "memory"
code_len = 10
base_url = "https://short.example/"
"#,
    )
    .expect("parse");
    let svc = cfg.url_service().expect("service");
    let out = svc.shorten("https://example.org").expect("shorten");
    assert_eq!(out.code.len(), 10);
    assert!(out.short_url.starts_with("https://short.example/s/"));
    assert!(matches!(svc.lookup("missing"), Err(Error::NotFound(_))));
}
