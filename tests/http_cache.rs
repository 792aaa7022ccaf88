//! Integration tests for the disk-resident HTTP cache: freshness windows,
//! independent content/header halves and on-disk layout.
//!
//! Each test works in its own scratch directory and mock server.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use podcast_proxy::cache::{HttpCache, Method};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("podcast_proxy_it_cache_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Pretends `file` was last written `age` ago.
fn age_file(file: &Path, age: Duration) {
    let then = SystemTime::now() - age;
    std::fs::File::options()
        .write(true)
        .open(file)
        .unwrap()
        .set_modified(then)
        .unwrap();
}

fn age_entry(dir: &Path, age: Duration) {
    age_file(&dir.join("content"), age);
    age_file(&dir.join("headers"), age);
}

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// Freshness
// ============================================================================

#[tokio::test]
async fn test_entry_fresh_just_before_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(scratch_dir("fresh"), reqwest::Client::new())
        .with_head_for_headers(false);
    let url = format!("{}/listing", server.uri());

    cache.get(&url).await.unwrap();
    age_entry(
        &cache.entry_dir(Method::Get, &url).unwrap(),
        23 * HOUR + 59 * MINUTE,
    );

    let resource = cache.get(&url).await.unwrap();
    assert_eq!(resource.content, b"page");
}

#[tokio::test]
async fn test_entry_refetched_just_after_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .expect(2)
        .mount(&server)
        .await;

    let cache = HttpCache::new(scratch_dir("stale"), reqwest::Client::new())
        .with_head_for_headers(false);
    let url = format!("{}/listing", server.uri());

    cache.get(&url).await.unwrap();
    let dir = cache.entry_dir(Method::Get, &url).unwrap();
    age_entry(&dir, 24 * HOUR + MINUTE);

    cache.get(&url).await.unwrap();

    // The refetch rewrote the entry, so it is fresh again
    let age = std::fs::metadata(dir.join("content"))
        .unwrap()
        .modified()
        .unwrap()
        .elapsed()
        .unwrap_or_default();
    assert!(age < HOUR);
}

#[tokio::test]
async fn test_custom_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .expect(2)
        .mount(&server)
        .await;

    let cache = HttpCache::new(scratch_dir("custom_ttl"), reqwest::Client::new())
        .with_ttl(HOUR)
        .with_head_for_headers(false);
    let url = format!("{}/listing", server.uri());

    cache.get(&url).await.unwrap();
    age_entry(&cache.entry_dir(Method::Get, &url).unwrap(), 2 * HOUR);
    cache.get(&url).await.unwrap();
}

#[tokio::test]
async fn test_future_mtime_counts_as_fresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new"))
        .expect(0)
        .mount(&server)
        .await;

    let cache = HttpCache::new(scratch_dir("future"), reqwest::Client::new());
    let url = format!("{}/listing", server.uri());
    let dir = cache.entry_dir(Method::Get, &url).unwrap();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("content"), "cached").unwrap();
    std::fs::write(dir.join("headers"), "{}").unwrap();
    for file in ["content", "headers"] {
        std::fs::File::options()
            .write(true)
            .open(dir.join(file))
            .unwrap()
            .set_modified(SystemTime::now() + HOUR)
            .unwrap();
    }

    assert_eq!(cache.get(&url).await.unwrap().content, b"cached");
}

// ============================================================================
// Independent halves
// ============================================================================

#[tokio::test]
async fn test_stale_headers_refreshed_with_head_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ep"))
        .respond_with(ResponseTemplate::new(200).set_body_string("episode"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/ep"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 7]))
        .expect(2)
        .mount(&server)
        .await;

    let cache = HttpCache::new(scratch_dir("stale_headers"), reqwest::Client::new());
    let url = format!("{}/ep", server.uri());

    cache.get(&url).await.unwrap();
    let dir = cache.entry_dir(Method::Get, &url).unwrap();
    age_file(&dir.join("headers"), 25 * HOUR);

    let resource = cache.get(&url).await.unwrap();
    assert_eq!(resource.content, b"episode");
    assert_eq!(resource.headers.content_length(), Some(7));
}

#[tokio::test]
async fn test_get_and_head_entries_are_separate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("audio"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 5]))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(scratch_dir("separate"), reqwest::Client::new())
        .with_head_for_headers(false);
    let url = format!("{}/ep.mp3", server.uri());

    cache.get(&url).await.unwrap();
    let headers = cache.head(&url).await.unwrap();
    assert_eq!(headers.content_length(), Some(5));

    let get_dir = cache.entry_dir(Method::Get, &url).unwrap();
    let head_dir = cache.entry_dir(Method::Head, &url).unwrap();
    assert_eq!(get_dir.parent(), head_dir.parent());
    assert!(get_dir.ends_with("GET"));
    assert!(head_dir.ends_with("HEAD"));
}

// ============================================================================
// Layout
// ============================================================================

#[tokio::test]
async fn test_query_order_shares_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/emissions/le-show"))
        .respond_with(ResponseTemplate::new(200).set_body_string("listing"))
        .expect(1)
        .mount(&server)
        .await;

    let root = scratch_dir("query_order");
    let cache = HttpCache::new(&root, reqwest::Client::new()).with_head_for_headers(false);

    cache
        .get(&format!("{}/emissions/le-show?p=2&lang=fr", server.uri()))
        .await
        .unwrap();
    let again = cache
        .get(&format!("{}/emissions/le-show?lang=fr&p=2", server.uri()))
        .await
        .unwrap();
    assert_eq!(again.content, b"listing");

    let host = server.address().to_string();
    let expected = root
        .join(host)
        .join("emissions")
        .join("le-show?lang=fr&p=2")
        .join("GET")
        .join("content");
    assert!(expected.exists(), "missing {}", expected.display());
}
