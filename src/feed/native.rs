//! A site's own syndication feed, used for channel metadata.

use thiserror::Error;

use super::{Feed, Item};
use crate::cache::{CacheError, HttpCache};

#[derive(Debug, Error)]
pub enum NativeFeedError {
    #[error("Failed to fetch native feed: {0}")]
    Fetch(#[source] CacheError),

    #[error("Failed to parse native feed: {0}")]
    Parse(#[source] rss::Error),

    #[error("Native feed has no items")]
    Empty,
}

/// Channel metadata plus a template for scraped items.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFeed {
    /// Channel fields, with no items
    pub feed: Feed,
    /// First item of the native feed
    pub template: Item,
}

pub async fn fetch_native_feed(
    cache: &HttpCache,
    url: &str,
) -> Result<NativeFeed, NativeFeedError> {
    let resource = cache.get(url).await.map_err(NativeFeedError::Fetch)?;
    let mut feed = Feed::from_rss(&resource.content).map_err(NativeFeedError::Parse)?;

    let items = std::mem::take(&mut feed.items);
    let template = items.into_iter().next().ok_or(NativeFeedError::Empty)?;

    tracing::debug!(url = %url, title = %feed.title, "Using native feed metadata");
    Ok(NativeFeed { feed, template })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("podcast_proxy_native_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn cache(name: &str) -> HttpCache {
        HttpCache::new(scratch(name), reqwest::Client::new()).with_head_for_headers(false)
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Native</title><link>https://site/show</link><description>d</description>
  <item><title>Latest</title><author>podcast@radiofrance.com</author></item>
  <item><title>Older</title></item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_first_item_becomes_template() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let url = format!("{}/rss.xml", server.uri());
        let native = fetch_native_feed(&cache("template"), &url).await.unwrap();

        assert_eq!(native.feed.title, "Native");
        assert!(native.feed.items.is_empty());
        assert_eq!(native.template.title, "Latest");
        assert_eq!(native.template.author, "podcast@radiofrance.com");
    }

    #[tokio::test]
    async fn test_empty_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel>
  <title>t</title><link>l</link><description>d</description>
</channel></rss>"#,
            ))
            .mount(&server)
            .await;

        let url = format!("{}/rss.xml", server.uri());
        let result = fetch_native_feed(&cache("empty"), &url).await;
        assert!(matches!(result, Err(NativeFeedError::Empty)));
    }

    #[tokio::test]
    async fn test_html_instead_of_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>moved</body></html>"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/rss.xml", server.uri());
        let result = fetch_native_feed(&cache("html"), &url).await;
        assert!(matches!(result, Err(NativeFeedError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/rss.xml", server.uri());
        let result = fetch_native_feed(&cache("missing"), &url).await;
        assert!(matches!(result, Err(NativeFeedError::Fetch(_))));
    }
}
