//! Pagination/merge engine.
//!
//! Walks a program's listing pages in order, turning episode nodes into
//! items, and stops at the first episode the previous feed already knows.
//! Newly found items come first, then every previous item in its original
//! order, so history survives the site dropping old episodes.
//!
//! All network access goes through the [`HttpCache`], one request at a time.

use std::collections::HashSet;

use url::Url;

use super::native::{self, NativeFeed};
use super::{Feed, FeedError, Item};
use crate::cache::HttpCache;
use crate::strategy::extract::{self, ExtractError};
use crate::strategy::Strategy;

/// Query parameter selecting a listing page.
pub const PAGE_PARAM: &str = "p";

/// Builds the feed for a listing whose first page is `first_page`.
pub async fn merge(
    cache: &HttpCache,
    strategy: &Strategy,
    listing_url: &Url,
    first_page: &[u8],
    prior: Option<&Feed>,
) -> Result<Feed, FeedError> {
    let overview = extract::inspect_listing(strategy, listing_url, first_page);
    let page_count = overview.page_count();

    let (mut feed, template) = match overview.native_feed {
        Some(feed_url) => match native::fetch_native_feed(cache, &feed_url).await {
            Ok(NativeFeed { feed, template }) => (feed, template),
            Err(e) => {
                tracing::warn!(
                    url = %feed_url,
                    error = %e,
                    "Native feed unusable, reading listing instead"
                );
                (overview.metadata, Item::default())
            }
        },
        None => (overview.metadata, Item::default()),
    };

    let identity = strategy.identity();
    let known: HashSet<&str> = prior
        .map(|p| p.items.iter().filter_map(|i| i.identity(identity)).collect())
        .unwrap_or_default();

    let fresh =
        collect_new_items(cache, strategy, listing_url, page_count, &template, &known).await?;

    tracing::info!(
        strategy = %strategy.identify(),
        url = %listing_url,
        new = fresh.len(),
        kept = prior.map_or(0, |p| p.items.len()),
        "Merged feed"
    );

    feed.items = fresh;
    if let Some(prior) = prior {
        feed.items.extend(prior.items.iter().cloned());
    }
    Ok(feed)
}

/// Phase 1: scrape listing pages until exhausted or a known item shows up.
async fn collect_new_items(
    cache: &HttpCache,
    strategy: &Strategy,
    listing_url: &Url,
    page_count: usize,
    template: &Item,
    known: &HashSet<&str>,
) -> Result<Vec<Item>, FeedError> {
    let identity = strategy.identity();
    let mut fresh = Vec::new();
    let mut discovered = HashSet::new();

    for page in 1..=page_count {
        let url = page_url(listing_url, page);
        let resource = cache.get(url.as_str()).await?;

        for candidate in extract::extract_episodes(strategy, &resource.content, template) {
            let item = match candidate {
                Ok(item) => item,
                Err(ExtractError::UnsupportedMedia(media)) => {
                    tracing::info!(
                        url = %url,
                        media = %media,
                        "Skipping episode with unsupported media"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Skipping episode node");
                    continue;
                }
            };

            let Some(key) = item.identity(identity).map(str::to_owned) else {
                tracing::debug!(
                    url = %url,
                    title = %item.title,
                    "Skipping episode without identity"
                );
                continue;
            };

            if known.contains(key.as_str()) {
                tracing::info!(url = %url, key = %key, "Reached a known episode, stopping");
                return Ok(fresh);
            }
            if !discovered.insert(key.clone()) {
                tracing::debug!(url = %url, key = %key, "Episode already seen in this run");
                continue;
            }

            fresh.push(enrich(cache, strategy, item).await?);
        }
    }

    Ok(fresh)
}

/// Adds the episode page description (best effort) and the media length.
async fn enrich(
    cache: &HttpCache,
    strategy: &Strategy,
    mut item: Item,
) -> Result<Item, FeedError> {
    match cache.get(&item.link).await {
        Ok(page) => {
            item.description =
                extract::extract_description(strategy, &page.content).unwrap_or_default();
        }
        Err(e) => {
            tracing::warn!(url = %item.link, error = %e, "Failed to fetch episode page");
        }
    }

    if let Some(enclosure) = item.enclosure.as_mut() {
        let headers = cache.head(&enclosure.url).await?;
        enclosure.length = headers.content_length().unwrap_or(0);
    }
    Ok(item)
}

/// URL of listing page `page` (1-based).
pub fn page_url(listing_url: &Url, page: usize) -> Url {
    let mut url = listing_url.clone();
    url.query_pairs_mut().append_pair(PAGE_PARAM, &page.to_string());
    url
}
