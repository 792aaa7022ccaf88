//! HTML extraction driven by a compiled [`Strategy`].
//!
//! Everything here is synchronous and works on raw markup: the parsed
//! document never outlives the call, so the async merge engine can hold
//! results across `.await` points.

use chrono::DateTime;
use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

use super::{FeedFinder, Strategy};
use crate::feed::{Enclosure, Feed, Image, Item};
use crate::util::{clean_text, resolve_url};

/// Why an episode node did not yield an item.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Episode node has no {0}")]
    Missing(&'static str),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),
}

/// What the first listing page says about the program as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingOverview {
    /// Absolute URL of the site's own feed, if the page links one
    pub native_feed: Option<String>,
    /// Channel metadata read from the page, with no items
    pub metadata: Feed,
    /// Number of pagination links
    pub pager_links: usize,
}

impl ListingOverview {
    /// Listing pages to visit: every linked page plus the first one.
    pub fn page_count(&self) -> usize {
        self.pager_links + 1
    }
}

pub fn inspect_listing(strategy: &Strategy, listing_url: &Url, markup: &[u8]) -> ListingOverview {
    let source = String::from_utf8_lossy(markup);
    let document = Html::parse_document(&source);
    let selectors = &strategy.selectors;

    let native_feed = match &strategy.feed_finder {
        FeedFinder::None => None,
        FeedFinder::Pattern(pattern) => pattern.find(&source).map(|m| m.as_str().to_owned()),
        FeedFinder::Anchor(selector) => document
            .select(selector)
            .find_map(|anchor| anchor.value().attr("href"))
            .map(|href| resolve_url(listing_url, href.trim())),
    };

    let title = document
        .select(&selectors.title)
        .next()
        .map(|e| element_text(&e))
        .unwrap_or_default();

    let description = document
        .select(&selectors.meta_description)
        .find_map(|e| e.value().attr("content"))
        .map(clean_text)
        .unwrap_or_default();

    let image = document
        .select(&selectors.cover)
        .find_map(|e| e.value().attr(&strategy.cover_attribute))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| {
            let url = resolve_url(listing_url, src);
            Image {
                url: url.clone(),
                title: title.clone(),
                link: url,
                ..Image::default()
            }
        });

    let pager_links = document.select(&selectors.pager).count();

    ListingOverview {
        native_feed,
        metadata: Feed {
            title,
            description,
            link: listing_url.to_string(),
            image,
            ..Feed::default()
        },
        pager_links,
    }
}

/// Converts every episode node of a listing page into a candidate item,
/// in page order.
pub fn extract_episodes(
    strategy: &Strategy,
    markup: &[u8],
    template: &Item,
) -> Vec<Result<Item, ExtractError>> {
    let document = Html::parse_document(&String::from_utf8_lossy(markup));
    episode_nodes(strategy, &document)
        .into_iter()
        .map(|node| parse_episode(strategy, node, template))
        .collect()
}

/// First non-empty descriptive paragraph of an episode page.
pub fn extract_description(strategy: &Strategy, markup: &[u8]) -> Option<String> {
    let document = Html::parse_document(&String::from_utf8_lossy(markup));
    document
        .select(&strategy.selectors.description)
        .map(|p| element_text(&p))
        .find(|text| !text.is_empty())
}

fn episode_nodes<'a>(strategy: &Strategy, document: &'a Html) -> Vec<ElementRef<'a>> {
    let selectors = &strategy.selectors;
    let primary: Vec<_> = document.select(&selectors.episodes).collect();
    if !primary.is_empty() {
        return primary;
    }

    document
        .select(&selectors.fallback_episodes)
        .filter_map(|node| climb(node, strategy.fallback_ancestor_hops))
        .collect()
}

fn climb(mut node: ElementRef<'_>, hops: usize) -> Option<ElementRef<'_>> {
    for _ in 0..hops {
        node = node.parent().and_then(ElementRef::wrap)?;
    }
    Some(node)
}

fn parse_episode(
    strategy: &Strategy,
    node: ElementRef<'_>,
    template: &Item,
) -> Result<Item, ExtractError> {
    let player = node
        .select(&strategy.selectors.player)
        .next()
        .ok_or(ExtractError::Missing("on-demand player"))?;
    let player = player.value();

    let media = player
        .attr("data-url")
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or(ExtractError::Missing("media URL"))?;
    let media = resolve_url(strategy.base_url(), media);
    if !strategy.accepts_media(&media) {
        return Err(ExtractError::UnsupportedMedia(media));
    }

    let link = node
        .select(&strategy.selectors.link)
        .find_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or(ExtractError::Missing("episode link"))?;

    let created = player
        .attr("data-start-time")
        .and_then(|t| t.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Ok(Item {
        title: player
            .attr("data-diffusion-title")
            .map(clean_text)
            .unwrap_or_default(),
        link: resolve_url(strategy.base_url(), link),
        author: template.author.clone(),
        enclosure: Some(Enclosure {
            url: media,
            length: 0,
            mime_type: strategy.media_type.clone(),
        }),
        description: String::new(),
        created,
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}
