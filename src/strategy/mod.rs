//! Per-site extraction strategies.
//!
//! A strategy is pure configuration: where a program's listing lives, which
//! selectors find pager links, episode nodes and description paragraphs,
//! and how the site advertises its own RSS feed (if at all). It has no
//! control flow of its own; [`Strategy::fetch`] hands everything to the
//! shared pagination/merge engine in [`crate::feed::merge`].
//!
//! Strategies are declared as [`StrategyConfig`] values (built-ins in
//! [`builtin`], extra ones from the config file), compiled once into
//! [`Strategy`] and collected in a [`StrategyRegistry`] that is handed to
//! the store.

pub mod builtin;
pub mod extract;

use std::collections::BTreeMap;

use regex::Regex;
use scraper::Selector;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::cache::HttpCache;
use crate::feed::{merge, Feed, FeedError, IdentityKey};

/// Placeholder substituted with the program name in `listing_path`.
pub const PROGRAM_PLACEHOLDER: &str = "{program}";

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Strategy '{name}': invalid base URL: {source}")]
    BaseUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Strategy '{name}': listing path must contain {{program}}")]
    ListingPath { name: String },

    #[error("Strategy '{name}': invalid selector for {field}: {reason}")]
    Selector {
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("Strategy '{name}': invalid feed link pattern: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

// ============================================================================
// Declarative configuration
// ============================================================================

/// How a listing page points at the site's own syndication feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedFinderConfig {
    /// The site has no usable feed; metadata comes from the listing page
    #[default]
    None,
    /// First match of a regex over the raw listing markup
    Pattern { pattern: String },
    /// `href` of the first element matching a CSS selector
    Anchor { selector: String },
}

/// Uncompiled strategy, as written in code or in `config.toml`.
///
/// Defaults describe the Radio France page family; a custom strategy
/// usually only needs `base_url` and whichever selectors differ.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Site root, used to build listing URLs and resolve relative links
    pub base_url: String,
    /// Listing path, containing `{program}`
    pub listing_path: String,
    /// Pagination links on the first listing page
    pub pager_selector: String,
    /// Episode nodes
    pub episode_selector: String,
    /// Episode nodes when `episode_selector` matches nothing
    pub fallback_episode_selector: String,
    /// Ancestors to climb from a fallback match to reach the episode node
    pub fallback_ancestor_hops: usize,
    /// Player control of a completed broadcast available on demand
    pub player_selector: String,
    /// Link to the episode page, searched inside the episode node
    pub link_selector: String,
    /// Paragraph on the episode page used as description
    pub description_selector: String,
    /// Cover picture on the listing page
    pub cover_selector: String,
    /// Attribute of the cover element holding the image URL
    pub cover_attribute: String,
    pub feed_finder: FeedFinderConfig,
    pub identity: IdentityKey,
    /// Required suffix of episode media URLs
    pub media_extension: String,
    pub media_type: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            listing_path: "/emissions/{program}".to_string(),
            pager_selector: "li.pager-item > a".to_string(),
            episode_selector: "div.podcast-list > div".to_string(),
            fallback_episode_selector: "figure".to_string(),
            fallback_ancestor_hops: 0,
            player_selector: r#"button[data-broadcast-type="replay"][data-is-aod="1"]"#
                .to_string(),
            link_selector: "a[href]".to_string(),
            description_selector: "article p".to_string(),
            cover_selector: "div.cover-picture img".to_string(),
            cover_attribute: "data-dejavu-src".to_string(),
            feed_finder: FeedFinderConfig::None,
            identity: IdentityKey::Enclosure,
            media_extension: ".mp3".to_string(),
            media_type: "audio/mpeg".to_string(),
        }
    }
}

// ============================================================================
// Compiled strategy
// ============================================================================

#[derive(Debug, Clone)]
pub enum FeedFinder {
    None,
    Pattern(Regex),
    Anchor(Selector),
}

#[derive(Debug, Clone)]
pub(crate) struct Selectors {
    pub(crate) pager: Selector,
    pub(crate) episodes: Selector,
    pub(crate) fallback_episodes: Selector,
    pub(crate) player: Selector,
    pub(crate) link: Selector,
    pub(crate) description: Selector,
    pub(crate) cover: Selector,
    pub(crate) title: Selector,
    pub(crate) meta_description: Selector,
}

/// A compiled, validated strategy.
#[derive(Debug, Clone)]
pub struct Strategy {
    name: String,
    base_url: Url,
    listing_path: String,
    pub(crate) selectors: Selectors,
    pub(crate) fallback_ancestor_hops: usize,
    pub(crate) cover_attribute: String,
    pub(crate) feed_finder: FeedFinder,
    identity: IdentityKey,
    media_extension: String,
    pub(crate) media_type: String,
}

impl Strategy {
    pub fn compile(name: &str, config: &StrategyConfig) -> Result<Self, StrategyError> {
        let base_url = Url::parse(&config.base_url).map_err(|source| StrategyError::BaseUrl {
            name: name.to_owned(),
            source,
        })?;

        if !config.listing_path.contains(PROGRAM_PLACEHOLDER) {
            return Err(StrategyError::ListingPath {
                name: name.to_owned(),
            });
        }

        let selector = |field: &'static str, css: &str| {
            Selector::parse(css).map_err(|e| StrategyError::Selector {
                name: name.to_owned(),
                field,
                reason: e.to_string(),
            })
        };

        let selectors = Selectors {
            pager: selector("pager_selector", &config.pager_selector)?,
            episodes: selector("episode_selector", &config.episode_selector)?,
            fallback_episodes: selector(
                "fallback_episode_selector",
                &config.fallback_episode_selector,
            )?,
            player: selector("player_selector", &config.player_selector)?,
            link: selector("link_selector", &config.link_selector)?,
            description: selector("description_selector", &config.description_selector)?,
            cover: selector("cover_selector", &config.cover_selector)?,
            title: selector("title", "head title")?,
            meta_description: selector("meta description", r#"meta[name="description"]"#)?,
        };

        let feed_finder = match &config.feed_finder {
            FeedFinderConfig::None => FeedFinder::None,
            FeedFinderConfig::Pattern { pattern } => {
                FeedFinder::Pattern(Regex::new(pattern).map_err(|source| {
                    StrategyError::Pattern {
                        name: name.to_owned(),
                        source,
                    }
                })?)
            }
            FeedFinderConfig::Anchor { selector: css } => {
                FeedFinder::Anchor(selector("feed_finder.selector", css)?)
            }
        };

        Ok(Self {
            name: name.to_owned(),
            base_url,
            listing_path: config.listing_path.clone(),
            selectors,
            fallback_ancestor_hops: config.fallback_ancestor_hops,
            cover_attribute: config.cover_attribute.clone(),
            feed_finder,
            identity: config.identity,
            media_extension: config.media_extension.to_ascii_lowercase(),
            media_type: config.media_type.clone(),
        })
    }

    /// Registry name of this strategy.
    pub fn identify(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn identity(&self) -> IdentityKey {
        self.identity
    }

    /// First listing page of `program`.
    pub fn listing_url(&self, program: &str) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&self.listing_path.replace(PROGRAM_PLACEHOLDER, program))
    }

    /// Whether `media_url` points at a file of the expected audio format.
    /// Only the path is checked, so query strings do not get in the way.
    pub fn accepts_media(&self, media_url: &str) -> bool {
        let path = match Url::parse(media_url) {
            Ok(url) => url.path().to_ascii_lowercase(),
            Err(_) => media_url.to_ascii_lowercase(),
        };
        path.ends_with(&self.media_extension)
    }

    /// Builds the feed of `program`, extending `prior` with whatever the
    /// live listing shows that `prior` does not know yet.
    pub async fn fetch(
        &self,
        cache: &HttpCache,
        program: &str,
        prior: Option<&Feed>,
    ) -> Result<Feed, FeedError> {
        let listing_url = self.listing_url(program)?;
        tracing::debug!(strategy = %self.name, url = %listing_url, "Fetching listing");

        let first_page = cache.get(listing_url.as_str()).await?;
        merge::merge(cache, self, &listing_url, &first_page.content, prior).await
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name → strategy table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Strategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in strategies.
    pub fn builtin() -> Result<Self, StrategyError> {
        let mut registry = Self::new();
        for (name, config) in builtin::configs() {
            registry.register(name, &config)?;
        }
        Ok(registry)
    }

    /// Compiles and adds a strategy, replacing any previous one of that name.
    pub fn register(&mut self, name: &str, config: &StrategyConfig) -> Result<(), StrategyError> {
        let strategy = Strategy::compile(name, config)?;
        if self.strategies.insert(name.to_owned(), strategy).is_some() {
            tracing::info!(strategy = %name, "Strategy overridden by configuration");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Strategy> {
        self.strategies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> StrategyConfig {
        StrategyConfig {
            base_url: base_url.to_string(),
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn test_builtin_registry() {
        let registry = StrategyRegistry::builtin().unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["franceculture", "franceinter"]);
        assert_eq!(
            registry.get("franceinter").unwrap().identify(),
            "franceinter"
        );
        assert!(registry.get("bbc").is_none());
    }

    #[test]
    fn test_listing_url() {
        let strategy = Strategy::compile("t", &config("https://www.franceinter.fr")).unwrap();
        assert_eq!(
            strategy.listing_url("le-show").unwrap().as_str(),
            "https://www.franceinter.fr/emissions/le-show"
        );
    }

    #[test]
    fn test_accepts_media() {
        let strategy = Strategy::compile("t", &config("https://example.com")).unwrap();
        assert!(strategy.accepts_media("https://cdn.example.com/a/ep.mp3"));
        assert!(strategy.accepts_media("https://cdn.example.com/a/EP.MP3?dl=1"));
        assert!(!strategy.accepts_media("https://cdn.example.com/a/ep.m4a"));
        assert!(!strategy.accepts_media("https://cdn.example.com/mp3"));
        assert!(!strategy.accepts_media(""));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = Strategy::compile("t", &config("not a url")).unwrap_err();
        assert!(matches!(err, StrategyError::BaseUrl { .. }));
    }

    #[test]
    fn test_listing_path_needs_placeholder() {
        let mut cfg = config("https://example.com");
        cfg.listing_path = "/shows/all".to_string();
        let err = Strategy::compile("t", &cfg).unwrap_err();
        assert!(matches!(err, StrategyError::ListingPath { .. }));
        assert!(err.to_string().contains("{program}"));
    }

    #[test]
    fn test_bad_selector_names_field() {
        let mut cfg = config("https://example.com");
        cfg.episode_selector = "div[[".to_string();
        match Strategy::compile("t", &cfg).unwrap_err() {
            StrategyError::Selector { field, .. } => assert_eq!(field, "episode_selector"),
            e => panic!("Expected Selector error, got {:?}", e),
        }
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut cfg = config("https://example.com");
        cfg.feed_finder = FeedFinderConfig::Pattern {
            pattern: "rss_(".to_string(),
        };
        let err = Strategy::compile("t", &cfg).unwrap_err();
        assert!(matches!(err, StrategyError::Pattern { .. }));
    }

    #[test]
    fn test_config_from_toml_uses_defaults() {
        let cfg: StrategyConfig = toml::from_str(
            r#"
base_url = "https://radio.example.com"
identity = "link"
feed_finder = { kind = "anchor", selector = "a.rss" }
"#,
        )
        .unwrap();

        assert_eq!(cfg.identity, IdentityKey::Link);
        assert_eq!(
            cfg.feed_finder,
            FeedFinderConfig::Anchor {
                selector: "a.rss".to_string()
            }
        );
        assert_eq!(cfg.listing_path, "/emissions/{program}");
        assert!(Strategy::compile("custom", &cfg).is_ok());
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = StrategyRegistry::builtin().unwrap();
        let before = registry.len();
        registry
            .register("franceinter", &config("https://mirror.example.com"))
            .unwrap();
        assert_eq!(registry.len(), before);
        assert_eq!(
            registry.get("franceinter").unwrap().base_url().as_str(),
            "https://mirror.example.com/"
        );
    }
}
