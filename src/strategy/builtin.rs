//! Strategies shipped with the proxy.

use super::{FeedFinderConfig, StrategyConfig};

/// France Inter: the listing page links to the program's feed through a
/// dedicated RSS button.
pub fn franceinter() -> StrategyConfig {
    StrategyConfig {
        base_url: "https://www.franceinter.fr".to_string(),
        feed_finder: FeedFinderConfig::Anchor {
            selector: "a.podcast-button.rss".to_string(),
        },
        ..StrategyConfig::default()
    }
}

/// France Culture: the feed URL only appears somewhere in the page source,
/// and episode figures sit two levels below the episode node.
pub fn franceculture() -> StrategyConfig {
    StrategyConfig {
        base_url: "https://www.franceculture.fr".to_string(),
        feed_finder: FeedFinderConfig::Pattern {
            pattern: r"https?://radiofrance-podcast\.net/podcast09/rss_[0-9]+\.xml".to_string(),
        },
        fallback_ancestor_hops: 2,
        ..StrategyConfig::default()
    }
}

pub fn configs() -> Vec<(&'static str, StrategyConfig)> {
    vec![
        ("franceinter", franceinter()),
        ("franceculture", franceculture()),
    ]
}
