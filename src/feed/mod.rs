//! Feed model and the pagination/merge engine.
//!
//! - [`Feed`] / [`Item`] are the in-memory podcast feed, convertible to and
//!   from RSS 2.0 (the persisted format).
//! - [`native`] fetches a site's own syndication feed when a listing page
//!   links one.
//! - [`merge`] walks a program's listing pages and extends a previously
//!   persisted feed with newly published episodes.

mod channel;
pub mod merge;
mod model;
pub mod native;

use thiserror::Error;

use crate::cache::CacheError;

pub use model::{Enclosure, Feed, IdentityKey, Image, Item};

/// Failures that abort a merge.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] CacheError),

    #[error("Invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("Failed to write RSS: {0}")]
    Serialize(#[from] rss::Error),
}
