//! Podcast RSS proxy.
//!
//! Turns paginated radio show listings into stable, deduplicated RSS feeds.
//! Every network access goes through a disk-resident response cache
//! ([`cache`]); per-site extraction is configuration ([`strategy`]); the
//! merge engine ([`feed::merge`]) extends the previously persisted feed
//! managed by the [`store`].

pub mod cache;
pub mod config;
pub mod feed;
pub mod store;
pub mod strategy;
pub mod util;
