use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Which item field identifies an episode across merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKey {
    /// The media (enclosure) URL
    #[default]
    Enclosure,
    /// The episode's listing link
    Link,
}

/// A podcast feed, in presentation order (newest first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub title: String,
    pub description: String,
    pub copyright: Option<String>,
    pub link: String,
    pub image: Option<Image>,
    pub updated: Option<DateTime<Utc>>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub title: String,
    pub link: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub title: String,
    pub link: String,
    /// Empty when unknown
    pub author: String,
    pub enclosure: Option<Enclosure>,
    pub description: String,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    /// Byte length; 0 when the server did not say
    pub length: u64,
    pub mime_type: String,
}

impl Item {
    /// Dedup key of this item, if it has one.
    pub fn identity(&self, key: IdentityKey) -> Option<&str> {
        let value = match key {
            IdentityKey::Enclosure => self.enclosure.as_ref()?.url.as_str(),
            IdentityKey::Link => self.link.as_str(),
        };
        (!value.is_empty()).then_some(value)
    }
}
