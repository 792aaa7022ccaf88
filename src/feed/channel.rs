//! Conversion between [`Feed`] and RSS 2.0 documents.
//!
//! The same mapping is used for persisted feed state and for native feeds
//! discovered on listing pages, so an item read back from disk compares
//! equal to the item that was written.

use chrono::{DateTime, Utc};

use super::model::{Enclosure, Feed, Image, Item};

impl Feed {
    /// Parses an RSS 2.0 document.
    pub fn from_rss(bytes: &[u8]) -> Result<Self, rss::Error> {
        let channel = rss::Channel::read_from(bytes)?;
        Ok(Self::from_channel(&channel))
    }

    pub fn from_channel(channel: &rss::Channel) -> Self {
        Self {
            title: channel.title().to_owned(),
            description: channel.description().to_owned(),
            copyright: channel.copyright().map(str::to_owned),
            link: channel.link().to_owned(),
            image: channel.image().map(|image| Image {
                url: image.url().to_owned(),
                title: image.title().to_owned(),
                link: image.link().to_owned(),
                width: image.width().and_then(|w| w.trim().parse().ok()),
                height: image.height().and_then(|h| h.trim().parse().ok()),
            }),
            // Only a parseable lastBuildDate sets the timestamp
            updated: channel.last_build_date().and_then(parse_rfc2822),
            items: channel.items().iter().map(Item::from_rss_item).collect(),
        }
    }

    pub fn to_channel(&self) -> rss::Channel {
        let mut channel = rss::Channel::default();
        channel.set_title(self.title.as_str());
        channel.set_link(self.link.as_str());
        channel.set_description(self.description.as_str());
        channel.set_copyright(self.copyright.clone());
        channel.set_last_build_date(self.updated.map(|t| t.to_rfc2822()));

        if let Some(image) = &self.image {
            let mut rss_image = rss::Image::default();
            rss_image.set_url(image.url.as_str());
            rss_image.set_title(image.title.as_str());
            rss_image.set_link(image.link.as_str());
            rss_image.set_width(image.width.map(|w| w.to_string()));
            rss_image.set_height(image.height.map(|h| h.to_string()));
            channel.set_image(rss_image);
        }

        channel.set_items(
            self.items
                .iter()
                .map(Item::to_rss_item)
                .collect::<Vec<_>>(),
        );
        channel
    }

    /// Serializes the feed as an RSS 2.0 document.
    pub fn to_rss(&self) -> Result<String, rss::Error> {
        let bytes = self.to_channel().write_to(Vec::new())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Item {
    pub fn from_rss_item(item: &rss::Item) -> Self {
        Self {
            title: item.title().unwrap_or_default().to_owned(),
            link: item.link().unwrap_or_default().to_owned(),
            author: item.author().unwrap_or_default().to_owned(),
            enclosure: item.enclosure().map(|enclosure| Enclosure {
                url: enclosure.url().to_owned(),
                length: enclosure.length().trim().parse().unwrap_or(0),
                mime_type: enclosure.mime_type().to_owned(),
            }),
            description: item.description().unwrap_or_default().to_owned(),
            created: item.pub_date().and_then(parse_rfc2822),
        }
    }

    pub fn to_rss_item(&self) -> rss::Item {
        let mut item = rss::Item::default();
        item.set_title(non_empty(&self.title));
        item.set_link(non_empty(&self.link));
        item.set_author(non_empty(&self.author));
        item.set_description(non_empty(&self.description));
        item.set_pub_date(self.created.map(|t| t.to_rfc2822()));

        if let Some(enclosure) = &self.enclosure {
            let mut rss_enclosure = rss::Enclosure::default();
            rss_enclosure.set_url(enclosure.url.as_str());
            rss_enclosure.set_length(enclosure.length.to_string());
            rss_enclosure.set_mime_type(enclosure.mime_type.as_str());
            item.set_enclosure(rss_enclosure);
        }
        item
    }
}

pub(crate) fn parse_rfc2822(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NATIVE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Le Show</title>
    <link>https://www.franceinter.fr/emissions/le-show</link>
    <description>Tous les épisodes</description>
    <copyright>Radio France</copyright>
    <lastBuildDate>Tue, 14 Nov 2023 10:00:00 +0100</lastBuildDate>
    <image>
      <url>https://img.example.com/cover.jpg</url>
      <title>Le Show</title>
      <link>https://www.franceinter.fr/emissions/le-show</link>
      <width>144</width>
      <height>144</height>
    </image>
    <item>
      <title>Épisode 1</title>
      <link>https://www.franceinter.fr/emissions/le-show/ep1</link>
      <author>podcast@radiofrance.com</author>
      <enclosure url="https://media.example.com/ep1.mp3" length="1234" type="audio/mpeg"/>
      <pubDate>Mon, 13 Nov 2023 08:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_channel_fields_are_read() {
        let feed = Feed::from_rss(NATIVE_RSS.as_bytes()).unwrap();

        assert_eq!(feed.title, "Le Show");
        assert_eq!(feed.description, "Tous les épisodes");
        assert_eq!(feed.copyright.as_deref(), Some("Radio France"));
        assert_eq!(
            feed.image,
            Some(Image {
                url: "https://img.example.com/cover.jpg".to_string(),
                title: "Le Show".to_string(),
                link: "https://www.franceinter.fr/emissions/le-show".to_string(),
                width: Some(144),
                height: Some(144),
            })
        );
        assert_eq!(
            feed.updated.map(|t| t.timestamp()),
            Some(1699952400) // 2023-11-14T09:00:00Z
        );

        let item = &feed.items[0];
        assert_eq!(item.author, "podcast@radiofrance.com");
        assert_eq!(
            item.enclosure,
            Some(Enclosure {
                url: "https://media.example.com/ep1.mp3".to_string(),
                length: 1234,
                mime_type: "audio/mpeg".to_string(),
            })
        );
        assert_eq!(item.created.map(|t| t.timestamp()), Some(1699862400));
    }

    #[test]
    fn test_unparseable_build_date_leaves_updated_unset() {
        let xml = NATIVE_RSS.replace(
            "Tue, 14 Nov 2023 10:00:00 +0100",
            "sometime last week",
        );
        let feed = Feed::from_rss(xml.as_bytes()).unwrap();
        assert_eq!(feed.updated, None);
        assert_eq!(feed.title, "Le Show");
    }

    #[test]
    fn test_written_feed_reads_back_equal() {
        let feed = Feed::from_rss(NATIVE_RSS.as_bytes()).unwrap();
        let written = feed.to_rss().unwrap();
        assert!(written.contains("<rss"));

        let reread = Feed::from_rss(written.as_bytes()).unwrap();
        assert_eq!(reread, feed);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Feed::from_rss(b"<html><body>not a feed</body></html>").is_err());
    }
}
