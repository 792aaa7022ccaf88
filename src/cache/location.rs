use std::path::{Path, PathBuf};

use url::Url;

use super::CacheError;

/// HTTP method an entry was recorded for. GET and HEAD entries for the same
/// URL live side by side and never share files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

/// Identity of a cached response: `(host, path, query, method)`.
///
/// The query is re-encoded with its pairs sorted by key, so `?b=2&a=1` and
/// `?a=1&b=2` share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    host: String,
    segments: Vec<String>,
    query: Option<String>,
    method: Method,
}

impl CacheKey {
    pub fn new(method: Method, raw_url: &str) -> Result<Self, CacheError> {
        let url = Url::parse(raw_url).map_err(|e| CacheError::InvalidUrl {
            url: raw_url.to_owned(),
            reason: e.to_string(),
        })?;
        Self::from_url(method, &url)
    }

    pub fn from_url(method: Method, url: &Url) -> Result<Self, CacheError> {
        let host = url.host_str().ok_or_else(|| CacheError::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_owned(),
        })?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        // Empty segments are dropped so the path can never climb out of the
        // host directory or resolve to an absolute path.
        let segments = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .map(str::to_owned)
            .collect();

        Ok(Self {
            host,
            segments,
            query: sorted_query(url),
            method,
        })
    }

    /// Directory holding the `content` and `headers` files of this entry:
    /// `<root>/<host>/<path>[?<query>]/<METHOD>`.
    pub fn entry_dir(&self, root: &Path) -> PathBuf {
        let mut dir = root.join(&self.host);
        let mut segments = self.segments.clone();

        if let Some(query) = &self.query {
            match segments.last_mut() {
                Some(last) => {
                    last.push('?');
                    last.push_str(query);
                }
                None => segments.push(format!("?{query}")),
            }
        }

        for segment in &segments {
            dir.push(segment);
        }
        dir.push(self.method.as_str());
        dir
    }
}

fn sorted_query(url: &Url) -> Option<String> {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        return None;
    }

    // Stable: repeated keys keep their relative order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    Some(
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish(),
    )
}
