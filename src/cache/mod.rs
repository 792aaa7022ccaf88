//! Disk-backed HTTP response cache.
//!
//! Every network access made while building a feed goes through
//! [`HttpCache`]. Responses are stored under a deterministic directory per
//! URL and method (see [`CacheKey`]):
//!
//! ```text
//! <root>/<host>/<path>[?<sorted query>]/<GET|HEAD>/content
//! <root>/<host>/<path>[?<sorted query>]/<GET|HEAD>/headers
//! ```
//!
//! The two files are independent halves of an entry. Each is fresh while its
//! modification time is younger than the TTL (24 hours by default); a stale
//! or missing half is re-fetched and overwritten. Nothing is ever evicted.
//!
//! For GET requests the stored header set comes from a separate HEAD request
//! to the same URL rather than from the GET response itself. This can be
//! turned off with [`HttpCache::with_head_for_headers`].

mod headers;
mod location;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::CONTENT_ENCODING;
use thiserror::Error;

pub use headers::ResponseHeaders;
pub use location::{CacheKey, Method};

/// Default freshness window for both halves of an entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single response body.
pub const MAX_RESOURCE_SIZE: usize = 20 * 1024 * 1024; // 20MB

const CONTENT_FILE: &str = "content";
const HEADERS_FILE: &str = "headers";

/// Errors returned by [`HttpCache`] operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The URL could not be mapped to a cache location
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Connection, TLS or body transfer failure
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Server answered with a 4xx/5xx status. Whatever was read is attached
    /// for best-effort use; nothing was written to the cache.
    #[error("HTTP error: status {status} for {url}")]
    Status {
        url: String,
        status: u16,
        content: Vec<u8>,
        headers: ResponseHeaders,
    },
    /// Response body exceeded the configured size ceiling
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
    /// Body declared gzip encoding but did not decompress
    #[error("Failed to decode gzip body: {0}")]
    Decode(#[source] std::io::Error),
    /// Reading or writing an entry on disk failed
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Header map could not be encoded for storage
    #[error("Failed to encode headers: {0}")]
    Headers(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// A GET response as served by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub content: Vec<u8>,
    pub headers: ResponseHeaders,
}

/// Disk-resident cache mediating all HTTP access.
///
/// Cloning is cheap; the underlying `reqwest::Client` is reference counted.
/// The cache takes no locks: concurrent writers of the same entry race, but
/// they write the same bytes for the same URL.
#[derive(Debug, Clone)]
pub struct HttpCache {
    root: PathBuf,
    client: reqwest::Client,
    ttl: Duration,
    head_for_headers: bool,
    max_resource_bytes: usize,
}

impl HttpCache {
    pub fn new(root: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            root: root.into(),
            client,
            ttl: DEFAULT_TTL,
            head_for_headers: true,
            max_resource_bytes: MAX_RESOURCE_SIZE,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// When disabled, GET entries store the GET response's own headers and
    /// no HEAD request is issued on the GET path.
    pub fn with_head_for_headers(mut self, enabled: bool) -> Self {
        self.head_for_headers = enabled;
        self
    }

    pub fn with_max_resource_bytes(mut self, limit: usize) -> Self {
        self.max_resource_bytes = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Directory of the entry for `url` under this cache's root.
    pub fn entry_dir(&self, method: Method, url: &str) -> Result<PathBuf, CacheError> {
        Ok(CacheKey::new(method, url)?.entry_dir(&self.root))
    }

    /// Fetches `url` with GET, serving each half of the entry from disk while
    /// it is fresh.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Network`] - transport failure, nothing cached
    /// - [`CacheError::Status`] - 4xx/5xx answer, carries what was read
    /// - [`CacheError::Decode`] - corrupt gzip body
    /// - [`CacheError::Io`] - entry could not be written
    pub async fn get(&self, url: &str) -> Result<Resource, CacheError> {
        let dir = self.entry_dir(Method::Get, url)?;

        let content = self.read_fresh_content(&dir).await;
        let headers = self.read_fresh_headers(&dir).await;

        match (content, headers) {
            (Some(content), Some(headers)) => {
                tracing::debug!(url = %url, "Cache hit");
                Ok(Resource { content, headers })
            }
            (Some(content), None) if self.head_for_headers => {
                tracing::debug!(url = %url, "Cached content fresh, refreshing headers");
                let headers = self.fetch_head(url).await?;
                self.store(&dir, None, &headers).await?;
                Ok(Resource { content, headers })
            }
            _ => {
                tracing::debug!(url = %url, "Cache miss, fetching");
                let resource = self.fetch_get(url).await?;
                self.store(&dir, Some(&resource.content), &resource.headers)
                    .await?;
                Ok(resource)
            }
        }
    }

    /// Fetches only the headers of `url` with HEAD.
    pub async fn head(&self, url: &str) -> Result<ResponseHeaders, CacheError> {
        let dir = self.entry_dir(Method::Head, url)?;

        if let Some(headers) = self.read_fresh_headers(&dir).await {
            tracing::debug!(url = %url, "Cache hit (HEAD)");
            return Ok(headers);
        }

        tracing::debug!(url = %url, "Cache miss (HEAD), fetching");
        let headers = self.fetch_head(url).await?;
        self.store(&dir, None, &headers).await?;
        Ok(headers)
    }

    // ========================================================================
    // Disk
    // ========================================================================

    async fn is_fresh(&self, path: &Path) -> bool {
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };

        match modified.elapsed() {
            Ok(age) => age < self.ttl,
            // Modification time in the future (clock skew): still fresh
            Err(_) => true,
        }
    }

    async fn read_fresh_content(&self, dir: &Path) -> Option<Vec<u8>> {
        let path = dir.join(CONTENT_FILE);
        if !self.is_fresh(&path).await {
            return None;
        }
        tokio::fs::read(&path).await.ok()
    }

    async fn read_fresh_headers(&self, dir: &Path) -> Option<ResponseHeaders> {
        let path = dir.join(HEADERS_FILE);
        if !self.is_fresh(&path).await {
            return None;
        }

        let raw = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(headers) => Some(headers),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Corrupt cached headers, treating as miss"
                );
                None
            }
        }
    }

    async fn store(
        &self,
        dir: &Path,
        content: Option<&[u8]>,
        headers: &ResponseHeaders,
    ) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CacheError::io(dir, e))?;

        if let Some(content) = content {
            let path = dir.join(CONTENT_FILE);
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| CacheError::io(&path, e))?;
        }

        let path = dir.join(HEADERS_FILE);
        let encoded = serde_json::to_vec(headers)?;
        tokio::fs::write(&path, encoded)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        Ok(())
    }

    // ========================================================================
    // Network
    // ========================================================================

    async fn fetch_get(&self, url: &str) -> Result<Resource, CacheError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let gzip = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
        let own_headers = ResponseHeaders::from_header_map(response.headers());

        let body = read_limited_bytes(response, self.max_resource_bytes).await?;
        let content = if gzip {
            decode_gzip(&body, self.max_resource_bytes)?
        } else {
            body
        };

        if status.is_client_error() || status.is_server_error() {
            return Err(CacheError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                content,
                headers: own_headers,
            });
        }

        if !self.head_for_headers {
            return Ok(Resource {
                content,
                headers: own_headers,
            });
        }

        match self.fetch_head(url).await {
            Ok(headers) => Ok(Resource { content, headers }),
            Err(CacheError::Status {
                url,
                status,
                headers,
                ..
            }) => Err(CacheError::Status {
                url,
                status,
                content,
                headers,
            }),
            Err(e) => Err(e),
        }
    }

    async fn fetch_head(&self, url: &str) -> Result<ResponseHeaders, CacheError> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        let headers = ResponseHeaders::from_header_map(response.headers());

        if status.is_client_error() || status.is_server_error() {
            return Err(CacheError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                content: Vec::new(),
                headers,
            });
        }

        Ok(headers)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, CacheError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(CacheError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(CacheError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Decompresses a gzip body, applying the same ceiling as the wire bytes.
fn decode_gzip(body: &[u8], limit: usize) -> Result<Vec<u8>, CacheError> {
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(body)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut decoded)
        .map_err(CacheError::Decode)?;

    if decoded.len() > limit {
        return Err(CacheError::TooLarge(limit));
    }
    Ok(decoded)
}
