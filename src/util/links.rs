use url::Url;

/// Resolves a potentially relative `href` against `base`.
///
/// Absolute URLs are returned unchanged; anything that cannot be resolved is
/// returned as-is.
pub fn resolve_url(base: &Url, href: &str) -> String {
    let href = href.trim();

    // Already absolute
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    // Relative URL (including protocol-relative): resolve against base
    match base.join(href) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_owned(),
    }
}
