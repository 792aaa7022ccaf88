/// Normalizes text scraped from markup for use in a feed.
///
/// Control characters are dropped (most of them are not allowed in XML 1.0
/// and would make the emitted RSS unreadable), runs of whitespace collapse
/// to a single space, and the result is trimmed.
///
/// # Examples
///
/// ```
/// use podcast_proxy::util::clean_text;
///
/// assert_eq!(clean_text("  Le\n\t grand \u{7}show "), "Le grand show");
/// ```
pub fn clean_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}
