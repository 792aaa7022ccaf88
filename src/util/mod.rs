//! Small helpers shared by the extraction code.
//!
//! - **Text**: scrubbing scraped strings before they end up in RSS XML
//! - **URLs**: resolving relative links found in listing markup

mod links;
mod text;

pub use links::resolve_url;
pub use text::clean_text;
