//! URL handling module for Sumi-Harvest
//!
//! This module turns task references into canonical identities and extracts
//! the origin of a URL for per-host state such as robots.txt caching.

mod domain;
mod normalize;

pub use domain::origin_key;
pub use normalize::normalize_url;

/// Derives the canonical deduplication identity for a task reference
///
/// References that parse as HTTP(S) URLs are normalized, so that
/// `https://WWW.Example.com/item/?utm_source=x#top` and
/// `https://example.com/item` share one identity. Any other reference (a page
/// index, an opaque locator) is only trimmed.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::canonical_identity;
///
/// assert_eq!(
///     canonical_identity("https://WWW.EXAMPLE.COM/item/?utm_source=x"),
///     "https://example.com/item"
/// );
/// assert_eq!(canonical_identity("  page:3 "), "page:3");
/// ```
pub fn canonical_identity(reference: &str) -> String {
    let trimmed = reference.trim();
    match normalize_url(trimmed) {
        Ok(url) => url.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
