//! Utility functions and helpers.

pub mod http;

use chrono::NaiveDate;
use scraper::Selector;
use url::Url;

use crate::error::{AppError, Result};

/// Date format used throughout the backend's pages.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the tenant (library) key from a catalog URL.
///
/// The key is the first path segment, e.g. `berlin` for
/// `https://www.onleihe.de/berlin/frontend/...`.
pub fn library_key(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str)?;
    url.path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::config(format!("No library segment in URL: {url_str}")))
}

/// Parse a localized `dd.mm.yyyy` date.
pub fn parse_date(text: &str, context: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|e| AppError::parse(context, format!("'{trimmed}' is not dd.mm.yyyy ({e})")))
}

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collapse all runs of whitespace (including line breaks and NBSP) into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
