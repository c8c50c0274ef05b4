//! Catalog media entities.
//!
//! A [`Media`] is either a book (ebook or audiobook) or an e-magazine. All
//! variants share the same identity: the numeric item id embedded in the
//! item's link. Equality and hashing look at that id only, so the same item
//! compares equal across polls even when its title or availability text
//! changed in between.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::normalize_whitespace;

/// Public host of the lending platform.
pub const ONLEIHE_BASE_URL: &str = "https://www.onleihe.de";

/// Numeric item id, the sole identity key of a [`Media`].
pub type MediaId = u64;

/// Delivery format of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Audio,
    Ebook,
    Emagazine,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Audio => "audio",
            MediaFormat::Ebook => "ebook",
            MediaFormat::Emagazine => "emagazine",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Availability of an item at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    /// Today if available, otherwise the date the item becomes available.
    pub date: NaiveDate,
}

impl Availability {
    /// Available right now.
    pub fn now() -> Self {
        Self {
            available: true,
            date: Local::now().date_naive(),
        }
    }

    /// Lent out until `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            available: false,
            date,
        }
    }
}

/// Book-only fields.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetails {
    /// Author text as found on the page; may contain line breaks.
    #[serde(rename = "author", serialize_with = "serialize_author")]
    raw_author: String,
    /// Abstract, absent when the listing omits it.
    pub description: Option<String>,
    pub insert_date: NaiveDate,
}

fn serialize_author<S>(raw: &str, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&normalize_whitespace(raw))
}

impl BookDetails {
    pub fn new(
        author: impl Into<String>,
        description: Option<String>,
        insert_date: NaiveDate,
    ) -> Self {
        Self {
            raw_author: author.into(),
            description,
            insert_date,
        }
    }

    /// Author with line breaks and whitespace runs collapsed to single spaces.
    pub fn author(&self) -> Cow<'_, str> {
        let raw = self.raw_author.as_str();
        let clean = raw.split_whitespace().eq(raw.split(' ')) && raw.trim() == raw;
        if clean {
            Cow::Borrowed(raw)
        } else {
            Cow::Owned(normalize_whitespace(raw))
        }
    }

    /// Author text exactly as extracted.
    pub fn raw_author(&self) -> &str {
        &self.raw_author
    }
}

/// Variant payload of a [`Media`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaKind {
    Book(BookDetails),
    Magazine,
}

/// A catalog item.
#[derive(Debug, Clone, Serialize)]
pub struct Media {
    /// Relative link of the item's info page, e.g.
    /// `mediaInfo,0-0-1234567-200-0-0-0-0-0-0-0.html`.
    pub link: String,
    id: MediaId,
    pub title: String,
    pub format: MediaFormat,
    /// Tenant key of the library the item was listed in.
    pub library: String,
    pub available: bool,
    pub availability_date: NaiveDate,
    pub kind: MediaKind,
}

impl Media {
    /// Build a book. Fails when the link carries no numeric id.
    pub fn book(
        link: impl Into<String>,
        title: impl Into<String>,
        format: MediaFormat,
        library: impl Into<String>,
        availability: Availability,
        details: BookDetails,
    ) -> Result<Self> {
        Self::build(
            link.into(),
            title.into(),
            format,
            library.into(),
            availability,
            MediaKind::Book(details),
        )
    }

    /// Build an e-magazine. Fails when the link carries no numeric id.
    pub fn magazine(
        link: impl Into<String>,
        title: impl Into<String>,
        library: impl Into<String>,
        availability: Availability,
    ) -> Result<Self> {
        Self::build(
            link.into(),
            title.into(),
            MediaFormat::Emagazine,
            library.into(),
            availability,
            MediaKind::Magazine,
        )
    }

    fn build(
        link: String,
        title: String,
        format: MediaFormat,
        library: String,
        availability: Availability,
        kind: MediaKind,
    ) -> Result<Self> {
        let id = id_from_link(&link)?;
        Ok(Self {
            link,
            id,
            title,
            format,
            library,
            available: availability.available,
            availability_date: availability.date,
            kind,
        })
    }

    pub fn id(&self) -> MediaId {
        self.id
    }

    /// Absolute URL of the item's info page on the public platform.
    pub fn full_url(&self) -> String {
        self.url_on(ONLEIHE_BASE_URL)
    }

    /// Info page URL under another platform origin.
    pub fn url_on(&self, base_url: &str) -> String {
        format!(
            "{}/{}/frontend/{}",
            base_url.trim_end_matches('/'),
            self.library,
            self.link
        )
    }

    pub fn as_book(&self) -> Option<&BookDetails> {
        match &self.kind {
            MediaKind::Book(details) => Some(details),
            MediaKind::Magazine => None,
        }
    }

    pub fn is_book(&self) -> bool {
        self.as_book().is_some()
    }
}

/// Identity key used by every media container.
pub fn media_key(media: &Media) -> MediaId {
    media.id
}

/// Parse the item id from a link: the third dash-delimited token.
pub fn id_from_link(link: &str) -> Result<MediaId> {
    let token = link
        .split('-')
        .nth(2)
        .ok_or_else(|| AppError::parse("media link", format!("no id token in '{link}'")))?;
    token
        .parse::<MediaId>()
        .map_err(|e| AppError::parse("media link", format!("id '{token}' in '{link}': {e}")))
}

impl PartialEq for Media {
    fn eq(&self, other: &Self) -> bool {
        media_key(self) == media_key(other)
    }
}

impl Eq for Media {}

impl Hash for Media {
    fn hash<H: Hasher>(&self, state: &mut H) {
        media_key(self).hash(state);
    }
}
