//! Immutable records materialized from sitemap documents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Priority assigned to a page when the document omits `<priority>`.
pub const DEFAULT_PRIORITY: f32 = 0.5;

/// How frequently a page is likely to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    /// Protocol token as it appears in `<changefreq>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFrequency::Always => "always",
            ChangeFrequency::Hourly => "hourly",
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
            ChangeFrequency::Monthly => "monthly",
            ChangeFrequency::Yearly => "yearly",
            ChangeFrequency::Never => "never",
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown change frequency: {0}")]
pub struct UnknownFrequency(pub String);

impl FromStr for ChangeFrequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(ChangeFrequency::Always),
            "hourly" => Ok(ChangeFrequency::Hourly),
            "daily" => Ok(ChangeFrequency::Daily),
            "weekly" => Ok(ChangeFrequency::Weekly),
            "monthly" => Ok(ChangeFrequency::Monthly),
            "yearly" => Ok(ChangeFrequency::Yearly),
            "never" => Ok(ChangeFrequency::Never),
            _ => Err(UnknownFrequency(s.to_string())),
        }
    }
}

/// Which record element produced a value; used to label validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `<url>` inside a `<urlset>`
    Page,
    /// `<sitemap>` inside a `<sitemapindex>`
    Index,
}

impl RecordKind {
    pub fn element_name(&self) -> &'static str {
        match self {
            RecordKind::Page => "url",
            RecordKind::Index => "sitemap",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.element_name())
    }
}

/// A page listed in a sitemap.
///
/// Values are only produced by the parser, which guarantees a non-empty
/// location and a priority within `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEntry {
    location: String,
    last_modified: Option<DateTime<Utc>>,
    change_frequency: Option<ChangeFrequency>,
    priority: f32,
}

impl PageEntry {
    pub(crate) fn new(
        location: String,
        last_modified: Option<DateTime<Utc>>,
        change_frequency: Option<ChangeFrequency>,
        priority: f32,
    ) -> Self {
        Self {
            location,
            last_modified,
            change_frequency,
            priority,
        }
    }

    /// URL of the page.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Time of the last modification, if the document gave a parseable one.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn change_frequency(&self) -> Option<ChangeFrequency> {
        self.change_frequency
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }
}

/// A child sitemap listed in a sitemap index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    location: String,
    last_modified: Option<DateTime<Utc>>,
}

impl IndexEntry {
    pub(crate) fn new(location: String, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            location,
            last_modified,
        }
    }

    /// URL of the child sitemap document.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }
}

/// Parse a W3C datetime as used by `<lastmod>`.
///
/// Accepts full RFC 3339 timestamps, minute precision with a zone designator,
/// zone-less timestamps (read as UTC), and the truncated `YYYY-MM-DD`,
/// `YYYY-MM` and `YYYY` forms, which resolve to midnight UTC at the start of
/// the period. Anything else yields `None`.
pub fn parse_w3c_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    let with_offset = match text.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => text.to_string(),
    };
    if let Ok(parsed) = DateTime::parse_from_str(&with_offset, "%Y-%m-%dT%H:%M%:z") {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    let date = match text.split('-').collect::<Vec<_>>().as_slice() {
        [_, _, _] => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok(),
        [year, month] => NaiveDate::from_ymd_opt(parse_year(year)?, parse_digits(month, 2)?, 1),
        [year] => NaiveDate::from_ymd_opt(parse_year(year)?, 1, 1),
        _ => None,
    }?;

    date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc())
}

fn parse_year(text: &str) -> Option<i32> {
    parse_digits(text, 4).and_then(|year| i32::try_from(year).ok())
}

fn parse_digits(text: &str, width: usize) -> Option<u32> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
