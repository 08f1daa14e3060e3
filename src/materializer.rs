//! Decode a single `<url>` or `<sitemap>` subtree into a validated record.

use std::io::BufRead;

use tracing::debug;

use crate::config::{ParseOptions, PriorityPolicy, UnknownFrequencyPolicy};
use crate::entry::{
    ChangeFrequency, DEFAULT_PRIORITY, IndexEntry, PageEntry, RecordKind, parse_w3c_datetime,
};
use crate::error::{self, SitemapError};
use crate::walker::{ElementStart, TokenStream};

/// Raw child texts of a record element, before any validation.
#[derive(Debug, Default)]
struct RawFields {
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

impl RawFields {
    fn read<R: BufRead>(
        tokens: &mut TokenStream<R>,
        start: &ElementStart<'_>,
    ) -> error::Result<Self> {
        let mut raw = RawFields::default();
        tokens.read_children(start, |name, text| match name {
            b"loc" => raw.loc = Some(text),
            b"lastmod" => raw.lastmod = Some(text),
            b"changefreq" => raw.changefreq = Some(text),
            b"priority" => raw.priority = Some(text),
            _ => {}
        })?;
        Ok(raw)
    }
}

/// Materialize the `<url>` element at `start` and hand it to `consumer`.
///
/// `ordinal` is the 1-based position of the element among its kind and is
/// only used to label validation errors. The consumer is not called when
/// validation fails, and its own error is returned unchanged.
pub fn materialize_entry<R, F, E>(
    tokens: &mut TokenStream<R>,
    start: &ElementStart<'_>,
    options: &ParseOptions,
    ordinal: usize,
    consumer: &mut F,
) -> Result<(), E>
where
    R: BufRead,
    F: FnMut(PageEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    let raw = RawFields::read(tokens, start)?;
    let kind = RecordKind::Page;

    let location = required_location(raw.loc, kind, ordinal)?;
    let last_modified = raw.lastmod.as_deref().and_then(parse_w3c_datetime);
    let change_frequency =
        change_frequency(raw.changefreq, options.unknown_frequency, ordinal)?;
    let priority = priority(raw.priority, options.priority_policy, ordinal)?;

    consumer(PageEntry::new(
        location,
        last_modified,
        change_frequency,
        priority,
    ))
}

/// Materialize the `<sitemap>` element at `start` and hand it to `consumer`.
pub fn materialize_index_entry<R, F, E>(
    tokens: &mut TokenStream<R>,
    start: &ElementStart<'_>,
    ordinal: usize,
    consumer: &mut F,
) -> Result<(), E>
where
    R: BufRead,
    F: FnMut(IndexEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    let raw = RawFields::read(tokens, start)?;

    let location = required_location(raw.loc, RecordKind::Index, ordinal)?;
    let last_modified = raw.lastmod.as_deref().and_then(parse_w3c_datetime);

    consumer(IndexEntry::new(location, last_modified))
}

fn required_location(
    loc: Option<String>,
    record: RecordKind,
    ordinal: usize,
) -> error::Result<String> {
    match loc.as_deref().map(str::trim) {
        Some(location) if !location.is_empty() => Ok(location.to_string()),
        _ => Err(SitemapError::MissingField {
            record,
            ordinal,
            field: "loc",
        }),
    }
}

fn change_frequency(
    text: Option<String>,
    policy: UnknownFrequencyPolicy,
    ordinal: usize,
) -> error::Result<Option<ChangeFrequency>> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };

    match (text.parse::<ChangeFrequency>(), policy) {
        (Ok(frequency), _) => Ok(Some(frequency)),
        (Err(_), UnknownFrequencyPolicy::Ignore) => {
            debug!(ordinal, value = %text, "ignoring unknown <changefreq>");
            Ok(None)
        }
        (Err(err), UnknownFrequencyPolicy::Reject) => Err(SitemapError::InvalidField {
            record: RecordKind::Page,
            ordinal,
            field: "changefreq",
            value: text,
            reason: err.to_string(),
        }),
    }
}

fn priority(
    text: Option<String>,
    policy: PriorityPolicy,
    ordinal: usize,
) -> error::Result<f32> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(DEFAULT_PRIORITY);
    };

    let value = match text.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            debug!(ordinal, value = %text, "unparseable <priority>, using default");
            return Ok(DEFAULT_PRIORITY);
        }
    };

    if (0.0..=1.0).contains(&value) {
        return Ok(value);
    }

    match policy {
        PriorityPolicy::Clamp => Ok(value.clamp(0.0, 1.0)),
        PriorityPolicy::Reject => Err(SitemapError::InvalidField {
            record: RecordKind::Page,
            ordinal,
            field: "priority",
            value: text,
            reason: "must be between 0.0 and 1.0".to_string(),
        }),
    }
}
