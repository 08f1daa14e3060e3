//! Entry points that turn a byte source into a stream of records.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::config::{FetchConfig, ParseOptions};
use crate::entry::{IndexEntry, PageEntry, RecordKind};
use crate::error::SitemapError;
use crate::fetcher::SitemapFetcher;
use crate::materializer::{materialize_entry, materialize_index_entry};
use crate::walker::{PayloadTrace, walk};

/// Parser for sitemap and sitemap-index documents with explicit options.
///
/// The free functions in this module use `SitemapParser::default()`.
#[derive(Debug, Clone, Default)]
pub struct SitemapParser {
    options: ParseOptions,
}

impl SitemapParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a `<urlset>` document, calling `consumer` once per `<url>`.
    pub fn parse<R, F, E>(&self, source: R, consumer: F) -> Result<(), E>
    where
        R: Read,
        F: FnMut(PageEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        if self.options.trace_payload {
            self.parse_buffered(BufReader::new(PayloadTrace::new(source)), consumer)
        } else {
            self.parse_buffered(BufReader::new(source), consumer)
        }
    }

    /// Parse a `<sitemapindex>` document, calling `consumer` once per `<sitemap>`.
    pub fn parse_index<R, F, E>(&self, source: R, consumer: F) -> Result<(), E>
    where
        R: Read,
        F: FnMut(IndexEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        if self.options.trace_payload {
            parse_index_buffered(BufReader::new(PayloadTrace::new(source)), consumer)
        } else {
            parse_index_buffered(BufReader::new(source), consumer)
        }
    }

    /// Open `path` and parse it as a sitemap. The file is closed on return.
    pub fn parse_file<P, F, E>(&self, path: P, consumer: F) -> Result<(), E>
    where
        P: AsRef<Path>,
        F: FnMut(PageEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        let file = File::open(path).map_err(SitemapError::from)?;
        self.parse(file, consumer)
    }

    /// Open `path` and parse it as a sitemap index.
    pub fn parse_index_file<P, F, E>(&self, path: P, consumer: F) -> Result<(), E>
    where
        P: AsRef<Path>,
        F: FnMut(IndexEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        let file = File::open(path).map_err(SitemapError::from)?;
        self.parse_index(file, consumer)
    }

    fn parse_buffered<R, F, E>(&self, source: R, mut consumer: F) -> Result<(), E>
    where
        R: BufRead,
        F: FnMut(PageEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        let mut ordinal = 0;
        walk(source, |tokens, start| {
            if start.local_name() != RecordKind::Page.element_name().as_bytes() {
                return Ok(());
            }
            ordinal += 1;
            materialize_entry(tokens, start, &self.options, ordinal, &mut consumer)
        })
    }
}

fn parse_index_buffered<R, F, E>(source: R, mut consumer: F) -> Result<(), E>
where
    R: BufRead,
    F: FnMut(IndexEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    let mut ordinal = 0;
    walk(source, |tokens, start| {
        if start.local_name() != RecordKind::Index.element_name().as_bytes() {
            return Ok(());
        }
        ordinal += 1;
        materialize_index_entry(tokens, start, ordinal, &mut consumer)
    })
}

/// Parse a sitemap read from `source` with default options.
pub fn parse<R, F, E>(source: R, consumer: F) -> Result<(), E>
where
    R: Read,
    F: FnMut(PageEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    SitemapParser::default().parse(source, consumer)
}

/// Parse a sitemap index read from `source` with default options.
pub fn parse_index<R, F, E>(source: R, consumer: F) -> Result<(), E>
where
    R: Read,
    F: FnMut(IndexEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    SitemapParser::default().parse_index(source, consumer)
}

/// Parse the sitemap stored at `path`.
pub fn parse_from_file<P, F, E>(path: P, consumer: F) -> Result<(), E>
where
    P: AsRef<Path>,
    F: FnMut(PageEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    SitemapParser::default().parse_file(path, consumer)
}

/// Parse the sitemap index stored at `path`.
pub fn parse_index_from_file<P, F, E>(path: P, consumer: F) -> Result<(), E>
where
    P: AsRef<Path>,
    F: FnMut(IndexEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    SitemapParser::default().parse_index_file(path, consumer)
}

/// Download the sitemap at `url`, through a random proxy from `proxies` if
/// any are given, and parse it as it streams in.
pub fn parse_from_site<F, E>(
    url: &str,
    proxies: &[String],
    user_agent: &str,
    consumer: F,
) -> Result<(), E>
where
    F: FnMut(PageEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    SitemapFetcher::new(FetchConfig::default()).fetch(url, proxies, user_agent, consumer)
}

/// Download and parse the sitemap index at `url`.
pub fn parse_index_from_site<F, E>(
    url: &str,
    proxies: &[String],
    user_agent: &str,
    consumer: F,
) -> Result<(), E>
where
    F: FnMut(IndexEntry) -> Result<(), E>,
    E: From<SitemapError>,
{
    SitemapFetcher::new(FetchConfig::default()).fetch_index(url, proxies, user_agent, consumer)
}
