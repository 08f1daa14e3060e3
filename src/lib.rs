//! # sitemap-stream Library
//!
//! Streaming extraction of URL records from sitemap and sitemap-index XML
//! documents of any size, read from memory, disk, or the network (with
//! proxy failover). Records are handed to a caller-supplied consumer one at a
//! time, in document order; the first consumer error stops the parse.

pub mod config;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod materializer;
pub mod parser;
pub mod walker;

pub use config::{
    Config, ConfigError, ConfigManager, EnvProvider, FetchConfig, ParseOptions, PriorityPolicy,
    SystemEnvProvider, UnknownFrequencyPolicy,
};
pub use entry::{
    ChangeFrequency, DEFAULT_PRIORITY, IndexEntry, PageEntry, RecordKind, UnknownFrequency,
    parse_w3c_datetime,
};
pub use error::{Result, SitemapError};
pub use fetcher::SitemapFetcher;
pub use parser::{
    SitemapParser, parse, parse_from_file, parse_from_site, parse_index, parse_index_from_file,
    parse_index_from_site,
};
pub use walker::{ElementStart, PayloadTrace, TokenStream, walk};
