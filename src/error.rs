use std::sync::Arc;

use thiserror::Error;

use crate::entry::RecordKind;

/// Every way a parse or fetch can fail.
///
/// Consumers may return their own error type from the record callback as long
/// as it implements `From<SitemapError>`; in that case the caller's error comes
/// back unchanged and never passes through this enum.
#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed XML at byte {position}: document ended inside <{element}>")]
    UnexpectedEof { position: u64, element: String },

    #[error("Invalid {record} record #{ordinal}: missing required field <{field}>")]
    MissingField {
        record: RecordKind,
        ordinal: usize,
        field: &'static str,
    },

    #[error("Invalid {record} record #{ordinal}: <{field}> = {value:?} - {reason}")]
    InvalidField {
        record: RecordKind,
        ordinal: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid proxy URL: {proxy} - {details}")]
    ProxyUrl { proxy: String, details: String },

    #[error("HTTP status error: {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Consumer aborted: {0}")]
    Consumer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SitemapError {
    /// Wrap an arbitrary error raised by record-consuming code.
    pub fn consumer<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        SitemapError::Consumer(err.into())
    }

    /// Map a tokenizer failure, keeping I/O errors in the I/O class.
    pub(crate) fn from_xml(position: u64, err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => SitemapError::Io(
                Arc::try_unwrap(io)
                    .unwrap_or_else(|shared| std::io::Error::new(shared.kind(), shared.to_string())),
            ),
            source => SitemapError::Xml { position, source },
        }
    }

    /// True for the only failure class that triggers the direct fallback.
    pub fn is_timeout(&self) -> bool {
        match self {
            SitemapError::Timeout { .. } => true,
            SitemapError::Network(err) => err.is_timeout(),
            _ => false,
        }
    }

    /// True when the byte stream could not be read as XML.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            SitemapError::Xml { .. } | SitemapError::UnexpectedEof { .. }
        )
    }

    /// True when a record element was well-formed but its content was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SitemapError::MissingField { .. } | SitemapError::InvalidField { .. }
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SitemapError>;
