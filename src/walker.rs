//! Token-level walk over an XML byte stream.
//!
//! The walker never builds a document tree. Peak memory is bounded by the
//! largest single record subtree, which is what makes multi-gigabyte sitemaps
//! tractable.

use std::io::{BufRead, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::error::{self, SitemapError};

/// A start tag seen by the walker, handed to the element handler.
pub struct ElementStart<'a> {
    tag: BytesStart<'a>,
    self_closing: bool,
}

impl<'a> ElementStart<'a> {
    fn new(tag: BytesStart<'a>, self_closing: bool) -> Self {
        Self { tag, self_closing }
    }

    /// Element name without any namespace prefix.
    pub fn local_name(&self) -> &[u8] {
        self.tag.local_name().into_inner()
    }

    /// Full (possibly prefixed) element name, lossily decoded.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.tag.name().as_ref()).into_owned()
    }

    /// `<url/>` style elements carry no children.
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }
}

/// Reader positioned inside the document, shared between the walk loop and
/// element handlers.
pub struct TokenStream<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> TokenStream<R> {
    fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Byte offset of the tokenizer within the source.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// Decode the direct children of `start` into `(local name, text)` pairs.
    ///
    /// Consumes exactly the element's subtree, up to and including its end
    /// tag. Text and CDATA directly inside a child are concatenated and
    /// unescaped; anything nested deeper is skipped.
    pub fn read_children<F>(&mut self, start: &ElementStart<'_>, mut visit: F) -> error::Result<()>
    where
        F: FnMut(&[u8], String),
    {
        if start.is_self_closing() {
            return Ok(());
        }

        let mut depth = 0usize;
        let mut child: Option<(Vec<u8>, String)> = None;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(err) => {
                    let position = self.reader.buffer_position() as u64;
                    return Err(SitemapError::from_xml(position, err));
                }
            };

            match event {
                Event::Start(tag) => {
                    depth += 1;
                    if depth == 1 {
                        child = Some((tag.local_name().as_ref().to_vec(), String::new()));
                    }
                }
                Event::Empty(tag) => {
                    if depth == 0 {
                        visit(tag.local_name().as_ref(), String::new());
                    }
                }
                Event::Text(text) => {
                    if let (1, Some((_, value))) = (depth, child.as_mut()) {
                        match text.unescape() {
                            Ok(unescaped) => value.push_str(&unescaped),
                            Err(err) => {
                                let position = self.reader.buffer_position() as u64;
                                return Err(SitemapError::from_xml(position, err));
                            }
                        }
                    }
                }
                Event::CData(data) => {
                    if let (1, Some((_, value))) = (depth, child.as_mut()) {
                        value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    if depth == 1 {
                        if let Some((name, value)) = child.take() {
                            visit(&name, value);
                        }
                    }
                    depth -= 1;
                }
                Event::Eof => {
                    return Err(SitemapError::UnexpectedEof {
                        position: self.reader.buffer_position() as u64,
                        element: start.name(),
                    });
                }
                _ => {}
            }
        }
    }
}

/// Walk every start element of `source`, in document order.
///
/// `handler` is called once per start tag (self-closing tags included) and
/// may consume that element's subtree through the [`TokenStream`]. The first
/// handler error stops the walk and is returned as is. Malformed markup is
/// reported as [`SitemapError::Xml`]; reaching the end of the stream is a
/// normal, successful end, however many records were seen.
pub fn walk<R, E, H>(source: R, mut handler: H) -> Result<(), E>
where
    R: BufRead,
    E: From<SitemapError>,
    H: FnMut(&mut TokenStream<R>, &ElementStart<'_>) -> Result<(), E>,
{
    let mut tokens = TokenStream::new(source);
    let mut buf = Vec::new();

    loop {
        match tokens.reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => handler(&mut tokens, &ElementStart::new(tag, false))?,
            Ok(Event::Empty(tag)) => handler(&mut tokens, &ElementStart::new(tag, true))?,
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(SitemapError::from_xml(tokens.position(), err).into()),
        }
        buf.clear();
    }
}

/// Byte source that logs every chunk it forwards.
///
/// Each byte is read from the inner source exactly once, so wrapping a
/// network body or pipe does not starve the walk.
pub struct PayloadTrace<R> {
    inner: R,
    offset: u64,
}

impl<R> PayloadTrace<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Total bytes forwarded so far.
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }
}

impl<R: Read> Read for PayloadTrace<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read > 0 {
            trace!(
                target: "sitemap_stream::payload",
                offset = self.offset,
                len = read,
                chunk = %String::from_utf8_lossy(&buf[..read]),
                "payload chunk"
            );
            self.offset += read as u64;
        }
        Ok(read)
    }
}
