//! MJPEG over HTTP multipart
//!
//! Frames are carried as parts of a `multipart/x-mixed-replace` body:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 5120\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! --frame\r\n
//! ...
//! ```
//!
//! The decoder is incremental: it is fed arbitrary chunks from the transport
//! and yields whole frames. It prefers `Content-Length` and falls back to
//! scanning for the next boundary when a part carries no length.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

/// Boundary used for the streams this host serves
pub const BOUNDARY: &str = "frame";

/// Largest frame accepted from a peer
pub const MAX_PART: usize = 16 * 1024 * 1024;

/// Largest header block accepted for one part
const MAX_HEADERS: usize = 16 * 1024;

/// Content type of a served stream
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

/// Encode one frame as a multipart part
pub fn encode_part(frame: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );
    let mut buf = BytesMut::with_capacity(header.len() + frame.len() + 2);
    buf.put_slice(header.as_bytes());
    buf.put_slice(frame);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Extract the boundary from a `Content-Type` header value
///
/// Quotes and a leading `--` are stripped; returns `None` when absent.
pub fn boundary_from_content_type(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let val = val.trim().trim_matches('"');
        let val = val.strip_prefix("--").unwrap_or(val);
        (!val.is_empty()).then(|| val.to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(headers: &[u8]) -> Result<Option<usize>> {
    let text = std::str::from_utf8(headers)
        .map_err(|_| Error::Malformed("part headers are not UTF-8".into()))?;

    for line in text.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let len = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::Malformed(format!("bad Content-Length {:?}", value)))?;
                return Ok(Some(len));
            }
        }
    }
    Ok(None)
}

/// Incremental multipart frame parser
#[derive(Debug)]
pub struct PartParser {
    delimiter: Vec<u8>,
    buf: BytesMut,
}

impl PartParser {
    /// Create a parser for `boundary` (without the leading dashes)
    pub fn new(boundary: &str) -> Self {
        Self {
            delimiter: format!("--{}", boundary).into_bytes(),
            buf: BytesMut::new(),
        }
    }

    /// Append transport bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete frame, if one is buffered
    pub fn next_part(&mut self) -> Result<Option<Bytes>> {
        // Skip preamble / trailing CRLF of the previous part
        match find(&self.buf, &self.delimiter) {
            Some(start) => self.buf.advance(start),
            None => {
                // Keep a tail that could still be the start of a delimiter
                let keep = self.delimiter.len().saturating_sub(1);
                if self.buf.len() > keep {
                    let stale = self.buf.len() - keep;
                    self.buf.advance(stale);
                }
                return Ok(None);
            }
        }

        let Some(line_end) = find(&self.buf, b"\r\n") else {
            return Ok(None);
        };
        if self.buf[self.delimiter.len()..line_end].starts_with(b"--") {
            return Err(Error::EndOfStream("closing boundary".into()));
        }

        let headers_start = line_end + 2;
        let Some(headers_len) = find(&self.buf[headers_start..], b"\r\n\r\n") else {
            // A part with no headers at all
            if self.buf[headers_start..].starts_with(b"\r\n") {
                return self.take_body(headers_start + 2, None);
            }
            if self.buf.len() - headers_start > MAX_HEADERS {
                return Err(Error::Malformed("part headers too long".into()));
            }
            return Ok(None);
        };

        let length = content_length(&self.buf[headers_start..headers_start + headers_len])?;
        self.take_body(headers_start + headers_len + 4, length)
    }

    fn take_body(&mut self, body_start: usize, length: Option<usize>) -> Result<Option<Bytes>> {
        match length {
            Some(len) => {
                let end = match body_start.checked_add(len) {
                    Some(end) if len <= MAX_PART => end,
                    _ => return Err(Error::Malformed(format!("part of {} bytes", len))),
                };
                if self.buf.len() < end {
                    return Ok(None);
                }
                self.buf.advance(body_start);
                Ok(Some(self.buf.split_to(len).freeze()))
            }
            None => {
                let mut next = b"\r\n".to_vec();
                next.extend_from_slice(&self.delimiter);
                let Some(body_len) = find(&self.buf[body_start..], &next) else {
                    if self.buf.len() - body_start > MAX_PART + next.len() {
                        return Err(Error::Malformed("no boundary after a full-size part".into()));
                    }
                    return Ok(None);
                };
                self.buf.advance(body_start);
                let body = self.buf.split_to(body_len).freeze();
                // leave the delimiter at the front for the next call
                self.buf.advance(2);
                Ok(Some(body))
            }
        }
    }
}

/// Frame reader over a chunked byte stream
pub struct MultipartReader<S> {
    inner: S,
    parser: PartParser,
    source: String,
}

impl<S, E> MultipartReader<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    /// Wrap `inner`; `source` names the stream in errors
    pub fn new(inner: S, boundary: &str, source: impl Into<String>) -> Self {
        Self {
            inner,
            parser: PartParser::new(boundary),
            source: source.into(),
        }
    }

    /// Read the next frame
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.parser.next_part()? {
                return Ok(frame);
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.parser.push(&chunk),
                Some(Err(e)) => return Err(Error::read(&self.source, e)),
                None => return Err(Error::EndOfStream(self.source.clone())),
            }
        }
    }
}
