//! Two-phase decode of captured handler output.
//!
//! The parser walks `Headers -> Body -> Done` over one complete buffer:
//!
//! - **Headers**: status line and header block via httparse (obsolete line
//!   folding accepted). Interim `1xx` responses are skipped. Every
//!   `Set-Cookie` line is folded into the response's cookie jar.
//! - **Body**: framing per RFC 9112 Section 6.3: no body for `HEAD`, `1xx`,
//!   `204` and `304`; chunked when it is the final transfer coding;
//!   `Content-Length` otherwise; else everything up to the end of the
//!   buffer. A short buffer ends the phase early rather than failing.
//!
//! If the body comes out empty while unconsumed bytes remain after the
//! body phase, those bytes become the body verbatim.

use bytes::{Bytes, BytesMut};
use http::{Method, Version};

use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::headers::HeaderMultiMap;
use crate::response::Response;

/// Maximum number of headers to parse.
const MAX_HEADERS_COUNT: usize = 128;

/// Where the parser is in its walk over the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Headers,
    Body,
    Done,
}

/// How the body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The response cannot carry a body.
    Empty,
    Length(usize),
    Chunked,
    /// Delimited by the end of the stream.
    UntilEof,
}

#[derive(Debug)]
struct Head {
    status: u16,
    reason: String,
    version: Version,
    headers: HeaderMultiMap,
    cookies: CookieJar,
    framing: Framing,
}

/// Response parser for one exchange.
#[derive(Debug)]
pub struct ResponseParser {
    request_method: Method,
    state: ParseState,
}

impl ResponseParser {
    /// `request_method` decides whether a body may follow (`HEAD` never has one).
    pub fn new(request_method: Method) -> Self {
        Self {
            request_method,
            state: ParseState::Headers,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Parse the complete captured stream into a response.
    pub fn parse(&mut self, buf: &[u8]) -> Result<Response> {
        if buf.is_empty() {
            return Err(Error::http_protocol("Handler wrote no response bytes"));
        }

        let mut offset = 0;
        let head = loop {
            let (head, consumed) = self.parse_head(&buf[offset..])?;
            offset += consumed;
            // Per RFC 9112 Section 6: 1xx responses precede the final one
            if (100..200).contains(&head.status) && head.status != 101 {
                tracing::debug!(status = head.status, "skipping interim response");
                continue;
            }
            break head;
        };
        self.transition(ParseState::Body);

        let (mut body, consumed) = read_body(head.framing, &buf[offset..]);
        offset += consumed;
        self.transition(ParseState::Done);

        if body.is_empty() && offset < buf.len() {
            tracing::debug!(
                trailing = buf.len() - offset,
                framing = ?head.framing,
                "empty body with unconsumed bytes, using trailing bytes as body"
            );
            body = Bytes::copy_from_slice(&buf[offset..]);
        }

        Ok(Response::new(
            head.status,
            head.reason,
            head.version,
            head.headers,
            head.cookies,
            body,
        ))
    }

    fn transition(&mut self, next: ParseState) {
        tracing::trace!(from = ?self.state, to = ?next, "response parser transition");
        self.state = next;
    }

    fn parse_head(&self, buf: &[u8]) -> Result<(Head, usize)> {
        let mut raw = [httparse::EMPTY_HEADER; MAX_HEADERS_COUNT];
        let mut response = httparse::Response::new(&mut raw);

        let mut config = httparse::ParserConfig::default();
        config.allow_obsolete_multiline_headers_in_responses(true);
        config.allow_spaces_after_header_name_in_responses(true);

        let headers_len = match config
            .parse_response(&mut response, buf)
            .map_err(|e| Error::http_protocol(format!("Failed to parse response: {}", e)))?
        {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => {
                return Err(Error::http_protocol("Incomplete response headers"));
            }
        };

        let status = response
            .code
            .ok_or_else(|| Error::http_protocol("Missing status code"))?;
        let version = match response.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };
        let reason = response.reason.unwrap_or_default().to_string();

        let headers: HeaderMultiMap = response
            .headers
            .iter()
            .filter(|h| !h.name.is_empty())
            .map(|h| (h.name.to_string(), unfold(h.value)))
            .collect();

        let mut cookies = CookieJar::new();
        cookies.store_from_headers(headers.get_all("Set-Cookie"));

        let framing = self.framing(status, &headers)?;
        tracing::debug!(status, ?framing, headers = headers.len(), "parsed response head");

        Ok((
            Head {
                status,
                reason,
                version,
                headers,
                cookies,
                framing,
            },
            headers_len,
        ))
    }

    fn framing(&self, status: u16, headers: &HeaderMultiMap) -> Result<Framing> {
        if matches!(status, 100..=199 | 204 | 304) || self.request_method == Method::HEAD {
            return Ok(Framing::Empty);
        }

        // Per RFC 9112: Transfer-Encoding overrides Content-Length
        if let Some(te) = headers.get("Transfer-Encoding") {
            let chunked = te
                .split(',')
                .next_back()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case("chunked"));
            return Ok(if chunked { Framing::Chunked } else { Framing::UntilEof });
        }

        match headers.get("Content-Length") {
            Some(cl) => parse_content_length(cl).map(Framing::Length),
            None => Ok(Framing::UntilEof),
        }
    }
}

/// Parse a full response with a fresh parser.
pub fn parse_response(request_method: &Method, buf: &[u8]) -> Result<Response> {
    ResponseParser::new(request_method.clone()).parse(buf)
}

/// Read the body per `framing`, returning it and the bytes consumed.
fn read_body(framing: Framing, buf: &[u8]) -> (Bytes, usize) {
    match framing {
        Framing::Empty => (Bytes::new(), 0),
        Framing::Length(len) => {
            let take = len.min(buf.len());
            if take < len {
                tracing::debug!(expected = len, available = take, "body shorter than Content-Length");
            }
            (Bytes::copy_from_slice(&buf[..take]), take)
        }
        Framing::Chunked => decode_chunked(buf),
        Framing::UntilEof => (Bytes::copy_from_slice(buf), buf.len()),
    }
}

/// Decode a chunked body, stopping early if the buffer runs out.
///
/// Per RFC 9112 Section 7.1:
/// chunked-body = *chunk last-chunk trailer-section CRLF
fn decode_chunked(buf: &[u8]) -> (Bytes, usize) {
    let mut body = BytesMut::new();
    let mut pos = 0;

    while let Some((size, line_end)) = find_chunk_size(&buf[pos..]) {
        pos += line_end;

        // Zero size indicates last-chunk
        if size == 0 {
            pos += consume_trailers(&buf[pos..]);
            break;
        }

        let available = buf.len() - pos;
        if available < size {
            body.extend_from_slice(&buf[pos..]);
            pos = buf.len();
            break;
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size;
        if buf[pos..].starts_with(b"\r\n") {
            pos += 2;
        }
    }

    (body.freeze(), pos)
}

/// Skip trailer fields and the terminating empty line.
fn consume_trailers(buf: &[u8]) -> usize {
    let mut pos = 0;
    while let Some(line) = find_crlf(&buf[pos..]) {
        pos += line + 2;
        if line == 0 {
            break;
        }
    }
    pos
}

/// Unfold obsolete line folding into single spaces.
fn unfold(value: &[u8]) -> String {
    let text = String::from_utf8_lossy(value);
    if !text.contains(['\r', '\n']) {
        return text.into_owned();
    }
    text.split('\n')
        .map(|line| line.trim_matches(|c: char| c == '\r' || c == ' ' || c == '\t'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a chunk size from the buffer, returning (size, end_of_line_position).
fn find_chunk_size(buffer: &[u8]) -> Option<(usize, usize)> {
    let i = find_crlf(buffer)?;
    // Parse hex size (may have chunk extensions after ;)
    let line = String::from_utf8_lossy(&buffer[..i]);
    let size_part = line.split(';').next()?;
    let size = usize::from_str_radix(size_part.trim(), 16).ok()?;
    Some((size, i + 2))
}

/// Find the first CRLF in a buffer, returning its position.
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
}

/// Parse and validate Content-Length header value per RFC 9112 Section 6.2.
///
/// If multiple values are present (comma-separated), they must all be identical.
fn parse_content_length(value: &str) -> Result<usize> {
    let mut parts = value.split(',').map(str::trim);
    let invalid = || Error::http_protocol(format!("Invalid Content-Length: {}", value));

    let first = parts
        .next()
        .ok_or_else(invalid)?
        .parse::<usize>()
        .map_err(|_| invalid())?;
    for part in parts {
        let val = part.parse::<usize>().map_err(|_| invalid())?;
        if val != first {
            return Err(Error::http_protocol(format!(
                "Conflicting Content-Length values: {}",
                value
            )));
        }
    }
    Ok(first)
}
