//! Entry codec: HTTP/1.1 wire serialization plus gzip.
//!
//! A stored entry is the gzip-compressed wire form of the full response:
//! status line, headers, blank line, body. A `Content-Length` is written only
//! when the origin declared one; otherwise the body runs to the end of the
//! entry. Parsing also accepts chunked bodies.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::StatusCode;
use thiserror::Error;

use super::entry::CachedResponse;
use crate::transport::FetchRequest;

/// Errors while encoding or decoding a stored entry.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Compressing the serialized response failed.
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// The stored bytes are not valid gzip.
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// The first line is not an HTTP status line.
    #[error("malformed status line {line:?}")]
    MalformedStatusLine { line: String },

    /// A header line could not be parsed.
    #[error("malformed header line {line:?}")]
    MalformedHeader { line: String },

    /// `Content-Length` is not a non-negative integer.
    #[error("invalid content length {value:?}")]
    InvalidContentLength { value: String },

    /// The body ends before its declared length.
    #[error("truncated body: expected {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// Chunked framing is broken.
    #[error("invalid chunked body: {message}")]
    InvalidChunk { message: String },

    /// The header block never terminated.
    #[error("unexpected end of entry")]
    UnexpectedEof,
}

/// Serialize and compress a response.
pub fn encode(response: &CachedResponse) -> Result<Vec<u8>, CodecError> {
    compress(&serialize(response))
}

/// Decompress and parse an entry, delimiting the body as `request` dictates.
pub fn decode(bytes: &[u8], request: &FetchRequest) -> Result<CachedResponse, CodecError> {
    let wire = decompress(bytes)?;
    parse(&wire, request.is_head())
}

/// Write the canonical HTTP/1.1 wire form of `response`.
pub fn serialize(response: &CachedResponse) -> Vec<u8> {
    let status = response.status();
    let body = response.body();
    let mut out = Vec::with_capacity(body.len() + 256);

    out.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );

    for (name, value) in response.headers() {
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        write_header(&mut out, name.as_str(), value.as_bytes());
    }

    // An undeclared length stays undeclared so the body reads to EOF. A
    // bodiless response to HEAD keeps the length the origin declared.
    match response.headers().get(CONTENT_LENGTH) {
        Some(declared) if body.is_empty() => {
            write_header(&mut out, CONTENT_LENGTH.as_str(), declared.as_bytes())
        }
        Some(_) => write_header(
            &mut out,
            CONTENT_LENGTH.as_str(),
            body.len().to_string().as_bytes(),
        ),
        None => {}
    }

    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

/// Gzip-compress serialized bytes.
pub fn compress(wire: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(wire).map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}

/// Gunzip stored bytes.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut wire = Vec::new();
    decoder
        .read_to_end(&mut wire)
        .map_err(CodecError::Decompress)?;
    Ok(wire)
}

/// Parse an HTTP/1.x response.
///
/// `head` marks a response to a HEAD request, which has no body whatever
/// its headers say.
pub fn parse(wire: &[u8], head: bool) -> Result<CachedResponse, CodecError> {
    let (status_line, mut pos) = next_line(wire, 0).ok_or(CodecError::UnexpectedEof)?;
    let status = parse_status_line(status_line)?;

    let mut headers = HeaderMap::new();
    loop {
        let (line, next) = next_line(wire, pos).ok_or(CodecError::UnexpectedEof)?;
        pos = next;
        if line.is_empty() {
            break;
        }
        let (name, value) = parse_header_line(line)?;
        headers.append(name, value);
    }

    let rest = &wire[pos..];

    if head || !status_has_body(status) {
        return Ok(CachedResponse::new(status, headers, Vec::new()));
    }

    if is_chunked(&headers) {
        let body = dechunk(rest)?;
        headers.remove(TRANSFER_ENCODING);
        return Ok(CachedResponse::new(status, headers, body));
    }

    let body = match headers.get(CONTENT_LENGTH) {
        Some(value) => {
            let expected = parse_content_length(value)?;
            let actual = rest.len() as u64;
            if actual < expected {
                return Err(CodecError::Truncated { expected, actual });
            }
            rest[..expected as usize].to_vec()
        }
        None => rest.to_vec(),
    };

    Ok(CachedResponse::new(status, headers, body))
}

fn status_has_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Returns the line starting at `pos` without its terminator, and the offset
/// just past the terminator. Accepts both CRLF and bare LF.
fn next_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.iter().position(|&b| b == b'\n')?;
    let line = &rest[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, pos + end + 1))
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

fn parse_status_line(line: &[u8]) -> Result<StatusCode, CodecError> {
    let malformed = || CodecError::MalformedStatusLine { line: lossy(line) };

    let mut parts = line.splitn(3, |&b| b == b' ');
    let version = parts.next().ok_or_else(malformed)?;
    if !version.starts_with(b"HTTP/") {
        return Err(malformed());
    }

    let code = parts.next().ok_or_else(malformed)?;
    if code.len() != 3 {
        return Err(malformed());
    }
    StatusCode::from_bytes(code).map_err(|_| malformed())
}

fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), CodecError> {
    let malformed = || CodecError::MalformedHeader { line: lossy(line) };

    // Folded continuation lines are obsolete and not produced by `serialize`.
    if line.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
        return Err(malformed());
    }

    let colon = line.iter().position(|&b| b == b':').ok_or_else(malformed)?;
    let name = HeaderName::from_bytes(&line[..colon]).map_err(|_| malformed())?;
    let value = line[colon + 1..].trim_ascii();
    let value = HeaderValue::from_bytes(value).map_err(|_| malformed())?;

    Ok((name, value))
}

fn parse_content_length(value: &HeaderValue) -> Result<u64, CodecError> {
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| CodecError::InvalidContentLength {
            value: lossy(value.as_bytes()),
        })
}

fn dechunk(buf: &[u8]) -> Result<Vec<u8>, CodecError> {
    let invalid = |message: &str| CodecError::InvalidChunk {
        message: message.to_string(),
    };

    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let (size_line, next) = next_line(buf, pos).ok_or_else(|| invalid("missing chunk size"))?;
        pos = next;

        let size_text = size_line
            .split(|&b| b == b';')
            .next()
            .unwrap_or_default()
            .trim_ascii();
        let size = std::str::from_utf8(size_text)
            .ok()
            .and_then(|s| usize::from_str_radix(s, 16).ok())
            .ok_or_else(|| invalid("chunk size is not hexadecimal"))?;

        if size == 0 {
            // Trailers are dropped; a missing final CRLF is tolerated.
            while let Some((line, next)) = next_line(buf, pos) {
                pos = next;
                if line.is_empty() {
                    break;
                }
            }
            return Ok(body);
        }

        let end = pos
            .checked_add(size)
            .filter(|end| *end <= buf.len())
            .ok_or_else(|| invalid("chunk extends past end of entry"))?;
        body.extend_from_slice(&buf[pos..end]);
        pos = end;

        match next_line(buf, pos) {
            Some((line, next)) if line.is_empty() => pos = next,
            _ => return Err(invalid("chunk not terminated by CRLF")),
        }
    }
}
