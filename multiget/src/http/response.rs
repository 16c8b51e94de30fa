//! Response head decoding.
//!
//! The header section is read byte by byte until the blank line that ends
//! it. Carriage returns are dropped as they are read, so the accumulated
//! text is `\n`-separated and can be split into lines afterwards.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::BufRead;

use super::body::{copy_body, Framing};
use super::error::{HttpError, HttpResult};

/// Status value of a response whose status line could not be parsed.
pub const STATUS_UNPARSED: i32 = -1;

/// Position inside a possible `\r\n\r\n` terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadState {
    Plain,
    R,
    Rn,
    Rnr,
    Rnrn,
}

impl HeadState {
    fn next(self, byte: u8) -> Self {
        match (self, byte) {
            (HeadState::Rn, b'\r') => HeadState::Rnr,
            (HeadState::Rnr, b'\n') => HeadState::Rnrn,
            (HeadState::R, b'\n') => HeadState::Rn,
            (_, b'\r') => HeadState::R,
            _ => HeadState::Plain,
        }
    }
}

/// Read the header section from `reader`, stopping right after the
/// terminating `\r\n\r\n`. Returns the head text with `\r` removed.
///
/// Body bytes following the terminator are left unread.
pub fn read_head<R: BufRead + ?Sized>(reader: &mut R) -> HttpResult<String> {
    let mut head = Vec::new();
    let mut state = HeadState::Plain;
    let mut seen_any = false;

    while state != HeadState::Rnrn {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Err(if seen_any {
                HttpError::IncompleteHead
            } else {
                HttpError::NoResponse
            });
        }
        seen_any = true;

        let mut used = 0;
        for &byte in available {
            used += 1;
            state = state.next(byte);
            if byte != b'\r' {
                head.push(byte);
            }
            if state == HeadState::Rnrn {
                break;
            }
        }
        reader.consume(used);
    }

    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// A parsed HTTP/1.1 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub http_version: String,
    /// Numeric status, or [`STATUS_UNPARSED`].
    pub status: i32,
    pub status_text: String,
    /// Header fields; keys keep their case, a repeated key keeps the last value.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            http_version: String::new(),
            status: STATUS_UNPARSED,
            status_text: String::new(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

impl HttpResponse {
    /// Parse the status line and header fields from `\n`-separated head
    /// text. Lines without a colon are skipped.
    pub fn parse_head(text: &str) -> Self {
        let mut response = Self::default();
        let mut lines = text.lines();

        let Some(status_line) = lines.next() else {
            return response;
        };
        let status_line = status_line.trim_end_matches('\r');
        let mut parts = status_line.splitn(3, ' ');
        response.http_version = parts.next().unwrap_or_default().to_string();
        response.status = parts
            .next()
            .and_then(|code| code.trim().parse().ok())
            .unwrap_or(STATUS_UNPARSED);
        response.status_text = parts.next().unwrap_or_default().to_string();

        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                tracing::trace!(line, "skipping malformed header line");
                continue;
            };
            response
                .headers
                .insert(key.to_string(), value.trim_start_matches(' ').to_string());
        }

        response
    }

    /// Parse a complete raw response held in memory, head and body.
    pub fn parse(raw: &[u8]) -> HttpResult<Self> {
        let mut reader = raw;
        let head = read_head(&mut reader)?;
        let mut response = Self::parse_head(&head);
        let framing = Framing::for_response(&response);
        copy_body(&mut reader, framing, &mut response.body)?;
        Ok(response)
    }

    /// Whether the status line was understood.
    pub fn is_parsed(&self) -> bool {
        self.status != STATUS_UNPARSED
    }

    /// Look up a header, trying the exact key before a case-insensitive match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// Parsed `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")?.trim().parse().ok()
    }

    /// Whether the server advertises `Accept-Ranges: bytes`.
    pub fn accepts_byte_ranges(&self) -> bool {
        self.header("Accept-Ranges")
            .is_some_and(|value| value.trim() == "bytes")
    }

    /// Whether the body uses chunked transfer-encoding.
    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"))
    }

    /// Whether this is a 301 or 302 redirect.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }

    /// Whether the server asked for the connection to be closed.
    pub fn wants_close(&self) -> bool {
        self.header("Connection")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("close"))
    }

    /// Status line and headers rendered one per line, headers sorted by key.
    pub fn display_headers(&self) -> String {
        let mut out = format!("{} {} {}\n", self.http_version, self.status, self.status_text);
        let mut keys: Vec<&String> = self.headers.keys().collect();
        keys.sort();
        for key in keys {
            let _ = writeln!(out, "{}: {}", key, self.headers[key]);
        }
        out
    }
}
