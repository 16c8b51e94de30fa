//! Body framing: Content-Length, chunked transfer-encoding, or read until
//! the peer closes.

use std::io::{self, BufRead, Read, Write};

use super::error::{HttpError, HttpResult};
use super::response::HttpResponse;

/// How the end of a response body is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Exactly this many bytes follow the head.
    ContentLength(u64),
    /// A sequence of size-prefixed chunks ending with a zero-size chunk.
    Chunked,
    /// Everything until the peer closes the connection.
    UntilClose,
}

impl Framing {
    /// Pick the framing for a response: `Content-Length` first, then
    /// chunked `Transfer-Encoding`, otherwise until close.
    pub fn for_response(response: &HttpResponse) -> Self {
        if let Some(length) = response.content_length() {
            Framing::ContentLength(length)
        } else if response.is_chunked() {
            Framing::Chunked
        } else {
            Framing::UntilClose
        }
    }

    /// Whether the connection can carry another request once the body is read.
    pub fn leaves_connection_reusable(self) -> bool {
        !matches!(self, Framing::UntilClose)
    }
}

/// Copy a framed body from `reader` into `writer`, returning the number of
/// body bytes written.
pub fn copy_body<R, W>(reader: &mut R, framing: Framing, writer: &mut W) -> HttpResult<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    match framing {
        Framing::ContentLength(length) => copy_exact(reader, length, writer),
        Framing::Chunked => copy_chunked(reader, writer),
        Framing::UntilClose => Ok(io::copy(reader, writer)?),
    }
}

/// Read a framed body into memory.
pub fn read_body<R: BufRead + ?Sized>(reader: &mut R, framing: Framing) -> HttpResult<Vec<u8>> {
    let mut body = Vec::new();
    copy_body(reader, framing, &mut body)?;
    Ok(body)
}

fn copy_exact<R, W>(reader: &mut R, length: u64, writer: &mut W) -> HttpResult<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    let received = io::copy(&mut (&mut *reader).take(length), writer)?;
    if received < length {
        return Err(HttpError::TruncatedBody {
            expected: length,
            received,
        });
    }
    Ok(received)
}

/// Position inside a chunk-size line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeLine {
    Digits,
    Extension,
    Cr,
    Done,
}

/// Read one chunk-size line (`1a;ext=x\r\n`). Hex digits before the first
/// other character make up the size; the rest of the line is ignored.
fn read_chunk_size<R: BufRead + ?Sized>(reader: &mut R) -> HttpResult<u64> {
    let mut size: u64 = 0;
    let mut state = SizeLine::Digits;

    while state != SizeLine::Done {
        let byte = next_byte(reader)?;
        state = match (state, byte) {
            (_, b'\n') => SizeLine::Done,
            (_, b'\r') => SizeLine::Cr,
            (SizeLine::Digits, b) if b.is_ascii_hexdigit() => {
                let digit = u64::from((b as char).to_digit(16).unwrap_or(0));
                size = size
                    .checked_mul(16)
                    .and_then(|s| s.checked_add(digit))
                    .ok_or(HttpError::ChunkSizeOverflow)?;
                SizeLine::Digits
            }
            _ => SizeLine::Extension,
        };
    }

    Ok(size)
}

fn next_byte<R: BufRead + ?Sized>(reader: &mut R) -> HttpResult<u8> {
    let byte = match reader.fill_buf()?.first() {
        Some(&byte) => byte,
        None => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
    };
    reader.consume(1);
    Ok(byte)
}

/// Read one line, returning whether it was empty (just the line ending).
fn skip_line<R: BufRead + ?Sized>(reader: &mut R) -> HttpResult<bool> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(line.iter().all(|&b| b == b'\r' || b == b'\n'))
}

fn copy_chunked<R, W>(reader: &mut R, writer: &mut W) -> HttpResult<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0;
    loop {
        let size = read_chunk_size(reader)?;
        if size == 0 {
            // Trailer fields, if any, then the final blank line.
            while !skip_line(reader)? {}
            return Ok(total);
        }
        let received = io::copy(&mut (&mut *reader).take(size), writer)?;
        if received < size {
            return Err(HttpError::TruncatedBody {
                expected: total + size,
                received: total + received,
            });
        }
        total += received;
        skip_line(reader)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_chunked(raw: &[u8]) -> HttpResult<Vec<u8>> {
        let mut reader = raw;
        read_body(&mut reader, Framing::Chunked)
    }

    #[test]
    fn test_chunked_wikipedia() {
        let body = decode_chunked(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n").unwrap();
        assert_eq!(body, b"Wikipedia");
    }

    #[test]
    fn test_chunked_consumes_terminator_only() {
        let raw = b"3\r\nabc\r\n0\r\n\r\nHTTP/1.1";
        let mut reader = &raw[..];
        let body = read_body(&mut reader, Framing::Chunked).unwrap();
        assert_eq!(body, b"abc");
        assert_eq!(reader, b"HTTP/1.1");
    }

    #[test]
    fn test_chunked_extensions_and_trailers() {
        let body =
            decode_chunked(b"A;name=value\r\n0123456789\r\n0\r\nExpires: never\r\n\r\n").unwrap();
        assert_eq!(body, b"0123456789");
    }

    #[test]
    fn test_chunked_uppercase_and_lowercase_hex() {
        let mut raw = b"1f\r\n".to_vec();
        raw.extend_from_slice(&[b'x'; 31]);
        raw.extend_from_slice(b"\r\n1F\r\n");
        raw.extend_from_slice(&[b'y'; 31]);
        raw.extend_from_slice(b"\r\n0\r\n\r\n");
        assert_eq!(decode_chunked(&raw).unwrap().len(), 62);
    }

    #[test]
    fn test_chunked_truncated_data() {
        let err = decode_chunked(b"a\r\nshort").unwrap_err();
        assert!(matches!(
            err,
            HttpError::TruncatedBody {
                expected: 10,
                received: 5
            }
        ));
    }

    #[test]
    fn test_chunked_missing_terminator() {
        assert!(matches!(
            decode_chunked(b"3\r\nabc\r\n"),
            Err(HttpError::Io(_))
        ));
    }

    #[test]
    fn test_chunk_size_overflow() {
        assert!(matches!(
            decode_chunked(b"fffffffffffffffff\r\n"),
            Err(HttpError::ChunkSizeOverflow)
        ));
    }

    #[test]
    fn test_content_length_exact_and_leaves_rest() {
        let raw = b"helloworld";
        let mut reader = &raw[..];
        let body = read_body(&mut reader, Framing::ContentLength(5)).unwrap();
        assert_eq!(body, b"hello");
        assert_eq!(reader, b"world");
    }

    #[test]
    fn test_content_length_truncated() {
        let mut reader: &[u8] = b"abc";
        let err = read_body(&mut reader, Framing::ContentLength(8)).unwrap_err();
        assert!(matches!(
            err,
            HttpError::TruncatedBody {
                expected: 8,
                received: 3
            }
        ));
    }

    #[test]
    fn test_until_close_reads_everything() {
        let mut reader: &[u8] = b"all of it";
        let body = read_body(&mut reader, Framing::UntilClose).unwrap();
        assert_eq!(body, b"all of it");
        assert!(!Framing::UntilClose.leaves_connection_reusable());
        assert!(Framing::Chunked.leaves_connection_reusable());
    }

    #[test]
    fn test_framing_precedence() {
        let both = HttpResponse::parse_head(
            "HTTP/1.1 200 OK\nContent-Length: 3\nTransfer-Encoding: chunked\n\n",
        );
        assert_eq!(Framing::for_response(&both), Framing::ContentLength(3));

        let chunked = HttpResponse::parse_head("HTTP/1.1 200 OK\nTransfer-Encoding: chunked\n\n");
        assert_eq!(Framing::for_response(&chunked), Framing::Chunked);

        let neither = HttpResponse::parse_head("HTTP/1.0 200 OK\n\n");
        assert_eq!(Framing::for_response(&neither), Framing::UntilClose);
    }

    proptest! {
        #[test]
        fn prop_chunked_decodes_any_split(
            body in proptest::collection::vec(any::<u8>(), 0..512),
            cuts in proptest::collection::vec(1usize..64, 0..16),
        ) {
            let mut raw = Vec::new();
            let mut rest = &body[..];
            for cut in cuts {
                if rest.is_empty() {
                    break;
                }
                let n = cut.min(rest.len());
                raw.extend_from_slice(format!("{:x}\r\n", n).as_bytes());
                raw.extend_from_slice(&rest[..n]);
                raw.extend_from_slice(b"\r\n");
                rest = &rest[n..];
            }
            if !rest.is_empty() {
                raw.extend_from_slice(format!("{:X}\r\n", rest.len()).as_bytes());
                raw.extend_from_slice(rest);
                raw.extend_from_slice(b"\r\n");
            }
            raw.extend_from_slice(b"0\r\n\r\n");

            prop_assert_eq!(decode_chunked(&raw).unwrap(), body);
        }
    }
}
