//! HTTP/1.1 over raw connections.
//!
//! - `response`: header-section decoding and the [`HttpResponse`] model
//! - `body`: Content-Length, chunked and close-delimited body framing
//! - `client`: request construction, redirects and connection reuse
//!
//! No external HTTP library is involved; requests are written as text and
//! responses decoded straight from the connection's byte stream.

mod body;
mod client;
mod error;
mod response;

pub use body::{copy_body, read_body, Framing};
pub use client::{HttpClient, Method, DEFAULT_MAX_REDIRECTS, USER_AGENT};
pub use error::{HttpError, HttpResult};
pub use response::{read_head, HttpResponse, STATUS_UNPARSED};
