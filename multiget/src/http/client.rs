//! Blocking HTTP/1.1 client over pooled connections.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use super::body::{copy_body, Framing};
use super::error::{HttpError, HttpResult};
use super::response::{read_head, HttpResponse};
use crate::connection::{ConnectionPool, PoolGuard, ProxyTarget};
use crate::url::Endpoint;

/// Product token sent in the `User-Agent` header.
pub const USER_AGENT: &str = concat!("multi-get/", env!("CARGO_PKG_VERSION"));

/// Redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP client issuing `HEAD` and `GET` requests.
///
/// The header set is caller-mutable and sent with every request; `Host` is
/// always filled in from the request URL. Connections come from a shared
/// [`ConnectionPool`] and go back to it when the response leaves them
/// reusable.
///
/// # Example
///
/// ```ignore
/// use multiget::http::HttpClient;
///
/// let mut client = HttpClient::new();
/// client.set_header("Range", "bytes=0-1023");
/// let response = client.get("http://example.com/file.bin")?;
/// assert_eq!(response.status, 206);
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    headers: Vec<(String, String)>,
    proxy: Option<ProxyTarget>,
    pool: Arc<ConnectionPool>,
    max_redirects: usize,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a client using the process-wide pool and the default headers.
    pub fn new() -> Self {
        Self {
            headers: vec![
                ("Connection".to_string(), "keep-alive".to_string()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ],
            proxy: None,
            pool: ConnectionPool::global(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Use `pool` instead of the process-wide pool.
    pub fn with_pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Follow at most `max_redirects` redirects per request.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Set a request header, replacing any value under the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Remove a request header.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Current value of a request header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Route new connections through a SOCKS5 proxy, or connect directly.
    pub fn set_proxy(&mut self, proxy: Option<ProxyTarget>) {
        self.proxy = proxy;
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Issue a `HEAD` request, following redirects.
    pub fn head(&self, url: &str) -> HttpResult<HttpResponse> {
        self.execute(Method::Head, url, &mut io::sink())
            .map(|(response, _)| response)
    }

    /// Issue a `GET` request, following redirects, with the body read into
    /// [`HttpResponse::body`].
    pub fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        let mut body = Vec::new();
        let (mut response, _) = self.execute(Method::Get, url, &mut body)?;
        response.body = body;
        Ok(response)
    }

    /// Issue a `GET` request, streaming the final response body into
    /// `writer`. Returns the response head and the body length.
    pub fn get_to<W: Write + ?Sized>(
        &self,
        url: &str,
        writer: &mut W,
    ) -> HttpResult<(HttpResponse, u64)> {
        self.execute(Method::Get, url, writer)
    }

    fn execute<W: Write + ?Sized>(
        &self,
        method: Method,
        url: &str,
        writer: &mut W,
    ) -> HttpResult<(HttpResponse, u64)> {
        let mut target = url.to_string();

        for _ in 0..=self.max_redirects {
            let endpoint = Endpoint::parse(&target)?;
            let (response, written) = self.exchange(method, &endpoint, writer)?;

            let location = response
                .header("Location")
                .filter(|_| response.is_redirect())
                .map(str::to_string);
            match location {
                Some(location) => {
                    let next = endpoint.resolve(&location);
                    tracing::info!(
                        status = response.status,
                        from = %endpoint,
                        to = %next,
                        "following redirect"
                    );
                    target = next;
                }
                None => return Ok((response, written)),
            }
        }

        Err(HttpError::TooManyRedirects {
            limit: self.max_redirects,
        })
    }

    /// One request/response on a pooled connection. A reused connection the
    /// peer closed before answering is discarded and the request replayed.
    fn exchange<W: Write + ?Sized>(
        &self,
        method: Method,
        endpoint: &Endpoint,
        writer: &mut W,
    ) -> HttpResult<(HttpResponse, u64)> {
        loop {
            let mut guard =
                PoolGuard::acquire(Arc::clone(&self.pool), endpoint, self.proxy.as_ref());
            if !guard.connected() {
                return Err(HttpError::Connect {
                    origin: endpoint.origin_key(),
                });
            }

            let response = match self.send_request(&mut guard, method, endpoint) {
                Ok(response) => response,
                Err(e) => {
                    guard.invalidate();
                    if guard.reused() && e.is_stale_connection() {
                        tracing::debug!(
                            origin = %endpoint.origin_key(),
                            "pooled connection went stale, retrying"
                        );
                        continue;
                    }
                    return Err(e);
                }
            };

            return self
                .receive_body(&mut guard, method, response, writer)
                .inspect_err(|_| guard.invalidate());
        }
    }

    /// Send the request and read the response head.
    fn send_request(
        &self,
        guard: &mut PoolGuard,
        method: Method,
        endpoint: &Endpoint,
    ) -> HttpResult<HttpResponse> {
        let request = self.build_request(method, endpoint);
        let conn = guard.connection().ok_or_else(|| HttpError::Connect {
            origin: endpoint.origin_key(),
        })?;

        tracing::debug!(method = %method, url = %endpoint, "sending request");
        conn.send_all(request.as_bytes())?;

        let head = read_head(conn)?;
        let response = HttpResponse::parse_head(&head);
        if !response.is_parsed() {
            let line = head.lines().next().unwrap_or_default().to_string();
            return Err(HttpError::MalformedStatusLine(line));
        }
        tracing::debug!(status = response.status, url = %endpoint, "response received");
        Ok(response)
    }

    /// Read the body that follows `response`. Redirect bodies are discarded.
    fn receive_body<W: Write + ?Sized>(
        &self,
        guard: &mut PoolGuard,
        method: Method,
        response: HttpResponse,
        writer: &mut W,
    ) -> HttpResult<(HttpResponse, u64)> {
        let framing = match method {
            Method::Head => None,
            Method::Get => Some(Framing::for_response(&response)),
        };

        let written = match (framing, guard.connection()) {
            (Some(framing), Some(conn)) if response.is_redirect() => {
                copy_body(conn, framing, &mut io::sink())?;
                0
            }
            (Some(framing), Some(conn)) => copy_body(conn, framing, writer)?,
            _ => 0,
        };

        let reusable = framing.map_or(true, Framing::leaves_connection_reusable)
            && !response.wants_close();
        if !reusable {
            guard.invalidate();
        }

        Ok((response, written))
    }

    fn build_request(&self, method: Method, endpoint: &Endpoint) -> String {
        let mut request = format!("{} {} HTTP/1.1\r\n", method, endpoint.path);
        request.push_str(&format!("Host: {}\r\n", endpoint.host_header()));
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Host") {
                continue;
            }
            request.push_str(&format!("{}: {}\r\n", name, value));
        }
        request.push_str("\r\n");
        request
    }
}
