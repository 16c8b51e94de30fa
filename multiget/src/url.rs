//! URL parsing into request endpoints.
//!
//! Only `http://` and `https://` URLs are understood. The parser is
//! intentionally small: `scheme://host[:port][/path]`, with the port
//! defaulting from the scheme and the path defaulting to `/`.

use std::fmt;

use thiserror::Error;

/// File name used when the URL has no usable last path segment.
pub const FALLBACK_FILE_NAME: &str = "multi-get.downloaded";

/// Errors produced while parsing a URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    /// The URL does not start with `http://` or `https://`.
    #[error("unsupported url: {0} (expected http:// or https://)")]
    UnsupportedScheme(String),

    /// Nothing between the scheme and the path.
    #[error("url has no host: {0}")]
    MissingHost(String),

    /// The `:port` part is not a valid 16-bit port.
    #[error("invalid port in url: {0}")]
    InvalidPort(String),
}

/// URL scheme; decides the transport and the default port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Port used when the URL does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP resource: scheme, host, port and request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Parse a `http://` or `https://` URL.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let url = url.trim();
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else {
            return Err(UrlError::UnsupportedScheme(url.to_string()));
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], rest[idx..].to_string()),
            None => (rest, "/".to_string()),
        };
        if authority.is_empty() {
            return Err(UrlError::MissingHost(url.to_string()));
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| UrlError::InvalidPort(url.to_string()))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };
        if host.is_empty() {
            return Err(UrlError::MissingHost(url.to_string()));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Key identifying the origin, `scheme://host:port`.
    pub fn origin_key(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Value for the `Host` request header; the port is only included
    /// when it differs from the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Base URL without path, omitting a default port.
    fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.host_header())
    }

    /// Resolve a `Location` header value against this endpoint.
    ///
    /// Handles absolute URLs, scheme-relative (`//host/path`),
    /// absolute-path and relative-path references.
    pub fn resolve(&self, location: &str) -> String {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        if let Some(rest) = location.strip_prefix("//") {
            return format!("{}://{}", self.scheme, rest);
        }
        if location.starts_with('/') {
            return format!("{}{}", self.base(), location);
        }

        let path = self.path.split(['?', '#']).next().unwrap_or("/");
        let dir = match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "/",
        };
        format!("{}{}{}", self.base(), dir, location)
    }

    /// Local file name for this resource: the last path segment with any
    /// query or fragment removed, or [`FALLBACK_FILE_NAME`].
    pub fn file_name(&self) -> String {
        let path = self.path.split(['?', '#']).next().unwrap_or("");
        match path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => FALLBACK_FILE_NAME.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base(), self.path)
    }
}
