//! HTTP transport boundary.
//!
//! Every capability call is one blocking round trip through a [`Transport`].
//! The bundled [`HttpTransport`] uses reqwest's blocking client and requires
//! the `remote` feature (enabled by default); tests and embedders can supply
//! their own implementation.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;

#[cfg(feature = "remote")]
use crate::types::ClientConfig;

/// Opaque error type returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "X_KASABI_APIKEY";

/// HTTP methods used by the platform APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status, headers and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs one HTTP exchange per call.
///
/// Implementations own connection handling, redirects, TLS and timeouts.
/// A non-success status is a normal return value, not an error.
pub trait Transport: Send + Sync {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, BoxError>;
}

/// Transport backed by `reqwest::blocking`. Follows redirects.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpTransport {
    /// Build a transport using the timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
impl Transport for HttpTransport {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, BoxError> {
        let mut builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Transport handle plus API key, shared read-only by a dataset and every
/// client discovered from it.
#[derive(Clone)]
pub struct Session {
    api_key: Arc<str>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(api_key: impl Into<Arc<str>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
        }
    }

    /// GET `url` asking for `accept`.
    pub fn get(&self, url: &str, accept: &str) -> Result<HttpResponse, Error> {
        self.send(Method::Get, url, &[("accept", accept)], None)
    }

    /// POST `body` to `url` with the given content type and accept.
    pub fn post(
        &self,
        url: &str,
        content_type: &str,
        accept: &str,
        body: &[u8],
    ) -> Result<HttpResponse, Error> {
        self.send(
            Method::Post,
            url,
            &[("accept", accept), ("content-type", content_type)],
            Some(body),
        )
    }

    fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, Error> {
        let mut all_headers = Vec::with_capacity(headers.len() + 1);
        all_headers.extend_from_slice(headers);
        all_headers.push((API_KEY_HEADER, &*self.api_key));

        tracing::debug!(%method, url, "sending request");
        let response = self
            .transport
            .request(method, url, &all_headers, body)
            .map_err(|source| Error::Transport {
                method,
                url: url.to_string(),
                source,
            })?;
        tracing::debug!(%method, url, status = response.status, "received response");
        Ok(response)
    }
}
