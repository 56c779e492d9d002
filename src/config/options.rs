// src/config/options.rs
use crate::core::Headers;
use super::consts::DEFAULT_REQUEST_TIMEOUT;

/// How a field body is put on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/x-www-form-urlencoded`
    #[default]
    Form,
    /// `application/json`
    Json,
}

/// Per-call request knobs every fetcher accepts.
///
/// Defaults mirror what the portals expect: certificates verified, redirects
/// *not* followed (login parsers read the 302 themselves), 30 second timeout.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOptions {
    pub headers: Headers,
    pub timeout: Option<f64>,
    pub verify: bool,
    pub allow_redirects: bool,
    pub body_encoding: BodyEncoding,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: Headers::new(),
            timeout: None,
            verify: true,
            allow_redirects: false,
            body_encoding: BodyEncoding::Form,
        }
    }
}

impl RequestOptions {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    pub fn body_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.body_encoding = encoding;
        self
    }

    /// Timeout actually applied. Unset, zero, negative or non-finite values
    /// fall back to the crate default.
    pub fn effective_timeout(&self) -> f64 {
        self.timeout
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}
