// src/core/net.rs
//! Request contract, pluggable backend and the post-condition chain.
//!
//! Every site module talks to the network exclusively through [`HttpClient`]:
//!
//! ```text
//! sites::<site>::fetch → HttpClient::get/post → Backend::request
//!                                       ↘ PostCondition::check (each, in order)
//! ```
//!
//! The backend only moves bytes. Status classification happens afterwards,
//! in the post-condition chain, so swapping backends never changes what a
//! parser sees. Nothing in this layer retries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::{BodyEncoding, RequestOptions};
use crate::error::{Error, Result};

use super::backend::ReqwestBackend;
use super::headers::{Cookies, Headers};
use super::response::Response;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
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

/// Request payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// Named fields, encoded according to [`BodyEncoding`].
    Fields(BTreeMap<String, String>),
    /// Sent as-is.
    Raw(Vec<u8>),
}

impl Body {
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Body::Fields(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Encode for the wire; returns the bytes and the content-type to send.
    pub fn encode(&self, encoding: BodyEncoding) -> Result<(Vec<u8>, Option<&'static str>)> {
        match (self, encoding) {
            (Body::Raw(bytes), _) => Ok((bytes.clone(), None)),
            (Body::Fields(fields), BodyEncoding::Form) => {
                let encoded = url::form_urlencoded::Serializer::new(s!())
                    .extend_pairs(fields.iter())
                    .finish();
                Ok((encoded.into_bytes(), Some("application/x-www-form-urlencoded")))
            }
            (Body::Fields(fields), BodyEncoding::Json) => {
                Ok((serde_json::to_vec(fields)?, Some("application/json")))
            }
        }
    }
}

/// One immutable request. Built with [`Request::get`] / [`Request::post`].
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Body>,
    pub body_encoding: BodyEncoding,
    pub cookies: Cookies,
    pub verify: bool,
    pub allow_redirects: bool,
    /// Seconds.
    pub timeout: f64,
}

impl Request {
    fn new(method: Method, url: &str) -> Self {
        let defaults = RequestOptions::default();
        Self {
            method,
            url: s!(url),
            headers: Headers::new(),
            body: None,
            body_encoding: defaults.body_encoding,
            cookies: Cookies::new(),
            verify: defaults.verify,
            allow_redirects: defaults.allow_redirects,
            timeout: defaults.effective_timeout(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn options(mut self, opts: &RequestOptions) -> Self {
        self.headers.extend(&opts.headers);
        self.body_encoding = opts.body_encoding;
        self.verify = opts.verify;
        self.allow_redirects = opts.allow_redirects;
        self.timeout = opts.effective_timeout();
        self
    }

    pub fn cookies(mut self, cookies: &Cookies) -> Self {
        self.cookies = cookies.clone();
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }
}

/// Something that can perform a request. Implementations only transfer bytes
/// and map transport failures (timeouts in particular) onto [`Error`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn request(&self, request: &Request) -> Result<Response>;
}

/// Check run on every finished response before it reaches the caller.
pub trait PostCondition: Send + Sync {
    fn check(&self, response: &Response) -> Result<()>;
}

/// 4xx → [`Error::Client`], 5xx → [`Error::Server`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusCheck;

impl PostCondition for StatusCheck {
    fn check(&self, response: &Response) -> Result<()> {
        let status = response.status;
        match status / 100 {
            4 => Err(Error::Client { status, response: Box::new(response.clone()) }),
            5 => Err(Error::Server { status, response: Box::new(response.clone()) }),
            _ => Ok(()),
        }
    }
}

/// Entry point for all network traffic.
///
/// Cheap to clone; clones share the backend and the post-condition list.
#[derive(Clone)]
pub struct HttpClient {
    backend: Arc<dyn Backend>,
    postconditions: Vec<Arc<dyn PostCondition>>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("postconditions", &self.postconditions.len())
            .finish_non_exhaustive()
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(ReqwestBackend::new())
    }
}

impl HttpClient {
    /// Client over `backend` with the standard post-conditions (status check).
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            postconditions: vec![Arc::new(StatusCheck)],
        }
    }

    /// Append a post-condition; runs after the ones already registered.
    pub fn with_postcondition(mut self, check: impl PostCondition + 'static) -> Self {
        self.postconditions.push(Arc::new(check));
        self
    }

    pub async fn get(&self, url: &str, cookies: &Cookies, opts: &RequestOptions) -> Result<Response> {
        self.send(Request::get(url).options(opts).cookies(cookies)).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: Body,
        cookies: &Cookies,
        opts: &RequestOptions,
    ) -> Result<Response> {
        self.send(Request::post(url).options(opts).cookies(cookies).body(body)).await
    }

    /// Run the backend, then every post-condition in registration order.
    pub async fn send(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.backend.request(&request).await?;
        trace!(status = response.status, url = %response.url, "response received");

        for check in &self.postconditions {
            check.check(&response)?;
        }
        Ok(response)
    }
}
