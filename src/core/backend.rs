// src/core/backend.rs
// reqwest-backed transport. One client per request, like a fresh browser
// session: cookies travel only through the explicit `Cookie` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;

use crate::config::consts::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{Error, Result};

use super::headers::{cookie_header, Cookies};
use super::net::{Backend, Method, Request};
use super::response::Response;

const MAX_REDIRECTS: usize = 10;

/// `Request::timeout` as a `Duration`; zero or unrepresentable values use the default.
fn timeout_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT))
}

#[derive(Clone, Debug, Default)]
pub struct ReqwestBackend;

impl ReqwestBackend {
    pub fn new() -> Self {
        Self
    }

    fn client(request: &Request) -> Result<reqwest::Client> {
        let policy = if request.allow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        Ok(reqwest::Client::builder()
            .redirect(policy)
            .danger_accept_invalid_certs(!request.verify)
            .timeout(timeout_duration(request.timeout))
            .build()?)
    }
}

#[async_trait]
impl Backend for ReqwestBackend {
    async fn request(&self, request: &Request) -> Result<Response> {
        let client = Self::client(request)?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(cookie) = cookie_header(&request.cookies) {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            let (bytes, content_type) = body.encode(request.body_encoding)?;
            if let Some(ct) = content_type {
                if !request.headers.contains("content-type") {
                    builder = builder.header(reqwest::header::CONTENT_TYPE, ct);
                }
            }
            builder = builder.body(bytes);
        }

        let timed_out = |e: &reqwest::Error| e.is_timeout();
        let res = match builder.send().await {
            Ok(res) => res,
            Err(e) if timed_out(&e) => {
                return Err(Error::Timeout { url: request.url.clone(), seconds: request.timeout });
            }
            Err(e) => return Err(e.into()),
        };

        let status = res.status();
        let final_url = res.url().to_string();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let cookies: Cookies = res
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let headers: Vec<(String, String)> = res
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();

        let raw = match res.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) if timed_out(&e) => {
                return Err(Error::Timeout { url: request.url.clone(), seconds: request.timeout });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Response::new(status.as_u16(), final_url, reason, headers, raw, cookies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_timeouts_do_not_panic() {
        let default = Duration::from_secs(30);
        assert_eq!(timeout_duration(-1.0), default);
        assert_eq!(timeout_duration(f64::NAN), default);
        assert_eq!(timeout_duration(f64::INFINITY), default);
        assert_eq!(timeout_duration(0.0), default);
        assert_eq!(timeout_duration(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn client_builds_with_negative_timeout() {
        let mut request = Request::get("https://x.test/");
        request.timeout = -3.0;
        assert!(ReqwestBackend::client(&request).is_ok());
    }
}
