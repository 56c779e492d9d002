// src/error.rs
//! Crate error type.
//!
//! Only *unexpected* failures live here: the transport could not deliver a
//! usable response, or a page did not have the structure a parser relies on.
//! Expected outcomes such as a wrong password, an expired session or an empty
//! result set are not errors; parsers return them as
//! [`ErrorData`](crate::engine::ErrorData) inside the envelope.

use crate::core::Response;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend gave up waiting for the server.
    #[error("request timed out after {seconds}s: {url}")]
    Timeout { url: String, seconds: f64 },

    /// 4xx status, raised by the transport post-condition chain.
    #[error("client error: status {status} from {}", .response.url)]
    Client { status: u16, response: Box<Response> },

    /// 5xx status, raised by the transport post-condition chain.
    #[error("server error: status {status} from {}", .response.url)]
    Server { status: u16, response: Box<Response> },

    /// The page did not have the structure the parser expects.
    #[error("parse error: {message} ({})", .response.url)]
    Parsing { message: String, response: Box<Response> },

    /// A semester code that has no counterpart in the other site's encoding.
    #[error("unknown semester code: {0}")]
    UnknownSemester(String),

    /// Connection, TLS or body read failure inside the backend.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::Parsing`] that keeps a copy of the offending response.
    pub fn parsing(message: impl Into<String>, response: &Response) -> Self {
        Error::Parsing {
            message: message.into(),
            response: Box::new(response.clone()),
        }
    }

    /// The response attached to status and parse errors, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Client { response, .. }
            | Error::Server { response, .. }
            | Error::Parsing { response, .. } => Some(response),
            _ => None,
        }
    }

    /// `true` for timeouts and 4xx/5xx statuses.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Client { .. } | Error::Server { .. }
        )
    }
}
