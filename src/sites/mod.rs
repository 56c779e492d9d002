// src/sites/mod.rs
//! # Site modules
//!
//! One module per portal. Each module knows *where the ground truth lives* in
//! that portal's pages and how to get there (urls, form fields, which request
//! comes first).
//!
//! ## What lives here
//! - **Fetch**: building and sending the request(s) for one page through
//!   [`HttpClient`](crate::core::HttpClient), including multi-step flows such
//!   as the intranet term resubmission.
//! - **Parse**: turning the response into an
//!   [`ApiResponse`](crate::engine::ApiResponse) using `core::html` (DOM
//!   pages) or `quick_xml` (the mileage XML sheet).
//! - **Preconditions**: `preconditions()` builds the registry of session
//!   checks for that portal; parsers run it before their body.
//!
//! ## What does **not** live here
//! - Status-code classification (transport post-conditions).
//! - Credential storage, retries, caching.
//!
//! ## Typical call chain
//! ```text
//! caller → <Page>::fetch(client, ...) → Fetched { response, context }
//!        → <Page>::parse(&response, &context)
//!             ↘ preconditions().run(...) → page body → ApiResponse
//! ```
//!
//! ## Conventions
//! - Expected failures (bad password, expired session, nothing found) are
//!   `ErrorData`; a page that does not look like it should is `Error::Parsing`.
//! - Tables keep the site's own header text; columns are only dropped or
//!   renamed where a page documents it.
//! - One `scraper::Html` per parse, never kept across an `.await`.
//!
//! ## Sites
//! - `intranet` – academic system (chapel, timetable, courses, photo).
//! - `lms` – Moodle-based LMS (profile, course list, attendance).
//! - `library` – library system (checkouts, book details, new arrivals).
//! - `kbu` – public notice boards.
//! - `mileage` – campus points system (XML sheet endpoint).

use serde::{Deserialize, Serialize};

use crate::core::{Cookies, Response};
use crate::core::date::issued_at;
use crate::engine::{ApiResponse, ErrorData, ResourceData};
use crate::error::Result;

pub mod intranet;
pub mod kbu;
pub mod library;
pub mod lms;
pub mod mileage;
pub mod mileage_params;

/// Session handed back by every successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    pub cookies: Cookies,
    /// Issue time, epoch seconds, from the response `date` header.
    pub iat: i64,
}

/// Raw image bytes, unchanged. Serialized as base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(with = "base64_bytes")]
    pub raw_image: Vec<u8>,
}

pub(crate) fn login_success(response: &Response) -> Result<ApiResponse<LoginData>> {
    let iat = issued_at(response)?;
    Ok(ResourceData::new(LoginData { cookies: response.cookies.clone(), iat }, &response.url).into())
}

/// Image when `content-type` says so, otherwise `title` as an error.
///
/// `meta.format` holds the sniffed file extension when the bytes are
/// recognizable.
pub(crate) fn parse_image(response: &Response, title: &str) -> ApiResponse<ImageData> {
    let is_image = response
        .content_type()
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image"));
    if !is_image {
        return ErrorData::new(title, &response.url).into();
    }

    let mut out = ResourceData::new(ImageData { raw_image: response.raw.clone() }, &response.url);
    if let Some(ext) = image::guess_format(&response.raw)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
    {
        out = out.with_meta("format", ext);
    }
    out.into()
}

/// Append `pairs` as a urlencoded query, after `?` or `&` as needed.
pub(crate) fn with_query<'a>(base: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let query = url::form_urlencoded::Serializer::new(s!()).extend_pairs(pairs).finish();
    if query.is_empty() {
        return s!(base);
    }
    let sep = if base.contains('?') { "&" } else { "?" };
    join!(base, sep, &query)
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
