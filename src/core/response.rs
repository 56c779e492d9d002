// src/core/response.rs
//! Fully buffered HTTP response.
//!
//! One `Response` is built per request/response cycle by the backend and then
//! handed, read-only, to the parsing layer. It is a plain value: cloning it or
//! sharing it between tasks is safe, and nothing in the crate mutates it after
//! construction.
//!
//! ## Notes
//! - Header names are lower-cased at construction ([`Headers`]), so lookups
//!   are case-insensitive.
//! - `text` is a best-effort decode of `raw` using the `content-type` charset;
//!   it is empty when the bytes are not valid in that charset.
//! - [`Response::document`] builds the HTML view on demand. `scraper::Html` is
//!   neither `Send` nor cheap to share, so parsers build it once per parse and
//!   pass `&Html` down instead of caching it here.

use encoding_rs::{Encoding, UTF_8};
use scraper::Html;

use super::headers::{Cookies, Headers};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// Numeric status code (`200`, `302`, ...).
    pub status: u16,

    /// Url the response was read from.
    pub url: String,

    /// Reason phrase (`"OK"`, `"Found"`); empty if the server sent none.
    pub reason: String,

    pub headers: Headers,

    /// Body bytes exactly as received.
    pub raw: Vec<u8>,

    /// Decoded body text.
    pub text: String,

    /// Cookies set by this response.
    pub cookies: Cookies,
}

impl Response {
    /// Assemble a response; header names are case-folded here.
    pub fn new<I, K, V>(
        status: u16,
        url: impl Into<String>,
        reason: impl Into<String>,
        headers: I,
        raw: Vec<u8>,
        cookies: Cookies,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers: Headers = headers.into_iter().collect();
        let text = decode_text(&raw, headers.get("content-type"));
        Self {
            status,
            url: url.into(),
            reason: reason.into(),
            headers,
            raw,
            text,
            cookies,
        }
    }

    /// Convenience for text bodies (tests, cached pages).
    pub fn html(status: u16, url: impl Into<String>, body: &str) -> Self {
        Self::new(
            status,
            url,
            "",
            [("content-type", "text/html; charset=utf-8")],
            body.as_bytes().to_vec(),
            Cookies::new(),
        )
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Parsed HTML view of `text`.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.text)
    }
}

/// Pull `charset=` out of a content-type value.
pub fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|part| {
        let (k, v) = part.split_once('=')?;
        if k.trim().eq_ignore_ascii_case("charset") {
            Some(v.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// Decode with the declared charset (UTF-8 when none or unknown).
/// Malformed input yields an empty string rather than replacement characters.
pub fn decode_text(raw: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_of)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    encoding
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(|text| text.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_keys_are_lowercased_at_construction() {
        let r = Response::new(
            200,
            "https://x.test",
            "OK",
            [("Content-Type", "text/html"), ("Set-Cookie", "a=b")],
            b"<p>hi</p>".to_vec(),
            Cookies::new(),
        );
        assert_eq!(r.headers.get("content-type"), Some("text/html"));
        assert_eq!(&r.headers["content-type"], "text/html");
        assert_eq!(r.header("SET-COOKIE"), Some("a=b"));
        assert_eq!(r.text, "<p>hi</p>");
    }

    #[test]
    fn charset_parsing() {
        assert_eq!(charset_of("text/html; charset=ks_c_5601-1987"), Some("ks_c_5601-1987"));
        assert_eq!(charset_of("text/html;charset=\"UTF-8\""), Some("UTF-8"));
        assert_eq!(charset_of("image/jpeg"), None);
    }

    #[test]
    fn decodes_euc_kr_label() {
        // "세션" in EUC-KR
        let raw = [0xBC, 0xBC, 0xBC, 0xC7];
        assert_eq!(decode_text(&raw, Some("text/html; charset=ks_c_5601-1987")), "세션");
    }

    #[test]
    fn undecodable_body_yields_empty_text() {
        let raw = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(decode_text(&raw, Some("image/jpeg")), "");
    }
}
