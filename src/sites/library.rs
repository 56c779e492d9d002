// src/sites/library.rs
//! Library system.
//!
//! A checkout is only complete after three pages:
//!
//! ```text
//! CheckoutList  → [No, 서지정보, 대출일자, 반납예정일, 대출상태, 연기신청, 상세페이지 URL]
//!   BookDetail  → ISBN, title, cover url      (public, per detail path)
//!   BookPhoto   → cover bytes                 (public, absolute url)
//! ```
//!
//! [`checkout_books`] runs that chain. Detail paths that are not
//! `/Search/Detail/<digits>` (search-result links) are not followed.
//!
//! Session handling is shared with the intranet (same alert texts) plus a
//! plain `302` back to the login page.

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RequestOptions;
use crate::config::consts::LIBRARY_DOMAIN;
use crate::core::html::{find, find_all, is_heading_row, parse_table, text_of};
use crate::core::sanitize::{first_token, normalize_ws};
use crate::core::{Body, Cookies, HttpClient, Response, Table};
use crate::engine::{
    ApiResponse, ErrorData, Fetched, GeneralFetcher, LoginFetcher, Parser, Preconditions,
    ResourceData,
};
use crate::error::{Error, Result};

use super::{ImageData, LoginData, intranet, login_success, parse_image};

/// Same checks as the intranet: session alerts and the bare `302`.
pub fn preconditions() -> Preconditions {
    intranet::preconditions()
}

fn url(path: &str) -> String {
    join!(LIBRARY_DOMAIN, path)
}

/// `/Search/Detail/161595` yes, `/Search/Detail/%EA%B9...` no.
pub fn is_detail_path(path: &str) -> bool {
    path.strip_prefix("/Search/Detail/")
        .is_some_and(|id| id.bytes().all(|b| b.is_ascii_digit()))
}

pub struct Login;

impl Login {
    pub const PATH: &'static str = "/Account/LogOn";
}

#[async_trait]
impl LoginFetcher for Login {
    /// Both fields travel base64-encoded.
    async fn fetch(
        &self,
        client: &HttpClient,
        user_id: &str,
        user_pw: &str,
        opts: &RequestOptions,
    ) -> Result<Fetched> {
        let form = Body::fields([
            ("l_id", STANDARD.encode(user_id)),
            ("l_pass", STANDARD.encode(user_pw)),
        ]);
        Ok(client.post(&url(Self::PATH), form, &Cookies::new(), opts).await?.into())
    }
}

impl Parser for Login {
    type Context = ();
    type Output = LoginData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<LoginData>> {
        let Some(location) = response.header("location") else {
            let doc = response.document();
            let warning = find(doc.root_element(), ".alert-warning")?
                .map(text_of)
                .ok_or_else(|| Error::parsing("login warning not found", response))?;
            return Ok(ErrorData::new(warning, &response.url).into());
        };

        static ERROR_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ErrorCode=(\d+)").unwrap());
        match ERROR_CODE.captures(location).and_then(|c| c.get(1)) {
            Some(code) => Ok(ErrorData::new("잘못된 경로입니다.", &response.url).code(code.as_str()).into()),
            None => login_success(response),
        }
    }
}

pub struct CheckoutList;

impl CheckoutList {
    pub const PATH: &'static str = "/MyLibrary";
    pub const DETAIL_HEADER: &'static str = "상세페이지 URL";
}

#[async_trait]
impl GeneralFetcher for CheckoutList {
    async fn fetch(&self, client: &HttpClient, cookies: &Cookies, opts: &RequestOptions) -> Result<Fetched> {
        Ok(client.get(&url(Self::PATH), cookies, opts).await?.into())
    }
}

impl Parser for CheckoutList {
    type Context = ();
    type Output = Table;

    /// Column 4 (an action button) is dropped. The title cell is narrowed to
    /// the bold title and the last column becomes the detail page path.
    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<Table>> {
        preconditions().run(response, || {
            let doc = response.document();
            let root = doc.root_element();
            let head = find(root, ".sponge-table-default thead")?;
            let body = find(root, ".sponge-table-default tbody")?;
            let mut table = parse_table(response, head, body)?;

            if table.body.is_empty() {
                return Ok(ErrorData::new("대출한 내역이 없습니다.", &response.url).into());
            }
            if !table.remove_column(4) {
                return Err(Error::parsing("checkout table narrower than expected", response));
            }
            if let Some(last) = table.head.last_mut() {
                *last = s!(Self::DETAIL_HEADER);
            }

            // parse_table skipped the same heading rows
            let rows = match body {
                Some(body) => find_all(body, "tr")?,
                None => Vec::new(),
            };
            let rows = rows.into_iter().filter(|tr| !is_heading_row(*tr));
            for (tr, row) in rows.zip(table.body.iter_mut()) {
                let title = find(tr, "td a strong")?
                    .map(text_of)
                    .ok_or_else(|| Error::parsing("checkout title not found", response))?;
                let path = find(tr, ".left a")?
                    .and_then(|a| a.value().attr("href"))
                    .ok_or_else(|| Error::parsing("checkout detail link not found", response))?;
                row[1] = title;
                if let Some(last) = row.last_mut() {
                    *last = s!(path);
                }
            }

            Ok(ResourceData::new(table, &response.url).into())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetailData {
    pub isbn: String,
    pub title: String,
    /// Cover image; `None` unless it is an absolute http(s) url.
    pub image_url: Option<String>,
}

pub struct BookDetail;

impl BookDetail {
    pub async fn fetch(&self, client: &HttpClient, path: &str, opts: &RequestOptions) -> Result<Fetched> {
        Ok(client.get(&url(path), &Cookies::new(), opts).await?.into())
    }
}

impl Parser for BookDetail {
    type Context = ();
    type Output = BookDetailData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<BookDetailData>> {
        let doc = response.document();
        let root = doc.root_element();

        let fields = find_all(root, "#detailtoprightnew .sponge-book-list-data")?;
        let isbn = fields
            .get(1)
            .map(|el| s!(first_token(&text_of(*el))))
            .ok_or_else(|| Error::parsing("isbn field not found", response))?;
        let title = find(root, ".sponge-book-title")?
            .map(text_of)
            .ok_or_else(|| Error::parsing("book title not found", response))?;
        let src = find(root, ".page-detail-title-image a img")?
            .and_then(|img| img.value().attr("src"))
            .ok_or_else(|| Error::parsing("cover image not found", response))?;

        let image_url = (src.starts_with("http://") || src.starts_with("https://")).then(|| s!(src));
        Ok(ResourceData::new(BookDetailData { isbn, title, image_url }, &response.url).into())
    }
}

pub struct BookPhoto;

impl BookPhoto {
    pub async fn fetch(&self, client: &HttpClient, photo_url: &str, opts: &RequestOptions) -> Result<Fetched> {
        Ok(client.get(photo_url, &Cookies::new(), opts).await?.into())
    }
}

impl Parser for BookPhoto {
    type Context = ();
    type Output = ImageData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<ImageData>> {
        Ok(parse_image(response, "이미지를 불러올 수 없습니다."))
    }
}

/// Detail paths of the new-arrivals shelf.
pub struct NewBookPath;

impl NewBookPath {
    pub const PATH: &'static str = "/Search/New";

    pub async fn fetch(&self, client: &HttpClient, opts: &RequestOptions) -> Result<Fetched> {
        Ok(client.get(&url(Self::PATH), &Cookies::new(), opts).await?.into())
    }
}

impl Parser for NewBookPath {
    type Context = ();
    type Output = Vec<String>;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<Vec<String>>> {
        let doc = response.document();
        let mut paths = Vec::new();
        for li in find_all(doc.root_element(), ".sponge-newbook-list > li")? {
            let href = find(li, "a")?
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(|| Error::parsing("new book entry without link", response))?;
            paths.push(s!(href));
        }
        Ok(ResourceData::new(paths, &response.url).into())
    }
}

/// Publisher introduction, cut to its first two sentences.
pub struct BookIntro;

impl BookIntro {
    pub const PATH: &'static str = "/Naver/NaverDetail";

    pub async fn fetch(&self, client: &HttpClient, isbn: &str, opts: &RequestOptions) -> Result<Fetched> {
        let target = join!(&url(Self::PATH), "?isbn=", isbn);
        Ok(client.get(&target, &Cookies::new(), opts).await?.into())
    }
}

impl Parser for BookIntro {
    type Context = ();
    type Output = Option<String>;

    /// `data` is `None` when the book has no introduction.
    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<Option<String>>> {
        let doc = response.document();
        let content = match find(doc.root_element(), ".sponge-page-guide")? {
            Some(guide) => find(guide, "div#bookIntroContent")?,
            None => None,
        };
        static SENTENCES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(([^.]*).){2}").unwrap());
        let intro = content.and_then(|el| {
            let text: String = el.text().collect();
            SENTENCES.find(&text).map(|m| normalize_ws(m.as_str()))
        });
        Ok(ResourceData::new(intro, &response.url).into())
    }
}

/// One checkout with whatever the detail and cover pages added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutBook {
    /// Row as listed by [`CheckoutList`].
    pub row: Vec<String>,
    pub detail: Option<BookDetailData>,
    pub image: Option<ImageData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutBooks {
    pub head: Vec<String>,
    pub books: Vec<CheckoutBook>,
}

/// CheckoutList → BookDetail → BookPhoto for every checkout.
///
/// A missing detail page or cover leaves that part `None`; request and parse
/// errors still propagate.
pub async fn checkout_books(
    client: &HttpClient,
    cookies: &Cookies,
    opts: &RequestOptions,
) -> Result<ApiResponse<CheckoutBooks>> {
    let list = match CheckoutList.fetch(client, cookies, opts).await?.parse(&CheckoutList)? {
        ApiResponse::Resource(list) => list,
        ApiResponse::Error(e) => return Ok(e.into()),
    };

    let mut books = Vec::with_capacity(list.data.body.len());
    for row in &list.data.body {
        let mut book = CheckoutBook { row: row.clone(), detail: None, image: None };
        let path = row.last().map(String::as_str).unwrap_or("");
        if is_detail_path(path) {
            let detail = BookDetail.fetch(client, path, opts).await?.parse(&BookDetail)?;
            book.detail = detail.into_resource().map(|r| r.data);
        }
        if let Some(photo_url) = book.detail.as_ref().and_then(|d| d.image_url.clone()) {
            let photo = BookPhoto.fetch(client, &photo_url, opts).await?.parse(&BookPhoto)?;
            book.image = photo.into_resource().map(|r| r.data);
        }
        books.push(book);
    }

    Ok(list.map(|t| CheckoutBooks { head: t.head, books }).into())
}
