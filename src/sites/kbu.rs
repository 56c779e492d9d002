// src/sites/kbu.rs
//! Public notice boards on the college homepage.
//!
//! All boards share one list template (`ul[data-role=table]` of `li.tbody`
//! rows) and one article template, so a single parser serves every
//! [`NoticeBoard`]. No login, no preconditions.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RequestOptions;
use crate::config::consts::KBU_DOMAIN;
use crate::core::html::{find, find_all, find_text, text_of};
use crate::core::{Cookies, HttpClient, Response};
use crate::engine::{ApiResponse, Fetched, Parser, ResourceData};
use crate::error::{Error, Result};

use super::with_query;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeBoard {
    Main,
    Scholarship,
    Illip,
}

impl NoticeBoard {
    /// List path; the page number is appended.
    pub fn path(&self) -> &'static str {
        match self {
            NoticeBoard::Main => "/ko/life/notice/list/",
            NoticeBoard::Scholarship => "/ko/life/tuition_notice/list/",
            NoticeBoard::Illip => "/ko/illip/notice/list/",
        }
    }

    pub async fn fetch(
        &self,
        client: &HttpClient,
        page: &str,
        keyword: Option<&str>,
        opts: &RequestOptions,
    ) -> Result<Fetched<NoticeQuery>> {
        let mut target = join!(KBU_DOMAIN, self.path(), page);
        if let Some(k) = keyword.filter(|k| !k.is_empty()) {
            target = with_query(&target, [("keyword", k)]);
        }
        let response = client.get(&target, &Cookies::new(), opts).await?;
        let query = NoticeQuery { page: s!(page), keyword: keyword.map(str::to_string) };
        Ok(Fetched::new(response, query))
    }
}

/// What was asked for; echoed into `meta`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeQuery {
    pub page: String,
    pub keyword: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRow {
    pub seq: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeList {
    pub notice: Vec<NoticeRow>,
}

impl Parser for NoticeBoard {
    type Context = NoticeQuery;
    type Output = NoticeList;

    fn parse(&self, response: &Response, query: &NoticeQuery) -> Result<ApiResponse<NoticeList>> {
        let doc = response.document();
        let container = find(doc.root_element(), r#"ul[data-role="table"].black"#)?
            .ok_or_else(|| Error::parsing("notice list not found", response))?;

        let mut rows = Vec::new();
        for li in find_all(container, "li.tbody")? {
            let field = |css: &str| -> Result<String> {
                find_text(li, css)?.ok_or_else(|| Error::parsing(format!("notice row lacks {css}"), response))
            };
            let href = find(li, "a[href]")?
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(|| Error::parsing("notice row without link", response))?;
            rows.push(NoticeRow {
                seq: field("span.loopnum")?,
                title: field("span.title")?,
                author: field("span.name")?,
                date: field("span.reg_date")?,
                url: join!(KBU_DOMAIN, href),
            });
        }

        let keyword = query.keyword.clone().map_or(Value::Null, Value::from);
        Ok(ResourceData::new(NoticeList { notice: rows }, &response.url)
            .with_meta("page", query.page.clone())
            .with_meta("keyword", keyword)
            .into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeData {
    pub title: String,
    pub author: String,
    pub date: NaiveDateTime,
    pub content: String,
    pub url: String,
}

/// A single notice, by absolute url (as found in [`NoticeRow::url`]).
pub struct NoticeArticle;

impl NoticeArticle {
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub async fn fetch(&self, client: &HttpClient, url: &str, opts: &RequestOptions) -> Result<Fetched> {
        Ok(client.get(url, &Cookies::new(), opts).await?.into())
    }
}

impl Parser for NoticeArticle {
    type Context = ();
    type Output = NoticeData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<NoticeData>> {
        let doc = response.document();
        let root = doc.root_element();
        let header = find(root, "div.header")?
            .ok_or_else(|| Error::parsing("notice header not found", response))?;

        let missing = |what: &str| Error::parsing(format!("notice {what} not found"), response);
        let title = find_text(header, "h5")?.ok_or_else(|| missing("title"))?;
        let author = find_text(header, r#"span[rel="author"]"#)?.ok_or_else(|| missing("author"))?;
        let date = find_text(header, "time")?.ok_or_else(|| missing("date"))?;
        let content = find(root, "div.content")?.map(text_of).ok_or_else(|| missing("content"))?;

        let date = NaiveDateTime::parse_from_str(&date, Self::DATE_FORMAT)
            .map_err(|_| Error::parsing(format!("unreadable notice date {date:?}"), response))?;

        let data = NoticeData { title, author, date, content, url: response.url.clone() };
        Ok(ResourceData::new(data, &response.url).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn board_paths() {
        assert_eq!(NoticeBoard::Main.path(), "/ko/life/notice/list/");
        assert_eq!(NoticeBoard::Scholarship.path(), "/ko/life/tuition_notice/list/");
        assert_eq!(NoticeBoard::Illip.path(), "/ko/illip/notice/list/");
    }

    #[test]
    fn list_rows() {
        let r = Response::html(200, "https://www.test/ko/life/notice/list/2", r#"
            <ul data-role="table" class="black">
              <li class="thead"><span>번호</span></li>
              <li class="tbody"><a href="/ko/life/notice/view/81">
                <span class="loopnum">81</span><span class="title"> 수강신청 안내 </span>
                <span class="name">학사지원팀</span><span class="reg_date">2022-02-10</span></a></li>
            </ul>"#);
        let q = NoticeQuery { page: s!("2"), keyword: None };
        let out = NoticeBoard::Main.parse(&r, &q).unwrap();
        let rows = &out.data().unwrap().notice;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "수강신청 안내");
        assert_eq!(rows[0].url, "https://www.bible.ac.kr/ko/life/notice/view/81");
        assert_eq!(out.meta()["page"], "2");
        assert!(out.meta()["keyword"].is_null());
    }

    #[test]
    fn missing_list_is_an_error() {
        let r = Response::html(200, "u", "<p>점검중</p>");
        let q = NoticeQuery::default();
        assert!(matches!(NoticeBoard::Illip.parse(&r, &q), Err(Error::Parsing { .. })));
    }

    #[test]
    fn article() {
        let r = Response::html(200, "https://www.test/ko/life/notice/view/81", r#"
            <div class="header"><h5>수강신청 안내</h5>
              <span rel="author">학사지원팀</span><time>2022-02-10 09:30:00</time></div>
            <div class="content"><p>수강신청은</p> <p>2월 14일부터</p></div>"#);
        let out = NoticeArticle.parse(&r, &()).unwrap();
        let d = out.data().unwrap();
        assert_eq!(d.author, "학사지원팀");
        assert_eq!(d.date, NaiveDate::from_ymd_opt(2022, 2, 10).unwrap().and_hms_opt(9, 30, 0).unwrap());
        assert_eq!(d.content, "수강신청은 2월 14일부터");
        assert_eq!(d.url, "https://www.test/ko/life/notice/view/81");
    }

    #[test]
    fn article_spacing_is_plain() {
        let r = Response::html(200, "u", "
            <div class=\"header\"><h5>채플&nbsp;안내</h5>
              <span rel=\"author\">교목실</span><time>2022-03-02 10:00:00</time></div>
            <div class=\"content\">매주&nbsp;수요일\u{3000}10시</div>");
        let d = NoticeArticle.parse(&r, &()).unwrap().data().cloned().unwrap();
        assert_eq!(d.title, "채플 안내");
        assert_eq!(d.content, "매주 수요일 10시");
        assert!(d.content.chars().all(|c| c == ' ' || !c.is_whitespace()));
    }
}
