// src/sites/intranet.rs
//! Intranet (ASP.NET academic system).
//!
//! Pages:
//! - [`Login`] – `POST /ble_login2.aspx`; success is a `302`.
//! - [`StudentPhoto`] – `GET /SchoolRegMng/SR015.aspx?schNo=<id>`; jpeg or an html error page.
//! - [`Chapel`], [`Timetable`], [`Course`] – one academic term per page load.
//!
//! Term selection: the page always loads on the term the server picks. To see
//! another one, the form is posted back with every hidden field (view state),
//! the term key and the search action flag. That second request is skipped
//! when the wanted term is already shown or is not offered at all.
//!
//! An expired session shows up as an `alert(...)` mentioning 세션 or 수업평가
//! (course evaluation not yet done).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RequestOptions;
use crate::config::consts::{
    INTRANET_ACTION_KEY, INTRANET_ACTION_SEARCH, INTRANET_DOMAIN, INTRANET_SEMESTER_KEY,
};
use crate::core::html::{elements, extract_alerts, extract_hidden_tags, find, find_all, parse_table, text_of};
use crate::core::sanitize::first_number;
use crate::core::{Body, Cookies, HttpClient, Response, SemesterData, Table};
use crate::engine::{
    ApiResponse, ErrorData, Fetched, LoginFetcher, Parser, Precondition, Preconditions, ResourceData,
    SemesterFetcher,
};
use crate::error::{Error, Result};

use super::{ImageData, LoginData, login_success, parse_image, with_query};

pub struct SessionExpired;

impl Precondition for SessionExpired {
    fn is_blocking(&self, response: &Response) -> Option<ErrorData> {
        let alerts = extract_alerts(&response.document());
        let title = alerts
            .iter()
            .find(|a| a.contains("세션") || a.contains("수업평가"))?
            .clone();
        Some(ErrorData::new(title, &response.url).alerts(alerts))
    }
}

/// Bare `302`: the server sent the request back to its login page.
pub struct RedirectToLogin;

impl Precondition for RedirectToLogin {
    fn is_blocking(&self, response: &Response) -> Option<ErrorData> {
        (response.status == 302)
            .then(|| ErrorData::new("세션이 만료되어 로그인페이지로 리다이렉트 되었습니다.", &response.url))
    }
}

pub fn preconditions() -> Preconditions {
    Preconditions::new().with(SessionExpired).with(RedirectToLogin)
}

fn url(path: &str) -> String {
    join!(INTRANET_DOMAIN, path)
}

/// Terms offered by the page's term `<select>` and the one marked selected.
pub fn extract_semester(response: &Response, doc: &scraper::Html) -> Result<SemesterData> {
    let select = elements(doc.root_element(), "select")
        .find(|el| el.value().attr("name") == Some(INTRANET_SEMESTER_KEY))
        .ok_or_else(|| Error::parsing("semester select not found", response))?;

    let mut selectable = Vec::new();
    let mut selected = None;
    for option in elements(select, "option") {
        let value = option
            .value()
            .attr("value")
            .ok_or_else(|| Error::parsing("semester option without value", response))?;
        if selected.is_none() && option.value().attr("selected").is_some() {
            selected = Some(s!(value));
        }
        selectable.push(s!(value));
    }

    let selected = selected.ok_or_else(|| Error::parsing("no semester option selected", response))?;
    Ok(SemesterData { selected, selectable })
}

/// GET `url`; when `semester` is offered but not shown, post the form back for it.
///
/// The context is `None` only when the session check blocked the first page.
pub async fn post_with_semester(
    client: &HttpClient,
    url: &str,
    cookies: &Cookies,
    semester: Option<&str>,
    opts: &RequestOptions,
) -> Result<Fetched<Option<SemesterData>>> {
    let checks = preconditions();
    let response = client.get(url, cookies, opts).await?;
    if checks.check(&response).is_some() {
        return Ok(Fetched::new(response, None));
    }

    let (info, mut form) = {
        let doc = response.document();
        (extract_semester(&response, &doc)?, extract_hidden_tags(&doc))
    };

    let wanted = match semester {
        Some(w) if w != info.selected && info.selectable.iter().any(|s| s == w) => w,
        _ => return Ok(Fetched::new(response, Some(info))),
    };

    form.insert(s!(INTRANET_SEMESTER_KEY), s!(wanted));
    form.insert(s!(INTRANET_ACTION_KEY), s!(INTRANET_ACTION_SEARCH));
    debug!(url, semester = wanted, shown = %info.selected, "resubmitting for semester");

    let response = client.post(url, Body::Fields(form), cookies, opts).await?;
    if checks.check(&response).is_some() {
        return Ok(Fetched::new(response, None));
    }
    let info = {
        let doc = response.document();
        extract_semester(&response, &doc)?
    };
    Ok(Fetched::new(response, Some(info)))
}

fn semester_of<'a>(response: &Response, context: &'a Option<SemesterData>) -> Result<&'a SemesterData> {
    context
        .as_ref()
        .ok_or_else(|| Error::parsing("semester was not resolved for this page", response))
}

pub struct Login;

impl Login {
    pub const PATH: &'static str = "/ble_login2.aspx";
}

#[async_trait]
impl LoginFetcher for Login {
    async fn fetch(
        &self,
        client: &HttpClient,
        user_id: &str,
        user_pw: &str,
        opts: &RequestOptions,
    ) -> Result<Fetched> {
        let form = Body::fields([("Txt_1", user_id), ("Txt_2", user_pw), ("use_type", "2")]);
        let response = client.post(&url(Self::PATH), form, &Cookies::new(), opts).await?;
        Ok(response.into())
    }
}

impl Parser for Login {
    type Context = ();
    type Output = LoginData;

    /// `302` = logged in; `503` = server overloaded (its own error page);
    /// anything else carries the reason in an alert.
    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<LoginData>> {
        match response.status {
            302 => login_success(response),
            503 => {
                let doc = response.document();
                let root = doc.root_element();
                let title = find(root, "h2")?
                    .map(text_of)
                    .ok_or_else(|| Error::parsing("overload page without title", response))?;
                let message = find(root, "p")?.map(text_of).unwrap_or_default();
                Ok(ErrorData::new(title, &response.url).message(message).into())
            }
            _ => {
                let alerts = extract_alerts(&response.document());
                let title = alerts.first().cloned().unwrap_or_default();
                Ok(ErrorData::new(title, &response.url).alerts(alerts).into())
            }
        }
    }
}

pub struct StudentPhoto;

impl StudentPhoto {
    pub const PATH: &'static str = "/SchoolRegMng/SR015.aspx";

    pub async fn fetch(
        &self,
        client: &HttpClient,
        cookies: &Cookies,
        sid: &str,
        opts: &RequestOptions,
    ) -> Result<Fetched> {
        let target = with_query(&url(Self::PATH), [("schNo", sid)]);
        Ok(client.get(&target, cookies, opts).await?.into())
    }
}

impl Parser for StudentPhoto {
    type Context = ();
    type Output = ImageData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<ImageData>> {
        preconditions().run(response, || Ok(parse_image(response, "이미지를 불러올 수 없습니다.")))
    }
}

macro_rules! semester_page {
    ($page:ident) => {
        #[async_trait]
        impl SemesterFetcher for $page {
            async fn fetch(
                &self,
                client: &HttpClient,
                cookies: &Cookies,
                semester: Option<&str>,
                opts: &RequestOptions,
            ) -> Result<Fetched<Option<SemesterData>>> {
                post_with_semester(client, &url(Self::PATH), cookies, semester, opts).await
            }
        }
    };
}

/// Chapel attendance: a summary of counts plus the per-session table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapelData {
    pub summary: BTreeMap<String, String>,
    pub head: Vec<String>,
    pub body: Vec<Vec<String>>,
}

pub struct Chapel;

impl Chapel {
    pub const PATH: &'static str = "/StudentMng/SM050.aspx";

    /// Counts keyed by their row header; values keep only the digits.
    fn parse_summary(response: &Response, doc: &scraper::Html) -> Result<BTreeMap<String, String>> {
        let root = doc.root_element();
        let tbody = find(root, "tbody.mbody")?
            .ok_or_else(|| Error::parsing("chapel summary table not found", response))?;

        let keys = elements(tbody, "th").skip(1).map(text_of);
        let mut values: Vec<String> = elements(tbody, "td").map(text_of).collect();
        values.pop();

        let mut summary: BTreeMap<String, String> = keys
            .zip(values)
            .map(|(k, v)| (k, s!(first_number(&v).unwrap_or(""))))
            .collect();

        for (long, short) in [("지각일수", "지각"), ("출석일수", "출석"), ("확정일수", "확정")] {
            let v = summary
                .remove(long)
                .ok_or_else(|| Error::parsing(format!("chapel summary lacks {long}"), response))?;
            summary.insert(s!(short), v);
        }

        let view = find(root, "tbody.viewbody")?
            .ok_or_else(|| Error::parsing("chapel view table not found", response))?;
        let key = find(view, "th")?.map(text_of);
        let value = find(view, "td")?.map(text_of);
        let (Some(key), Some(value)) = (key, value) else {
            return Err(Error::parsing("chapel view table is empty", response));
        };
        let count = first_number(&value)
            .ok_or_else(|| Error::parsing(format!("no count in {value:?}"), response))?;
        summary.insert(key, s!(count));
        Ok(summary)
    }

    /// Second `tbody.mbody`; column 5 (a duplicate of the date) is dropped.
    fn parse_main_table(response: &Response, doc: &scraper::Html) -> Result<Table> {
        let root = doc.root_element();
        let mut table = parse_table(
            response,
            find(root, "thead.mhead")?,
            find_all(root, "tbody.mbody")?.get(1).copied(),
        )?;
        if !table.remove_column(5) {
            return Err(Error::parsing("chapel table narrower than expected", response));
        }
        Ok(table)
    }
}

semester_page!(Chapel);

impl Parser for Chapel {
    type Context = Option<SemesterData>;
    type Output = ChapelData;

    fn parse(&self, response: &Response, context: &Option<SemesterData>) -> Result<ApiResponse<ChapelData>> {
        preconditions().run(response, || {
            let semester = semester_of(response, context)?;
            let doc = response.document();
            let summary = Self::parse_summary(response, &doc)?;
            let Table { head, body } = Self::parse_main_table(response, &doc)?;
            Ok(ResourceData::new(ChapelData { summary, head, body }, &response.url)
                .with_semester(semester)
                .into())
        })
    }
}

/// One class in the timetable grid, e.g. `성경개론(본관301)09:00~10:50`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub subject: String,
    pub room: String,
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableData {
    pub head: Vec<String>,
    /// One list per header column, top to bottom.
    pub body: Vec<Vec<TimetableEntry>>,
}

pub struct Timetable;

impl Timetable {
    pub const PATH: &'static str = "/GradeMng/GD160.aspx";

    fn parse_entry(cell: &str, response: &Response) -> Result<TimetableEntry> {
        static PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
            [
                Regex::new(r"^(.+)?\(([^(]*)?\)(\d{2}:\d{2})\s*~\s*([0-9:]{0,5})").unwrap(),
                Regex::new(r"^(.+)?()(\d{2}:\d{2})\s*~\s*([0-9:]{0,5})").unwrap(),
            ]
        });
        let caps = PATTERNS
            .iter()
            .find_map(|re| re.captures(cell))
            .ok_or_else(|| Error::parsing(format!("unreadable timetable cell {cell:?}"), response))?;
        let group = |i: usize| s!(caps.get(i).map_or("", |m| m.as_str()));
        Ok(TimetableEntry { subject: group(1), room: group(2), start: group(3), end: group(4) })
    }
}

semester_page!(Timetable);

impl Parser for Timetable {
    type Context = Option<SemesterData>;
    type Output = TimetableData;

    fn parse(&self, response: &Response, context: &Option<SemesterData>) -> Result<ApiResponse<TimetableData>> {
        preconditions().run(response, || {
            let semester = semester_of(response, context)?;
            let doc = response.document();
            let root = doc.root_element();
            let table = parse_table(response, find(root, "thead.mhead")?, find(root, "tbody.mbody")?)?;

            let mut columns: Vec<Vec<TimetableEntry>> = vec![Vec::new(); table.head.len()];
            for row in &table.body {
                for (column, cell) in columns.iter_mut().zip(row) {
                    if !cell.is_empty() {
                        column.push(Self::parse_entry(cell, response)?);
                    }
                }
            }

            Ok(ResourceData::new(TimetableData { head: table.head, body: columns }, &response.url)
                .with_semester(semester)
                .into())
        })
    }
}

/// Registered courses for the term.
pub struct Course;

impl Course {
    pub const PATH: &'static str = "/GradeMng/GD095.aspx";
}

semester_page!(Course);

impl Parser for Course {
    type Context = Option<SemesterData>;
    type Output = Table;

    fn parse(&self, response: &Response, context: &Option<SemesterData>) -> Result<ApiResponse<Table>> {
        preconditions().run(response, || {
            let semester = semester_of(response, context)?;
            let doc = response.document();
            let root = doc.root_element();
            let table = parse_table(response, find(root, "thead.mhead")?, find(root, "tbody.mbody")?)?;
            Ok(ResourceData::new(table, &response.url).with_semester(semester).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sem() -> Option<SemesterData> {
        Some(SemesterData { selected: s!("20221"), selectable: vec![s!("20221"), s!("20212")] })
    }

    #[test]
    fn session_alert_blocks() {
        let r = Response::html(200, "https://x.test", "<script>alert('세션이 만료되었습니다');</script>");
        let err = SessionExpired.is_blocking(&r).unwrap();
        assert_eq!(err.title(), "세션이 만료되었습니다");
        assert_eq!(err.error.alert_messages, vec!["세션이 만료되었습니다"]);

        let r = Response::html(200, "https://x.test", "<script>alert('수업평가를 먼저 해주세요');</script>");
        assert!(SessionExpired.is_blocking(&r).is_some());

        let r = Response::html(200, "https://x.test", "<script>alert('저장되었습니다');</script>");
        assert!(SessionExpired.is_blocking(&r).is_none());
    }

    #[test]
    fn login_redirect_blocks() {
        let r = Response::html(302, "https://x.test/GradeMng/GD095.aspx", "");
        let err = preconditions().check(&r).unwrap();
        assert_eq!(err.title(), "세션이 만료되어 로그인페이지로 리다이렉트 되었습니다.");
        assert_eq!(preconditions().len(), 2);
    }

    #[test]
    fn semester_select_is_read() {
        let r = Response::html(200, "https://x.test", r#"
            <select name="ctl00$ContentPlaceHolder1$cbo_YearHg">
              <option value="20221" selected="selected">2022-1</option>
              <option value="20212">2021-2</option>
            </select>"#);
        let info = extract_semester(&r, &r.document()).unwrap();
        assert_eq!(info, sem().unwrap());
    }

    #[test]
    fn semester_select_without_selection_is_an_error() {
        let r = Response::html(200, "https://x.test", r#"
            <select name="ctl00$ContentPlaceHolder1$cbo_YearHg"><option value="20221">x</option></select>"#);
        assert!(matches!(extract_semester(&r, &r.document()), Err(Error::Parsing { .. })));
    }

    #[test]
    fn overloaded_login_page() {
        let r = Response::html(503, "https://x.test", "<h2>Service Unavailable</h2><p>잠시 후 다시 시도하세요</p>");
        let out = Login.parse(&r, &()).unwrap();
        let e = out.error().unwrap();
        assert_eq!(e.title(), "Service Unavailable");
        assert_eq!(e.error.message.as_deref(), Some("잠시 후 다시 시도하세요"));
    }

    #[test]
    fn rejected_login_without_alert_has_empty_title() {
        let r = Response::html(200, "https://x.test", "<p>nothing</p>");
        let out = Login.parse(&r, &()).unwrap();
        assert_eq!(out.error().map(ErrorData::title), Some(""));
    }

    #[test]
    fn chapel_page() {
        let r = Response::html(200, "https://x.test/StudentMng/SM050.aspx", r#"<table>
            <tbody class="mbody"><tr>
              <th>구분</th><th>지각일수</th><th>출석일수</th><th>확정일수</th><th>결석일수</th>
              <td>2일</td><td>20일</td><td>18일</td><td>1 일</td><td>비고</td>
            </tr></tbody>
            <tbody class="viewbody"><tr><th>필요출석</th><td>24회</td></tr></tbody>
            </table>
            <table><thead class="mhead"><tr>
              <th>주차</th><th>날짜</th><th>요일</th><th>시간</th><th>구분</th><th>일자</th><th>비고</th>
            </tr></thead>
            <tbody class="mbody">
              <tr><td>1</td><td>2022-03-02</td><td>수</td><td>10:30</td><td>출석</td><td>03-02</td><td></td></tr>
            </tbody></table>"#);
        let out = Chapel.parse(&r, &sem()).unwrap();
        let data = out.data().unwrap();
        assert_eq!(data.summary["지각"], "2");
        assert_eq!(data.summary["출석"], "20");
        assert_eq!(data.summary["확정"], "18");
        assert_eq!(data.summary["결석일수"], "1");
        assert_eq!(data.summary["필요출석"], "24");
        assert!(!data.summary.contains_key("지각일수"));
        assert_eq!(data.head, vec!["주차", "날짜", "요일", "시간", "구분", "비고"]);
        assert_eq!(data.body, vec![vec!["1", "2022-03-02", "수", "10:30", "출석", ""]]);
        assert_eq!(out.meta()["selected"], "20221");
    }

    #[test]
    fn timetable_cells_grouped_by_column() {
        let r = Response::html(200, "https://x.test", r#"<table>
            <thead class="mhead"><tr><th>월</th><th>화</th></tr></thead>
            <tbody class="mbody">
              <tr><td>성경개론(본관301)09:00~10:50</td><td></td></tr>
              <tr><td></td><td>채플10:30 ~ 11:20</td></tr>
            </tbody></table>"#);
        let out = Timetable.parse(&r, &sem()).unwrap();
        let data = out.data().unwrap();
        assert_eq!(data.body.len(), 2);
        assert_eq!(
            data.body[0],
            vec![TimetableEntry { subject: s!("성경개론"), room: s!("본관301"), start: s!("09:00"), end: s!("10:50") }]
        );
        assert_eq!(
            data.body[1],
            vec![TimetableEntry { subject: s!("채플"), room: s!(), start: s!("10:30"), end: s!("11:20") }]
        );
    }

    #[test]
    fn timetable_parses_across_threads() {
        let r = Response::html(200, "https://x.test", r#"<table>
            <thead class="mhead"><tr><th>수</th></tr></thead>
            <tbody class="mbody"><tr><td>구약개론(101)13:00~14:50</td></tr></tbody></table>"#);
        std::thread::scope(|scope| {
            let runs: Vec<_> = (0..4).map(|_| scope.spawn(|| Timetable.parse(&r, &sem()).unwrap())).collect();
            for run in runs {
                let out = run.join().unwrap();
                assert_eq!(out.data().unwrap().body[0][0].room, "101");
            }
        });
    }

    #[test]
    fn timetable_garbage_cell_is_an_error() {
        let r = Response::html(200, "https://x.test", r#"<table>
            <thead class="mhead"><tr><th>월</th></tr></thead>
            <tbody class="mbody"><tr><td>휴강</td></tr></tbody></table>"#);
        assert!(matches!(Timetable.parse(&r, &sem()), Err(Error::Parsing { .. })));
    }

    #[test]
    fn blocked_page_skips_semester_requirement() {
        let r = Response::html(200, "https://x.test", "<script>alert('세션이 종료되었습니다.')</script>");
        let out = Course.parse(&r, &None).unwrap();
        assert_eq!(out.error().map(ErrorData::title), Some("세션이 종료되었습니다."));
    }
}
