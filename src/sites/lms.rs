// src/sites/lms.rs
//! LMS (Moodle with the Ubion plugins).
//!
//! Pages:
//! - [`Login`] – `POST /login/index.php`; always redirects on a well-formed
//!   attempt, failures carry `errorcode=N` in `location`.
//! - [`Profile`] – `/user/user_edit.php`; student id, name and major.
//! - [`CourseList`] – `/local/ubion/user/index.php`; term chosen through
//!   `year`/`semester` query values (LMS encoding, see `core::semester`).
//! - [`Attendance`] – `/local/ubattendance/my_status.php?id=<course>`.
//!
//! A lapsed session answers any page with a redirect to the login form.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Node};
use serde::{Deserialize, Serialize};

use crate::config::RequestOptions;
use crate::config::consts::LMS_DOMAIN;
use crate::core::html::{elements, extract_alerts, find, find_all, parse_table, text_of};
use crate::core::sanitize::{first_number, normalize_ws, strip_brackets};
use crate::core::{Body, Cookies, HttpClient, Response, SemesterConverter, SemesterData};
use crate::engine::{
    ApiResponse, ErrorData, Fetched, GeneralFetcher, LoginFetcher, Parser, Precondition, Preconditions,
    ResourceData, SemesterFetcher,
};
use crate::error::{Error, Result};

use super::{LoginData, login_success, with_query};

pub struct SessionExpired;

impl Precondition for SessionExpired {
    fn is_blocking(&self, response: &Response) -> Option<ErrorData> {
        let location = response.header("location")?;
        location
            .contains("login")
            .then(|| ErrorData::new("세션이 만료되었습니다.", &response.url))
    }
}

pub fn preconditions() -> Preconditions {
    Preconditions::new().with(SessionExpired)
}

fn url(path: &str) -> String {
    join!(LMS_DOMAIN, path)
}

/// Option values of one `<select>` plus the first one marked selected.
fn options_of(select: ElementRef<'_>, response: &Response) -> Result<(Vec<String>, String)> {
    let mut values = Vec::new();
    let mut selected = None;
    for option in elements(select, "option") {
        let value = option
            .value()
            .attr("value")
            .ok_or_else(|| Error::parsing("option without value", response))?;
        if selected.is_none() && option.value().attr("selected").is_some() {
            selected = Some(s!(value));
        }
        values.push(s!(value));
    }
    let selected = selected.ok_or_else(|| Error::parsing("no option selected", response))?;
    Ok((values, selected))
}

/// Terms from `select#year` × `select#semester`, in intranet encoding.
///
/// `selectable` lists every other year/term combination; the shown one is
/// only in `selected`.
pub fn extract_semester(response: &Response, doc: &scraper::Html) -> Result<SemesterData> {
    let root = doc.root_element();
    let year = find(root, "select#year")?.ok_or_else(|| Error::parsing("year select not found", response))?;
    let term = find(root, "select#semester")?
        .ok_or_else(|| Error::parsing("semester select not found", response))?;

    let (years, year_selected) = options_of(year, response)?;
    let (terms, term_selected) = options_of(term, response)?;

    let to_intranet = |y: &str, t: &str| {
        SemesterConverter::lms_to_intranet(y, t).ok_or_else(|| Error::UnknownSemester(join!(y, "/", t)))
    };

    let selected = to_intranet(&year_selected, &term_selected)?;
    let mut selectable = Vec::with_capacity(years.len() * terms.len());
    for y in &years {
        for t in &terms {
            selectable.push(to_intranet(y, t)?);
        }
    }
    if let Some(i) = selectable.iter().position(|s| *s == selected) {
        selectable.remove(i);
    }

    Ok(SemesterData { selected, selectable })
}

pub struct Login;

impl Login {
    pub const PATH: &'static str = "/login/index.php";

    /// Title for a `location: ...errorcode=N`.
    pub fn error_title(code: &str) -> String {
        match code {
            "1" => s!("현재, 브라우저의 쿠키가 작동하지 않습니다."),
            "2" => s!(
                "사용자 아이디: 이이디에는 영어소문자, 숫자, 밑줄( _ ), 하이폰( - ), 마침표( . ) 또는 @ 기호만을 쓸 수 있습니다."
            ),
            "3" => s!("아이디 또는 패스워드가 잘못 입력되었습니다."),
            other => format!("login errorcode={other}"),
        }
    }
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
        let form = Body::fields([("username", user_id), ("password", user_pw)]);
        Ok(client.post(&url(Self::PATH), form, &Cookies::new(), opts).await?.into())
    }
}

impl Parser for Login {
    type Context = ();
    type Output = LoginData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<LoginData>> {
        let Some(location) = response.header("location") else {
            let alerts = extract_alerts(&response.document());
            let title = alerts.first().cloned().unwrap_or_default();
            return Ok(ErrorData::new(title, &response.url).alerts(alerts).into());
        };

        static ERROR_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"errorcode=(\d+)").unwrap());
        match ERROR_CODE.captures(location).and_then(|c| c.get(1)) {
            Some(code) => Ok(ErrorData::new(Self::error_title(code.as_str()), &response.url)
                .code(code.as_str())
                .into()),
            None => login_success(response),
        }
    }
}

fn is_hangul(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

fn hangul_between(s: &str, min: usize, max: usize) -> bool {
    let n = s.chars().count();
    n >= min && n <= max && s.chars().all(is_hangul)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub sid: String,
    pub name: String,
    pub major: String,
}

pub struct Profile;

impl Profile {
    pub const PATH: &'static str = "/user/user_edit.php?lang=ko";

    /// Two or more Hangul syllables.
    pub fn validate_name(name: &str) -> bool {
        hangul_between(name, 2, usize::MAX)
    }

    /// Optional leading letter, then 3 to 9 digits.
    pub fn validate_sid(sid: &str) -> bool {
        let digits = match sid.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => &sid[1..],
            _ => sid,
        };
        (3..=9).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
    }

    /// 3 to 17 Hangul syllables.
    pub fn validate_major(major: &str) -> bool {
        hangul_between(major, 3, 17)
    }

    fn sid_of(response: &Response, doc: &scraper::Html) -> Result<String> {
        let container = find(doc.root_element(), "div#fitem_id_idnumber")?
            .ok_or_else(|| Error::parsing("student id container not found", response))?;
        let sid = find(container, "div.felement.fstatic")?
            .map(text_of)
            .ok_or_else(|| Error::parsing("student id not found", response))?;
        if !Self::validate_sid(&sid) {
            return Err(Error::parsing(format!("invalid student id {sid:?}"), response));
        }
        Ok(sid)
    }

    fn input_value(response: &Response, doc: &scraper::Html, container: &str, what: &str) -> Result<String> {
        let container = find(doc.root_element(), container)?
            .ok_or_else(|| Error::parsing(format!("{what} container not found"), response))?;
        let input = find(container, "input")?
            .ok_or_else(|| Error::parsing(format!("{what} input not found"), response))?;
        Ok(s!(input.value().attr("value").unwrap_or("").trim()))
    }

    fn name_of(response: &Response, doc: &scraper::Html) -> Result<String> {
        let name = Self::input_value(response, doc, "div#fitem_id_firstname", "name")?;
        if !Self::validate_name(&name) {
            return Err(Error::parsing(format!("invalid name {name:?}"), response));
        }
        Ok(name)
    }

    fn major_of(response: &Response, doc: &scraper::Html) -> Result<String> {
        let major = Self::input_value(response, doc, "div#fitem_id_department", "major")?;
        if !Self::validate_major(&major) {
            return Err(Error::parsing(format!("invalid major {major:?}"), response));
        }
        Ok(major)
    }

    pub fn parse_sid(&self, response: &Response) -> Result<ApiResponse<String>> {
        preconditions().run(response, || {
            Ok(ResourceData::new(Self::sid_of(response, &response.document())?, &response.url).into())
        })
    }

    pub fn parse_name(&self, response: &Response) -> Result<ApiResponse<String>> {
        preconditions().run(response, || {
            Ok(ResourceData::new(Self::name_of(response, &response.document())?, &response.url).into())
        })
    }

    pub fn parse_major(&self, response: &Response) -> Result<ApiResponse<String>> {
        preconditions().run(response, || {
            Ok(ResourceData::new(Self::major_of(response, &response.document())?, &response.url).into())
        })
    }
}

#[async_trait]
impl GeneralFetcher for Profile {
    async fn fetch(&self, client: &HttpClient, cookies: &Cookies, opts: &RequestOptions) -> Result<Fetched> {
        Ok(client.get(&url(Self::PATH), cookies, opts).await?.into())
    }
}

impl Parser for Profile {
    type Context = ();
    type Output = ProfileData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<ProfileData>> {
        preconditions().run(response, || {
            let doc = response.document();
            let data = ProfileData {
                sid: Self::sid_of(response, &doc)?,
                name: Self::name_of(response, &doc)?,
                major: Self::major_of(response, &doc)?,
            };
            Ok(ResourceData::new(data, &response.url).into())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseListData {
    /// Course name (section tags removed) → course id.
    pub courses: BTreeMap<String, String>,
}

pub struct CourseList;

impl CourseList {
    pub const PATH: &'static str = "/local/ubion/user/index.php?lang=ko";
}

#[async_trait]
impl SemesterFetcher for CourseList {
    async fn fetch(
        &self,
        client: &HttpClient,
        cookies: &Cookies,
        semester: Option<&str>,
        opts: &RequestOptions,
    ) -> Result<Fetched> {
        let mut target = url(Self::PATH);
        if let Some(code) = semester {
            let lms = SemesterConverter::intranet_to_lms(code)
                .ok_or_else(|| Error::UnknownSemester(s!(code)))?;
            target = with_query(&target, [("year", lms.year.as_str()), ("semester", lms.semester.as_str())]);
        }
        Ok(client.get(&target, cookies, opts).await?.into())
    }
}

static COURSE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]id=(\d+)").unwrap());

impl Parser for CourseList {
    type Context = ();
    type Output = CourseListData;

    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<CourseListData>> {
        preconditions().run(response, || {
            let doc = response.document();

            let mut courses = BTreeMap::new();
            for link in find_all(doc.root_element(), "a.coursefullname")? {
                let href = link.value().attr("href").unwrap_or("");
                let id = COURSE_ID
                    .captures(href)
                    .and_then(|c| c.get(1))
                    .ok_or_else(|| Error::parsing(format!("no course id in {href:?}"), response))?;
                courses.insert(strip_brackets(&text_of(link)), s!(id.as_str()));
            }

            let semester = extract_semester(response, &doc)?;
            Ok(ResourceData::new(CourseListData { courses }, &response.url)
                .with_semester(&semester)
                .into())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceData {
    pub summary: BTreeMap<String, String>,
    pub head: Vec<String>,
    pub body: Vec<Vec<String>>,
    pub foot: BTreeMap<String, String>,
}

pub struct Attendance;

impl Attendance {
    pub const PATH: &'static str = "/local/ubattendance/my_status.php?lang=ko";

    pub async fn fetch(
        &self,
        client: &HttpClient,
        cookies: &Cookies,
        course_id: &str,
        opts: &RequestOptions,
    ) -> Result<Fetched> {
        let target = with_query(&url(Self::PATH), [("id", course_id)]);
        Ok(client.get(&target, cookies, opts).await?.into())
    }

    /// `<li><span>담당교수</span> : 홍길동</li>` → (label, loose text).
    fn label_and_text(el: ElementRef<'_>) -> Option<(String, String)> {
        let mut label = None;
        let mut rest = s!();
        for child in el.children() {
            match child.value() {
                Node::Element(_) if label.is_none() => label = ElementRef::wrap(child).map(text_of),
                Node::Text(t) => rest.push_str(t),
                _ => {}
            }
        }
        Some((label?, normalize_ws(&rest)))
    }

    fn parse_summary(response: &Response, doc: &scraper::Html) -> Result<BTreeMap<String, String>> {
        let container = find(doc.root_element(), "div.course_info.well")?
            .ok_or_else(|| Error::parsing("attendance summary not found", response))?;
        elements(container, "li")
            .map(|li| -> Result<(String, String)> {
                let (k, v) = Self::label_and_text(li)
                    .ok_or_else(|| Error::parsing("summary item without label", response))?;
                Ok((k, s!(v.replace(':', "").trim())))
            })
            .collect()
    }

    fn parse_foot(response: &Response, doc: &scraper::Html) -> Result<BTreeMap<String, String>> {
        let tfoot = find(doc.root_element(), "tfoot")?
            .ok_or_else(|| Error::parsing("attendance table foot not found", response))?;
        elements(tfoot, "span")
            .map(|span| -> Result<(String, String)> {
                let (k, v) = Self::label_and_text(span)
                    .ok_or_else(|| Error::parsing("foot counter without label", response))?;
                let n = first_number(&v)
                    .ok_or_else(|| Error::parsing(format!("no count for {k}"), response))?;
                Ok((k, s!(n)))
            })
            .collect()
    }
}

impl Parser for Attendance {
    type Context = ();
    type Output = AttendanceData;

    /// Anything but `200` (303: not enrolled, 404: course removed) means the
    /// course has no attendance to show.
    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<AttendanceData>> {
        preconditions().run(response, || {
            if response.status != 200 {
                return Ok(ErrorData::new("출석 정보를 불러올 수 없는 강의입니다.", &response.url).into());
            }
            let doc = response.document();
            let summary = Self::parse_summary(response, &doc)?;

            let table = find(doc.root_element(), "table.attendance_my")?
                .ok_or_else(|| Error::parsing("attendance table not found", response))?;
            let main = parse_table(response, find(table, "thead")?, find(table, "tbody")?)?;

            let foot = Self::parse_foot(response, &doc)?;
            Ok(ResourceData::new(
                AttendanceData { summary, head: main.head, body: main.body, foot },
                &response.url,
            )
            .into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(location: &str) -> Response {
        let mut r = Response::html(303, "https://lms.test/login/index.php", "");
        r.headers.insert("Location", location);
        r.headers.insert("Date", "Mon, 12 Aug 2019 03:00:00 GMT");
        r
    }

    #[test]
    fn login_error_codes() {
        let out = Login.parse(&redirect("https://lms.test/login/index.php?errorcode=3"), &()).unwrap();
        let e = out.error().unwrap();
        assert_eq!(e.title(), "아이디 또는 패스워드가 잘못 입력되었습니다.");
        assert_eq!(e.error.code.as_deref(), Some("3"));

        let out = Login.parse(&redirect("/login/index.php?errorcode=9"), &()).unwrap();
        assert_eq!(out.error().map(ErrorData::title), Some("login errorcode=9"));
    }

    #[test]
    fn login_success_reads_iat() {
        let out = Login.parse(&redirect("https://lms.test/my/"), &()).unwrap();
        assert_eq!(out.data().map(|d| d.iat), Some(1565578800));
    }

    #[test]
    fn session_redirect_blocks() {
        assert!(SessionExpired.is_blocking(&redirect("https://lms.test/login/index.php")).is_some());
        assert!(SessionExpired.is_blocking(&redirect("https://lms.test/my/")).is_none());
        assert!(SessionExpired.is_blocking(&Response::html(200, "u", "")).is_none());
    }

    #[test]
    fn profile_validators() {
        assert!(Profile::validate_sid("201912345"));
        assert!(Profile::validate_sid("a123"));
        assert!(!Profile::validate_sid("ab123"));
        assert!(!Profile::validate_sid("12"));
        assert!(Profile::validate_name("홍길동"));
        assert!(!Profile::validate_name("홍"));
        assert!(!Profile::validate_name("Hong"));
        assert!(Profile::validate_major("신학과"));
        assert!(!Profile::validate_major("신학"));
    }

    #[test]
    fn profile_page() {
        let r = Response::html(200, "https://lms.test/user/user_edit.php", r#"
            <div id="fitem_id_idnumber"><div class="felement fstatic"> 201912345 </div></div>
            <div id="fitem_id_firstname"><input name="firstname" value=" 홍길동 "></div>
            <div id="fitem_id_department"><input name="department" value="기독교교육과"></div>"#);
        let out = Profile.parse(&r, &()).unwrap();
        assert_eq!(
            out.data(),
            Some(&ProfileData { sid: s!("201912345"), name: s!("홍길동"), major: s!("기독교교육과") })
        );
        assert_eq!(Profile.parse_name(&r).unwrap().data().map(String::as_str), Some("홍길동"));
    }

    #[test]
    fn profile_with_bad_sid_is_an_error() {
        let r = Response::html(200, "u", r#"
            <div id="fitem_id_idnumber"><div class="felement fstatic">guest</div></div>"#);
        assert!(matches!(Profile.parse_sid(&r), Err(Error::Parsing { .. })));
    }

    #[test]
    fn course_list_with_terms() {
        let r = Response::html(200, "https://lms.test/local/ubion/user/index.php", r#"
            <select id="year"><option value="2022" selected>2022</option><option value="2021">2021</option></select>
            <select id="semester"><option value="10" selected>1학기</option><option value="20">2학기</option></select>
            <a class="coursefullname" href="https://lms.test/course/view.php?id=1234">[1분반] 성경개론</a>
            <a class="coursefullname" href="/course/view.php?lang=ko&id=77">기독교윤리</a>"#);
        let out = CourseList.parse(&r, &()).unwrap();
        let courses = &out.data().unwrap().courses;
        assert_eq!(courses["성경개론"], "1234");
        assert_eq!(courses["기독교윤리"], "77");
        assert_eq!(out.meta()["selected"], "20221");
        assert_eq!(out.meta()["selectable"], serde_json::json!(["20222", "20211", "20212"]));
    }

    #[test]
    fn unmappable_lms_term_is_an_error() {
        let r = Response::html(200, "u", r#"
            <select id="year"><option value="2022" selected>2022</option></select>
            <select id="semester"><option value="99" selected>?</option></select>"#);
        assert!(matches!(CourseList.parse(&r, &()), Err(Error::UnknownSemester(_))));
    }

    #[test]
    fn attendance_page() {
        let r = Response::html(200, "https://lms.test/local/ubattendance/my_status.php", r#"
            <div class="course_info well"><ul>
              <li><span>강좌명</span> : 성경개론</li>
              <li><span>담당교수</span>: 홍길동</li>
            </ul></div>
            <table class="attendance_my table table-bordered">
              <thead><tr><th>주차</th><th>출결</th></tr></thead>
              <tbody><tr><td>1</td><td>출석</td></tr></tbody>
              <tfoot><tr><td colspan="2"><span><b>출석</b> 12회</span><span><b>결석</b> 0회</span></td></tr></tfoot>
            </table>"#);
        let out = Attendance.parse(&r, &()).unwrap();
        let d = out.data().unwrap();
        assert_eq!(d.summary["강좌명"], "성경개론");
        assert_eq!(d.summary["담당교수"], "홍길동");
        assert_eq!(d.head, vec!["주차", "출결"]);
        assert_eq!(d.body, vec![vec!["1", "출석"]]);
        assert_eq!(d.foot["출석"], "12");
        assert_eq!(d.foot["결석"], "0");
    }

    #[test]
    fn attendance_for_unenrolled_course() {
        let r = Response::html(303, "u", "");
        let out = Attendance.parse(&r, &()).unwrap();
        assert_eq!(out.error().map(ErrorData::title), Some("출석 정보를 불러올 수 없는 강의입니다."));
    }
}
