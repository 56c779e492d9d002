// src/sites/mileage.rs
//! Campus points system.
//!
//! Everything past login goes through one sheet endpoint that answers with
//! an XML grid:
//!
//! ```text
//! <SHEET><DATA><TR><TD>..</TD>..</TR>..</DATA>
//!        <ETC KEY="total_rows">12</ETC><MESSAGE>..</MESSAGE></SHEET>
//! ```
//!
//! The grid carries no header row; columns follow the request's `S_SAVENAME`,
//! so the head is rebuilt from the params that went out. The host's
//! certificate chain does not verify, so every request here goes out with
//! `verify(false)`.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::config::RequestOptions;
use crate::config::consts::{MILEAGE_DOMAIN, MILEAGE_REFERER};
use crate::core::html::extract_alerts;
use crate::core::{Body, Cookies, HttpClient, Response, Table};
use crate::engine::{
    ApiResponse, ErrorData, Fetched, GeneralFetcher, LoginFetcher, Parser, Precondition, Preconditions,
    ResourceData,
};
use crate::error::{Error, Result};

use super::mileage_params::{SearchParams, SheetParams, StatementParams, translate_mileage_req, translate_statement_type};
use super::{LoginData, login_success};

const SHEET_PATH: &str = "/ddd.sheetAction";

fn url(path: &str) -> String {
    join!(MILEAGE_DOMAIN, path)
}

/// `<message>` saying the server-side session is gone.
pub struct SessionExpired;

impl Precondition for SessionExpired {
    fn is_blocking(&self, response: &Response) -> Option<ErrorData> {
        let message = read_sheet(&response.text).ok()?.message?;
        message
            .contains("세션정보")
            .then(|| ErrorData::new("마일리지 세션이 만료되었습니다.", &response.url))
    }
}

pub fn preconditions() -> Preconditions {
    Preconditions::new().with(SessionExpired)
}

pub struct Login;

impl Login {
    pub const PATH: &'static str = "/login/login_check.jsp";
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
        let opts = opts.clone().verify(false).header("referer", MILEAGE_REFERER);
        let form = Body::fields([
            ("user_id", user_id),
            ("user_pwd", user_pw),
            ("mac_addr", ""),
            ("AutoFg", "M"),
            ("appfg", "web"),
            ("logoutFg", "Y"),
            ("login_auto_serial", ""),
        ]);
        Ok(client.post(&url(Self::PATH), form, &Cookies::new(), &opts).await?.into())
    }
}

impl Parser for Login {
    type Context = ();
    type Output = LoginData;

    /// Both outcomes are a 200 with a `location.replace` script; only a
    /// failed login also shows an alert.
    fn parse(&self, response: &Response, _: &()) -> Result<ApiResponse<LoginData>> {
        let alerts = extract_alerts(&response.document());
        match alerts.first() {
            Some(first) => Ok(ErrorData::new(first.clone(), &response.url).alerts(alerts).into()),
            None => login_success(response),
        }
    }
}

async fn post_sheet<P: SheetParams>(
    client: &HttpClient,
    cookies: &Cookies,
    params: &P,
    opts: &RequestOptions,
) -> Result<Fetched<P>> {
    let opts = opts.clone().verify(false);
    let form = Body::fields(params.to_fields()?);
    debug!(req = params.req(), page = params.page_num(), "mileage sheet request");
    let response = client.post(&url(SHEET_PATH), form, cookies, &opts).await?;
    Ok(Fetched::new(response, params.clone()))
}

/// What one sheet reply carries. Each part is `None` when its element is absent.
#[derive(Debug, Default)]
struct SheetXml {
    rows: Option<Vec<Vec<String>>>,
    total_rows: Option<String>,
    message: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Slot {
    Cell,
    TotalRows,
    Message,
    Other,
}

fn is(e: &BytesStart, name: &str) -> bool {
    e.local_name().as_ref().eq_ignore_ascii_case(name.as_bytes())
}

fn is_total_rows(e: &BytesStart) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref().eq_ignore_ascii_case(b"key") && a.value.as_ref() == b"total_rows")
}

/// Element names are matched case-insensitively; `<TD/>` is an empty cell.
fn read_sheet(xml: &str) -> std::result::Result<SheetXml, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut sheet = SheetXml::default();
    let mut in_data = false;
    let mut row: Option<Vec<String>> = None;
    let mut slot = Slot::Other;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                text.clear();
                slot = Slot::Other;
                if is(&e, "data") {
                    in_data = true;
                    sheet.rows.get_or_insert_with(Vec::new);
                } else if in_data && is(&e, "tr") {
                    row = Some(Vec::new());
                } else if row.is_some() && is(&e, "td") {
                    slot = Slot::Cell;
                } else if is(&e, "etc") && is_total_rows(&e) {
                    slot = Slot::TotalRows;
                } else if is(&e, "message") {
                    slot = Slot::Message;
                }
            }
            Event::Empty(e) => {
                if let Some(cells) = row.as_mut().filter(|_| is(&e, "td")) {
                    cells.push(String::new());
                } else if is(&e, "data") {
                    sheet.rows.get_or_insert_with(Vec::new);
                } else if is(&e, "message") {
                    sheet.message.get_or_insert_with(String::new);
                }
            }
            Event::Text(e) => {
                if slot != Slot::Other {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if slot != Slot::Other {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                let value = std::mem::take(&mut text).trim().to_string();
                match std::mem::replace(&mut slot, Slot::Other) {
                    Slot::Cell => {
                        if let Some(cells) = row.as_mut() {
                            cells.push(value);
                        }
                    }
                    Slot::TotalRows => sheet.total_rows = Some(value),
                    Slot::Message => sheet.message = Some(value),
                    Slot::Other => {
                        let name = e.local_name();
                        if name.as_ref().eq_ignore_ascii_case(b"tr") {
                            if let (Some(cells), Some(rows)) = (row.take(), sheet.rows.as_mut()) {
                                rows.push(cells);
                            }
                        } else if name.as_ref().eq_ignore_ascii_case(b"data") {
                            in_data = false;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheet)
}

/// One grid page; `head` holds display names rebuilt from `req`.
fn parse_sheet(response: &Response, req: &str, page_num: &str) -> Result<ResourceData<Table>> {
    let sheet = read_sheet(&response.text)
        .map_err(|e| Error::parsing(format!("sheet is not well-formed: {e}"), response))?;
    let body = sheet.rows.ok_or_else(|| Error::parsing("sheet data not found", response))?;
    let total_rows = sheet
        .total_rows
        .ok_or_else(|| Error::parsing("sheet total_rows not found", response))?;

    let head = translate_mileage_req(req);
    if let Some(row) = body.iter().find(|row| row.len() != head.len()) {
        return Err(Error::parsing(
            format!("sheet row has {} cells, head has {}", row.len(), head.len()),
            response,
        ));
    }

    let current = body.len();
    Ok(ResourceData::new(Table { head, body }, &response.url)
        .with_meta("total_size", total_rows)
        .with_meta("current_size", current)
        .with_meta("page_n", page_num))
}

/// Member search. Look up by student id to learn the customer id that
/// [`Statement`] needs.
#[derive(Clone, Debug, Default)]
pub struct Search {
    pub params: SearchParams,
}

impl Search {
    pub fn new(params: SearchParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl GeneralFetcher for Search {
    async fn fetch(&self, client: &HttpClient, cookies: &Cookies, opts: &RequestOptions) -> Result<Fetched<SearchParams>> {
        post_sheet(client, cookies, &self.params, opts).await
    }
}

impl Parser for Search {
    type Context = SearchParams;
    type Output = Table;

    fn parse(&self, response: &Response, params: &SearchParams) -> Result<ApiResponse<Table>> {
        preconditions().run(response, || {
            Ok(parse_sheet(response, params.req(), params.page_num())?.into())
        })
    }
}

/// Point history of one member. The `구분` column comes back as a code and
/// is shown by name.
#[derive(Clone, Debug, Default)]
pub struct Statement {
    pub params: StatementParams,
}

impl Statement {
    pub fn new(params: StatementParams) -> Self {
        Self { params }
    }

    pub fn for_customer(customer_id: &str) -> Self {
        let mut params = StatementParams::default();
        params.set_customer_id(customer_id);
        Self { params }
    }
}

#[async_trait]
impl GeneralFetcher for Statement {
    async fn fetch(
        &self,
        client: &HttpClient,
        cookies: &Cookies,
        opts: &RequestOptions,
    ) -> Result<Fetched<StatementParams>> {
        post_sheet(client, cookies, &self.params, opts).await
    }
}

impl Parser for Statement {
    type Context = StatementParams;
    type Output = Table;

    fn parse(&self, response: &Response, params: &StatementParams) -> Result<ApiResponse<Table>> {
        preconditions().run(response, || {
            let mut sheet = parse_sheet(response, params.req(), params.page_num())?;
            let idx = sheet
                .data
                .column("구분")
                .ok_or_else(|| Error::parsing("statement head lacks 구분", response))?;
            for row in &mut sheet.data.body {
                row[idx] = translate_statement_type(&row[idx]);
            }
            Ok(sheet.into())
        })
    }
}
