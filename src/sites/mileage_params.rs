// src/sites/mileage_params.rs
//! Request records for the mileage sheet endpoint.
//!
//! The endpoint is a generic grid backend: every field of the upstream search
//! form has to be sent, and `S_SAVENAME` (the *req* string, `|`-separated
//! column keys) decides which columns come back and in which order. Only the
//! fields behind the accessors below are meant to change; the rest are the
//! values the upstream page itself submits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Column key → display name. Unknown keys are shown as-is.
const REQ_MEANINGS: &[(&str, &str)] = &[
    ("CST_NO", "회원번호"),
    ("CST_NM", "회원명"),
    ("CST_CARD_NO", "카드번호"),
    ("PROD_CD", "상품코드"),
    ("PROD_NM", "상품명"),
    ("SALE_QTY", "판매수량"),
    ("TOT_SALE_AMT", "총매출"),
    ("TOT_DC_AMT", "할인액"),
    ("DCM_SALE_AMT", "순매출"),
    ("SALE_DATE", "판매일자"),
    ("SALE_TIME", "판매시간"),
    ("SHOP_NM", "매장명"),
    ("CST_USE_POINT", "사용포인트"),
    ("CHG_DATE", "변경일자"),
    ("CHG_FG", "구분"),
    ("POINT", "포인트"),
    ("REMARK", "비고"),
    ("CST_CLS_NM", "회원등급"),
    ("BIRTH_DATE", "생일"),
    ("TEL_NO", "전화번호"),
    ("HP_NO", "휴대폰번호"),
    ("SMS_RECV_YN", "SMS수신여부"),
    ("ACC_POINT", "포인트적립"),
    ("USE_POINT", "포인트사용"),
    ("ADJ_POINT", "포인트조정"),
    ("AVL_POINT", "포인트가용"),
    ("ACC_SALE_CNT", "결제횟수"),
    ("ACC_SALE_AMT", "결제금액"),
    ("F_SALE_DATE", "최초방문일"),
    ("L_SALE_DATE", "최종방문일"),
    ("INS_DT", "가입일"),
    ("ADDR", "주소"),
    ("DM_RECV_YN", "DM수신여부"),
    ("CST_ID", "회원참조"),
];

/// `CHG_FG` codes of a statement row.
const STATEMENT_TYPES: &[(&str, &str)] = &[
    ("0", "신규"),
    ("1", "이관"),
    ("2", "조정"),
    ("3", "적립"),
    ("4", "적립취소"),
    ("5", "사용"),
    ("6", "사용취소"),
];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// `"CST_NO|CST_NM|FOO"` → `["회원번호", "회원명", "FOO"]`.
pub fn translate_mileage_req(req: &str) -> Vec<String> {
    req.split('|').map(|key| s!(lookup(REQ_MEANINGS, key).unwrap_or(key))).collect()
}

pub fn translate_statement_type(code: &str) -> String {
    s!(lookup(STATEMENT_TYPES, code).unwrap_or(code))
}

/// What the sheet parser needs to know about a request record.
pub trait SheetParams: Serialize + Clone + Send + Sync {
    /// `|`-separated column keys (`S_SAVENAME`).
    fn req(&self) -> &str;

    fn page_num(&self) -> &str;

    /// Every field as a form pair, upstream names.
    fn to_fields(&self) -> Result<BTreeMap<String, String>> {
        let Value::Object(map) = serde_json::to_value(self)? else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }
}

/// Member search (`master.cust.cust020`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SearchParams {
    #[serde(rename = "birth_day")]
    pub birth_day: String,
    #[serde(rename = "birth_day2")]
    pub birth_day2: String,
    #[serde(rename = "birth_month")]
    pub birth_month: String,
    #[serde(rename = "birth_month2")]
    pub birth_month2: String,
    #[serde(rename = "cst_nos")]
    pub cst_nos: String,
    #[serde(rename = "date1_1")]
    pub date1_1: String,
    #[serde(rename = "date1_2")]
    pub date1_2: String,
    #[serde(rename = "date_period1")]
    pub date_period1: String,
    #[serde(rename = "list")]
    pub list: String,
    #[serde(rename = "mySheet1")]
    pub my_sheet1: String,
    #[serde(rename = "page_no")]
    pub page_no: String,
    #[serde(rename = "page_size")]
    pub page_size: String,
    #[serde(rename = "page_url")]
    pub page_url: String,
    #[serde(rename = "r_ogn_cd")]
    pub r_ogn_cd: String,
    #[serde(rename = "r_ogn_fg")]
    pub r_ogn_fg: String,
    #[serde(rename = "row_cnt")]
    pub row_cnt: String,
    pub chg_shop_cd: String,
    /// Student id.
    pub cst_card_no: String,
    pub cst_card_use_fg: String,
    pub cst_cls_cd: String,
    pub cst_id: String,
    pub cst_nm: String,
    /// Member (customer) number.
    pub cst_no: String,
    pub date_fg: String,
    pub dm_recv_yn: String,
    pub email_addr: String,
    pub email_recv_yn: String,
    pub ex_cst: String,
    pub ex_visit: String,
    pub hp_card1: String,
    pub hp_card2: String,
    pub hp_no1: String,
    pub hp_no2: String,
    pub hp_no3: String,
    pub hp_sale1: String,
    pub hp_sale2: String,
    pub ins_shop_cd: String,
    pub mview_yn: String,
    pub orderyn: String,
    pub pnt_fg: String,
    pub sale_fg: String,
    pub sex_fg: String,
    pub sheetseq: String,
    pub sms_recv_yn: String,
    pub s_controller: String,
    pub s_cst_nm: String,
    pub s_forward: String,
    pub s_method: String,
    pub s_savename: String,
    pub s_tel_no: String,
    pub s_treecol: String,
    #[serde(rename = "SaleYN")]
    pub sale_yn: String,
    pub tel_no1: String,
    pub tel_no2: String,
    pub tel_no3: String,
    pub term_fg: String,
    pub use_yn: String,
    pub wedding_yn: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            birth_day: s!("01"),
            birth_day2: s!("01"),
            birth_month: s!("01"),
            birth_month2: s!("01"),
            cst_nos: s!(),
            // any past date works
            date1_1: s!("2019-08-12"),
            date1_2: s!("2019-08-12"),
            date_period1: s!("366"),
            list: s!(),
            my_sheet1: s!(),
            page_no: s!("1"),
            page_size: s!("5000"),
            page_url: s!("/master/cust/cust020.jsp"),
            r_ogn_cd: s!("HNON"),
            r_ogn_fg: s!("C"),
            row_cnt: s!(),
            chg_shop_cd: s!(),
            cst_card_no: s!(),
            cst_card_use_fg: s!(),
            cst_cls_cd: s!(),
            cst_id: s!(),
            cst_nm: s!(),
            cst_no: s!(),
            date_fg: s!("A"),
            dm_recv_yn: s!(),
            email_addr: s!(),
            email_recv_yn: s!(),
            ex_cst: s!(),
            ex_visit: s!(),
            hp_card1: s!(),
            hp_card2: s!(),
            hp_no1: s!(),
            hp_no2: s!(),
            hp_no3: s!(),
            hp_sale1: s!(),
            hp_sale2: s!(),
            ins_shop_cd: s!(),
            mview_yn: s!("N"),
            orderyn: s!(),
            pnt_fg: s!("A"),
            sale_fg: s!("C"),
            sex_fg: s!("A"),
            sheetseq: s!("1"),
            sms_recv_yn: s!(),
            s_controller: s!("master.cust.cust020"),
            s_cst_nm: s!(),
            s_forward: s!(),
            s_method: s!("search"),
            s_savename: s!(
                "CST_NO|CST_NM|CST_CLS_NM|CST_CARD_NO|ACC_POINT|USE_POINT|ADJ_POINT|AVL_POINT|ACC_SALE_CNT|ACC_SALE_AMT|INS_DT"
            ),
            s_tel_no: s!(),
            s_treecol: s!(),
            sale_yn: s!(),
            tel_no1: s!(),
            tel_no2: s!(),
            tel_no3: s!(),
            term_fg: s!("A"),
            use_yn: s!(),
            wedding_yn: s!("A"),
        }
    }
}

impl SearchParams {
    pub fn set_req(&mut self, req: impl Into<String>) -> &mut Self {
        self.s_savename = req.into();
        self
    }

    pub fn student_id(&self) -> &str {
        &self.cst_card_no
    }

    pub fn set_student_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.cst_card_no = id.into();
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.cst_no
    }

    pub fn set_customer_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.cst_no = id.into();
        self
    }

    pub fn set_page_num(&mut self, num: impl Into<String>) -> &mut Self {
        self.page_no = num.into();
        self
    }

    pub fn page_size(&self) -> &str {
        &self.page_size
    }

    pub fn set_page_size(&mut self, size: impl Into<String>) -> &mut Self {
        self.page_size = size.into();
        self
    }

    /// `(010, 1234, 5678)`
    pub fn phone_number(&self) -> (&str, &str, &str) {
        (&self.hp_no1, &self.hp_no2, &self.hp_no3)
    }

    pub fn set_phone_number(&mut self, a: &str, b: &str, c: &str) -> &mut Self {
        self.hp_no1 = s!(a);
        self.hp_no2 = s!(b);
        self.hp_no3 = s!(c);
        self
    }
}

impl SheetParams for SearchParams {
    fn req(&self) -> &str {
        &self.s_savename
    }

    fn page_num(&self) -> &str {
        &self.page_no
    }
}

/// Point history of one member (`master.cust.cust020_cst_info`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementParams {
    #[serde(rename = "S_CONTROLLER")]
    pub s_controller: String,
    #[serde(rename = "S_METHOD")]
    pub s_method: String,
    #[serde(rename = "S_SAVENAME")]
    pub s_savename: String,
    #[serde(rename = "SHEETSEQ")]
    pub sheetseq: String,
    #[serde(rename = "CST_NO")]
    pub cst_no: String,
    pub page_no: String,
    pub page_no2: String,
    pub page_size: String,
    pub page_size2: String,
}

impl Default for StatementParams {
    fn default() -> Self {
        Self {
            s_controller: s!("master.cust.cust020_cst_info"),
            s_method: s!("search"),
            s_savename: s!("CHG_DATE|SALE_DATE|CHG_FG|POINT|REMARK"),
            sheetseq: s!("2"),
            cst_no: s!(),
            page_no: s!("1"),
            page_no2: s!("1"),
            page_size: s!("2000"),
            page_size2: s!("2000"),
        }
    }
}

impl StatementParams {
    pub fn set_req(&mut self, req: impl Into<String>) -> &mut Self {
        self.s_savename = req.into();
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.cst_no
    }

    pub fn set_customer_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.cst_no = id.into();
        self
    }

    pub fn set_page_num(&mut self, num: impl Into<String>) -> &mut Self {
        self.page_no = num.into();
        self
    }

    pub fn page_size(&self) -> &str {
        &self.page_size
    }

    pub fn set_page_size(&mut self, size: impl Into<String>) -> &mut Self {
        self.page_size = size.into();
        self
    }
}

impl SheetParams for StatementParams {
    fn req(&self) -> &str {
        &self.s_savename
    }

    fn page_num(&self) -> &str {
        &self.page_no
    }
}
