// src/config/consts.rs

// Net config
pub const DEFAULT_REQUEST_TIMEOUT: f64 = 30.0; // seconds

// Site roots (with protocol, no trailing slash)
pub const INTRANET_DOMAIN: &str = "https://kbuis.bible.ac.kr";
pub const LMS_DOMAIN: &str = "https://lms.bible.ac.kr";
pub const LIBRARY_DOMAIN: &str = "https://lib.bible.ac.kr";
pub const KBU_DOMAIN: &str = "https://www.bible.ac.kr";
pub const MILEAGE_DOMAIN: &str = "https://asp.netusys.com";

// Intranet ASP.NET form keys
pub const INTRANET_SEMESTER_KEY: &str = "ctl00$ContentPlaceHolder1$cbo_YearHg";
pub const INTRANET_ACTION_KEY: &str = "ctl00$ContentPlaceHolder1$hidActionMode";
pub const INTRANET_ACTION_SEARCH: &str = "S";

// Mileage login refuses posts without this referer
pub const MILEAGE_REFERER: &str = "https://asp.netusys.com/mobile/login/login_form.jsp?logoutFg=Y";
