// src/core/date.rs

use chrono::NaiveDateTime;

use crate::core::Response;
use crate::error::{Error, Result};

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// `"Sun, 06 Nov 1994 08:49:37 GMT"` → seconds since the Unix epoch.
pub fn httpdate_to_unixtime(date: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(date.trim(), HTTP_DATE)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Issue time of a login response, read from its `date` header.
pub fn issued_at(response: &Response) -> Result<i64> {
    let date = response
        .header("date")
        .ok_or_else(|| Error::parsing("date header missing", response))?;
    httpdate_to_unixtime(date)
        .ok_or_else(|| Error::parsing(format!("unreadable date header: {date}"), response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc1123_dates() {
        assert_eq!(httpdate_to_unixtime("Sun, 06 Nov 1994 08:49:37 GMT"), Some(784111777));
        assert_eq!(httpdate_to_unixtime(" Thu, 01 Jan 1970 00:00:00 GMT "), Some(0));
        assert_eq!(httpdate_to_unixtime("yesterday"), None);
    }

    #[test]
    fn issued_at_needs_a_date_header() {
        let r = Response::html(302, "https://x.test", "");
        assert!(matches!(issued_at(&r), Err(Error::Parsing { .. })));

        let mut r = r;
        r.headers.insert("Date", "Mon, 12 Aug 2019 03:00:00 GMT");
        assert_eq!(issued_at(&r).unwrap(), 1565578800);
    }
}
