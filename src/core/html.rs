// src/core/html.rs
//! DOM helpers shared by the site parsers.
//!
//! Parsers hold one `scraper::Html` per parse and pass it (or an element in it)
//! to these helpers. Text is always read the same way: all descendant text
//! nodes concatenated, whitespace collapsed, trimmed ([`text_of`]).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::core::Response;
use crate::core::sanitize::normalize_ws;
use crate::error::{Error, Result};

/// Header cells plus row-major body cells.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub head: Vec<String>,
    pub body: Vec<Vec<String>>,
}

impl Table {
    /// Drop column `index` from the head and every row. `false` when the
    /// table is narrower than that.
    pub fn remove_column(&mut self, index: usize) -> bool {
        if index >= self.head.len() || self.body.iter().any(|r| index >= r.len()) {
            return false;
        }
        self.head.remove(index);
        for row in &mut self.body {
            row.remove(index);
        }
        true
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.head.iter().position(|h| h == name)
    }
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::Selector(s!(css)))
}

/// First match of `css` below `scope`.
pub fn find<'a>(scope: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).next())
}

/// Every match of `css` below `scope`, in document order.
pub fn find_all<'a>(scope: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).collect())
}

/// Whitespace-normalized text of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

/// Text of the first match, or `None` when nothing matches.
pub fn find_text(scope: ElementRef<'_>, css: &str) -> Result<Option<String>> {
    Ok(find(scope, css)?.map(text_of))
}

pub fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value().attr(name).map(str::to_string)
}

/// Descendant elements named `tag` (lower-case), without a selector.
pub fn elements<'a>(scope: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// `true` for a row made only of `th` cells (a sub-heading inside a body).
pub fn is_heading_row(tr: ElementRef<'_>) -> bool {
    elements(tr, "th").next().is_some() && elements(tr, "td").next().is_none()
}

/// Read a head container (`th` cells) and a body container (`tr` rows of `td`).
///
/// Fails when either container is missing, or when a body row does not have
/// exactly as many `td` cells as the head has columns. Rows made only of `th`
/// cells are sub-headings and are skipped; any other row without `td` is an
/// error.
pub fn parse_table(
    response: &Response,
    head: Option<ElementRef<'_>>,
    body: Option<ElementRef<'_>>,
) -> Result<Table> {
    let head = head.ok_or_else(|| Error::parsing("table head not found", response))?;
    let body = body.ok_or_else(|| Error::parsing("table body not found", response))?;

    let head: Vec<String> = elements(head, "th").map(text_of).collect();

    let mut rows = Vec::new();
    for (i, tr) in elements(body, "tr").enumerate() {
        if is_heading_row(tr) {
            continue;
        }
        let cells: Vec<String> = elements(tr, "td").map(text_of).collect();
        if cells.len() != head.len() {
            return Err(Error::parsing(
                format!("row {i} has {} cells, head has {} columns", cells.len(), head.len()),
                response,
            ));
        }
        rows.push(cells);
    }

    Ok(Table { head, body: rows })
}

/// Messages passed to `alert(...)` in every `<script>`, in document order.
///
/// Only literal string arguments count: the argument must be wrapped in one
/// matching pair of `'` or `"`, which is stripped. Calls with a variable or
/// an empty literal are skipped.
pub fn extract_alerts(doc: &Html) -> Vec<String> {
    let mut out = Vec::new();
    for script in elements(doc.root_element(), "script") {
        let code: String = script.text().collect();
        for arg in alert_arguments(&code) {
            if let Some(msg) = unquote(arg) {
                if !msg.is_empty() {
                    out.push(s!(msg));
                }
            }
        }
    }
    out
}

/// `name → value` of every `<input type="hidden">` carrying a name.
pub fn extract_hidden_tags(doc: &Html) -> BTreeMap<String, String> {
    elements(doc.root_element(), "input")
        .filter(|el| {
            el.value()
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
        })
        .filter_map(|el| {
            let name = el.value().attr("name")?;
            Some((s!(name), s!(el.value().attr("value").unwrap_or(""))))
        })
        .collect()
}

/// Raw argument text of each `alert ( ... )` call.
///
/// The argument is everything up to the first `)` on the same line, and is at
/// least one character long, so `alert('a(b)')` yields `'a(b`.
fn alert_arguments(code: &str) -> impl Iterator<Item = &str> {
    static ALERT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"alert\s*\((.+?)\)").unwrap());
    ALERT.captures_iter(code).filter_map(|c| c.get(1)).map(|m| m.as_str())
}

fn unquote(arg: &str) -> Option<&str> {
    let arg = arg.trim();
    let first = arg.chars().next()?;
    if arg.len() >= 2 && (first == '\'' || first == '"') && arg.ends_with(first) {
        Some(&arg[1..arg.len() - 1])
    } else {
        None
    }
}
