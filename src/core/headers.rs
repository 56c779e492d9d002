// src/core/headers.rs
// Header and cookie maps shared by requests and responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cookie jar passed explicitly between calls (name → value).
pub type Cookies = BTreeMap<String, String>;

/// Header map with ASCII-lowercased keys.
///
/// Keys are folded on insert *and* on lookup, so `get("Content-Type")` and
/// `get("content-type")` hit the same entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert, replacing any previous value for the same (case-folded) name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    /// Merge `other` on top of `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: &Headers) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut h = Headers::new();
        for (k, v) in iter {
            h.insert(k.as_ref(), v);
        }
        h
    }
}

impl std::ops::Index<&str> for Headers {
    type Output = str;

    /// Panics when the header is absent, like `HashMap` indexing.
    fn index(&self, name: &str) -> &str {
        match self.get(name) {
            Some(v) => v,
            None => panic!("header `{name}` not present"),
        }
    }
}

/// Render a cookie map as a `Cookie:` request header value.
pub fn cookie_header(cookies: &Cookies) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    let pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
    Some(pairs.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_fold_on_insert_and_lookup() {
        let h: Headers = [("Content-Type", "text/html"), ("Location", "/x")].into_iter().collect();
        assert_eq!(h.get("content-type"), Some("text/html"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(&h["location"], "/x");
        assert!(h.contains("LOCATION"));
        assert!(!h.contains("date"));
    }

    #[test]
    fn later_insert_wins() {
        let mut h = Headers::new();
        h.insert("Referer", "a");
        h.insert("referer", "b");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("Referer"), Some("b"));
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let mut c = Cookies::new();
        assert_eq!(cookie_header(&c), None);
        c.insert(s!("ASP.NET_SessionId"), s!("abc"));
        c.insert(s!("MoodleSession"), s!("xyz"));
        assert_eq!(
            cookie_header(&c).as_deref(),
            Some("ASP.NET_SessionId=abc; MoodleSession=xyz")
        );
    }
}
