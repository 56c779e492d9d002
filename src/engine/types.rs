// src/engine/types.rs
//! Result envelope returned by every parser.
//!
//! A parse yields exactly one of:
//! - [`ResourceData`]: the extracted record, the url it came from and a free
//!   form `meta` map (pagination, selected/selectable terms, ...).
//! - [`ErrorData`]: an *expected* failure reported by the site (wrong
//!   password, expired session, nothing to show) with a human readable title.
//!
//! Both serialize to the shape API consumers already know:
//! `{"data": ..., "link": ..., "meta": {...}}` / `{"error": {...}, "link": ..., "meta": {...}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SemesterData;

pub type Meta = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceData<T> {
    pub data: T,
    pub link: String,
    #[serde(default)]
    pub meta: Meta,
}

impl<T> ResourceData<T> {
    pub fn new(data: T, link: impl Into<String>) -> Self {
        Self { data, link: link.into(), meta: Meta::new() }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(s!(key), value.into());
        self
    }

    /// Adds `selected` and `selectable`.
    pub fn with_semester(self, semester: &SemesterData) -> Self {
        self.with_meta("selected", semester.selected.clone())
            .with_meta("selectable", semester.selectable.clone())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResourceData<U> {
        ResourceData { data: f(self.data), link: self.link, meta: self.meta }
    }
}

/// Body of an [`ErrorData`]. Empty optional parts are left out when serialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub title: String,

    /// Every `alert(...)` message found on the page, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alert_messages: Vec<String>,

    /// Site-specific error code (`errorcode=3`, `ErrorCode=1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub error: ErrorDetail,
    pub link: String,
    #[serde(default)]
    pub meta: Meta,
}

impl ErrorData {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail { title: title.into(), ..Default::default() },
            link: link.into(),
            meta: Meta::new(),
        }
    }

    pub fn alerts(mut self, alerts: Vec<String>) -> Self {
        self.error.alert_messages = alerts;
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.error.message = Some(message.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.error.title
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Resource(ResourceData<T>),
    Error(ErrorData),
}

impl<T> ApiResponse<T> {
    pub fn is_resource(&self) -> bool {
        matches!(self, ApiResponse::Resource(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error(_))
    }

    pub fn resource(&self) -> Option<&ResourceData<T>> {
        match self {
            ApiResponse::Resource(r) => Some(r),
            ApiResponse::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorData> {
        match self {
            ApiResponse::Error(e) => Some(e),
            ApiResponse::Resource(_) => None,
        }
    }

    pub fn into_resource(self) -> Option<ResourceData<T>> {
        match self {
            ApiResponse::Resource(r) => Some(r),
            ApiResponse::Error(_) => None,
        }
    }

    /// Shortcut for `resource().map(|r| &r.data)`.
    pub fn data(&self) -> Option<&T> {
        self.resource().map(|r| &r.data)
    }

    pub fn link(&self) -> &str {
        match self {
            ApiResponse::Resource(r) => &r.link,
            ApiResponse::Error(e) => &e.link,
        }
    }

    pub fn meta(&self) -> &Meta {
        match self {
            ApiResponse::Resource(r) => &r.meta,
            ApiResponse::Error(e) => &e.meta,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        match self {
            ApiResponse::Resource(r) => ApiResponse::Resource(r.map(f)),
            ApiResponse::Error(e) => ApiResponse::Error(e),
        }
    }
}

impl<T> From<ResourceData<T>> for ApiResponse<T> {
    fn from(r: ResourceData<T>) -> Self {
        ApiResponse::Resource(r)
    }
}

impl<T> From<ErrorData> for ApiResponse<T> {
    fn from(e: ErrorData) -> Self {
        ApiResponse::Error(e)
    }
}
