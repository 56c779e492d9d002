// src/core/mod.rs

pub mod backend;
pub mod date;
pub mod headers;
pub mod html;
pub mod net;
pub mod response;
pub mod sanitize;
pub mod semester;

pub use backend::ReqwestBackend;
pub use headers::{Cookies, Headers};
pub use html::Table;
pub use net::{Backend, Body, HttpClient, Method, PostCondition, Request, StatusCheck};
pub use response::Response;
pub use semester::{LmsSemester, SemesterConverter, SemesterData, SemesterStyle};
