// src/lib.rs
//! Async scraping client for the Bible College web portals.
//!
//! ```text
//! sites::<site>::<Page>::fetch → core::HttpClient → Backend
//!                              ↘ Fetched { response, context }
//! engine::Preconditions::run → <Page>::parse → ApiResponse
//! ```
//!
//! Every page type implements one fetch capability ([`engine::LoginFetcher`],
//! [`engine::GeneralFetcher`] or [`engine::SemesterFetcher`]) and
//! [`engine::Parser`]. Parsing is synchronous and never touches the network.

#[macro_use]
pub mod macros;

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod sites;

pub use crate::config::{BodyEncoding, RequestOptions};
pub use crate::core::{Cookies, Headers, HttpClient, Response, SemesterData};
pub use crate::engine::{ApiResponse, ErrorData, ErrorDetail, Fetched, Meta, ResourceData};
pub use crate::error::{Error, Result};
