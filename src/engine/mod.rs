// src/engine/mod.rs

pub mod pipeline;
pub mod types;

pub use pipeline::{
    login, scrape_general, scrape_semester, Fetched, GeneralFetcher, LoginFetcher, Parser,
    Precondition, Preconditions, SemesterFetcher,
};
pub use types::{ApiResponse, ErrorData, ErrorDetail, Meta, ResourceData};
