// src/engine/pipeline.rs
//! fetch → preconditions → parse.
//!
//! A page type implements one fetch capability plus [`Parser`]. Fetching
//! returns the response together with whatever the parser needs to know about
//! how it was requested ([`Fetched::context`]); parsing is pure.
//!
//! Preconditions are plain registries built by each site module
//! (`sites::<site>::preconditions()`), and parsers wrap their body in
//! [`Preconditions::run`], so a blocked response never reaches the body.

use async_trait::async_trait;
use tracing::warn;

use crate::config::RequestOptions;
use crate::core::{Cookies, HttpClient, Response};
use crate::error::Result;

use super::types::{ApiResponse, ErrorData};

/// A check that can stop a response from being parsed.
pub trait Precondition: Send + Sync {
    /// `Some` when the page cannot be parsed (expired session, login redirect).
    fn is_blocking(&self, response: &Response) -> Option<ErrorData>;
}

/// Ordered list of [`Precondition`]s. The first one that blocks wins.
#[derive(Default)]
pub struct Preconditions {
    checks: Vec<Box<dyn Precondition>>,
}

impl Preconditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, check: impl Precondition + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn check(&self, response: &Response) -> Option<ErrorData> {
        let blocked = self.checks.iter().find_map(|c| c.is_blocking(response));
        if let Some(err) = &blocked {
            warn!(url = %response.url, title = %err.error.title, "precondition blocked parse");
        }
        blocked
    }

    /// Run the checks, then `body` only if none of them blocked.
    pub fn run<T>(
        &self,
        response: &Response,
        body: impl FnOnce() -> Result<ApiResponse<T>>,
    ) -> Result<ApiResponse<T>> {
        match self.check(response) {
            Some(err) => Ok(ApiResponse::Error(err)),
            None => body(),
        }
    }
}

/// A response plus what the fetch step learned while producing it.
#[derive(Clone, Debug)]
pub struct Fetched<C = ()> {
    pub response: Response,
    pub context: C,
}

impl<C> Fetched<C> {
    pub fn new(response: Response, context: C) -> Self {
        Self { response, context }
    }

    pub fn parse<P>(&self, page: &P) -> Result<ApiResponse<P::Output>>
    where
        P: Parser<Context = C>,
    {
        page.parse(&self.response, &self.context)
    }
}

impl From<Response> for Fetched<()> {
    fn from(response: Response) -> Self {
        Self { response, context: () }
    }
}

/// Turns one kind of page into an envelope.
pub trait Parser {
    /// Fetch-side facts the parse needs (requested term, request params...).
    type Context;
    type Output;

    fn parse(&self, response: &Response, context: &Self::Context) -> Result<ApiResponse<Self::Output>>;
}

/// Pages reached by posting credentials.
#[async_trait]
pub trait LoginFetcher: Parser + Send + Sync {
    async fn fetch(
        &self,
        client: &HttpClient,
        user_id: &str,
        user_pw: &str,
        opts: &RequestOptions,
    ) -> Result<Fetched<Self::Context>>;
}

/// Pages that only need the session cookies.
#[async_trait]
pub trait GeneralFetcher: Parser + Send + Sync {
    async fn fetch(
        &self,
        client: &HttpClient,
        cookies: &Cookies,
        opts: &RequestOptions,
    ) -> Result<Fetched<Self::Context>>;
}

/// Pages that show one academic term at a time. `None` keeps the term the
/// server picks.
#[async_trait]
pub trait SemesterFetcher: Parser + Send + Sync {
    async fn fetch(
        &self,
        client: &HttpClient,
        cookies: &Cookies,
        semester: Option<&str>,
        opts: &RequestOptions,
    ) -> Result<Fetched<Self::Context>>;
}

pub async fn login<P: LoginFetcher>(
    page: &P,
    client: &HttpClient,
    user_id: &str,
    user_pw: &str,
    opts: &RequestOptions,
) -> Result<ApiResponse<P::Output>> {
    page.fetch(client, user_id, user_pw, opts).await?.parse(page)
}

pub async fn scrape_general<P: GeneralFetcher>(
    page: &P,
    client: &HttpClient,
    cookies: &Cookies,
    opts: &RequestOptions,
) -> Result<ApiResponse<P::Output>> {
    page.fetch(client, cookies, opts).await?.parse(page)
}

pub async fn scrape_semester<P: SemesterFetcher>(
    page: &P,
    client: &HttpClient,
    cookies: &Cookies,
    semester: Option<&str>,
    opts: &RequestOptions,
) -> Result<ApiResponse<P::Output>> {
    page.fetch(client, cookies, semester, opts).await?.parse(page)
}
