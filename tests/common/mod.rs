// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use biblebot::core::{Backend, Body, Cookies, HttpClient, Method, Request, Response};
use biblebot::Result;

pub const DATE: &str = "Mon, 12 Aug 2019 03:00:00 GMT";
pub const DATE_EPOCH: i64 = 1565578800;

/// Replays canned responses in order and records every request it saw.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    replies: Arc<Mutex<VecDeque<Response>>>,
    seen: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = Response>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            seen: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn request(&self, request: &Request) -> Result<Response> {
        self.seen.lock().unwrap().push(request.clone());
        let mut reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply for {}", request.url));
        if reply.url.is_empty() {
            reply.url = request.url.clone();
        }
        Ok(reply)
    }
}

/// Client plus a handle on its backend for inspecting traffic afterwards.
pub fn client(replies: impl IntoIterator<Item = Response>) -> (HttpClient, ScriptedBackend) {
    let backend = ScriptedBackend::new(replies);
    (HttpClient::new(backend.clone()), backend)
}

/// HTML page served at whatever url was requested.
pub fn page(status: u16, body: &str) -> Response {
    Response::html(status, "", body)
}

/// Response carrying the fixed `date` header and the given cookies.
pub fn dated(status: u16, body: &str, cookies: &[(&str, &str)]) -> Response {
    let mut r = page(status, body);
    r.headers.insert("date", DATE);
    r.cookies = cookies.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<Cookies>();
    r
}

pub fn redirect(location: &str) -> Response {
    let mut r = dated(302, "", &[]);
    r.headers.insert("location", location);
    r
}

pub fn image(bytes: &[u8]) -> Response {
    Response::new(200, "", "OK", [("content-type", "image/png")], bytes.to_vec(), Cookies::new())
}

/// Form fields of a recorded request, if it carried any.
pub fn form(request: &Request) -> Option<&std::collections::BTreeMap<String, String>> {
    match &request.body {
        Some(Body::Fields(f)) => Some(f),
        _ => None,
    }
}
