// tests/transport.rs
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use biblebot::core::{Body, HttpClient, PostCondition};
use biblebot::engine::login;
use biblebot::sites::intranet;
use biblebot::{BodyEncoding, Cookies, Error, RequestOptions, Response, Result};

use common::{client, page, ScriptedBackend};
use tokio::net::TcpListener;

#[tokio::test]
async fn client_errors_are_raised() {
    let (client, _) = client([page(404, "<h1>Not Found</h1>")]);
    let err = client.get("https://x.test/a", &Cookies::new(), &RequestOptions::default()).await.unwrap_err();
    match err {
        Error::Client { status, response } => {
            assert_eq!(status, 404);
            assert_eq!(response.url, "https://x.test/a");
        }
        other => panic!("expected client error, got {other:?}"),
    }
}

#[tokio::test]
async fn overloaded_login_surfaces_as_server_error() {
    let (client, _) = client([page(503, "<h2>Service Unavailable</h2><p>busy</p>")]);
    let err = login(&intranet::Login, &client, "a", "b", &RequestOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Server { status: 503, .. }));
}

#[tokio::test]
async fn redirects_pass_through() {
    let (client, _) = client([page(302, "")]);
    let r = client.get("https://x.test/", &Cookies::new(), &RequestOptions::default()).await.unwrap();
    assert_eq!(r.status, 302);
}

struct Counting(Arc<AtomicUsize>);

impl PostCondition for Counting {
    fn check(&self, _: &Response) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn extra_postconditions_run_after_status_check() {
    let hits = Arc::new(AtomicUsize::new(0));
    let backend = ScriptedBackend::new([page(200, "ok"), page(500, "boom")]);
    let client = HttpClient::new(backend).with_postcondition(Counting(hits.clone()));

    client.get("https://x.test/1", &Cookies::new(), &RequestOptions::default()).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // status check fails first; later checks never see the response
    assert!(client.get("https://x.test/2", &Cookies::new(), &RequestOptions::default()).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn options_reach_the_backend() {
    let (client, backend) = client([page(200, "ok")]);
    let opts = RequestOptions::default()
        .header("X-Test", "1")
        .timeout(5.0)
        .verify(false)
        .allow_redirects(false)
        .body_encoding(BodyEncoding::Json);
    let cookies: Cookies = [("a".to_string(), "b".to_string())].into_iter().collect();
    client.post("https://x.test/p", Body::fields([("k", "v")]), &cookies, &opts).await.unwrap();

    let sent = backend.requests().remove(0);
    assert_eq!(sent.headers.get("x-test"), Some("1"));
    assert_eq!(sent.timeout, 5.0);
    assert!(!sent.verify);
    assert!(!sent.allow_redirects);
    assert_eq!(sent.body_encoding, BodyEncoding::Json);
    assert_eq!(sent.cookies, cookies);

    let (bytes, ct) = sent.body.unwrap().encode(sent.body_encoding).unwrap();
    assert_eq!(ct, Some("application/json"));
    assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"k":"v"}"#);
}

#[tokio::test]
async fn silent_server_times_out() {
    // accepts the connection, then never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        std::future::pending::<()>().await;
    });

    let url = format!("http://{addr}/slow");
    let opts = RequestOptions::default().timeout(0.2);
    let err = HttpClient::default().get(&url, &Cookies::new(), &opts).await.unwrap_err();
    assert!(err.is_request_error());
    match err {
        Error::Timeout { url: got, seconds } => {
            assert_eq!(got, url);
            assert_eq!(seconds, 0.2);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn default_timeout_applies() {
    assert_eq!(RequestOptions::default().effective_timeout(), 30.0);
}
