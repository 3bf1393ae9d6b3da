mod common;

use std::time::Duration;

use common::{closed_port, spawn_upstream, StubResponse};
use urlfetch::errors::FetchError;
use urlfetch::http_request::{HttpMethod, HttpRequest};
use urlfetch::http_request_executor::Fetcher;
use urlfetch::response_validator::validate;
use urlfetch::url_rewrite::RewriteRules;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn sends_method_and_headers_and_returns_raw_body() {
    let (addr, captured) = spawn_upstream(vec![StubResponse::ok("{\"k\":1}")]);
    let request = HttpRequest::new(format!("http://{addr}/api/items?a=1&a=2"), HttpMethod::Delete)
        .with_headers(vec![("Accept", "*/*"), ("X-Test", "value")]);

    let response = Fetcher::new().unwrap().fetch(&request, TIMEOUT).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "{\"k\":1}");
    assert_eq!(response.header("content-type"), Some("application/json"));

    let seen = captured.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(seen.request_line, "DELETE /api/items?a=1&a=2 HTTP/1.1");
    assert_eq!(seen.header("accept"), Some("*/*"));
    assert_eq!(seen.header("x-test"), Some("value"));
}

#[test]
fn browse_urls_are_sent_to_the_titles_api() {
    let (addr, captured) = spawn_upstream(vec![StubResponse::ok("[1]")]);
    let request = HttpRequest::new(format!("http://{addr}/browse/123?from=browse"), HttpMethod::Get);

    let response = Fetcher::new().unwrap().fetch(&request, TIMEOUT).unwrap();

    assert_eq!(response.url, format!("http://{addr}/secure/titles/123?from=browse"));
    let seen = captured.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(seen.request_line, "GET /secure/titles/123?from=browse HTTP/1.1");
}

#[test]
fn browse_rewrite_can_be_turned_off() {
    let (addr, captured) = spawn_upstream(vec![StubResponse::ok("[1]")]);
    let request = HttpRequest::new(format!("http://{addr}/browse/123"), HttpMethod::Get);

    Fetcher::new()
        .unwrap()
        .with_rewrites(RewriteRules::none())
        .fetch(&request, TIMEOUT)
        .unwrap();

    let seen = captured.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(seen.request_line, "GET /browse/123 HTTP/1.1");
}

#[test]
fn error_status_carries_the_response_body() {
    let (addr, _captured) = spawn_upstream(vec![StubResponse::json(
        404,
        "Not Found",
        "{\"error\":\"no such title\"}",
    )]);
    let request = HttpRequest::new(format!("http://{addr}/titles/9"), HttpMethod::Get);

    let err = Fetcher::new().unwrap().fetch(&request, TIMEOUT).unwrap_err();

    assert_eq!(err.status(), Some(404));
    match &err {
        FetchError::Network(failure) => {
            assert_eq!(failure.body.as_deref(), Some("{\"error\":\"no such title\"}"));
            assert!(failure.message.starts_with("404 Client Error: Not Found for url:"));
        }
        other => panic!("expected network error, got {other:?}"),
    }
    assert!(err.to_string().contains("\nResponse: {\"error\":\"no such title\"}"));
}

#[test]
fn server_errors_are_network_errors() {
    let (addr, _captured) = spawn_upstream(vec![StubResponse::json(503, "Service Unavailable", "")]);
    let request = HttpRequest::new(format!("http://{addr}/"), HttpMethod::Get);

    let err = Fetcher::new().unwrap().fetch(&request, TIMEOUT).unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(
        err.to_string(),
        format!("Request failed: 503 Server Error: Service Unavailable for url: http://{addr}/")
    );
}

#[test]
fn refused_connection_is_a_network_error() {
    let addr = closed_port();
    let request = HttpRequest::new(format!("http://{addr}/"), HttpMethod::Get);

    let err = Fetcher::new().unwrap().fetch(&request, TIMEOUT).unwrap_err();

    assert!(matches!(err, FetchError::Network(_)), "{err}");
    assert_eq!(err.status(), None);
}

#[test]
fn slow_server_hits_the_timeout() {
    let (addr, _captured) =
        spawn_upstream(vec![StubResponse::ok("{\"late\":true}").delayed(Duration::from_secs(3))]);
    let request = HttpRequest::new(format!("http://{addr}/slow"), HttpMethod::Get);

    let err = Fetcher::new()
        .unwrap()
        .fetch(&request, Duration::from_secs(1))
        .unwrap_err();

    assert!(err.to_string().contains("timed out after 1s"), "{err}");
}

#[test]
fn fetched_body_feeds_the_validator() {
    let (addr, _captured) = spawn_upstream(vec![
        StubResponse::ok("{\"title\":\"Kurtlar Vadisi\"}"),
        StubResponse::ok("{}"),
    ]);
    let fetcher = Fetcher::new().unwrap();
    let request = HttpRequest::new(format!("http://{addr}/t"), HttpMethod::Get);

    let good = validate(&fetcher.fetch(&request, TIMEOUT).unwrap()).unwrap();
    assert_eq!(good["title"], "Kurtlar Vadisi");

    let empty = validate(&fetcher.fetch(&request, TIMEOUT).unwrap());
    assert!(matches!(empty, Err(FetchError::EmptyResponse)));
}
