use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

use crate::errors::{FetchError, FetchResult};
use crate::http_request::HttpRequest;
use crate::logger::{self, Logger};
use crate::url_rewrite::RewriteRules;

/// What came back from the server, before any JSON handling.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Url the request was actually sent to, after rewriting.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends exactly one request per call. No retries; redirects follow the
/// client's default policy.
pub struct Fetcher {
    client: Client,
    rewrites: RewriteRules,
    logger: Arc<dyn Logger>,
}

impl Fetcher {
    pub fn new() -> FetchResult<Fetcher> {
        let client = Client::builder()
            .build()
            .map_err(|e| FetchError::network(format!("could not build http client: {}", e)))?;
        return Ok(Fetcher {
            client,
            rewrites: RewriteRules::default(),
            logger: logger::noop(),
        });
    }

    pub fn with_rewrites(mut self, rewrites: RewriteRules) -> Fetcher {
        self.rewrites = rewrites;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Fetcher {
        self.logger = logger;
        self
    }

    /// Url the request for `url` will be sent to.
    pub fn target_url(&self, url: &str) -> String {
        match self.rewrites.apply(url) {
            Some(rewritten) => {
                self.logger
                    .info(&format!("Rewriting URL for the API: {}", rewritten));
                rewritten
            }
            None => url.to_string(),
        }
    }

    pub fn fetch(&self, request: &HttpRequest, timeout: Duration) -> FetchResult<RawResponse> {
        let target = self.target_url(&request.url);
        let uri = target
            .parse::<Url>()
            .map_err(|e| FetchError::InvalidRequest(format!("{} @ '{}'", e, target)))?;
        let headers = header_map(&request.headers)?;

        let names: Vec<&str> = request.headers.iter().map(|(k, _)| k.as_str()).collect();
        self.logger.info(&format!(
            "Making {} request to {} with headers: {:?}",
            request.method, uri, names
        ));

        let response = self
            .client
            .request(request.method.to_reqwest(), uri.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .map_err(|e| self.transport_error(e, timeout))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let kind = if status.is_client_error() { "Client" } else { "Server" };
            let message = format!(
                "{} {} Error: {} for url: {}",
                status.as_u16(),
                kind,
                status.canonical_reason().unwrap_or("Unknown"),
                uri
            );
            let body = response.text().ok();
            let err = FetchError::http_status(message, status.as_u16(), body);
            self.logger.error(&err.to_string());
            return Err(err);
        }

        let raw = into_raw_response(target, response).map_err(|e| self.transport_error(e, timeout))?;
        self.logger.info(&format!(
            "Request successful with status code: {}",
            raw.status
        ));
        return Ok(raw);
    }

    fn transport_error(&self, e: reqwest::Error, timeout: Duration) -> FetchError {
        let err = if e.is_builder() {
            FetchError::InvalidRequest(e.to_string())
        } else if e.is_timeout() {
            FetchError::network(format!("timed out after {}s: {}", timeout.as_secs(), e))
        } else {
            FetchError::network(e.to_string())
        };
        self.logger.error(&err.to_string());
        err
    }
}

fn header_map(headers: &[(String, String)]) -> FetchResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| FetchError::InvalidRequest(format!("invalid header name '{}'", key)))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            FetchError::InvalidRequest(format!("invalid value for header '{}'", key))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

fn into_raw_response(url: String, response: Response) -> Result<RawResponse, reqwest::Error> {
    let status = response.status().as_u16();
    // header values with opaque bytes are skipped
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let body = response.text()?;
    Ok(RawResponse {
        url,
        status,
        headers,
        body,
    })
}
