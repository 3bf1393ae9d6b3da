use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::anyhow;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s.trim().to_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            "patch" => Ok(HttpMethod::Patch),
            _ => Err(anyhow!("{} is a unknown http method", s)),
        };
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One user-issued request. Built fresh for every fetch, never persisted.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    /// Header pairs in the order they should be sent.
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new<S: Into<String>>(url: S, method: HttpMethod) -> HttpRequest {
        return HttpRequest {
            url: url.into(),
            method,
            headers: Vec::new(),
        };
    }

    /// Sets a header, replacing an earlier value for the same name
    /// (compared case-insensitively) while keeping its position.
    pub fn set_header<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> HttpRequest
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.set_header(key, value);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("GET", HttpMethod::Get)]
    #[test_case("post", HttpMethod::Post)]
    #[test_case(" Put ", HttpMethod::Put)]
    #[test_case("delete", HttpMethod::Delete)]
    #[test_case("PATCH", HttpMethod::Patch)]
    fn parses_supported_methods(raw: &str, expected: HttpMethod) {
        assert_eq!(raw.parse::<HttpMethod>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_method() {
        let err = "TRACE".parse::<HttpMethod>().unwrap_err();
        assert!(err.to_string().contains("unknown http method"));
    }

    #[test]
    fn later_headers_override_earlier_ones_case_insensitively() {
        let request = HttpRequest::new("https://example.com", HttpMethod::Get).with_headers(vec![
            ("accept", "text/plain"),
            ("x-test", "1"),
            ("Accept", "application/json"),
        ]);
        assert_eq!(
            request.headers,
            vec![
                ("accept".to_string(), "application/json".to_string()),
                ("x-test".to_string(), "1".to_string()),
            ]
        );
    }
}
