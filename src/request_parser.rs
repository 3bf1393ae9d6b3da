use reqwest::Url;

// Relative inputs such as `example.com/items?page=2` are resolved against
// this so their query component is still reachable.
const FALLBACK_BASE: &str = "http://localhost/";

/// Query parameters of an url, keys in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParameters {
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    /// One `key: value` line per key, showing only the key's first value.
    pub fn summary_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(k, values)| values.first().map(|v| format!("{}: {}", k, v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }
}

/// Decodes the query component of `url`. Repeated keys collect all of their
/// values in order; pairs with an empty value are dropped. Never fails: an
/// url that cannot be parsed at all yields an empty result.
pub fn parse_query_parameters(url: &str) -> QueryParameters {
    let mut params = QueryParameters::default();

    let parsed = match Url::parse(FALLBACK_BASE)
        .ok()
        .and_then(|base| Url::options().base_url(Some(&base)).parse(url.trim()).ok())
    {
        Some(parsed) => parsed,
        None => return params,
    };

    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }
        params.push(key.into_owned(), value.into_owned());
    }
    return params;
}

/// Turns a block of `Name: value` lines into header pairs. Only the first
/// colon separates name from value, both sides are trimmed and lines without
/// a colon are ignored. A repeated name keeps its first position but takes
/// the last value.
pub fn parse_headers(raw_text: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in raw_text.lines() {
        let (key, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };
        let key = key.trim().to_string();
        let value = value.trim().to_string();

        match headers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => headers.push((key, value)),
        }
    }
    return headers;
}
