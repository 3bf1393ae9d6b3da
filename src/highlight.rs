//! Terminal rendering of responses and snapshot listings.

use std::ops::Range;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const KEY: &str = "\x1b[36m";
const STRING: &str = "\x1b[33m";
const NUMBER: &str = "\x1b[32m";
const LITERAL: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<string>"(?:[^"\\]|\\.)*")(?P<colon>\s*:)?|(?P<number>-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)|(?P<boolean>\btrue\b|\bfalse\b)|(?P<null>\bnull\b)"#,
    )
    .expect("token pattern is valid")
});

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TokenKind {
    Key,
    String,
    Number,
    Boolean,
    Null,
}

impl TokenKind {
    fn color(&self) -> &'static str {
        match self {
            TokenKind::Key => KEY,
            TokenKind::String => STRING,
            TokenKind::Number => NUMBER,
            TokenKind::Boolean | TokenKind::Null => LITERAL,
        }
    }
}

/// Pretty-prints `value` with two-space indentation, non-ASCII kept as is.
pub fn to_pretty(value: &Value) -> String {
    // Value always serializes
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Byte ranges of the highlightable tokens in pretty-printed JSON text.
/// Object keys are told apart from string values by the colon after them.
pub fn tokens(text: &str) -> Vec<(TokenKind, Range<usize>)> {
    let mut out = Vec::new();
    for caps in TOKEN.captures_iter(text) {
        let (kind, m) = if let Some(m) = caps.name("string") {
            let kind = if caps.name("colon").is_some() {
                TokenKind::Key
            } else {
                TokenKind::String
            };
            (kind, m)
        } else if let Some(m) = caps.name("number") {
            (TokenKind::Number, m)
        } else if let Some(m) = caps.name("boolean") {
            (TokenKind::Boolean, m)
        } else if let Some(m) = caps.name("null") {
            (TokenKind::Null, m)
        } else {
            continue;
        };
        out.push((kind, m.range()));
    }
    out
}

/// Wraps every token of `text` in its ANSI colour.
pub fn highlight(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut last = 0;
    for (kind, range) in tokens(text) {
        out.push_str(&text[last..range.start]);
        out.push_str(kind.color());
        out.push_str(&text[range.clone()]);
        out.push_str(RESET);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

pub fn render(value: &Value, color: bool) -> String {
    let text = to_pretty(value);
    if color {
        highlight(&text)
    } else {
        text
    }
}

/// `20250327_210714` → `2025-03-27 21:07:14`. A token without a time part
/// is shown as a date; anything unrecognised is returned unchanged.
pub fn format_timestamp(timestamp: &str) -> String {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    match timestamp.split_once('_') {
        Some((date, time)) if date.len() == 8 && digits(date) && time.len() >= 4 && digits(time) => {
            let second = time.get(4..6).unwrap_or("00");
            format!(
                "{}-{}-{} {}:{}:{}",
                &date[0..4],
                &date[4..6],
                &date[6..8],
                &time[0..2],
                &time[2..4],
                second
            )
        }
        None if timestamp.get(..8).map_or(false, digits) => {
            format!("{}-{}-{}", &timestamp[0..4], &timestamp[4..6], &timestamp[6..8])
        }
        _ => timestamp.to_string(),
    }
}

/// Parent directory and file name, e.g. `bar/response_20250327_210714.json`.
pub fn format_filepath(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy())
    {
        Some(parent) => format!("{}/{}", parent, file),
        None => file,
    }
}
