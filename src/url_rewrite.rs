use std::fmt::Debug;

use regex::Regex;
use reqwest::Url;

pub const DEFAULT_PATTERN: &str = "/browse";
pub const DEFAULT_REPLACEMENT: &str = "/secure/titles";

/// Rewrites the path component of an url before it is sent.
/// Returns `None` when the rule does not apply.
pub trait PathRewrite: Debug + Send + Sync {
    fn rewrite(&self, path: &str) -> Option<String>;
}

/// Replaces the first occurrence of a fixed string.
#[derive(Debug)]
pub struct LiteralRewrite {
    text: String,
    substitution: String,
}

impl LiteralRewrite {
    pub fn new<S1: Into<String>, S2: Into<String>>(text: S1, substitution: S2) -> Self {
        LiteralRewrite {
            text: text.into(),
            substitution: substitution.into(),
        }
    }
}

impl PathRewrite for LiteralRewrite {
    fn rewrite(&self, path: &str) -> Option<String> {
        if self.text.is_empty() || !path.contains(&self.text) {
            return None;
        }
        Some(path.replacen(&self.text, &self.substitution, 1))
    }
}

/// Replaces the first match of a regular expression; `$1` style group
/// references are expanded in the substitution.
#[derive(Debug)]
pub struct RegexRewrite {
    pattern: Regex,
    substitution: String,
}

impl RegexRewrite {
    pub fn new<S: Into<String>>(pattern: Regex, substitution: S) -> Self {
        RegexRewrite {
            pattern,
            substitution: substitution.into(),
        }
    }
}

impl PathRewrite for RegexRewrite {
    fn rewrite(&self, path: &str) -> Option<String> {
        if !self.pattern.is_match(path) {
            return None;
        }
        Some(self.pattern.replace(path, self.substitution.as_str()).into_owned())
    }
}

/// Ordered rewrite rules. Every rule sees the output of the previous one.
#[derive(Debug)]
pub struct RewriteRules {
    rules: Vec<Box<dyn PathRewrite>>,
}

impl RewriteRules {
    /// No rewriting at all.
    pub fn none() -> Self {
        RewriteRules { rules: Vec::new() }
    }

    pub fn literal<S1: Into<String>, S2: Into<String>>(mut self, text: S1, substitution: S2) -> Self {
        self.rules
            .push(Box::new(LiteralRewrite::new(text, substitution)));
        self
    }

    pub fn regex<S: Into<String>>(mut self, pattern: Regex, substitution: S) -> Self {
        self.rules
            .push(Box::new(RegexRewrite::new(pattern, substitution)));
        self
    }

    pub fn push<R: PathRewrite + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the rules to the path of `url`, leaving scheme, host, query
    /// and fragment alone. Returns the new url only if something changed.
    /// Input that does not parse as an absolute url is rewritten as a whole.
    pub fn apply(&self, url: &str) -> Option<String> {
        if self.rules.is_empty() {
            return None;
        }

        match Url::parse(url) {
            Ok(mut parsed) => {
                let path = self.rewrite_path(parsed.path())?;
                parsed.set_path(&path);
                Some(parsed.to_string())
            }
            Err(_) => self.rewrite_path(url),
        }
    }

    fn rewrite_path(&self, path: &str) -> Option<String> {
        let mut current = path.to_string();
        let mut changed = false;
        for rule in &self.rules {
            if let Some(next) = rule.rewrite(&current) {
                changed |= next != current;
                current = next;
            }
        }
        if changed {
            Some(current)
        } else {
            None
        }
    }
}

impl Default for RewriteRules {
    /// The `/browse` → `/secure/titles` api convention.
    fn default() -> Self {
        RewriteRules::none().literal(DEFAULT_PATTERN, DEFAULT_REPLACEMENT)
    }
}
