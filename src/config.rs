use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs};

use anyhow::{bail, Context as _};
use regex::Regex;
use serde::Deserialize;

use crate::http_request::HttpMethod;
use crate::url_rewrite::RewriteRules;

pub const CONFIG_ENV: &str = "URLFETCH_CONFIG";
pub const DEFAULT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_LOG_BACKUPS: u32 = 5;

const DEFAULT_HEADERS: &str = "accept: application/json, text/plain, */*\n\
accept-encoding: gzip, deflate, br\n\
cache-control: no-cache\n\
pragma: no-cache";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store_root: Option<PathBuf>,
    #[serde(default)]
    pub request: RequestConfig,
    /// `None` means the built-in `/browse` rule, an empty list disables rewriting.
    #[serde(default)]
    pub rewrite: Option<Vec<RewriteConfig>>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_method")]
    pub default_method: String,
    #[serde(default = "default_headers")]
    pub default_headers: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_method: default_method(),
            default_headers: default_headers(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_method() -> String {
    "GET".to_string()
}
fn default_headers() -> String {
    DEFAULT_HEADERS.to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RewriteConfig {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub regex: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    /// Directory receiving `urlfetch_<YYYYMMDD>.log`.
    pub file: Option<PathBuf>,
    /// Size at which the log file is rolled over to `.1`.
    pub max_bytes: Option<u64>,
    /// Rolled files kept next to the live one.
    pub backups: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let toml =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&toml).with_context(|| format!("load config {}", path.display()))
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        toml.parse()
    }

    /// Explicit path first, then `$URLFETCH_CONFIG`, otherwise defaults.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_path(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request.timeout_secs == 0 {
            bail!("request.timeout_secs must be > 0");
        }
        if self.logging.as_ref().and_then(|l| l.max_bytes) == Some(0) {
            bail!("logging.max_bytes must be > 0");
        }
        self.default_method()?;
        self.rewrite_rules()?;
        Ok(())
    }

    pub fn log_format(&self) -> LogFormat {
        match self.logging.as_ref().and_then(|l| l.format) {
            Some(format) => format,
            None => LogFormat::Pretty,
        }
    }

    /// `(max_bytes, backups)` for the log file.
    pub fn log_rotation(&self) -> (u64, u32) {
        let logging = self.logging.as_ref();
        (
            logging.and_then(|l| l.max_bytes).unwrap_or(DEFAULT_LOG_MAX_BYTES),
            logging.and_then(|l| l.backups).unwrap_or(DEFAULT_LOG_BACKUPS),
        )
    }

    pub fn default_method(&self) -> anyhow::Result<HttpMethod> {
        self.request
            .default_method
            .parse()
            .context("request.default_method")
    }

    /// Where snapshots go: configured root, else the platform data dir,
    /// else `./responses`.
    pub fn store_root(&self) -> PathBuf {
        if let Some(root) = &self.store_root {
            return root.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join("urlfetch").join("responses"))
            .unwrap_or_else(|| PathBuf::from("responses"))
    }

    pub fn rewrite_rules(&self) -> anyhow::Result<RewriteRules> {
        let rules = match &self.rewrite {
            None => return Ok(RewriteRules::default()),
            Some(rules) => rules,
        };

        let mut out = RewriteRules::none();
        for (i, rule) in rules.iter().enumerate() {
            if rule.pattern.is_empty() {
                bail!("rewrite[{}].pattern must not be empty", i);
            }
            out = if rule.regex {
                let pattern = Regex::new(&rule.pattern)
                    .with_context(|| format!("rewrite[{}].pattern is not a valid regex", i))?;
                out.regex(pattern, rule.replacement.clone())
            } else {
                out.literal(rule.pattern.clone(), rule.replacement.clone())
            };
        }
        Ok(out)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s).context("parse config TOML")?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.request.timeout_secs, 30);
        assert_eq!(config.default_method().unwrap(), HttpMethod::Get);
        assert!(config.request.default_headers.contains("accept: application/json"));
        assert_eq!(config.rewrite_rules().unwrap().len(), 1);
        assert!(config.logging.is_none());
        assert_eq!(config.log_format(), LogFormat::Pretty);
        assert_eq!(config.log_rotation(), (10 * 1024 * 1024, 5));
    }

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml_str(
            r#"
store_root = "/var/lib/urlfetch"

[request]
timeout_secs = 5
default_method = "post"
default_headers = "x-api-key: abc"

[[rewrite]]
pattern = "/browse"
replacement = "/secure/titles"

[[rewrite]]
pattern = '/v(\d+)/'
replacement = "/api/v$1/"
regex = true

[logging]
level = "debug"
format = "json"
file = "/var/log/urlfetch"
max_bytes = 4096
backups = 2
"#,
        )
        .unwrap();

        assert_eq!(config.store_root(), PathBuf::from("/var/lib/urlfetch"));
        assert_eq!(config.request.timeout_secs, 5);
        assert_eq!(config.default_method().unwrap(), HttpMethod::Post);
        let rules = config.rewrite_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.apply("https://example.com/v2/browse/1").as_deref(),
            Some("https://example.com/api/v2/secure/titles/1")
        );
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.log_rotation(), (4096, 2));
        let logging = config.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert_eq!(logging.format, Some(LogFormat::Json));
        assert_eq!(logging.file, Some(PathBuf::from("/var/log/urlfetch")));
    }

    #[test]
    fn empty_rewrite_list_disables_rewriting() {
        let config = Config::from_toml_str("rewrite = []").unwrap();
        assert!(config.rewrite_rules().unwrap().is_empty());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_toml_str("[request]\ntimeout_secs = 0").unwrap_err();
        assert!(format!("{err:#}").contains("timeout_secs"), "{err:#}");
    }

    #[test]
    fn zero_log_size_is_rejected() {
        let err = Config::from_toml_str("[logging]\nmax_bytes = 0").unwrap_err();
        assert!(format!("{err:#}").contains("max_bytes"), "{err:#}");
    }

    #[test]
    fn bad_regex_is_rejected() {
        let err = Config::from_toml_str(
            "[[rewrite]]\npattern = \"(\"\nreplacement = \"x\"\nregex = true",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("rewrite[0]"), "{err:#}");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = Config::from_toml_str("[request]\ndefault_method = \"TRACE\"").unwrap_err();
        assert!(format!("{err:#}").contains("unknown http method"), "{err:#}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("colour = \"dark\"").is_err());
    }
}
