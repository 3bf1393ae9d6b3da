//! On-disk snapshots of fetched JSON responses.
//!
//! Every saved response lands at
//! `<root>/<host>/<segment>/.../response_<YYYYMMDD_HHMMSS>.json`, mirroring the
//! url it came from. Files are written once and never replaced: a second save
//! within the same second gets a `_1`, `_2`, ... suffix.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tempfile::{Builder, NamedTempFile};
use walkdir::WalkDir;

use crate::errors::{FetchError, FetchResult};
use crate::logger::{self, Logger};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SNAPSHOT_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^response_(\d{8}_\d{6})(?:_(\d+))?\.json$").expect("snapshot pattern is valid")
});

/// One saved snapshot as reported by [`ResponseStore::list_all`].
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotIndexEntry {
    pub filepath: PathBuf,
    /// `YYYYMMDD_HHMMSS` token taken from the file name.
    pub timestamp: String,
    /// Same-second disambiguation suffix, 0 for the first file of that second.
    pub sequence: u32,
    pub data: Value,
}

/// Result of a best-effort scan: what could be read, plus the snapshot
/// files that were skipped because they failed to load.
#[derive(Debug, Default)]
pub struct SnapshotListing {
    pub entries: Vec<SnapshotIndexEntry>,
    pub skipped: Vec<PathBuf>,
}

pub trait ResponseStore {
    /// Persists `payload` for `url` and returns where it was written.
    fn save(&self, url: &str, payload: &Value) -> FetchResult<PathBuf>;

    fn load(&self, path: &Path) -> FetchResult<Value>;

    /// All snapshots, most recent first. Unreadable files never fail the
    /// listing; they are reported in [`SnapshotListing::skipped`].
    fn list_all(&self) -> FetchResult<SnapshotListing>;
}

pub struct FsResponseStore {
    root: PathBuf,
    logger: Arc<dyn Logger>,
}

impl FsResponseStore {
    /// Opens the store at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> FetchResult<FsResponseStore> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| FetchError::filesystem(root, e))?;
        let root = fs::canonicalize(root).map_err(|e| FetchError::filesystem(root, e))?;

        return Ok(FsResponseStore {
            root,
            logger: logger::noop(),
        });
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> FsResponseStore {
        self.logger = logger;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory snapshots of `url` are kept in. Pure; nothing is created.
    pub fn snapshot_dir(&self, url: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for part in url_components(url) {
            dir.push(part);
        }
        dir
    }

    /// Creates [`Self::snapshot_dir`] for `url`. Safe to call repeatedly.
    pub fn ensure_snapshot_dir(&self, url: &str) -> FetchResult<PathBuf> {
        let dir = self.snapshot_dir(url);
        fs::create_dir_all(&dir).map_err(|e| FetchError::filesystem(&dir, e))?;
        Ok(dir)
    }

    /// Like [`ResponseStore::save`] with an explicit capture time.
    pub fn save_at(
        &self,
        url: &str,
        payload: &Value,
        captured_at: NaiveDateTime,
    ) -> FetchResult<PathBuf> {
        let dir = self.ensure_snapshot_dir(url)?;
        let timestamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
        let contents = to_pretty_json(payload)?;

        let mut staged = Builder::new()
            .prefix(".response_")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| FetchError::filesystem(&dir, e))?;
        write_synced(staged.as_file_mut(), &contents)
            .map_err(|e| FetchError::filesystem(staged.path(), e))?;

        let path = publish(staged, &dir, &timestamp)?;

        self.logger
            .info(&format!("Saved response to {}", path.display()));
        return Ok(path);
    }

    fn parse_file_name(&self, name: &str) -> Option<(String, u32)> {
        let captures = SNAPSHOT_FILE.captures(name)?;
        let timestamp = captures.get(1)?.as_str().to_string();
        let sequence = match captures.get(2) {
            Some(n) => n.as_str().parse().ok()?,
            None => 0,
        };
        Some((timestamp, sequence))
    }
}

impl ResponseStore for FsResponseStore {
    fn save(&self, url: &str, payload: &Value) -> FetchResult<PathBuf> {
        self.save_at(url, payload, Local::now().naive_local())
    }

    fn load(&self, path: &Path) -> FetchResult<Value> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.to_path_buf()),
            _ => FetchError::filesystem(path, e),
        })?;
        serde_json::from_str(&contents).map_err(|e| FetchError::InvalidJson(e.to_string()))
    }

    fn list_all(&self) -> FetchResult<SnapshotListing> {
        fs::create_dir_all(&self.root).map_err(|e| FetchError::filesystem(&self.root, e))?;

        let mut listing = SnapshotListing::default();
        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.logger
                        .error(&format!("Skipping unreadable store entry: {}", e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let (timestamp, sequence) = match self.parse_file_name(&name) {
                Some(parsed) => parsed,
                None => continue,
            };

            match self.load(entry.path()) {
                Ok(data) => listing.entries.push(SnapshotIndexEntry {
                    filepath: entry.path().to_path_buf(),
                    timestamp,
                    sequence,
                    data,
                }),
                Err(e) => {
                    self.logger.error(&format!(
                        "Skipping snapshot {}: {}",
                        entry.path().display(),
                        e
                    ));
                    listing.skipped.push(entry.path().to_path_buf());
                }
            }
        }

        listing.entries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.sequence.cmp(&a.sequence))
                .then_with(|| a.filepath.cmp(&b.filepath))
        });
        listing.skipped.sort();
        Ok(listing)
    }
}

/// Host (with port, as written) followed by the decoded, non-empty path
/// segments of `url`. Input without a scheme is treated as a bare path.
fn url_components(url: &str) -> Vec<String> {
    let mut parts = Vec::new();

    let path = match Url::parse(url.trim()) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let host = match authority(url) {
                Some(given) => given.to_string(),
                None => parsed.host_str().unwrap_or_default().to_string(),
            };
            if let Some(host) = sanitize_segment(&host) {
                parts.push(host);
            }
            parsed.path().to_string()
        }
        _ => url
            .trim()
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let decoded = urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string());
        if let Some(safe) = sanitize_segment(&decoded) {
            parts.push(safe);
        }
    }
    parts
}

// `host[:port]` exactly as typed, without any `user:password@` prefix.
fn authority(url: &str) -> Option<&str> {
    let (_, rest) = url.trim().split_once("://")?;
    let end = rest
        .find(|c: char| matches!(c, '/' | '\\' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    };
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

// A decoded segment must stay a single directory name below the root.
fn sanitize_segment(segment: &str) -> Option<String> {
    let cleaned: String = segment
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

fn to_pretty_json(payload: &Value) -> FetchResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    payload
        .serialize(&mut serializer)
        .map_err(|e| FetchError::InvalidJson(e.to_string()))?;
    Ok(buf)
}

fn write_synced(file: &mut File, contents: &[u8]) -> io::Result<()> {
    file.write_all(contents)?;
    file.sync_all()
}

/// Moves the fully written `staged` file to the first free snapshot name of
/// `timestamp` in `dir`. The move fails instead of replacing an existing
/// file, so a published name is never overwritten. On error the staged file
/// is removed when it is dropped.
fn publish(mut staged: NamedTempFile, dir: &Path, timestamp: &str) -> FetchResult<PathBuf> {
    let mut sequence: u32 = 0;

    loop {
        let candidate = dir.join(snapshot_file_name(timestamp, sequence));
        match staged.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                staged = e.file;
                sequence += 1;
            }
            Err(e) => return Err(FetchError::filesystem(candidate, e.error)),
        }
    }
}

pub fn snapshot_file_name(timestamp: &str, sequence: u32) -> String {
    if sequence == 0 {
        format!("response_{}.json", timestamp)
    } else {
        format!("response_{}_{}.json", timestamp, sequence)
    }
}
