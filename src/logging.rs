use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context as _};
use chrono::Local;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::config::{Config, LogFormat};

/// Installs the global subscriber. Logs go to stderr and, when
/// `[logging].file` is set, also to a size-capped daily file in that directory.
pub fn init(config: &Config, cli_level: Option<&str>) -> anyhow::Result<()> {
    let level = level_filter(config, cli_level)?;
    let log_dir = config.logging.as_ref().and_then(|l| l.file.as_deref());

    let writer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let path = log_file_path(dir);
            let (max_bytes, backups) = config.log_rotation();
            let file = RotatingFile::open(path.clone(), max_bytes, backups)
                .with_context(|| format!("open log file {}", path.display()))?;
            BoxMakeWriter::new(io::stderr.and(Mutex::new(file)))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let installed = match config.log_format() {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(writer)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(log_dir.is_none())
            .with_writer(writer)
            .pretty()
            .try_init(),
    };
    return installed.map_err(|e| anyhow!("could not install log subscriber: {}", e));
}

pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(format!("urlfetch_{}.log", Local::now().format("%Y%m%d")))
}

/// `--log-level` wins over `[logging].level`; neither means info.
fn level_filter(config: &Config, cli_level: Option<&str>) -> anyhow::Result<LevelFilter> {
    let configured = config.logging.as_ref().and_then(|l| l.level.as_deref());
    let level = match cli_level.or(configured) {
        Some(level) => level.trim().to_ascii_lowercase(),
        None => return Ok(LevelFilter::INFO),
    };
    return match level.as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        _ => Err(anyhow!("{} is a unknown log level", level)),
    };
}

/// Append-only log file that rolls over once a write would take it past
/// `max_bytes`. Older contents move to `<file>.1` .. `<file>.<backups>`, the
/// oldest falling off the end. Without backups the file starts over empty.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: u32,
    file: File,
    len: u64,
}

impl RotatingFile {
    pub fn open(path: PathBuf, max_bytes: u64, backups: u32) -> io::Result<RotatingFile> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let len = file.metadata()?.len();
        return Ok(RotatingFile {
            path,
            max_bytes,
            backups,
            file,
            len,
        });
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups > 0 {
            for n in (1..self.backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.len = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.len > 0 && self.len + buf.len() as u64 > self.max_bytes {
            self.roll_over()?;
        }
        let written = self.file.write(buf)?;
        self.len += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
