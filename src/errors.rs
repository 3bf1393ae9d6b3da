use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything the fetch / validate / store pipeline can fail with.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Network(NetworkFailure),
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),
    #[error("Empty response received")]
    EmptyResponse,
    #[error("Snapshot not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Details of a request that could not be completed or came back with an
/// error status. The body is kept so callers can show what the server said.
#[derive(Debug)]
pub struct NetworkFailure {
    pub message: String,
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl Display for NetworkFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Request failed: {}", self.message)?;
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            write!(f, "\nResponse: {}", body)?;
        }
        Ok(())
    }
}

impl FetchError {
    pub fn network<S: Into<String>>(message: S) -> FetchError {
        return FetchError::Network(NetworkFailure {
            message: message.into(),
            status: None,
            body: None,
        });
    }

    pub fn http_status<S: Into<String>>(message: S, status: u16, body: Option<String>) -> FetchError {
        return FetchError::Network(NetworkFailure {
            message: message.into(),
            status: Some(status),
            body,
        });
    }

    pub fn filesystem<P: Into<PathBuf>>(path: P, source: io::Error) -> FetchError {
        return FetchError::Filesystem {
            path: path.into(),
            source,
        };
    }

    /// Status code of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Network(failure) => failure.status,
            _ => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
