//! Error taxonomy for hub-binding.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::filter::FilterError;

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error kinds callers discriminate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    BadRequest,
    EmptyBody,
    Network,
    Rest,
}

impl ErrorKind {
    /// Map a non-2xx status to its kind; `None` below 400.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            0..400 => None,
            400 => Some(Self::BadRequest),
            401 | 403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            _ => Some(Self::Rest),
        }
    }

    /// Whether `err`, or anything it wraps, is of this kind.
    pub fn is(self, err: &(dyn StdError + 'static)) -> bool {
        let mut next = Some(err);
        while let Some(e) = next {
            let kind = if let Some(e) = e.downcast_ref::<Error>() {
                e.kind()
            } else if let Some(e) = e.downcast_ref::<RestError>() {
                Some(e.kind)
            } else if e.is::<NetworkError>() {
                Some(Self::Network)
            } else {
                None
            };
            if kind == Some(self) {
                return true;
            }
            next = e.source();
        }
        false
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Forbidden => "forbidden",
            Self::BadRequest => "bad request",
            Self::EmptyBody => "empty body",
            Self::Network => "network",
            Self::Rest => "rest",
        };
        f.write_str(name)
    }
}

/// Non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestError {
    pub kind: ErrorKind,
    pub status: u16,
    pub method: String,
    pub path: String,
    /// Server supplied reason, when the body carried one.
    pub reason: Option<String>,
}

impl RestError {
    pub fn new(status: StatusCode, method: &str, path: &str) -> Self {
        Self {
            kind: ErrorKind::from_status(status).unwrap_or(ErrorKind::Rest),
            status: status.as_u16(),
            method: method.to_string(),
            path: path.to_string(),
            reason: None,
        }
    }

    /// Attach the reason found in a response body.
    ///
    /// A JSON object with an `error` field contributes that field; any
    /// other non-blank body is used verbatim.
    pub fn with_body(mut self, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if text.is_empty() {
            return self;
        }
        let reason = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => match map.get("error") {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => text.to_string(),
            },
            _ => text.to_string(),
        };
        self.reason = Some(reason);
        self
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed: {} ({})", self.method, self.path, self.kind, self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

impl StdError for RestError {}

/// Transient send failure (refused, reset, timed out).
///
/// Cloned so the same value can be returned while the client is latched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} {path}: network error: {reason}")]
pub struct NetworkError {
    pub method: String,
    pub path: String,
    pub reason: String,
}

impl NetworkError {
    pub fn new(method: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("{method} {path}: empty body (status {status})")]
    EmptyBody {
        status: u16,
        method: String,
        path: String,
    },

    #[error("invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] hub_archive::Error),

    #[error("not a regular file: {path}")]
    NotRegularFile { path: PathBuf },

    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("request failed: {0}")]
    Request(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy kind, when the error belongs to it.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rest(e) => Some(e.kind),
            Self::Network(_) => Some(ErrorKind::Network),
            Self::EmptyBody { .. } => Some(ErrorKind::EmptyBody),
            _ => None,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        kind.is(self)
    }

    pub fn is_not_found(&self) -> bool {
        self.is(ErrorKind::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        self.is(ErrorKind::Conflict)
    }
}
