use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("command failed: {command} (exit {status:?}): {output}")]
    Command {
        command: String,
        status: Option<i32>,
        output: String,
    },

    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("URL not valid: {0}")]
    InvalidUrl(String),

    #[error("http URL used with {setting} = false: {url}")]
    Insecure { url: String, setting: &'static str },

    #[error("setting not found: {0}")]
    SettingNotFound(String),

    #[error("{0}: must be a directory")]
    NotDirectory(PathBuf),

    #[error("{0}: must be empty")]
    NotEmpty(PathBuf),

    #[error("credential store not created: {0}")]
    CredentialStore(PathBuf),

    #[error("revision not found in: {0}")]
    Revision(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
