use std::path::PathBuf;

use {skillport_common::FromMessage, skillport_remote::RemoteError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Walkdir(#[from] walkdir::Error),
    #[error(transparent)]
    Fs(#[from] skillport_common::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("invalid skill folder {path}: {reason}")]
    InvalidSkill { path: PathBuf, reason: String },
    #[error("unknown agent '{id}' (known: {known})")]
    UnknownAgent { id: String, known: String },
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_skill(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSkill {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure was a rejected write outside its root.
    #[must_use]
    pub fn is_path_escape(&self) -> bool {
        matches!(self, Self::Fs(inner) if inner.is_path_escape())
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skillport_common::impl_context!();
