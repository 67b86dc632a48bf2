use {skillport_common::FromMessage, skillport_remote::RemoteError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Fs(#[from] skillport_common::Error),
    #[error(transparent)]
    Skills(#[from] skillport_skills::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("plan file version {found} is not supported (expected {expected})")]
    PlanVersion { expected: u32, found: String },
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
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skillport_common::impl_context!();
