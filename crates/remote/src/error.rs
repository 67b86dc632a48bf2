use skillport_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Another skill already owns this slug.
    #[error("slug '{slug}' is already taken")]
    SlugConflict { slug: String },
    #[error("skill '{id}' not found")]
    NotFound { id: String },
    #[error("remote returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("{message}")]
    Message { message: String },
}

impl RemoteError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_slug_conflict(&self) -> bool {
        matches!(self, Self::SlugConflict { .. })
    }
}

impl FromMessage for RemoteError {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Error = RemoteError;
pub type Result<T> = std::result::Result<T, RemoteError>;

skillport_common::impl_context!();
