use std::path::PathBuf;

use thiserror::Error;

use super::filters::FilterId;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Media '{media}' can no longer be resolved: {reason}")]
    UnresolvableReference { media: String, reason: String },

    #[error("Storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("An edit is already in progress")]
    SessionBusy,

    #[error("Transcoder failed with return code {0}")]
    TranscodeFailed(i32),

    #[error("No filter at catalog position {0}")]
    UnknownFilter(usize),

    #[error("Filter '{0}' cannot be applied")]
    FilterNotSelectable(FilterId),
}

impl EditError {
    pub fn unresolvable(media: impl Into<String>, reason: impl Into<String>) -> Self {
        EditError::UnresolvableReference {
            media: media.into(),
            reason: reason.into(),
        }
    }

    /// Transcoder return code, for failures that came from the transcoder
    pub fn code(&self) -> Option<i32> {
        match self {
            EditError::TranscodeFailed(code) => Some(*code),
            _ => None,
        }
    }
}
