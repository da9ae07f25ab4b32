use std::time::Duration;

use thiserror::Error;

use crate::paging::ValidationError;

/// Outcomes of a card operation other than success.
///
/// `NotFound` covers both a missing card and one owned by someone else.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("card {id} not found")]
    NotFound { id: i64 },

    #[error("{principal} owns no cards")]
    Forbidden { principal: String },

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("store unavailable: {0}")]
    Store(#[from] storage::Error),

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("store call aborted: {0}")]
    Aborted(String),
}

impl Error {
    /// Whether the failure lies with the store rather than the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Timeout(_) | Error::Aborted(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
