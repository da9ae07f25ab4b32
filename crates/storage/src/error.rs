use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("card has no id; only persisted cards can be saved")]
    MissingId,

    #[error("card owner must not be empty")]
    MissingOwner,

    #[error("store connection poisoned by a panicked writer")]
    Poisoned,
}

impl Error {
    /// Whether the database reported lock contention rather than a hard failure.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
