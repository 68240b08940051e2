use thiserror::Error;

/// Errors raised by the task model and the stores behind it.
#[derive(Debug, Error)]
pub enum Error {
    /// A start or stop was requested from a state that does not allow it.
    #[error("{0}")]
    IllegalState(&'static str),

    /// A required argument was missing or unusable.
    #[error("{0}")]
    InvalidArgument(String),

    /// A stored timestamp could not be read back.
    #[error("Failed to parse timestamp {value:?}: {reason}")]
    ParseFailure { value: String, reason: String },

    /// The underlying database failed.
    #[error("{context}")]
    Storage {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attach a short description to a failed database call.
pub(crate) trait StorageContext<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| Error::Storage { context, source })
    }
}
