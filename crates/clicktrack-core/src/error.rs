//! Error type shared by every core operation.

use crate::TrackerId;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the core crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// A stored row or a cursor payload could not be (de)serialized.
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("tracker {0} not found")]
    TrackerNotFound(TrackerId),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error("page {page} out of range (1..={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
}

impl Error {
    /// Whether retrying the same operation may succeed.
    ///
    /// Storage-level failures are transient; validation failures and
    /// missing trackers are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Transaction(_)
                | Self::Table(_)
                | Self::Storage(_)
                | Self::Commit(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_transient() {
        assert!(!Error::TrackerNotFound(TrackerId(1)).is_transient());
        assert!(!Error::InvalidCursor.is_transient());
        assert!(!Error::PageOutOfRange { page: 3, page_count: 2 }.is_transient());
    }

    #[test]
    fn storage_errors_are_transient() {
        let err = Error::Storage(redb::StorageError::Io(std::io::Error::other("disk unavailable")));
        assert!(err.is_transient());
    }

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = Error::PageOutOfRange { page: 4, page_count: 2 };
        assert_eq!(err.to_string(), "page 4 out of range (1..=2)");
    }
}
