use thiserror::Error;

/// Failures surfaced by the aggregation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `chats.chat_id` primary-key violation on registration.
    #[error("channel {0} is already registered")]
    DuplicateKey(i64),

    #[error("stored timestamp {0} is out of range")]
    BadTimestamp(i64),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
