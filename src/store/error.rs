//! Error taxonomy for the store (spec.md §7: `NotFound`, `StoreCorrupted`, `StoreFull`,
//! plus constraint violations surfaced with the offending key).

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database is corrupted")]
    Corrupted,

    #[error("database or disk is full")]
    Full,

    #[error("constraint violation on {key}")]
    Constraint { key: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classifies a raw `DbErr` from sqlx/sea-orm into the spec's error kinds, matching
    /// on the sqlite error message the way the teacher's crawler layer matches provider
    /// error substrings (see crawler::fetcher::FetchError::Deleted).
    pub fn classify(err: sea_orm::DbErr) -> Self {
        let msg = err.to_string().to_lowercase();
        if msg.contains("malformed") || msg.contains("corrupt") {
            StoreError::Corrupted
        } else if msg.contains("disk") && msg.contains("full") {
            StoreError::Full
        } else if msg.contains("unique constraint") || msg.contains("foreign key constraint") {
            StoreError::Constraint { key: err.to_string() }
        } else {
            StoreError::Db(err)
        }
    }
}
