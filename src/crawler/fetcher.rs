//! The Fetcher port (spec.md §6): the crawler depends only on this trait, never on a
//! concrete HTTP client or browser driver, mirroring the teacher's `IndexPersistence`
//! trait used to swap database-backed vs in-memory indexing persistence in tests.

use async_trait::async_trait;
use serde_json::Value as Json;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("transient fetch error: {0}")]
    Transient(String),
    #[error("record deleted on provider")]
    Deleted,
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("permanent fetch error: {0}")]
    Permanent(String),
}

/// A raw, unparsed provider record plus the parent external IDs the record references
/// (so the crawler can enqueue them without the codec having run yet).
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub json: Json,
    pub father_external_id: Option<String>,
    pub mother_external_id: Option<String>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, provider: &str, external_id: &str) -> Result<RawRecord, FetchError>;
}

/// Classifies a deleted-record signal by substring match (spec.md §9 Open Question:
/// flagged as a known weakness — a stricter machine-readable error code would be
/// preferable, but no provider here offers one).
pub fn is_deleted_signal(message: &str) -> bool {
    message.contains("Unable to read Person") || message.contains("unable to read person")
}
