//! Member storage targets
//!
//! A [`MemberSink`] inserts records with "skip on duplicate card number"
//! semantics and reports how many rows were actually written. The importer
//! only talks to this trait, so the same pipeline drives PostgreSQL
//! ([`PgMemberSink`]) and the in-memory store used for dry runs and tests
//! ([`MemorySink`]).

pub mod memory;
pub mod postgres;

pub use memory::MemorySink;
pub use postgres::PgMemberSink;

use crate::models::MemberRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Insert failure, classified by whether the import can go on
#[derive(Debug, Error)]
pub enum SinkError {
    /// The store refused the statement (constraint, bad value, ...)
    #[error("Insert rejected: {0}")]
    Rejected(String),

    /// Transient trouble reaching the store
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The connection is gone for good
    #[error("Store connection closed: {0}")]
    Closed(String),
}

impl SinkError {
    /// Fatal errors abort the import; everything else is absorbed
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::Closed(_))
    }
}

impl From<sqlx::Error> for SinkError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                SinkError::Closed(err.to_string())
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_) => SinkError::Unavailable(err.to_string()),
            other => SinkError::Rejected(other.to_string()),
        }
    }
}

/// Conflict-ignoring insert target for member records
#[async_trait]
pub trait MemberSink: Send + Sync {
    /// Insert all records in one statement, skipping duplicate card numbers
    ///
    /// Returns the number of rows written. Either every non-duplicate row
    /// is written or, on error, none is.
    async fn insert_batch(&self, records: &[MemberRecord]) -> Result<u64, SinkError>;

    /// Insert a single record; `Ok(0)` means its card number already exists
    async fn insert_one(&self, record: &MemberRecord) -> Result<u64, SinkError> {
        self.insert_batch(std::slice::from_ref(record)).await
    }

    /// Human-readable name of the target, for logs
    fn target(&self) -> String;
}
