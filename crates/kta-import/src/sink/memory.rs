//! In-memory member sink
//!
//! Behaves like the PostgreSQL table as far as the importer can tell: a
//! unique index on the card number, all-or-nothing statements, and an
//! optional row check standing in for other table constraints. Used by
//! `kta-import --dry-run` and throughout the tests.

use crate::models::MemberRecord;
use crate::sink::{MemberSink, SinkError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

type RowCheck = Box<dyn Fn(&MemberRecord) -> Option<String> + Send + Sync>;

/// Card-number keyed store held in memory
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<HashMap<String, MemberRecord>>,
    check: Option<RowCheck>,
    closed: AtomicBool,
    batch_calls: AtomicUsize,
    row_calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any statement containing a record for which `check` returns a reason
    pub fn with_row_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&MemberRecord) -> Option<String> + Send + Sync + 'static,
    {
        self.check = Some(Box::new(check));
        self
    }

    /// Mark the store closed: every later insert fails fatally
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, no_kta: &str) -> bool {
        self.lock().contains_key(no_kta)
    }

    pub fn get(&self, no_kta: &str) -> Option<MemberRecord> {
        self.lock().get(no_kta).cloned()
    }

    /// Number of `insert_batch` calls
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of `insert_one` calls
    pub fn row_calls(&self) -> usize {
        self.row_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemberRecord>> {
        // A panic while holding the lock leaves the map itself consistent.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, records: &[MemberRecord]) -> Result<u64, SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed("memory sink closed".to_string()));
        }

        if let Some(check) = &self.check {
            for record in records {
                if let Some(reason) = check(record) {
                    return Err(SinkError::Rejected(format!(
                        "no_kta {}: {}",
                        record.no_kta, reason
                    )));
                }
            }
        }

        let mut rows = self.lock();
        let mut seen = HashSet::new();
        let mut inserted = 0;

        for record in records {
            if rows.contains_key(&record.no_kta) || !seen.insert(record.no_kta.as_str()) {
                continue;
            }
            rows.insert(record.no_kta.clone(), record.clone());
            inserted += 1;
        }

        Ok(inserted)
    }
}

#[async_trait]
impl MemberSink for MemorySink {
    async fn insert_batch(&self, records: &[MemberRecord]) -> Result<u64, SinkError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.insert(records)
    }

    async fn insert_one(&self, record: &MemberRecord) -> Result<u64, SinkError> {
        self.row_calls.fetch_add(1, Ordering::SeqCst);
        self.insert(std::slice::from_ref(record))
    }

    fn target(&self) -> String {
        "memory".to_string()
    }
}
