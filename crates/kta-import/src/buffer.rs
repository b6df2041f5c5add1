//! Bounded staging area between decoding and insertion

use crate::models::MemberRecord;

/// Records waiting for the next flush, in arrival order
#[derive(Debug)]
pub struct BatchBuffer {
    records: Vec<MemberRecord>,
    threshold: usize,
}

impl BatchBuffer {
    /// `threshold` is clamped to at least 1
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            records: Vec::with_capacity(threshold),
            threshold,
        }
    }

    /// Append a record; returns `true` once the buffer is due for a flush
    pub fn push(&mut self, record: MemberRecord) -> bool {
        self.records.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Take every buffered record, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<MemberRecord> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.threshold))
    }
}
