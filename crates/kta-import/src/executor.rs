//! Bulk insert with row-level fallback
//!
//! A flush first tries one conflict-ignoring statement for the whole batch.
//! When that statement fails for any non-fatal reason, every record of the
//! batch is retried on its own, in arrival order, so that a single bad row
//! costs only itself. Only a fatal store error (see
//! [`SinkError::is_fatal`]) escapes a flush.

use crate::models::MemberRecord;
use crate::sink::{MemberSink, SinkError};
use crate::stats::{FlushMode, FlushOutcome, ImportStats, RowFailure};
use tracing::{debug, instrument, warn};

pub struct DegradingInsertExecutor<S> {
    sink: S,
    max_recorded_failures: usize,
}

impl<S: MemberSink> DegradingInsertExecutor<S> {
    pub fn new(sink: S, max_recorded_failures: usize) -> Self {
        Self {
            sink,
            max_recorded_failures,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Store `batch`, updating `stats`; `Ok(None)` for an empty batch
    ///
    /// The batch is consumed whatever happens: records are never carried
    /// over into a later flush.
    #[instrument(skip_all, fields(target = %self.sink.target(), batch_size = batch.len()))]
    pub async fn flush(
        &self,
        batch: Vec<MemberRecord>,
        stats: &mut ImportStats,
    ) -> Result<Option<FlushOutcome>, SinkError> {
        if batch.is_empty() {
            return Ok(None);
        }

        let batch_size = batch.len();

        let outcome = match self.sink.insert_batch(&batch).await {
            Ok(written) => {
                let inserted = written.min(batch_size as u64);
                let skipped = batch_size as u64 - inserted;

                stats.inserted += inserted;
                stats.skipped += skipped;

                debug!(inserted, skipped, "Bulk insert complete");

                FlushOutcome {
                    mode: FlushMode::Bulk,
                    batch_size,
                    inserted,
                    skipped,
                    failed: 0,
                }
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, batch_size, "Bulk insert failed, retrying rows individually");
                self.insert_rows(&batch, stats).await?
            },
        };

        stats.record_flush(&outcome);
        Ok(Some(outcome))
    }

    /// Degrade path: one statement per record
    ///
    /// A record the store silently ignores (duplicate card number) counts
    /// as skipped, the same as on the bulk path.
    async fn insert_rows(
        &self,
        batch: &[MemberRecord],
        stats: &mut ImportStats,
    ) -> Result<FlushOutcome, SinkError> {
        let mut outcome = FlushOutcome {
            mode: FlushMode::Degraded,
            batch_size: batch.len(),
            inserted: 0,
            skipped: 0,
            failed: 0,
        };

        for record in batch {
            match self.sink.insert_one(record).await {
                Ok(0) => {
                    debug!(no_kta = %record.no_kta, line = record.source_line, "Duplicate card number skipped");
                    outcome.skipped += 1;
                    stats.skipped += 1;
                },
                Ok(_) => {
                    outcome.inserted += 1;
                    stats.inserted += 1;
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        no_kta = %record.no_kta,
                        line = record.source_line,
                        error = %e,
                        "Row insert failed"
                    );
                    outcome.failed += 1;
                    stats.record_failure(
                        RowFailure {
                            line: record.source_line,
                            no_kta: Some(record.no_kta.clone()),
                            nik: Some(record.nik.clone()),
                            reason: e.to_string(),
                        },
                        self.max_recorded_failures,
                    );
                },
            }
        }

        Ok(outcome)
    }
}
