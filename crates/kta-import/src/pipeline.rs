//! Import pipeline
//!
//! Source → decoder → buffer → executor, driven by a single loop:
//!
//! 1. pull one row from the [`MemberSource`]
//! 2. decode it, counting rows without NIK / card number as skipped
//! 3. buffer it; a full buffer is flushed before the next row is read
//! 4. at end of input, flush whatever is left
//!
//! Reading pauses while a flush runs, so memory stays bounded by one batch.

use crate::buffer::BatchBuffer;
use crate::config::ImportConfig;
use crate::decoder::{columns, decode_row, Decoded};
use crate::error::ImportError;
use crate::executor::DegradingInsertExecutor;
use crate::sink::MemberSink;
use crate::source::MemberSource;
use crate::stats::{FlushOutcome, ImportStats, RowFailure};
use chrono::Utc;
use std::path::Path;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Callback invoked after every flush with the running totals
pub type FlushObserver = Box<dyn FnMut(&FlushOutcome, &ImportStats) + Send>;

/// Member CSV importer
pub struct Importer<S> {
    config: ImportConfig,
    executor: DegradingInsertExecutor<S>,
    cancel: Option<CancellationToken>,
    on_flush: Option<FlushObserver>,
}

impl<S: MemberSink> Importer<S> {
    /// Create an importer writing to `sink`
    pub fn new(sink: S, config: ImportConfig) -> Result<Self, ImportError> {
        config.validate()?;

        let executor = DegradingInsertExecutor::new(sink, config.max_recorded_failures);

        Ok(Self {
            config,
            executor,
            cancel: None,
            on_flush: None,
        })
    }

    /// Stop reading when `token` is cancelled; rows already buffered are still flushed
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_flush<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&FlushOutcome, &ImportStats) + Send + 'static,
    {
        self.on_flush = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        self.executor.sink()
    }

    pub fn into_sink(self) -> S {
        self.executor.into_sink()
    }

    /// Open `path` with the configured dialect and import it
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn import_file(&mut self, path: impl AsRef<Path>) -> Result<ImportStats, ImportError> {
        let mut source = MemberSource::open(path.as_ref(), &self.config.dialect).await?;
        self.run(&mut source).await
    }

    /// Consume `source` to the end and return the totals
    ///
    /// Row-level problems never abort the run; only source I/O errors and
    /// fatal store errors do.
    #[instrument(skip_all, fields(target = %self.executor.sink().target(), batch_size = self.config.batch_size))]
    pub async fn run<R>(&mut self, source: &mut MemberSource<R>) -> Result<ImportStats, ImportError>
    where
        R: AsyncRead + Unpin + Send,
    {
        check_headers(source.headers());

        let mut stats = ImportStats::default();
        let mut buffer = BatchBuffer::new(self.config.batch_size);

        info!("Import started");

        loop {
            if self.is_cancelled() {
                warn!(rows_read = stats.rows_read, "Import cancelled, flushing buffered rows");
                stats.cancelled = true;
                break;
            }

            let row = match source.next_row().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    stats.rows_read += 1;
                    let line = e.line().unwrap_or(0);
                    warn!(line, error = %e, "Unreadable record");
                    stats.record_failure(
                        RowFailure {
                            line,
                            no_kta: None,
                            nik: None,
                            reason: e.to_string(),
                        },
                        self.config.max_recorded_failures,
                    );
                    continue;
                },
                Err(e) => return Err(e.into()),
            };

            stats.rows_read += 1;

            match decode_row(&row, Utc::now()) {
                Decoded::Skip(reason) => {
                    debug!(line = row.line(), %reason, "Row skipped");
                    stats.skipped += 1;
                },
                Decoded::Member(record) => {
                    if buffer.push(*record) {
                        self.flush(&mut buffer, &mut stats).await?;
                    }
                },
            }
        }

        self.flush(&mut buffer, &mut stats).await?;

        info!(
            rows_read = stats.rows_read,
            inserted = stats.inserted,
            skipped = stats.skipped,
            failed = stats.failed,
            flushes = stats.flushes,
            degraded_flushes = stats.degraded_flushes,
            "Import finished"
        );

        Ok(stats)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    async fn flush(
        &mut self,
        buffer: &mut BatchBuffer,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        let batch = buffer.drain();

        if let Some(outcome) = self.executor.flush(batch, stats).await? {
            debug!(
                mode = ?outcome.mode,
                inserted = outcome.inserted,
                skipped = outcome.skipped,
                failed = outcome.failed,
                "Flush complete"
            );

            if let Some(observer) = self.on_flush.as_mut() {
                observer(&outcome, stats);
            }
        }

        Ok(())
    }
}

/// Warn about expected columns the header lacks
fn check_headers(headers: &[String]) {
    for column in columns::ALL {
        if !headers.iter().any(|h| h == column) {
            if column == columns::NIK || column == columns::NO_KTA {
                warn!(column, "Required column missing, every row will be skipped");
            } else {
                debug!(column, "Optional column missing");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::stats::FlushMode;
    use std::sync::{Arc, Mutex};

    const HEADER: &str = "NIK;No. KTA;Nama Lengkap;Jenis Kelamin;tglentri\n";

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text.into_bytes()
    }

    async fn import(
        importer: &mut Importer<MemorySink>,
        input: &[u8],
    ) -> Result<ImportStats, ImportError> {
        let dialect = importer.config().dialect.clone();
        let mut source = MemberSource::new(input, &dialect).await?;
        importer.run(&mut source).await
    }

    fn importer(batch_size: usize) -> Importer<MemorySink> {
        let config = ImportConfig::default().with_batch_size(batch_size);
        Importer::new(MemorySink::new(), config).unwrap()
    }

    #[tokio::test]
    async fn test_missing_required_fields_never_reach_store() {
        let mut importer = importer(10);
        let input = csv(&[
            "3201;KTA-1;Budi;L;",
            ";KTA-2;Tanpa NIK;P;",
            "3203;;Tanpa KTA;P;",
            "3204;KTA-4;Siti;P;",
        ]);

        let stats = import(&mut importer, &input).await.unwrap();

        assert_eq!((stats.inserted, stats.skipped, stats.failed), (2, 2, 0));
        assert_eq!(stats.rows_read, 4);
        assert!(!importer.sink().contains("KTA-2"));
    }

    #[tokio::test]
    async fn test_delimiter_only_row_counts_as_skipped() {
        let mut importer = importer(10);
        let input = csv(&["1;A;x;L;", ";;;;", "2;B;y;P;"]);

        let stats = import(&mut importer, &input).await.unwrap();

        assert_eq!(stats.rows_read, 3);
        assert_eq!((stats.inserted, stats.skipped, stats.failed), (2, 1, 0));
    }

    #[tokio::test]
    async fn test_unreadable_record_fails_and_reading_continues() {
        let mut config = ImportConfig::default();
        config.dialect.flexible = false;
        let mut importer = Importer::new(MemorySink::new(), config).unwrap();

        let input = csv(&["1;A;x;L;", "2;B", "3;C;z;P;"]);
        let stats = import(&mut importer, &input).await.unwrap();

        assert_eq!((stats.inserted, stats.skipped, stats.failed), (2, 0, 1));
        assert_eq!(stats.failures[0].line, 3);
        assert_eq!(stats.failures[0].no_kta, None);
        assert!(importer.sink().contains("C"));
    }

    #[tokio::test]
    async fn test_flushes_at_threshold_and_at_end() {
        let flushes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&flushes);

        let mut importer = importer(2).on_flush(move |outcome, _| {
            seen.lock().unwrap().push(outcome.batch_size);
        });

        let input = csv(&[
            "1;A;x;L;",
            "2;B;x;L;",
            "3;C;x;L;",
            "4;D;x;L;",
            "5;E;x;L;",
        ]);
        let stats = import(&mut importer, &input).await.unwrap();

        assert_eq!(*flushes.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(stats.flushes, 3);
        assert_eq!(stats.inserted, 5);
    }

    #[tokio::test]
    async fn test_bad_row_only_costs_itself() {
        let sink = MemorySink::new().with_row_check(|r| {
            (r.nik.len() > 16).then(|| "nik exceeds 16 characters".to_string())
        });
        let mut importer = Importer::new(sink, ImportConfig::default()).unwrap();

        let input = csv(&[
            "3201;KTA-1;a;L;",
            "32010101019000011234;KTA-2;b;P;",
            "3203;KTA-3;c;L;",
        ]);
        let stats = import(&mut importer, &input).await.unwrap();

        assert_eq!((stats.inserted, stats.skipped, stats.failed), (2, 0, 1));
        assert_eq!(stats.degraded_flushes, 1);
        assert_eq!(stats.failures[0].line, 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_reading_after_flush() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let mut importer = importer(2)
            .with_cancellation(token)
            .on_flush(move |_, _| trigger.cancel());

        let input = csv(&["1;A;x;L;", "2;B;x;L;", "3;C;x;L;", "4;D;x;L;"]);
        let stats = import(&mut importer, &input).await.unwrap();

        assert!(stats.cancelled);
        assert_eq!(stats.rows_read, 2);
        assert_eq!(stats.inserted, 2);
        assert!(!importer.sink().contains("C"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_reads_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let mut importer = importer(10).with_cancellation(token);

        let stats = import(&mut importer, &csv(&["1;A;x;L;"])).await.unwrap();

        assert!(stats.cancelled);
        assert_eq!(stats.rows_read, 0);
        assert!(importer.sink().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_store_error_aborts() {
        let sink = MemorySink::new();
        sink.close();
        let mut importer = Importer::new(sink, ImportConfig::default()).unwrap();

        let err = import(&mut importer, &csv(&["1;A;x;L;"])).await.unwrap_err();
        assert!(matches!(err, ImportError::Sink(ref e) if e.is_fatal()));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = ImportConfig::default().with_batch_size(0);
        assert!(matches!(
            Importer::new(MemorySink::new(), config),
            Err(ImportError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_degraded_mode_reported_to_observer() {
        let modes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&modes);
        let sink = MemorySink::new().with_row_check(|r| {
            (r.no_kta == "BAD").then(|| "check constraint".to_string())
        });
        let mut importer = Importer::new(sink, ImportConfig::default())
            .unwrap()
            .on_flush(move |outcome, _| seen.lock().unwrap().push(outcome.mode));

        import(&mut importer, &csv(&["1;A;x;L;", "2;BAD;x;L;"]))
            .await
            .unwrap();

        assert_eq!(*modes.lock().unwrap(), vec![FlushMode::Degraded]);
    }
}
