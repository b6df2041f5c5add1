//! KTA Import Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads membership card (KTA) exports into PostgreSQL.
//!
//! Rows are streamed from a semicolon-separated file, normalized into
//! [`MemberRecord`]s and written in batches with
//! `ON CONFLICT (no_kta) DO NOTHING`. When a batch insert fails, the batch
//! is retried row by row so that one bad record never takes the rest of the
//! batch down with it.
//!
//! # Example
//!
//! ```no_run
//! use kta_import::config::{DatabaseConfig, ImportConfig};
//! use kta_import::{Importer, PgMemberSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::default().with_batch_size(500);
//!     let pool = DatabaseConfig::from_env().connect().await?;
//!
//!     let sink = PgMemberSink::new(pool, &config)?;
//!     let mut importer = Importer::new(sink, config)?;
//!     let stats = importer.import_file("data/anggota.csv").await?;
//!
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stats;

pub use config::ImportConfig;
pub use error::{ImportError, Result};
pub use models::{Gender, MemberRecord};
pub use pipeline::Importer;
pub use sink::{MemberSink, MemorySink, PgMemberSink, SinkError};
pub use source::{CsvDialect, MemberSource, RawRow, SourceError};
pub use stats::{FlushMode, FlushOutcome, ImportStats, RowFailure};
