//! Import and database configuration
//!
//! [`ImportConfig::from_env`] and [`DatabaseConfig::from_env`] read plain
//! environment variables; loading `.env` is left to the binary. Values that
//! are unset fall back to the `DEFAULT_*` constants below.

use crate::models::MemberRecord;
use crate::source::CsvDialect;
use kta_common::{KtaError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Default schema of the member table.
pub const DEFAULT_SCHEMA: &str = "public";

/// Default member table name.
pub const DEFAULT_TABLE: &str = "keanggotaan";

/// Default number of records per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// Default number of row failures kept for the report.
pub const DEFAULT_MAX_RECORDED_FAILURES: usize = 100;

/// Bind parameters PostgreSQL accepts in one statement.
pub const POSTGRES_MAX_BIND_PARAMS: usize = 65_535;

/// PostgreSQL identifier length limit (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/kta";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Settings for one import run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub schema: String,
    pub table: String,
    /// Records per bulk insert
    pub batch_size: usize,
    /// Cap on [`crate::stats::RowFailure`] entries kept in the stats
    pub max_recorded_failures: usize,
    pub dialect: CsvDialect,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_recorded_failures: DEFAULT_MAX_RECORDED_FAILURES,
            dialect: CsvDialect::default(),
        }
    }
}

impl ImportConfig {
    /// Read `DB_SCHEMA`, `DB_TABLE`, `IMPORT_BATCH_SIZE` and `IMPORT_MAX_FAILURES`
    ///
    /// A variable that is set but not a number is an error rather than
    /// silently replaced by the default.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(schema) = std::env::var("DB_SCHEMA") {
            config.schema = schema;
        }

        if let Ok(table) = std::env::var("DB_TABLE") {
            config.table = table;
        }

        if let Ok(size) = std::env::var("IMPORT_BATCH_SIZE") {
            config.batch_size = parse_env_number("IMPORT_BATCH_SIZE", &size)?;
        }

        if let Ok(max) = std::env::var("IMPORT_MAX_FAILURES") {
            config.max_recorded_failures = parse_env_number("IMPORT_MAX_FAILURES", &max)?;
        }

        Ok(config)
    }

    /// Largest batch whose bind parameters fit in a single statement
    pub fn max_batch_size() -> usize {
        POSTGRES_MAX_BIND_PARAMS / MemberRecord::COLUMNS.len()
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_recorded_failures(mut self, max: usize) -> Self {
        self.max_recorded_failures = max;
        self
    }

    /// `"schema"."table"`, quoted for use in SQL
    pub fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_identifier("schema", &self.schema)?;
        validate_identifier("table", &self.table)?;

        if self.batch_size == 0 {
            return Err(KtaError::config("Batch size must be greater than 0"));
        }

        let max = Self::max_batch_size();
        if self.batch_size > max {
            return Err(KtaError::config(format!(
                "Batch size {} exceeds the maximum of {} rows per statement",
                self.batch_size, max
            )));
        }

        if self.dialect.delimiter == self.dialect.quote {
            return Err(KtaError::config("CSV delimiter and quote must differ"));
        }

        Ok(())
    }
}

fn parse_env_number(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| KtaError::config(format!("{} must be a positive integer, got {:?}", name, value)))
}

/// Accept plain SQL identifiers only: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(KtaError::config(format!("Invalid {} name: {:?}", kind, name)));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(KtaError::config(format!(
            "{} name {:?} is longer than {} characters",
            kind, name, MAX_IDENTIFIER_LEN
        )));
    }

    Ok(())
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// Read `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and `DATABASE_CONNECT_TIMEOUT`
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(KtaError::config("Database URL cannot be empty"));
        }

        if self.max_connections == 0 {
            return Err(KtaError::config("Database max_connections must be greater than 0"));
        }

        Ok(())
    }

    /// Open the connection pool, failing fast if the server is unreachable
    pub async fn connect(&self) -> std::result::Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect(&self.url)
            .await
    }
}
