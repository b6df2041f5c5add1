//! Shared helpers for kta-import integration tests
//!
//! - member export fixtures written to temporary files
//! - a PostgreSQL container with the reference migration applied

#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// Header row of a full member export, in export order
pub const HEADER: &str = "NIK;No. KTA;Nama Lengkap;Kota Lahir;Tgl Lahir;Jenis Kelamin;Agama;\
Golongan Darah;Status;Alamat;RT;RW;Kode Pos;Photo;Scan KTP;tglentri;users";

const UTF8_BOM: &str = "\u{feff}";

/// Initialize tracing for tests, once per process
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,kta_import=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

/// A well-formed export row numbered `n`
pub fn member_row(n: usize) -> String {
    format!(
        "{nik};KTA-{n:05};Anggota {n};Bandung;1990-01-15;{gender};Islam;O;Kawin;\
Jl. Merdeka No. {n};001;002;40111;foto/{n}.jpg;ktp/{n}.jpg;2023-06-01 08:30:00;admin",
        nik = 3_273_000_000_000_000u64 + n as u64,
        gender = if n % 2 == 0 { "Laki-laki" } else { "Perempuan" },
    )
}

/// `count` well-formed rows, numbered from 1
pub fn member_rows(count: usize) -> Vec<String> {
    (1..=count).map(member_row).collect()
}

/// An export file living in its own temporary directory
pub struct CsvFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl CsvFixture {
    /// Write `rows` under the standard header
    pub fn new(rows: &[String]) -> Result<Self> {
        Self::build(rows, false)
    }

    /// Same as [`CsvFixture::new`], prefixed with a UTF-8 byte-order mark
    pub fn with_bom(rows: &[String]) -> Result<Self> {
        Self::build(rows, true)
    }

    fn build(rows: &[String], bom: bool) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp dir")?;
        let path = dir.path().join("anggota.csv");

        let mut text = String::new();
        if bom {
            text.push_str(UTF8_BOM);
        }
        text.push_str(HEADER);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }

        std::fs::write(&path, text).context("Failed to write fixture")?;

        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with the `keanggotaan` table created
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Number of rows currently in `keanggotaan`
    pub async fn member_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM keanggotaan")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count members")?;
        Ok(count)
    }
}
