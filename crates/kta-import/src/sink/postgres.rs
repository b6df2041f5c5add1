//! PostgreSQL member sink

use crate::config::ImportConfig;
use crate::models::MemberRecord;
use crate::sink::{MemberSink, SinkError};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

/// Writes members with `INSERT ... ON CONFLICT (no_kta) DO NOTHING`
pub struct PgMemberSink {
    pool: PgPool,
    table: String,
}

impl PgMemberSink {
    /// Validates the schema and table names from `config` before use
    pub fn new(pool: PgPool, config: &ImportConfig) -> kta_common::Result<Self> {
        config.validate()?;
        Ok(Self {
            pool,
            table: config.qualified_table(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn insert_query<'a>(&self, records: &'a [MemberRecord]) -> QueryBuilder<'a, Postgres> {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            self.table,
            MemberRecord::COLUMNS.join(", ")
        ));

        query_builder.push_values(records, |mut b, record| {
            b.push_bind(record.id)
                .push_bind(&record.nik)
                .push_bind(&record.no_kta)
                .push_bind(record.full_name.as_deref())
                .push_bind(record.birth_place.as_deref())
                .push_bind(record.birth_date)
                .push_bind(record.gender.map(|g| g.as_str()))
                .push_bind(record.religion.as_deref())
                .push_bind(record.blood_type.as_deref())
                .push_bind(record.marital_status.as_deref())
                .push_bind(record.address.as_deref())
                .push_bind(record.rt.as_deref())
                .push_bind(record.rw.as_deref())
                .push_bind(record.postal_code.as_deref())
                .push_bind(record.photo_path.as_deref())
                .push_bind(record.id_scan_path.as_deref())
                .push_bind(record.registration_date)
                .push_bind(record.created_at)
                .push_bind(&record.created_by)
                .push_bind(&record.status)
                .push_bind(record.verified);
        });

        query_builder.push(format!(
            " ON CONFLICT ({}) DO NOTHING",
            MemberRecord::CONFLICT_COLUMN
        ));

        query_builder
    }
}

#[async_trait]
impl MemberSink for PgMemberSink {
    async fn insert_batch(&self, records: &[MemberRecord]) -> Result<u64, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut query_builder = self.insert_query(records);
        let result = query_builder.build().execute(&self.pool).await?;

        debug!(
            table = %self.table,
            rows = records.len(),
            inserted = result.rows_affected(),
            "Insert executed"
        );

        Ok(result.rows_affected())
    }

    fn target(&self) -> String {
        self.table.clone()
    }
}
