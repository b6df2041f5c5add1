//! Member record model
//!
//! Field names are English; [`MemberRecord::COLUMNS`] maps them to the
//! column names of the `keanggotaan` table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status every imported card starts with
pub const KTA_STATUS_ACTIVE: &str = "active";

/// Fallback for `created_by` when the export has no user column
pub const DEFAULT_CREATED_BY: &str = "system";

/// Gender code as stored in `jenis_kelamin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Laki-laki
    L,
    /// Perempuan
    P,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::L => "L",
            Gender::P => "P",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One membership card holder, ready for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// UUID v7, so ids sort by creation time
    pub id: Uuid,
    /// National ID (NIK)
    pub nik: String,
    /// Card number, unique in the store
    pub no_kta: String,
    pub full_name: Option<String>,
    pub birth_place: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub religion: Option<String>,
    pub blood_type: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub rt: Option<String>,
    pub rw: Option<String>,
    pub postal_code: Option<String>,
    pub photo_path: Option<String>,
    pub id_scan_path: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub status: String,
    pub verified: bool,
    /// Line of the source file this record came from; not persisted
    #[serde(skip)]
    pub source_line: u64,
}

impl MemberRecord {
    /// Table columns in insertion order
    pub const COLUMNS: [&'static str; 21] = [
        "id",
        "nik",
        "no_kta",
        "nama_lengkap",
        "tempat_lahir",
        "tanggal_lahir",
        "jenis_kelamin",
        "agama",
        "golongan_darah",
        "status_perkawinan",
        "alamat_ktp",
        "rt_ktp",
        "rw_ktp",
        "kode_pos_ktp",
        "foto_formal",
        "scan_ktp",
        "tanggal_daftar",
        "created_at",
        "created_by",
        "kta_status",
        "is_verified",
    ];

    /// Column carrying the unique business key
    pub const CONFLICT_COLUMN: &'static str = "no_kta";

    /// A record with only the required fields set, everything else defaulted
    pub fn new(nik: impl Into<String>, no_kta: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            nik: nik.into(),
            no_kta: no_kta.into(),
            full_name: None,
            birth_place: None,
            birth_date: None,
            gender: None,
            religion: None,
            blood_type: None,
            marital_status: None,
            address: None,
            rt: None,
            rw: None,
            postal_code: None,
            photo_path: None,
            id_scan_path: None,
            registration_date: now,
            created_at: now,
            created_by: DEFAULT_CREATED_BY.to_string(),
            status: KTA_STATUS_ACTIVE.to_string(),
            verified: false,
            source_line: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let now = Utc::now();
        let record = MemberRecord::new("3201010101010001", "KTA-0001", now);

        assert_eq!(record.status, KTA_STATUS_ACTIVE);
        assert_eq!(record.created_by, DEFAULT_CREATED_BY);
        assert!(!record.verified);
        assert_eq!(record.registration_date, now);
        assert_eq!(record.id.get_version_num(), 7);
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let now = Utc::now();
        let first = MemberRecord::new("1", "A", now);
        let second = MemberRecord::new("2", "B", now);
        assert!(first.id < second.id);
    }

    #[test]
    fn test_conflict_column_is_a_column() {
        assert!(MemberRecord::COLUMNS.contains(&MemberRecord::CONFLICT_COLUMN));
    }
}
