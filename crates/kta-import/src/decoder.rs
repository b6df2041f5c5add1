//! Raw row to [`MemberRecord`] decoding

use crate::models::{MemberRecord, DEFAULT_CREATED_BY};
use crate::normalize::{non_empty, normalize_gender, parse_date, parse_naive_date};
use crate::source::RawRow;
use chrono::{DateTime, Utc};

/// Header names of the member export
pub mod columns {
    pub const NIK: &str = "NIK";
    pub const NO_KTA: &str = "No. KTA";
    pub const FULL_NAME: &str = "Nama Lengkap";
    pub const BIRTH_PLACE: &str = "Kota Lahir";
    pub const BIRTH_DATE: &str = "Tgl Lahir";
    pub const GENDER: &str = "Jenis Kelamin";
    pub const RELIGION: &str = "Agama";
    pub const BLOOD_TYPE: &str = "Golongan Darah";
    pub const MARITAL_STATUS: &str = "Status";
    pub const ADDRESS: &str = "Alamat";
    pub const RT: &str = "RT";
    pub const RW: &str = "RW";
    pub const POSTAL_CODE: &str = "Kode Pos";
    pub const PHOTO: &str = "Photo";
    pub const ID_SCAN: &str = "Scan KTP";
    pub const ENTRY_DATE: &str = "tglentri";
    pub const CREATED_BY: &str = "users";

    /// Every column the decoder reads
    pub const ALL: [&str; 17] = [
        NIK,
        NO_KTA,
        FULL_NAME,
        BIRTH_PLACE,
        BIRTH_DATE,
        GENDER,
        RELIGION,
        BLOOD_TYPE,
        MARITAL_STATUS,
        ADDRESS,
        RT,
        RW,
        POSTAL_CODE,
        PHOTO,
        ID_SCAN,
        ENTRY_DATE,
        CREATED_BY,
    ];
}

/// Why a row was left out before reaching the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingNik,
    MissingNoKta,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingNik => write!(f, "missing {}", columns::NIK),
            SkipReason::MissingNoKta => write!(f, "missing {}", columns::NO_KTA),
        }
    }
}

/// Result of decoding one row
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Member(Box<MemberRecord>),
    Skip(SkipReason),
}

/// Decode a raw row, using `now` for every time-of-import default
///
/// Rows without a national ID or card number are skipped, not rejected.
/// A missing or unreadable `tglentri` falls back to `now`; a bad birth
/// date just stays empty.
pub fn decode_row(row: &RawRow, now: DateTime<Utc>) -> Decoded {
    let Some(nik) = non_empty(row.get(columns::NIK)) else {
        return Decoded::Skip(SkipReason::MissingNik);
    };
    let Some(no_kta) = non_empty(row.get(columns::NO_KTA)) else {
        return Decoded::Skip(SkipReason::MissingNoKta);
    };

    let field = |column: &str| non_empty(row.get(column));

    let mut record = MemberRecord::new(nik, no_kta, now);
    record.full_name = field(columns::FULL_NAME);
    record.birth_place = field(columns::BIRTH_PLACE);
    record.birth_date = parse_naive_date(row.get(columns::BIRTH_DATE));
    record.gender = normalize_gender(row.get(columns::GENDER));
    record.religion = field(columns::RELIGION);
    record.blood_type = field(columns::BLOOD_TYPE);
    record.marital_status = field(columns::MARITAL_STATUS);
    record.address = field(columns::ADDRESS);
    record.rt = field(columns::RT);
    record.rw = field(columns::RW);
    record.postal_code = field(columns::POSTAL_CODE);
    record.photo_path = field(columns::PHOTO);
    record.id_scan_path = field(columns::ID_SCAN);
    record.registration_date = parse_date(row.get(columns::ENTRY_DATE)).unwrap_or(now);
    record.created_by =
        field(columns::CREATED_BY).unwrap_or_else(|| DEFAULT_CREATED_BY.to_string());
    record.source_line = row.line();

    Decoded::Member(Box::new(record))
}
