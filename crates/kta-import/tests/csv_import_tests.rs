//! End-to-end import tests over real files and the in-memory sink
//!
//! Run with:
//!
//! ```bash
//! cargo test -p kta-import --test csv_import_tests
//! ```

mod common;

use common::{init_test_tracing, member_row, member_rows, CsvFixture};
use kta_import::{FlushMode, Gender, ImportConfig, Importer, MemorySink};
use std::sync::{Arc, Mutex};

fn importer(batch_size: usize) -> Importer<MemorySink> {
    let config = ImportConfig::default().with_batch_size(batch_size);
    Importer::new(MemorySink::new(), config).expect("valid config")
}

#[tokio::test]
async fn test_bom_file_imports_in_two_flushes() {
    init_test_tracing();

    let fixture = CsvFixture::with_bom(&member_rows(305)).unwrap();

    let flushes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&flushes);
    let mut importer = importer(300).on_flush(move |outcome, _| {
        seen.lock().unwrap().push((outcome.batch_size, outcome.mode));
    });

    let stats = importer.import_file(fixture.path()).await.unwrap();

    assert_eq!((stats.inserted, stats.skipped, stats.failed), (305, 0, 0));
    assert_eq!(stats.rows_read, 305);
    assert_eq!(stats.degraded_flushes, 0);
    assert_eq!(
        *flushes.lock().unwrap(),
        vec![(300, FlushMode::Bulk), (5, FlushMode::Bulk)]
    );
    assert_eq!(importer.sink().batch_calls(), 2);
    assert_eq!(importer.sink().row_calls(), 0);
}

#[tokio::test]
async fn test_rerun_skips_everything() {
    init_test_tracing();

    let fixture = CsvFixture::new(&member_rows(305)).unwrap();

    let mut first = importer(300);
    let stats = first.import_file(fixture.path()).await.unwrap();
    assert_eq!(stats.inserted, 305);

    let mut second = Importer::new(first.into_sink(), ImportConfig::default()).unwrap();
    let stats = second.import_file(fixture.path()).await.unwrap();

    assert_eq!((stats.inserted, stats.skipped, stats.failed), (0, 305, 0));
    assert_eq!(second.sink().len(), 305);
}

#[tokio::test]
async fn test_bom_does_not_hide_the_first_column() {
    let fixture = CsvFixture::with_bom(&[member_row(1)]).unwrap();
    let mut importer = importer(10);

    let stats = importer.import_file(fixture.path()).await.unwrap();

    assert_eq!(stats.inserted, 1);
    let stored = importer.sink().get("KTA-00001").unwrap();
    assert_eq!(stored.nik, "3273000000000001");
}

#[tokio::test]
async fn test_fields_are_mapped_and_normalized() {
    let fixture = CsvFixture::new(&[member_row(2)]).unwrap();
    let mut importer = importer(10);

    importer.import_file(fixture.path()).await.unwrap();

    let stored = importer.sink().get("KTA-00002").unwrap();
    assert_eq!(stored.full_name.as_deref(), Some("Anggota 2"));
    assert_eq!(stored.birth_place.as_deref(), Some("Bandung"));
    assert_eq!(stored.birth_date.unwrap().to_string(), "1990-01-15");
    assert_eq!(stored.gender, Some(Gender::L));
    assert_eq!(stored.postal_code.as_deref(), Some("40111"));
    assert_eq!(stored.created_by, "admin");
    assert_eq!(stored.status, "active");
    assert!(!stored.verified);
    assert_eq!(
        stored.registration_date.format("%Y-%m-%d %H:%M").to_string(),
        "2023-06-01 08:30"
    );
    assert_eq!(stored.source_line, 2);
}

#[tokio::test]
async fn test_rows_without_keys_are_skipped() {
    let rows = vec![
        member_row(1),
        ";KTA-X1;Tanpa NIK;;;;;;;;;;;;;;".to_string(),
        "3273000000000099;;Tanpa KTA;;;;;;;;;;;;;;".to_string(),
        "   ;   ;Spasi saja;;;;;;;;;;;;;;".to_string(),
        member_row(2),
    ];
    let fixture = CsvFixture::new(&rows).unwrap();
    let mut importer = importer(10);

    let stats = importer.import_file(fixture.path()).await.unwrap();

    assert_eq!((stats.inserted, stats.skipped, stats.failed), (2, 3, 0));
    assert!(!importer.sink().contains("KTA-X1"));
    assert_eq!(importer.sink().len(), 2);
}

#[tokio::test]
async fn test_unparseable_optional_values_become_null() {
    let row = "3273000000000007;KTA-00007;Budi;Garut;not-a-date;X;;;;;;;;;;;".to_string();
    let fixture = CsvFixture::new(&[row]).unwrap();
    let mut importer = importer(10);

    let before = chrono::Utc::now();
    importer.import_file(fixture.path()).await.unwrap();

    let stored = importer.sink().get("KTA-00007").unwrap();
    assert_eq!(stored.birth_date, None);
    assert_eq!(stored.gender, None);
    assert_eq!(stored.religion, None);
    assert_eq!(stored.created_by, "system");
    assert!(stored.registration_date >= before);
}

#[tokio::test]
async fn test_one_bad_row_costs_only_itself() {
    init_test_tracing();

    let sink = MemorySink::new().with_row_check(|r| {
        (r.nik.len() > 16).then(|| "value too long for type character varying(16)".to_string())
    });
    let config = ImportConfig::default().with_batch_size(4);
    let mut importer = Importer::new(sink, config).unwrap();

    let mut rows = member_rows(8);
    rows[5] = rows[5].replacen("3273", "32733273", 1);
    let fixture = CsvFixture::new(&rows).unwrap();

    let stats = importer.import_file(fixture.path()).await.unwrap();

    assert_eq!((stats.inserted, stats.skipped, stats.failed), (7, 0, 1));
    assert_eq!((stats.flushes, stats.degraded_flushes), (2, 1));

    let failure = &stats.failures[0];
    assert_eq!(failure.no_kta.as_deref(), Some("KTA-00006"));
    assert_eq!(failure.line, 7);

    for n in [1, 2, 3, 4, 5, 7, 8] {
        assert!(importer.sink().contains(&format!("KTA-{n:05}")));
    }
}

#[tokio::test]
async fn test_duplicates_inside_one_file() {
    let rows = vec![member_row(1), member_row(2), member_row(1)];
    let fixture = CsvFixture::new(&rows).unwrap();
    let mut importer = importer(10);

    let stats = importer.import_file(fixture.path()).await.unwrap();

    assert_eq!((stats.inserted, stats.skipped, stats.failed), (2, 1, 0));
    assert_eq!(stats.processed(), 3);
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let mut importer = importer(10);

    let result = importer.import_file("/nonexistent/anggota.csv").await;

    assert!(matches!(result, Err(kta_import::ImportError::Source(_))));
    assert_eq!(importer.sink().batch_calls(), 0);
}

#[tokio::test]
async fn test_header_only_file_imports_nothing() {
    let fixture = CsvFixture::new(&[]).unwrap();
    let mut importer = importer(10);

    let stats = importer.import_file(fixture.path()).await.unwrap();

    assert_eq!(stats.processed(), 0);
    assert_eq!(stats.flushes, 0);
    assert_eq!(importer.sink().batch_calls(), 0);
}
