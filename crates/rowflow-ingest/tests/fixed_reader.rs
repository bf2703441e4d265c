//! Integration tests for the fixed-width line reader.

use rowflow_ingest::{
    FixedBindingTable, FixedWidthReader, FnMapper, MemoryLineSource, ReadFilter, RowMapper,
    TextFileSource, UnmappedMapper,
};
use rowflow_model::{
    ActionType, EntryKind, ImportEntry, ImportError, Result, Severity,
};

#[derive(Debug, Default, Clone)]
struct FurnitureLine {
    code: String,
    label: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Furniture {
    code: String,
    label: String,
}

fn bindings() -> FixedBindingTable<FurnitureLine> {
    FixedBindingTable::builder()
        .field(0, 3, |line: &mut FurnitureLine, value| line.code = value)
        .field(3, 8, |line: &mut FurnitureLine, value| line.label = value)
        .build()
}

fn mapper() -> impl RowMapper<FurnitureLine, Furniture> {
    FnMapper::new(|line: &FurnitureLine| {
        if line.code == "XXX" {
            return Err(ImportError::Mapping(format!("unknown code '{}'", line.code)));
        }
        Ok(Some(Furniture {
            code: line.code.clone(),
            label: line.label.trim().to_string(),
        }))
    })
}

fn no_hook() -> impl FnMut(&mut ImportEntry<Furniture, FurnitureLine>) -> Result<()> {
    |_| Ok(())
}

#[test]
fn header_lines_then_sliced_data_lines() {
    let source = MemoryLineSource::new("items.txt", &["CATALOG ", "A01chair", "B02table"]);
    let mut reader = FixedWidthReader::new(source, bindings(), mapper());
    let filter = reader.create_filter().unwrap();
    assert_eq!(filter.total_row_count(), 3);

    let mut hook = no_hook();
    let entries: Vec<_> = reader.read(filter, &mut hook).collect();
    assert_eq!(entries.len(), 3);

    let header = &entries[0];
    assert_eq!(header.kind(), EntryKind::Header);
    assert_eq!(header.severity, Severity::Info);
    assert_eq!(header.message, "Skipping header line");

    let chair = &entries[1];
    assert_eq!(chair.kind(), EntryKind::Mapped);
    assert_eq!(chair.severity, Severity::Info);
    assert_eq!(chair.action_type, ActionType::Persist);
    assert_eq!(chair.index, 1);
    assert_eq!(chair.count, 3);
    assert_eq!(
        chair.nodes(),
        [Furniture {
            code: "A01".to_string(),
            label: "chair".to_string(),
        }]
    );

    assert_eq!(entries[2].nodes()[0].code, "B02");
}

#[test]
fn mapper_failure_is_line_scoped() {
    let source = MemoryLineSource::new("items.txt", &["CATALOG ", "XXXboom ", "A01chair"]);
    let mut reader = FixedWidthReader::new(source, bindings(), mapper());
    let filter = reader.create_filter().unwrap();
    let mut hook = no_hook();
    let entries: Vec<_> = reader.read(filter, &mut hook).collect();

    let failed = &entries[1];
    assert_eq!(failed.kind(), EntryKind::Error);
    assert_eq!(failed.severity, Severity::Error);
    assert!(
        failed.message.contains("row mapper failed"),
        "message: {}",
        failed.message
    );
    assert!(failed.message.contains("XXX"), "message: {}", failed.message);

    // The next line is unaffected.
    assert_eq!(entries[2].kind(), EntryKind::Mapped);
    assert_eq!(entries[2].nodes()[0].code, "A01");
}

#[test]
fn unneeded_mapper_returns_raw_typed_lines() {
    let source = MemoryLineSource::new("items.txt", &["A01chair", "B02table"]);
    let mut reader: FixedWidthReader<MemoryLineSource, FurnitureLine, Furniture> =
        FixedWidthReader::new(source, bindings(), UnmappedMapper::new().with_skip_lines(0));
    let filter = reader.create_filter().unwrap();
    let mut hook = no_hook();
    let entries: Vec<_> = reader.read(filter, &mut hook).collect();

    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.kind() == EntryKind::Line));
    assert_eq!(entries[0].line().unwrap().code, "A01");
    assert_eq!(entries[1].line().unwrap().label, "table");
}

#[test]
fn filter_adjustment_excludes_lines_from_the_read() {
    let source = MemoryLineSource::new("items.txt", &["CATALOG ", "A01chair", "B02table"]);
    let mut reader = FixedWidthReader::new(source, bindings(), mapper());
    let mut filter = reader.create_filter().unwrap();
    filter.remove_row("", 1);

    let mut hook = no_hook();
    let entries: Vec<_> = reader.read(filter, &mut hook).collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind(), EntryKind::Header);
    assert_eq!(entries[1].nodes()[0].code, "B02");
    assert!(entries.iter().all(|entry| entry.count == 2));
}

#[test]
fn missing_file_fails_filter_creation() {
    let source = TextFileSource::new("/nonexistent/items.txt");
    let reader: FixedWidthReader<TextFileSource, FurnitureLine, Furniture> =
        FixedWidthReader::new(source, bindings(), mapper());
    let err = reader.create_filter().unwrap_err();
    assert!(matches!(err, ImportError::FilterCreation { .. }));
}

#[test]
fn source_failure_degrades_to_one_synthetic_error_entry() {
    let source = TextFileSource::new("/nonexistent/items.txt");
    let mut reader: FixedWidthReader<TextFileSource, FurnitureLine, Furniture> =
        FixedWidthReader::new(source, bindings(), mapper());
    let filter = ReadFilter::new(
        0,
        "items.txt",
        vec![String::new()],
        std::collections::BTreeMap::new(),
    );
    let mut hook = no_hook();
    let mut entries = reader.read(filter, &mut hook);

    let entry = entries.next_entry().unwrap();
    assert_eq!(entry.kind(), EntryKind::Error);
    assert_eq!(entry.severity, Severity::Error);
    assert!(entries.next_entry().is_none());
    assert!(!entries.has_next());
}

#[test]
fn abort_drains_without_emitting_further_entries() {
    let source = MemoryLineSource::new("items.txt", &["CATALOG ", "A01chair", "B02table"]);
    let mut reader = FixedWidthReader::new(source, bindings(), mapper());
    let filter = reader.create_filter().unwrap();
    let mut hook = no_hook();
    let mut entries = reader.read(filter, &mut hook);

    let first = entries.next_entry().unwrap();
    assert_eq!(first.kind(), EntryKind::Header);
    entries.abort();
    assert!(!entries.has_next());
    assert!(entries.next_entry().is_none());
}
