//! Integration tests for the file-backed strategies.

use std::cell::Cell;
use std::rc::Rc;

use rowflow_core::{FixedStrategy, FnProcessor, ImportStrategy, SheetStrategy};
use rowflow_ingest::{
    BindingTable, FixedBindingTable, FixedWidthReader, FnMapper, MemoryLineSource, MemorySource,
    RowMapper, SheetReader, UnmappedMapper,
};
use rowflow_model::{EntryKind, ImportEntry, ImportError, KindSet, Severity};

type Entry = ImportEntry<Item, ItemLine>;

#[derive(Debug, Default, Clone)]
struct ItemLine {
    name: String,
    qty: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct Item {
    name: String,
    qty: u32,
}

fn bindings() -> BindingTable<ItemLine> {
    BindingTable::builder()
        .column(0, |line: &mut ItemLine, value: String| line.name = value)
        .column(1, |_line: &mut ItemLine, _value: String| ())
        .column(2, |line: &mut ItemLine, value: u32| line.qty = value)
        .build()
}

fn mapper_for(_version: u32) -> Box<dyn RowMapper<ItemLine, Item>> {
    Box::new(FnMapper::new(|line: &ItemLine| {
        Ok(Some(Item {
            name: line.name.clone(),
            qty: line.qty,
        }))
    }))
}

fn scenario_source() -> MemorySource {
    MemorySource::new("scenario.xlsx").with_group(
        "S1",
        &[&["1", "h1", "h2"], &["a", "b", "3"], &["", "", ""]],
    )
}

fn sheet_strategy() -> SheetStrategy<MemorySource, ItemLine, Item> {
    SheetStrategy::new(SheetReader::new(scenario_source(), bindings(), mapper_for))
}

#[test]
fn parse_retains_only_mapped_entries() {
    let mut strategy = sheet_strategy();
    strategy.parse().unwrap();

    let results = strategy.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].nodes(), [Item { name: "a".to_string(), qty: 3 }]);
    assert!(!strategy.has_next());

    let report = strategy.report();
    assert_eq!(report.version, 1);
    assert_eq!(report.groups, ["S1"]);
    assert_eq!(report.headers["S1"], vec!["1", "h1", "h2"]);
    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.mapped_count(), 1);
    assert!(!report.has_errors());

    // The report is the serializable surface handed to a renderer.
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"version\":1"));
}

#[test]
fn post_processors_receive_the_retained_batch_once() {
    let calls = Rc::new(Cell::new(0usize));
    let size = Rc::new(Cell::new(0usize));
    let mut strategy = sheet_strategy();
    {
        let calls = Rc::clone(&calls);
        let size = Rc::clone(&size);
        strategy.add_post_processor(move |batch| {
            calls.set(calls.get() + 1);
            size.set(batch.len());
        });
    }
    strategy.parse().unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(size.get(), 1);
}

#[test]
fn processors_run_in_reverse_registration_order() {
    let order = Rc::new(std::cell::RefCell::new(Vec::new()));
    let mut strategy = sheet_strategy();
    {
        let order = Rc::clone(&order);
        strategy.register_processor(
            FnProcessor::new(move |_: &mut Entry| {
                order.borrow_mut().push("first-registered");
                Ok(())
            })
            .with_kinds(KindSet::of(&[EntryKind::Mapped])),
        );
    }
    {
        let order = Rc::clone(&order);
        strategy.register_processor(
            FnProcessor::new(move |_: &mut Entry| {
                order.borrow_mut().push("last-registered");
                Ok(())
            })
            .with_kinds(KindSet::of(&[EntryKind::Mapped])),
        );
    }
    strategy.parse().unwrap();
    assert_eq!(*order.borrow(), ["last-registered", "first-registered"]);
}

#[test]
fn processor_failure_degrades_the_row_not_the_batch() {
    let mut strategy = sheet_strategy();
    strategy.register_processor(
        FnProcessor::new(|_: &mut Entry| Err(ImportError::Processor("rejected".to_string())))
            .with_kinds(KindSet::of(&[EntryKind::Mapped])),
    );
    strategy.parse().unwrap();

    assert!(strategy.results().is_empty());
    let report = strategy.report();
    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.error_count(), 1);
    let failed = &report.entries[1];
    assert_eq!(failed.severity, Severity::Error);
    assert!(
        failed.message.contains("rejected"),
        "message: {}",
        failed.message
    );
    // The other rows are untouched.
    assert_eq!(report.entries[0].kind, EntryKind::Header);
    assert_eq!(report.entries[2].kind, EntryKind::Empty);
}

#[test]
fn abort_from_a_processor_stops_the_stream() {
    let source = MemorySource::new("abort.xlsx").with_group(
        "S1",
        &[
            &["1", "h1", "h2"],
            &["a", "b", "1"],
            &["c", "d", "2"],
            &["e", "f", "3"],
        ],
    );
    let mut strategy = SheetStrategy::new(SheetReader::new(source, bindings(), mapper_for));
    let handle = strategy.abort_handle();
    strategy.register_processor(FnProcessor::new(move |entry: &mut Entry| {
        if entry.index == 1 {
            handle.abort();
        }
        Ok(())
    }));
    strategy.parse().unwrap();

    // The entry that triggered the abort is still delivered; nothing after.
    let report = strategy.report();
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[1].kind, EntryKind::Mapped);
    assert_eq!(strategy.results().len(), 1);
    assert!(!strategy.has_next());
}

#[test]
fn keep_raw_lines_retains_unwrapped_entries() {
    let strategy = SheetStrategy::new(SheetReader::new(
        scenario_source(),
        bindings(),
        |_version| Box::new(UnmappedMapper::new()) as Box<dyn RowMapper<ItemLine, Item>>,
    ));
    let mut strategy = strategy.with_keep_raw_lines(true);
    strategy.parse().unwrap();

    let results = strategy.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind(), EntryKind::Line);
    assert_eq!(results[0].line().unwrap().name, "a");
}

#[test]
fn filter_adjustment_applies_before_the_read() {
    let mut strategy = sheet_strategy().with_filter_adjust(|mut filter| {
        filter.remove_row("S1", 1);
        filter
    });
    strategy.parse().unwrap();

    assert!(strategy.results().is_empty());
    assert_eq!(strategy.report().entries.len(), 2);
}

#[test]
fn reinitialize_clears_results_and_registrations() {
    let calls = Rc::new(Cell::new(0usize));
    let mut strategy = sheet_strategy();
    {
        let calls = Rc::clone(&calls);
        strategy.register_processor(FnProcessor::new(move |_: &mut Entry| {
            calls.set(calls.get() + 1);
            Ok(())
        }));
    }
    strategy.parse().unwrap();
    let after_first = calls.get();
    assert!(after_first > 0);
    assert_eq!(strategy.results().len(), 1);

    strategy.reinitialize(
        MemorySource::new("second.xlsx")
            .with_group("S1", &[&["1", "h1"], &["z", "y", "9"], &["w", "v", "8"]]),
    );
    assert!(strategy.results().is_empty());
    assert!(strategy.report().entries.is_empty());

    strategy.parse().unwrap();
    // Processor registrations do not survive reinitialization.
    assert_eq!(calls.get(), after_first);
    assert_eq!(strategy.results().len(), 2);
    assert_eq!(strategy.results()[0].nodes()[0].name, "z");
}

#[test]
fn reinitialize_resets_a_previous_abort() {
    let mut strategy = sheet_strategy();
    strategy.abort();
    strategy.reinitialize(scenario_source());
    strategy.parse().unwrap();
    assert_eq!(strategy.results().len(), 1);
}

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

#[test]
fn fixed_strategy_parses_line_sources() {
    let source = MemoryLineSource::new("items.txt", &["CATALOG ", "A01chair", "B02table"]);
    let bindings = FixedBindingTable::builder()
        .field(0, 3, |line: &mut FurnitureLine, value| line.code = value)
        .field(3, 8, |line: &mut FurnitureLine, value| line.label = value)
        .build();
    let mapper = FnMapper::new(|line: &FurnitureLine| {
        Ok(Some(Furniture {
            code: line.code.clone(),
            label: line.label.trim().to_string(),
        }))
    });
    let mut strategy = FixedStrategy::new(FixedWidthReader::new(source, bindings, mapper));
    strategy.parse().unwrap();

    let results = strategy.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].nodes()[0].code, "A01");
    assert_eq!(results[1].nodes()[0].label, "table");
    assert!(!strategy.has_next());
}
