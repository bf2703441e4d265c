pub mod binding;
pub mod filter;
pub mod fixed_reader;
pub mod mapper;
pub mod sheet_reader;
pub mod source;

pub use binding::{
    AppliedRow, BindingTable, BindingTableBuilder, FixedBindingTable, FixedBindingTableBuilder,
};
pub use filter::{RawCells, ReadFilter};
pub use fixed_reader::{FixedEntries, FixedWidthReader};
pub use mapper::{EntryHook, FnMapper, RowMapper, UnmappedMapper};
pub use sheet_reader::{SheetEntries, SheetReader};
pub use source::{
    CsvSource, LineSource, MemoryLineSource, MemorySource, SourceRow, TableScan, TableSource,
    TextFileSource,
};
