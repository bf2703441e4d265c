//! Opaque row sources.
//!
//! A source only needs to open, enumerate its groups and rows, extract raw
//! cell strings, and close (via `Drop`). Two shapes exist: the multi-group
//! spreadsheet shape ([`TableSource`]) and the single-group line-text shape
//! ([`LineSource`]). A source must support being opened twice per parse:
//! once for the pre-scan filter and once for the real pass.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use rowflow_model::{ImportError, Result};

/// One raw row pulled from a table scan.
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// Index into the scan's group-name list.
    pub group_index: usize,
    /// Row number within the group.
    pub row_number: usize,
    /// Raw cell strings, in column order.
    pub cells: Vec<String>,
}

/// One pass over a multi-group source. Rows arrive group by group, in
/// order; the resource is released on drop.
pub trait TableScan {
    fn group_names(&self) -> &[String];
    fn next_row(&mut self) -> Result<Option<SourceRow>>;
}

/// A multi-group, spreadsheet-shaped source.
pub trait TableSource {
    fn filename(&self) -> &str;
    fn open(&self) -> Result<Box<dyn TableScan>>;
}

/// A single-group, line-oriented text source.
pub trait LineSource {
    fn filename(&self) -> &str;
    fn open(&self) -> Result<Box<dyn Iterator<Item = io::Result<String>>>>;
}

/// In-memory multi-group source, mainly for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    filename: String,
    groups: Vec<(String, Vec<Vec<String>>)>,
}

impl MemorySource {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
            .collect();
        self.groups.push((name.into(), rows));
        self
    }
}

impl TableSource for MemorySource {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn open(&self) -> Result<Box<dyn TableScan>> {
        Ok(Box::new(MemoryScan {
            names: self.groups.iter().map(|(name, _)| name.clone()).collect(),
            groups: self.groups.iter().map(|(_, rows)| rows.clone()).collect(),
            group_index: 0,
            row_index: 0,
        }))
    }
}

struct MemoryScan {
    names: Vec<String>,
    groups: Vec<Vec<Vec<String>>>,
    group_index: usize,
    row_index: usize,
}

impl TableScan for MemoryScan {
    fn group_names(&self) -> &[String] {
        &self.names
    }

    fn next_row(&mut self) -> Result<Option<SourceRow>> {
        while self.group_index < self.groups.len() {
            let rows = &self.groups[self.group_index];
            if self.row_index < rows.len() {
                let row = SourceRow {
                    group_index: self.group_index,
                    row_number: self.row_index,
                    cells: rows[self.row_index].clone(),
                };
                self.row_index += 1;
                return Ok(Some(row));
            }
            self.group_index += 1;
            self.row_index = 0;
        }
        Ok(None)
    }
}

/// CSV file as a single-group table source. The group is named after the
/// file stem.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn group_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string())
    }
}

impl TableSource for CsvSource {
    fn filename(&self) -> &str {
        self.path.to_str().unwrap_or("csv")
    }

    fn open(&self) -> Result<Box<dyn TableScan>> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(&self.path)
            .map_err(|e| ImportError::Source(e.to_string()))?;
        Ok(Box::new(CsvScan {
            names: vec![self.group_name()],
            records: reader.into_records(),
            row_number: 0,
        }))
    }
}

struct CsvScan {
    names: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
    row_number: usize,
}

impl TableScan for CsvScan {
    fn group_names(&self) -> &[String] {
        &self.names
    }

    fn next_row(&mut self) -> Result<Option<SourceRow>> {
        match self.records.next() {
            None => Ok(None),
            Some(Err(e)) => Err(ImportError::Source(e.to_string())),
            Some(Ok(record)) => {
                let row = SourceRow {
                    group_index: 0,
                    row_number: self.row_number,
                    cells: record.iter().map(str::to_string).collect(),
                };
                self.row_number += 1;
                Ok(Some(row))
            }
        }
    }
}

/// In-memory line source.
#[derive(Debug, Clone, Default)]
pub struct MemoryLineSource {
    filename: String,
    lines: Vec<String>,
}

impl MemoryLineSource {
    pub fn new(filename: impl Into<String>, lines: &[&str]) -> Self {
        Self {
            filename: filename.into(),
            lines: lines.iter().map(|line| (*line).to_string()).collect(),
        }
    }
}

impl LineSource for MemoryLineSource {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn open(&self) -> Result<Box<dyn Iterator<Item = io::Result<String>>>> {
        Ok(Box::new(self.lines.clone().into_iter().map(Ok)))
    }
}

/// Plain text file read line by line.
#[derive(Debug, Clone)]
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LineSource for TextFileSource {
    fn filename(&self) -> &str {
        self.path.to_str().unwrap_or("text")
    }

    fn open(&self) -> Result<Box<dyn Iterator<Item = io::Result<String>>>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file).lines()))
    }
}
