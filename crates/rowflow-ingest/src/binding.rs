//! Declarative binding tables.
//!
//! Bindings put a typed-line field in positional relationship with either a
//! column index (sheet rows) or a character range (fixed-width lines). The
//! table is built once at definition time through a builder; applying it
//! reads each bound position exactly once per row and never mutates the
//! configuration.

use std::fmt;
use std::str::FromStr;

use rowflow_model::{ActionType, ImportError, Result};

type Setter<L> = Box<dyn Fn(&mut L, &str) -> std::result::Result<(), String>>;

struct ColumnBinding<L> {
    column: usize,
    action_type: ActionType,
    setter: Setter<L>,
}

/// Result of applying a [`BindingTable`] to one row.
#[derive(Debug)]
pub struct AppliedRow {
    /// True when every cell of the row satisfied the empty predicate.
    pub empty: bool,
    /// `(declared action type, cell value)` for every non-empty cell bound
    /// by a flagged column; input to action-type resolution.
    pub flagged: Vec<(ActionType, String)>,
}

/// Ordered column-index bindings for one typed-line definition.
pub struct BindingTable<L> {
    bindings: Vec<ColumnBinding<L>>,
}

impl<L> BindingTable<L> {
    pub fn builder() -> BindingTableBuilder<L> {
        BindingTableBuilder {
            bindings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Applies the table to one row's raw cells.
    ///
    /// Empty cells (per `is_empty`) are skipped and decide the row's empty
    /// classification. A setter failure is wrapped with the header name of
    /// the offending column (or its index when no header is known) and the
    /// row number, and is row-scoped for the caller.
    pub fn apply(
        &self,
        line: &mut L,
        cells: &[String],
        is_empty: &dyn Fn(&str) -> bool,
        headers: &[String],
        row_number: usize,
    ) -> Result<AppliedRow> {
        let mut empty = true;
        let mut flagged = Vec::new();
        for (column, cell) in cells.iter().enumerate() {
            let cell_empty = is_empty(cell);
            empty &= cell_empty;
            if cell_empty {
                continue;
            }
            for binding in &self.bindings {
                if binding.column != column {
                    continue;
                }
                (binding.setter)(line, cell).map_err(|reason| {
                    let header = headers
                        .get(column)
                        .cloned()
                        .unwrap_or_else(|| column.to_string());
                    ImportError::Convert {
                        header,
                        row: row_number,
                        reason,
                    }
                })?;
                if binding.action_type != ActionType::Persist {
                    flagged.push((binding.action_type, cell.clone()));
                }
                break;
            }
        }
        Ok(AppliedRow { empty, flagged })
    }
}

pub struct BindingTableBuilder<L> {
    bindings: Vec<ColumnBinding<L>>,
}

impl<L> BindingTableBuilder<L> {
    /// Binds a column to a field through its `FromStr` conversion.
    pub fn column<T, F>(mut self, column: usize, set: F) -> Self
    where
        T: FromStr,
        T::Err: fmt::Display,
        F: Fn(&mut L, T) + 'static,
    {
        self.bindings.push(ColumnBinding {
            column,
            action_type: ActionType::Persist,
            setter: Box::new(move |line, raw| {
                let value = raw.parse::<T>().map_err(|e| e.to_string())?;
                set(line, value);
                Ok(())
            }),
        });
        self
    }

    /// Binds a column carrying an action-type flag; the raw cell value is
    /// assigned as text and participates in action-type resolution.
    pub fn flag<F>(mut self, column: usize, action_type: ActionType, set: F) -> Self
    where
        F: Fn(&mut L, String) + 'static,
    {
        self.bindings.push(ColumnBinding {
            column,
            action_type,
            setter: Box::new(move |line, raw| {
                set(line, raw.to_string());
                Ok(())
            }),
        });
        self
    }

    pub fn build(self) -> BindingTable<L> {
        BindingTable {
            bindings: self.bindings,
        }
    }
}

struct FixedBinding<L> {
    start: usize,
    end: usize,
    setter: Box<dyn Fn(&mut L, String)>,
}

/// Ordered character-range bindings for fixed-width lines. Raw substring
/// assignment only; ranges are char-based and clamped to the line length.
pub struct FixedBindingTable<L> {
    bindings: Vec<FixedBinding<L>>,
}

impl<L> FixedBindingTable<L> {
    pub fn builder() -> FixedBindingTableBuilder<L> {
        FixedBindingTableBuilder {
            bindings: Vec::new(),
        }
    }

    pub fn apply(&self, line: &mut L, raw: &str) {
        for binding in &self.bindings {
            (binding.setter)(line, slice_chars(raw, binding.start, binding.end));
        }
    }
}

pub struct FixedBindingTableBuilder<L> {
    bindings: Vec<FixedBinding<L>>,
}

impl<L> FixedBindingTableBuilder<L> {
    pub fn field<F>(mut self, start: usize, end: usize, set: F) -> Self
    where
        F: Fn(&mut L, String) + 'static,
    {
        self.bindings.push(FixedBinding {
            start,
            end,
            setter: Box::new(set),
        });
        self
    }

    pub fn build(self) -> FixedBindingTable<L> {
        FixedBindingTable {
            bindings: self.bindings,
        }
    }
}

fn slice_chars(raw: &str, start: usize, end: usize) -> String {
    raw.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}
