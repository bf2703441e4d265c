//! Action types and the flagged-column tie-break.
//!
//! An action type is a downstream directive attached to an outcome entry:
//! persist the mapped nodes, delete them, detach them, or ignore the row
//! entirely. Bound columns may declare a non-default action type; when a
//! row carries a truthy value in such a column the row's action type is
//! resolved by [`resolve_action_type`].

use serde::{Deserialize, Serialize};

/// Downstream directive for a row's mapped nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Keep the mapped nodes (the default absent any flagged column).
    #[default]
    Persist,
    /// Delete the nodes identified by the row.
    Delete,
    /// Detach the nodes identified by the row.
    Detach,
    /// Drop the row without producing nodes.
    Ignore,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Persist => "persist",
            ActionType::Delete => "delete",
            ActionType::Detach => "detach",
            ActionType::Ignore => "ignore",
        }
    }

    /// Tie-break order: `Ignore` sorts before every other action type.
    pub fn order(&self) -> u8 {
        match self {
            ActionType::Ignore => 0,
            ActionType::Delete | ActionType::Detach | ActionType::Persist => 1,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokens accepted as a truthy flag value in a flagged column.
pub const TRUTHY_FLAGS: [&str; 4] = ["oui", "yes", "y", "o"];

/// Whether a cell value counts as a truthy flag, compared case-insensitively.
pub fn is_truthy_flag(value: &str) -> bool {
    let trimmed = value.trim();
    TRUTHY_FLAGS.iter().any(|flag| flag.eq_ignore_ascii_case(trimmed))
}

/// Resolve a data row's action type from its flagged-column candidates.
///
/// Candidates are `(declared action type, converted value)` pairs collected
/// while binding the row. Only candidates whose declared action type is not
/// `Persist` and whose value is a truthy flag participate; they are sorted
/// ascending by [`ActionType::order`] (a stable sort, so declaration order
/// breaks ties within an order class) and the first wins. No candidate
/// resolves to `Persist`.
pub fn resolve_action_type(candidates: &[(ActionType, String)]) -> ActionType {
    let mut flagged: Vec<ActionType> = candidates
        .iter()
        .filter(|(action, value)| *action != ActionType::Persist && is_truthy_flag(value))
        .map(|(action, _)| *action)
        .collect();
    flagged.sort_by_key(ActionType::order);
    flagged.first().copied().unwrap_or(ActionType::Persist)
}
