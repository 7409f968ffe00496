//! Composite-key grouping for the planning sheet.
//!
//! Rows are grouped on `(Part_No, Vendor_Code)`. Keys live in a `BTreeMap`
//! so groups come out sorted, numbers before text.
//!
//! ```text
//! Rows                               Groups
//! ┌──────────────────────────┐       ┌──────────────────────┐
//! │ A, V1, Past due: 10      │       │ (A, V1) → [10, 7]    │
//! │ A, V1, Week 1:    7      │  →    ├──────────────────────┤
//! │ B, V2, Past due:  3      │       │ (B, V2) → [3, 0]     │
//! └──────────────────────────┘       └──────────────────────┘
//! ```

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::error::{AggregateError, AggregateResult};
use crate::models::{Cell, Table};

// =============================================================================
// Keys
// =============================================================================

/// One component of a group key.
///
/// Built from a non-blank [`Cell`]; numbers compare numerically and sort
/// before booleans, dates and text.
#[derive(Debug, Clone)]
pub enum KeyPart {
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl KeyPart {
    /// `None` for blank cells, which never join a group.
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Empty => None,
            Cell::Text(s) if s.is_empty() => None,
            // -0.0 and 0.0 are the same key
            Cell::Number(n) => Some(KeyPart::Number(if *n == 0.0 { 0.0 } else { *n })),
            Cell::Bool(b) => Some(KeyPart::Bool(*b)),
            Cell::DateTime(dt) => Some(KeyPart::DateTime(*dt)),
            Cell::Text(s) => Some(KeyPart::Text(s.clone())),
        }
    }

    pub fn to_cell(&self) -> Cell {
        match self {
            KeyPart::Number(n) => Cell::Number(*n),
            KeyPart::Bool(b) => Cell::Bool(*b),
            KeyPart::DateTime(dt) => Cell::DateTime(*dt),
            KeyPart::Text(s) => Cell::Text(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            KeyPart::Number(_) => 0,
            KeyPart::Bool(_) => 1,
            KeyPart::DateTime(_) => 2,
            KeyPart::Text(_) => 3,
        }
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Number(a), KeyPart::Number(b)) => a.total_cmp(b),
            (KeyPart::Bool(a), KeyPart::Bool(b)) => a.cmp(b),
            (KeyPart::DateTime(a), KeyPart::DateTime(b)) => a.cmp(b),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::hash::Hash for KeyPart {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            KeyPart::Number(n) => n.to_bits().hash(state),
            KeyPart::Bool(b) => b.hash(state),
            KeyPart::DateTime(dt) => dt.hash(state),
            KeyPart::Text(s) => s.hash(state),
        }
    }
}

/// `(Part_No, Vendor_Code)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub part_no: KeyPart,
    pub vendor_code: KeyPart,
}

impl GroupKey {
    pub fn new(part_no: KeyPart, vendor_code: KeyPart) -> Self {
        Self {
            part_no,
            vendor_code,
        }
    }

    /// Key of `row`, or `None` when either component is blank.
    pub fn of_row(row: &[Cell], part_col: usize, vendor_col: usize) -> Option<Self> {
        Some(Self::new(
            KeyPart::from_cell(&row[part_col])?,
            KeyPart::from_cell(&row[vendor_col])?,
        ))
    }

    /// Convenience for tests and callers with plain text keys.
    pub fn text(part_no: &str, vendor_code: &str) -> Self {
        Self::new(
            KeyPart::Text(part_no.to_string()),
            KeyPart::Text(vendor_code.to_string()),
        )
    }
}

// =============================================================================
// Grouping
// =============================================================================

/// Locates the key columns of a table.
#[derive(Debug, Clone, Copy)]
pub struct KeyColumns {
    pub part_no: usize,
    pub vendor_code: usize,
}

impl KeyColumns {
    pub fn key_of(&self, row: &[Cell]) -> Option<GroupKey> {
        GroupKey::of_row(row, self.part_no, self.vendor_code)
    }
}

/// Sum `value_cols` per key over the rows accepted by `filter`.
///
/// A missing value column (`None`) contributes 0. Blank cells count as 0;
/// cells that are not numbers fail with [`AggregateError::InvalidNumber`].
/// Only keys with at least one accepted row appear in the result.
///
/// Each group's values are added in ascending order, so the sums do not
/// depend on the order of the input rows.
pub fn sum_by_key<F>(
    table: &Table,
    keys: KeyColumns,
    value_cols: &[(String, Option<usize>)],
    mut filter: F,
) -> AggregateResult<BTreeMap<GroupKey, Vec<f64>>>
where
    F: FnMut(&[Cell]) -> bool,
{
    let mut groups: BTreeMap<GroupKey, Vec<Vec<f64>>> = BTreeMap::new();

    for (idx, row) in table.rows().iter().enumerate() {
        if !filter(row) {
            continue;
        }
        let Some(key) = keys.key_of(row) else {
            continue;
        };

        let values = groups
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); value_cols.len()]);

        for (column, (name, col)) in values.iter_mut().zip(value_cols) {
            let Some(col) = col else { continue };
            let cell = &row[*col];
            column.push(cell.to_number().ok_or_else(|| AggregateError::InvalidNumber {
                // header is spreadsheet row 1
                row: idx + 2,
                column: name.clone(),
                value: cell.to_string(),
            })?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, columns)| (key, columns.into_iter().map(ordered_sum).collect()))
        .collect())
}

fn ordered_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

/// First row per key, in original row order.
pub fn first_by_key<'a>(table: &'a Table, keys: KeyColumns) -> HashMap<GroupKey, &'a [Cell]> {
    let mut first: HashMap<GroupKey, &'a [Cell]> = HashMap::new();
    for row in table.rows() {
        if let Some(key) = keys.key_of(row) {
            first.entry(key).or_insert(row.as_slice());
        }
    }
    first
}

/// Outer join of two per-key sum maps; a side without the key counts as 0.
///
/// Returns `(left, right)` per key, in key order.
pub fn outer_join(
    left: &BTreeMap<GroupKey, Vec<f64>>,
    right: &BTreeMap<GroupKey, Vec<f64>>,
    width: usize,
) -> BTreeMap<GroupKey, (Vec<f64>, Vec<f64>)> {
    let zeros = vec![0.0; width];
    left.keys()
        .chain(right.keys())
        .map(|key| {
            let l = left.get(key).cloned().unwrap_or_else(|| zeros.clone());
            let r = right.get(key).cloned().unwrap_or_else(|| zeros.clone());
            (key.clone(), (l, r))
        })
        .collect()
}
