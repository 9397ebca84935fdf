use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::record::{EvalContext, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

/// The single active sort column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn asc(column: impl Into<String>) -> Self {
        SortState {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        SortState {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Selecting the active column flips its direction, any other column starts ascending.
    pub fn select(current: Option<&SortState>, column: &str) -> SortState {
        match current {
            Some(state) if state.column == column => SortState {
                column: state.column.clone(),
                direction: state.direction.flip(),
            },
            _ => SortState::asc(column),
        }
    }
}

/// Missing values order before present ones.
fn compare_values(a: &Option<Value>, b: &Option<Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable in-place sort by one column. Keys are extracted once per record.
pub fn sort<R: Record>(records: &mut [&R], state: &SortState, ctx: &EvalContext) {
    let mut keyed: Vec<(Option<Value>, &R)> = records
        .iter()
        .map(|r| (r.value(&state.column, ctx), *r))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| state.direction.apply(compare_values(a, b)));
    for (slot, (_, record)) in records.iter_mut().zip(keyed) {
        *slot = record;
    }
    trace!(
        "Sorted {} records by {} {:?}",
        records.len(),
        state.column,
        state.direction
    );
}
