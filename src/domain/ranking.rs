//! Sorting and top-N pruning of events by a numeric field.
//!
//! All sorts are stable: items with equal keys keep their input order.

use crate::domain::event::NumericFields;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ascending" | "asc" => Ok(SortDirection::Ascending),
            "descending" | "desc" => Ok(SortDirection::Descending),
            other => Err(format!(
                "unknown sort direction '{}' (expected ascending or descending)",
                other
            )),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ascending"),
            SortDirection::Descending => write!(f, "descending"),
        }
    }
}

/// Sort `items` by `field` and keep at most `limit` of them.
///
/// Items without the field are dropped before sorting.
pub fn rank_and_prune<T: NumericFields + Clone>(
    items: &[T],
    field: &str,
    direction: SortDirection,
    limit: Option<usize>,
) -> Vec<T> {
    let mut keyed: Vec<(f64, &T)> = items
        .iter()
        .filter_map(|item| item.field(field).map(|v| (v, item)))
        .collect();

    keyed.sort_by(|a, b| direction.apply(a.0.total_cmp(&b.0)));

    let take = limit.unwrap_or(keyed.len());
    keyed
        .into_iter()
        .take(take)
        .map(|(_, item)| item.clone())
        .collect()
}

/// Stable in-place sort of the full sequence by `field`.
///
/// Items without the field sort as if it were zero, so nothing is lost.
pub fn sort_by_field<T: NumericFields>(items: &mut [T], field: &str, direction: SortDirection) {
    items.sort_by(|a, b| {
        let ka = a.field(field).unwrap_or(0.0);
        let kb = b.field(field).unwrap_or(0.0);
        direction.apply(ka.total_cmp(&kb))
    });
}
