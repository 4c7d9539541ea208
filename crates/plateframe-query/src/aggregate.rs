//! Grouped reduction of a measurement table with metadata recovery.
//!
//! Columns named in the reduce set are collapsed per group; columns in
//! neither the reduce set nor the grouping key are excluded from the
//! statistic and re-attached afterwards by an equality join on the keys.
//! That recovers categorical metadata that is constant within a group
//! without forcing it through a numeric reducer.

use plateframe_types::{PlateError, PlateFrame, Result};

use crate::aggregators::{AggSpec, Reduction};
use crate::backend::GroupedReducer;
use crate::groupby::unique_by_keys;
use crate::join::{join, JoinType};
use crate::sort::sort_by_names;

/// Reduce `reduce_columns` of `table` per distinct tuple of `group_keys`,
/// re-attach the remaining columns by key equality, and sort ascending by
/// the keys. The output has one row per distinct key tuple.
pub fn aggregate_measurements(
    table: &PlateFrame,
    group_keys: &[&str],
    reduce_columns: &[&str],
    method: Reduction,
    reducer: &dyn GroupedReducer,
) -> Result<PlateFrame> {
    let key_indices: Vec<usize> = group_keys
        .iter()
        .map(|name| table.column_index(name))
        .collect::<Result<_>>()?;

    let mut specs = Vec::with_capacity(reduce_columns.len());
    for &name in reduce_columns {
        if group_keys.contains(&name) {
            return Err(PlateError::Format(format!(
                "column '{}' is both a grouping key and a reduce column",
                name
            )));
        }
        specs.push(AggSpec::new(table.column_index(name)?, method, name));
    }

    let grouped = reducer.reduce(table, &key_indices, &specs)?;

    // Metadata columns to carry through: everything not reduced and not a key.
    let retained: Vec<&str> = table
        .column_names()
        .iter()
        .map(String::as_str)
        .filter(|name| !group_keys.contains(name) && !reduce_columns.contains(name))
        .collect();

    let result = if retained.is_empty() {
        grouped
    } else {
        let mut retain_cols: Vec<&str> = group_keys.to_vec();
        retain_cols.extend(&retained);
        let retain_table = table.select(&retain_cols)?;
        // One metadata row per key tuple; first occurrence wins.
        let key_positions: Vec<usize> = (0..group_keys.len()).collect();
        let deduped = unique_by_keys(&retain_table, &key_positions)?;
        join(&grouped, &deduped, group_keys, JoinType::Left)?
    };

    sort_by_names(&result, group_keys)
}
