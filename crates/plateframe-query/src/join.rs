//! Multi-key hash join.
//!
//! Builds a hash table on the right side, probes with the left in row
//! order. The output carries all left columns followed by the right's
//! non-key columns.

use std::collections::HashMap;

use plateframe_types::{Column, PlateError, PlateFrame, Result, Value};

use crate::groupby::RowKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// Join two frames on equally-named key columns.
pub fn join(
    left: &PlateFrame,
    right: &PlateFrame,
    on: &[&str],
    join_type: JoinType,
) -> Result<PlateFrame> {
    let left_keys: Vec<usize> = on
        .iter()
        .map(|name| left.column_index(name))
        .collect::<Result<_>>()?;
    let right_keys: Vec<usize> = on
        .iter()
        .map(|name| right.column_index(name))
        .collect::<Result<_>>()?;

    let right_carry: Vec<usize> = (0..right.num_columns())
        .filter(|c| !right_keys.contains(c))
        .collect();

    let mut names: Vec<String> = left.column_names().to_vec();
    for &col in &right_carry {
        let name = &right.column_names()[col];
        if names.contains(name) {
            return Err(PlateError::Format(format!(
                "join would duplicate column '{}'",
                name
            )));
        }
        names.push(name.clone());
    }

    let mut columns: Vec<Column> = left
        .columns()
        .iter()
        .map(|c| Column::empty(c.kind()))
        .collect();
    columns.extend(
        right_carry
            .iter()
            .map(|&c| Column::empty(right.column(c).kind())),
    );

    // Hash the right side
    let mut right_index: HashMap<RowKey, Vec<usize>> = HashMap::new();
    for row in 0..right.num_rows() {
        let key = RowKey(right_keys.iter().map(|&c| right.column(c).get(row)).collect());
        right_index.entry(key).or_default().push(row);
    }

    let left_ncols = left.num_columns();
    for left_row in 0..left.num_rows() {
        let key = RowKey(left_keys.iter().map(|&c| left.column(c).get(left_row)).collect());
        match right_index.get(&key) {
            Some(matches) => {
                for &right_row in matches {
                    for (col, column) in columns.iter_mut().enumerate().take(left_ncols) {
                        column.push(&left.column(col).get(left_row))?;
                    }
                    for (offset, &right_col) in right_carry.iter().enumerate() {
                        columns[left_ncols + offset]
                            .push(&right.column(right_col).get(right_row))?;
                    }
                }
            }
            None if join_type == JoinType::Left => {
                for (col, column) in columns.iter_mut().enumerate().take(left_ncols) {
                    column.push(&left.column(col).get(left_row))?;
                }
                for offset in 0..right_carry.len() {
                    columns[left_ncols + offset].push(&Value::Undefined)?;
                }
            }
            None => {}
        }
    }

    PlateFrame::new(names, columns)
}
