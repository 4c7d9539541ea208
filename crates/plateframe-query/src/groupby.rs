//! Hash-based grouped reduction.
//!
//! Rows are partitioned by the distinct tuples of the key columns; each
//! spec's aggregator runs independently per partition. Group output order
//! is first-seen row order, so results are deterministic before any sort.

use std::collections::HashMap;
use std::ops::Range;

use plateframe_types::{Column, PlateFrame, Result, Value};

use crate::aggregators::{AggSpec, Aggregator};

/// A grouping-key tuple usable as a hash-map key. Floats hash and compare
/// by bit pattern; missing equals missing.
#[derive(Clone, Debug)]
pub(crate) struct RowKey(pub Vec<Value>);

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().zip(other.0.iter()).all(|(a, b)| match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Undefined, Value::Undefined) => true,
            _ => false,
        })
    }
}

impl Eq for RowKey {}

impl std::hash::Hash for RowKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                Value::Integer(i) => i.hash(state),
                Value::Float(f) => f.to_bits().hash(state),
                Value::Str(s) => s.hash(state),
                Value::Undefined => {}
            }
        }
    }
}

/// Accumulated per-group aggregator state, ordered by first appearance.
pub(crate) struct GroupState {
    entries: Vec<(RowKey, Vec<Box<dyn Aggregator>>)>,
    index: HashMap<RowKey, usize>,
}

impl GroupState {
    pub(crate) fn new() -> Self {
        GroupState {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Fold a row range of the table into the state.
    pub(crate) fn accumulate(
        &mut self,
        table: &PlateFrame,
        rows: Range<usize>,
        key_columns: &[usize],
        specs: &[AggSpec],
    ) {
        for row in rows {
            let key = RowKey(
                key_columns
                    .iter()
                    .map(|&col| table.column(col).get(row))
                    .collect(),
            );

            let slot = match self.index.get(&key) {
                Some(&slot) => slot,
                None => {
                    let slot = self.entries.len();
                    let aggs: Vec<Box<dyn Aggregator>> =
                        specs.iter().map(|s| s.aggregator.box_clone()).collect();
                    self.index.insert(key.clone(), slot);
                    self.entries.push((key, aggs));
                    slot
                }
            };

            let aggs = &mut self.entries[slot].1;
            for (i, spec) in specs.iter().enumerate() {
                let value = table.column(spec.column).get(row);
                aggs[i].add(&value);
            }
        }
    }

    /// Fold a later partial state into this one. `other` must have been
    /// accumulated from rows that all follow this state's rows.
    pub(crate) fn merge(&mut self, other: GroupState) {
        for (key, aggs) in other.entries {
            match self.index.get(&key) {
                Some(&slot) => {
                    for (mine, theirs) in self.entries[slot].1.iter_mut().zip(aggs.iter()) {
                        mine.merge(theirs.as_ref());
                    }
                }
                None => {
                    let slot = self.entries.len();
                    self.index.insert(key.clone(), slot);
                    self.entries.push((key, aggs));
                }
            }
        }
    }

    /// Assemble the output frame: key columns (input kinds preserved)
    /// followed by one column per spec.
    pub(crate) fn finish(
        self,
        table: &PlateFrame,
        key_columns: &[usize],
        specs: &[AggSpec],
    ) -> Result<PlateFrame> {
        let mut names: Vec<String> = key_columns
            .iter()
            .map(|&col| table.column_names()[col].clone())
            .collect();
        names.extend(specs.iter().map(|s| s.output_name.clone()));

        let mut columns: Vec<Column> = key_columns
            .iter()
            .map(|&col| Column::empty(table.column(col).kind()))
            .collect();
        columns.extend(
            specs
                .iter()
                .map(|s| Column::empty(s.aggregator.output_kind(table.column(s.column).kind()))),
        );

        let num_keys = key_columns.len();
        for (key, mut aggs) in self.entries {
            for (i, value) in key.0.iter().enumerate() {
                columns[i].push(value)?;
            }
            for (i, agg) in aggs.iter_mut().enumerate() {
                columns[num_keys + i].push(&agg.finalize())?;
            }
        }

        PlateFrame::new(names, columns)
    }
}

/// Single-pass grouped reduction over the whole table.
pub fn group_by(table: &PlateFrame, key_columns: &[usize], specs: &[AggSpec]) -> Result<PlateFrame> {
    let mut state = GroupState::new();
    state.accumulate(table, 0..table.num_rows(), key_columns, specs);
    state.finish(table, key_columns, specs)
}

/// Keep the first row for each distinct key tuple, in first-seen order.
pub fn unique_by_keys(table: &PlateFrame, key_columns: &[usize]) -> Result<PlateFrame> {
    let mut seen: std::collections::HashSet<RowKey> = std::collections::HashSet::new();
    let mut keep = Vec::new();
    for row in 0..table.num_rows() {
        let key = RowKey(
            key_columns
                .iter()
                .map(|&col| table.column(col).get(row))
                .collect(),
        );
        if seen.insert(key) {
            keep.push(row);
        }
    }
    table.take(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::Reduction;
    use plateframe_types::ValueKind;

    fn sample() -> PlateFrame {
        // well, site, intensity
        PlateFrame::from_rows(
            vec!["well".into(), "site".into(), "intensity".into()],
            &[ValueKind::Str, ValueKind::Integer, ValueKind::Float],
            &[
                vec![Value::from("A"), Value::Integer(1), Value::Float(10.0)],
                vec![Value::from("A"), Value::Integer(1), Value::Float(20.0)],
                vec![Value::from("B"), Value::Integer(2), Value::Float(30.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_mean_deterministic() {
        let table = sample();
        let specs = [AggSpec::new(2, Reduction::Mean, "intensity")];
        let out = group_by(&table, &[0, 1], &specs).unwrap();

        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.num_columns(), 3);
        // First-seen order: (A,1) then (B,2)
        assert_eq!(
            out.row(0),
            vec![Value::from("A"), Value::Integer(1), Value::Float(15.0)]
        );
        assert_eq!(
            out.row(1),
            vec![Value::from("B"), Value::Integer(2), Value::Float(30.0)]
        );
    }

    #[test]
    fn test_group_by_preserves_key_kinds() {
        let table = sample();
        let specs = [AggSpec::new(2, Reduction::Max, "intensity")];
        let out = group_by(&table, &[1], &specs).unwrap();
        assert_eq!(out.kinds(), vec![ValueKind::Integer, ValueKind::Float]);
    }

    #[test]
    fn test_group_by_missing_keys_form_a_group() {
        let table = PlateFrame::from_rows(
            vec!["k".into(), "v".into()],
            &[ValueKind::Str, ValueKind::Integer],
            &[
                vec![Value::Undefined, Value::Integer(1)],
                vec![Value::Undefined, Value::Integer(3)],
                vec![Value::from("x"), Value::Integer(5)],
            ],
        )
        .unwrap();
        let specs = [AggSpec::new(1, Reduction::Mean, "v")];
        let out = group_by(&table, &[0], &specs).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.row(0), vec![Value::Undefined, Value::Float(2.0)]);
    }

    #[test]
    fn test_group_by_empty_table() {
        let table = PlateFrame::empty(
            vec!["k".into(), "v".into()],
            &[ValueKind::Str, ValueKind::Float],
        )
        .unwrap();
        let specs = [AggSpec::new(1, Reduction::Mean, "v")];
        let out = group_by(&table, &[0], &specs).unwrap();
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.kinds(), vec![ValueKind::Str, ValueKind::Float]);
    }

    #[test]
    fn test_partial_merge_matches_single_pass() {
        let table = sample();
        let specs = [AggSpec::new(2, Reduction::Mean, "intensity")];

        let mut left = GroupState::new();
        left.accumulate(&table, 0..2, &[0, 1], &specs);
        let mut right = GroupState::new();
        right.accumulate(&table, 2..3, &[0, 1], &specs);
        left.merge(right);
        let merged = left.finish(&table, &[0, 1], &specs).unwrap();

        let single = group_by(&table, &[0, 1], &specs).unwrap();
        assert_eq!(merged, single);
    }

    #[test]
    fn test_unique_by_keys_keeps_first() {
        let table = sample();
        let out = unique_by_keys(&table, &[0]).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.value("intensity", 0).unwrap(), Value::Float(10.0));
    }
}
