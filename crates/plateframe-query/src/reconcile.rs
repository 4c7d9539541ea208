//! Schema reconciliation: merging per-plate tables captured under
//! heterogeneous column sets into one unified table.
//!
//! Every plate's table is stamped with its acquisition and barcode
//! identifiers, merged under the chosen policy, given a synthetic per-image
//! composite identifier, and sorted for reproducible downstream grouping.

use std::sync::Arc;

use serde::Deserialize;

use plateframe_types::{Column, PlateError, PlateFrame, Result, Value, ValueKind};

use crate::sort::sort_by_names;

/// How disagreeing column sets are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Every table must have the same column count; otherwise the merge is
    /// aborted with `SchemaMismatch` and no partial result.
    Strict,
    /// The union of column names defines the schema; absent columns are
    /// filled with missing values.
    UnionWithNulls,
    /// The intersection of column names, sorted by name, defines the
    /// schema; every table is projected down to it.
    IntersectionOnly,
}

/// Column names used for stamping, the composite identifier, and the final
/// sort.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub acq_id_column: String,
    pub barcode_column: String,
    pub well_column: String,
    pub site_column: String,
    pub image_id_column: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            acq_id_column: "Metadata_AcqID".to_string(),
            barcode_column: "Metadata_Barcode".to_string(),
            well_column: "Metadata_Well".to_string(),
            site_column: "Metadata_Site".to_string(),
            image_id_column: "ImageID".to_string(),
        }
    }
}

/// One plate's raw table plus the identifiers from its analysis metadata.
#[derive(Debug, Clone)]
pub struct PlateSource {
    pub barcode: String,
    pub acquisition_id: i64,
    pub table: PlateFrame,
}

/// Merge per-plate tables into one unified frame under `policy`.
pub fn merge_plates(
    sources: &[PlateSource],
    policy: MergePolicy,
    options: &MergeOptions,
) -> Result<PlateFrame> {
    if sources.is_empty() {
        return Err(PlateError::Format("no plate tables to merge".to_string()));
    }

    let stamped: Vec<PlateFrame> = sources
        .iter()
        .map(|s| stamp(s, options))
        .collect::<Result<_>>()?;

    let merged = match policy {
        MergePolicy::Strict => merge_strict(&stamped)?,
        MergePolicy::UnionWithNulls => merge_union(&stamped)?,
        MergePolicy::IntersectionOnly => merge_intersection(&stamped)?,
    };

    let merged = derive_image_id(merged, options)?;

    let sort_candidates = [
        options.barcode_column.as_str(),
        options.well_column.as_str(),
        options.site_column.as_str(),
        options.image_id_column.as_str(),
    ];
    let sort_keys: Vec<&str> = sort_candidates
        .iter()
        .copied()
        .filter(|name| merged.has_column(name))
        .collect();
    sort_by_names(&merged, &sort_keys)
}

/// Copy the plate's identifiers onto every row of its table.
fn stamp(source: &PlateSource, options: &MergeOptions) -> Result<PlateFrame> {
    let rows = source.table.num_rows();
    let acq = Column::constant(&Value::Integer(source.acquisition_id), rows);
    let barcode = Column::constant(&Value::from(source.barcode.as_str()), rows);

    let mut out = source.table.clone();
    out = set_column(&out, &options.acq_id_column, acq)?;
    out = set_column(&out, &options.barcode_column, barcode)?;
    Ok(out)
}

fn set_column(frame: &PlateFrame, name: &str, column: Column) -> Result<PlateFrame> {
    if frame.has_column(name) {
        frame.replace_column(name, column)
    } else {
        frame.with_column(name, column)
    }
}

fn merge_strict(tables: &[PlateFrame]) -> Result<PlateFrame> {
    let counts: Vec<usize> = tables.iter().map(PlateFrame::num_columns).collect();
    if counts.iter().any(|&c| c != counts[0]) {
        let details = counts
            .iter()
            .enumerate()
            .map(|(i, c)| format!("table {} has {} columns", i, c))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(PlateError::SchemaMismatch {
            tables: (0..tables.len()).collect(),
            details,
        });
    }

    // Align later tables to the first table's column order.
    let names: Vec<&str> = tables[0].column_names().iter().map(String::as_str).collect();
    let mut aligned = Vec::with_capacity(tables.len());
    for (i, table) in tables.iter().enumerate() {
        match table.select(&names) {
            Ok(t) => aligned.push(t),
            Err(_) => {
                return Err(PlateError::SchemaMismatch {
                    tables: vec![i],
                    details: format!("table {} does not carry the first table's columns", i),
                });
            }
        }
    }
    concat_aligned(aligned)
}

fn merge_union(tables: &[PlateFrame]) -> Result<PlateFrame> {
    // Union of names in first-seen order.
    let mut union: Vec<String> = Vec::new();
    for table in tables {
        for name in table.column_names() {
            if !union.contains(name) {
                union.push(name.clone());
            }
        }
    }

    // Unified kind per name across the tables that carry it.
    let mut kinds = Vec::with_capacity(union.len());
    for name in &union {
        let mut kind: Option<ValueKind> = None;
        for table in tables {
            if let Ok(col) = table.column_by_name(name) {
                kind = Some(match kind {
                    None => col.kind(),
                    Some(k) => unify_kinds(name, k, col.kind())?,
                });
            }
        }
        kinds.push(kind.unwrap_or(ValueKind::Float));
    }

    let mut aligned = Vec::with_capacity(tables.len());
    for table in tables {
        let mut columns = Vec::with_capacity(union.len());
        for (name, &kind) in union.iter().zip(&kinds) {
            let column = match table.column_by_name(name) {
                Ok(col) => cast_to(col, kind),
                Err(_) => null_column(kind, table.num_rows()),
            };
            columns.push(column);
        }
        aligned.push(PlateFrame::new(union.clone(), columns)?);
    }
    concat_aligned(aligned)
}

fn merge_intersection(tables: &[PlateFrame]) -> Result<PlateFrame> {
    let mut common: Vec<String> = tables[0].column_names().to_vec();
    for table in &tables[1..] {
        common.retain(|name| table.has_column(name));
    }
    // Sorted by name for determinism.
    common.sort();

    let names: Vec<&str> = common.iter().map(String::as_str).collect();
    let aligned: Vec<PlateFrame> = tables
        .iter()
        .map(|t| t.select(&names))
        .collect::<Result<_>>()?;
    concat_aligned(aligned)
}

/// Vertically concatenate frames that share names and column order,
/// promoting Integer columns to Float where the tables disagree.
fn concat_aligned(tables: Vec<PlateFrame>) -> Result<PlateFrame> {
    let names = tables[0].column_names().to_vec();

    let mut kinds: Vec<ValueKind> = tables[0].kinds();
    for table in &tables[1..] {
        for (i, kind) in table.kinds().into_iter().enumerate() {
            kinds[i] = unify_kinds(&names[i], kinds[i], kind)?;
        }
    }

    let mut out: Option<PlateFrame> = None;
    for table in tables {
        let columns: Vec<Column> = table
            .columns()
            .iter()
            .zip(&kinds)
            .map(|(col, &kind)| cast_to(col, kind))
            .collect();
        let aligned = PlateFrame::new(names.clone(), columns)?;
        out = Some(match out {
            None => aligned,
            Some(acc) => acc.append(&aligned)?,
        });
    }
    match out {
        Some(frame) => Ok(frame),
        None => Err(PlateError::Format("no plate tables to merge".to_string())),
    }
}

fn unify_kinds(name: &str, a: ValueKind, b: ValueKind) -> Result<ValueKind> {
    if a == b {
        return Ok(a);
    }
    if a.is_numeric() && b.is_numeric() {
        return Ok(ValueKind::Float);
    }
    Err(PlateError::Type(format!(
        "column '{}' is {} in one table and {} in another",
        name, a, b
    )))
}

fn cast_to(col: &Column, kind: ValueKind) -> Column {
    if col.kind() == kind {
        col.clone()
    } else {
        col.cast_float()
    }
}

fn null_column(kind: ValueKind, len: usize) -> Column {
    match kind {
        ValueKind::Integer => Column::Integer(vec![None; len]),
        ValueKind::Float | ValueKind::Undefined => Column::Float(vec![None; len]),
        ValueKind::Str => Column::Str(vec![None; len]),
    }
}

/// Derive the synthetic per-image identifier by string-joining acquisition
/// id, well, and site (site only when the column is present). A missing
/// component makes the composite missing.
fn derive_image_id(frame: PlateFrame, options: &MergeOptions) -> Result<PlateFrame> {
    if !frame.has_column(&options.acq_id_column) || !frame.has_column(&options.well_column) {
        return Ok(frame);
    }

    let acq = frame.column_by_name(&options.acq_id_column)?;
    let well = frame.column_by_name(&options.well_column)?;
    let site = if frame.has_column(&options.site_column) {
        Some(frame.column_by_name(&options.site_column)?)
    } else {
        None
    };

    let mut ids: Vec<Option<Arc<str>>> = Vec::with_capacity(frame.num_rows());
    for row in 0..frame.num_rows() {
        let mut parts = vec![acq.get(row), well.get(row)];
        if let Some(site) = site {
            parts.push(site.get(row));
        }
        if parts.iter().any(Value::is_missing) {
            ids.push(None);
        } else {
            let joined = parts
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join("_");
            ids.push(Some(Arc::from(joined.as_str())));
        }
    }

    set_column(&frame, &options.image_id_column, Column::Str(ids))
}
