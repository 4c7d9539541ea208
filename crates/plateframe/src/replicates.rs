//! Replicate resolution over the analysis metadata.
//!
//! Several analyses may reference the same physical plate. Downstream joins
//! require at most one row per barcode, so the duplicates are resolved
//! before any raw file is read. Which barcodes are duplicated, and with
//! which analysis ids, is always reported first for observability.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::Deserialize;

use plateframe_query::sort::{sort, SortKey};
use plateframe_query::groupby::unique_by_keys;
use plateframe_types::{PlateError, PlateFrame, Result, Value};

use crate::config::{ANALYSIS_ID_COLUMN, PLATE_BARCODE_COLUMN};

/// How replicated analyses of one plate are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicatePolicy {
    /// Keep the row with the highest analysis id per barcode. Rests on the
    /// domain assumption that analysis ids grow monotonically, so the
    /// highest id is the most recent run; a tied maximum is flagged rather
    /// than picked silently.
    Auto,
    /// Remove the listed analysis ids; any remaining duplicates are the
    /// caller's to diagnose.
    Drop(Vec<i64>),
    /// Keep only the listed analysis ids, duplicates included.
    Keep(Vec<i64>),
}

/// Barcodes appearing on more than one metadata row, with their sorted
/// analysis ids.
pub fn duplicated_barcodes(info: &PlateFrame) -> Result<Vec<(String, Vec<i64>)>> {
    let barcode_col = info.column_by_name(PLATE_BARCODE_COLUMN)?;
    let id_col = info.column_by_name(ANALYSIS_ID_COLUMN)?;

    let mut by_barcode: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for row in 0..info.num_rows() {
        let barcode = match barcode_col.get(row) {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        };
        if let Value::Integer(id) = id_col.get(row) {
            by_barcode.entry(barcode).or_default().push(id);
        }
    }

    let mut duplicated: Vec<(String, Vec<i64>)> = by_barcode
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    for (_, ids) in duplicated.iter_mut() {
        ids.sort_unstable();
    }
    Ok(duplicated)
}

/// Resolve replicated analyses according to `policy`.
///
/// Under `Auto` the result is asserted to carry at most one row per
/// barcode; a violation (including a tied maximum analysis id) is
/// `DuplicateAnalysisUnresolved`. Under `Drop` and `Keep` the caller has
/// explicitly taken charge, so remaining duplicates are only logged.
pub fn resolve_replicates(info: &PlateFrame, policy: &ReplicatePolicy) -> Result<PlateFrame> {
    let duplicated = duplicated_barcodes(info)?;
    if duplicated.is_empty() {
        info!("no replicated analysis found");
    }
    for (barcode, ids) in &duplicated {
        info!(
            "analysis for plate {} is replicated {} times with analysis ids {:?}",
            barcode,
            ids.len(),
            ids
        );
    }

    let resolved = match policy {
        ReplicatePolicy::Auto => {
            // Tied maxima cannot be resolved by id ordering.
            let tied: Vec<String> = duplicated
                .iter()
                .filter(|(_, ids)| {
                    let max = ids.iter().max().copied();
                    ids.iter().filter(|&&id| Some(id) == max).count() > 1
                })
                .map(|(barcode, _)| barcode.clone())
                .collect();
            if !tied.is_empty() {
                return Err(PlateError::DuplicateAnalysisUnresolved(tied));
            }

            let id_index = info.column_index(ANALYSIS_ID_COLUMN)?;
            let barcode_index = info.column_index(PLATE_BARCODE_COLUMN)?;
            let by_id_desc = sort(info, &[SortKey::desc(id_index)])?;
            let unique = unique_by_keys(&by_id_desc, &[barcode_index])?;
            sort(&unique, &[SortKey::asc(id_index)])?
        }
        ReplicatePolicy::Drop(ids) => info.filter(ANALYSIS_ID_COLUMN, |v| match v {
            Value::Integer(id) => !ids.contains(id),
            _ => true,
        })?,
        ReplicatePolicy::Keep(ids) => info.filter(ANALYSIS_ID_COLUMN, |v| match v {
            Value::Integer(id) => ids.contains(id),
            _ => false,
        })?,
    };

    let remaining = duplicated_barcodes(&resolved)?;
    if !remaining.is_empty() {
        match policy {
            ReplicatePolicy::Auto => {
                return Err(PlateError::DuplicateAnalysisUnresolved(
                    remaining.into_iter().map(|(barcode, _)| barcode).collect(),
                ));
            }
            ReplicatePolicy::Drop(_) | ReplicatePolicy::Keep(_) => {
                for (barcode, ids) in &remaining {
                    warn!(
                        "plate {} still carries analyses {:?} after explicit resolution",
                        barcode, ids
                    );
                }
            }
        }
    }

    Ok(resolved)
}
