//! Column rescaling.
//!
//! Numeric columns transform independently; non-numeric columns pass
//! through unchanged in their original positions. A degenerate column —
//! zero variance, zero range, or too few observations — produces missing
//! values rather than a division fault.

use serde::Deserialize;

use plateframe_types::{Column, PlateError, PlateFrame, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NormalizeMethod {
    /// (x − sample mean) / sample standard deviation (N−1 divisor).
    #[serde(rename = "zscore")]
    ZScore,
    /// (x − min) / (max − min).
    #[serde(rename = "minmax")]
    MinMax,
}

impl std::str::FromStr for NormalizeMethod {
    type Err = PlateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zscore" => Ok(NormalizeMethod::ZScore),
            "minmax" => Ok(NormalizeMethod::MinMax),
            other => Err(PlateError::Format(format!(
                "unknown normalization method '{}'",
                other
            ))),
        }
    }
}

/// Rescale every numeric column of `table` with `method`.
pub fn normalize(table: &PlateFrame, method: NormalizeMethod) -> Result<PlateFrame> {
    let mut columns = Vec::with_capacity(table.num_columns());
    for col in table.columns() {
        if col.is_numeric() {
            columns.push(normalize_column(col, method));
        } else {
            columns.push(col.clone());
        }
    }
    PlateFrame::new(table.column_names().to_vec(), columns)
}

fn normalize_column(col: &Column, method: NormalizeMethod) -> Column {
    let observed = col.numeric_values();

    let transform: Option<(f64, f64)> = match method {
        NormalizeMethod::ZScore => {
            if observed.len() < 2 {
                None
            } else {
                let n = observed.len() as f64;
                let mean = observed.iter().sum::<f64>() / n;
                let variance =
                    observed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
                let std = variance.sqrt();
                if std == 0.0 {
                    None
                } else {
                    Some((mean, std))
                }
            }
        }
        NormalizeMethod::MinMax => {
            let min = observed.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = observed.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if observed.is_empty() || max == min {
                None
            } else {
                Some((min, max - min))
            }
        }
    };

    Column::Float(match transform {
        // Degenerate column: every value becomes missing.
        None => vec![None; col.len()],
        Some((offset, scale)) => (0..col.len())
            .map(|row| col.get(row).as_f64().map(|v| (v - offset) / scale))
            .collect(),
    })
}
