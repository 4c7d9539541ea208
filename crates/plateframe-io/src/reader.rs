//! Format probing and post-load normalization.
//!
//! A result table is addressed by its base path without extension. The
//! candidate serializations are probed in a fixed preference order and the
//! first existing file wins.

use std::path::PathBuf;

use log::debug;

use plateframe_types::{PlateError, PlateFrame, Result};

use crate::{columnar, delimited};

/// Probe order: binary columnar first, then comma-, then tab-delimited.
const EXTENSIONS: [&str; 3] = ["pfb", "csv", "tsv"];

/// Options applied after a table is loaded.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Narrow 64-bit floats and integers to 32-bit width on ingestion.
    pub narrow_numeric: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            narrow_numeric: true,
        }
    }
}

/// Load the table at `base`, trying `base.pfb`, `base.csv`, `base.tsv` in
/// order. Fails with `FileNotFound` when none exists.
///
/// Post-load, a column whose every value is missing is retyped to Float so
/// it joins numeric operations instead of being treated as text, and
/// numeric columns are narrowed when the options ask for it.
pub fn read_table(base: &str, options: &ReadOptions) -> Result<PlateFrame> {
    for ext in EXTENSIONS {
        let candidate = PathBuf::from(format!("{}.{}", base, ext));
        if !candidate.is_file() {
            continue;
        }
        debug!("reading {}", candidate.display());
        let frame = match ext {
            "csv" => delimited::read_delimited(&candidate, b',')?,
            "tsv" => delimited::read_delimited(&candidate, b'\t')?,
            _ => columnar::read_table(&candidate)?,
        };
        return normalize_loaded(frame, options);
    }

    Err(PlateError::FileNotFound {
        base: base.to_string(),
        tried: EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    })
}

fn normalize_loaded(frame: PlateFrame, options: &ReadOptions) -> Result<PlateFrame> {
    let mut out = frame;
    for name in out.column_names().to_vec() {
        let col = out.column_by_name(&name)?;
        if !col.is_numeric() && col.all_null() {
            let retyped = col.cast_float();
            out = out.replace_column(&name, retyped)?;
        }
    }
    if options.narrow_numeric {
        for name in out.column_names().to_vec() {
            let col = out.column_by_name(&name)?;
            if col.is_numeric() {
                let narrowed = col.narrow();
                out = out.replace_column(&name, narrowed)?;
            }
        }
    }
    Ok(out)
}
