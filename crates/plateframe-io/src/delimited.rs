//! Comma- and tab-delimited table reading and writing.
//!
//! Column types are inferred from the data: a column whose non-empty values
//! all parse as integers becomes Integer, else Float if they all parse as
//! floats, else Str. Empty fields are missing values.

use std::path::Path;
use std::sync::Arc;

use plateframe_types::{Column, PlateError, PlateFrame, Result};

/// Read a delimited file with a header row.
pub fn read_delimited(path: impl AsRef<Path>, delimiter: u8) -> Result<PlateFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path.as_ref())
        .map_err(csv_error)?;

    let names: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.len() != names.len() {
            return Err(PlateError::Format(format!(
                "record has {} fields, expected {}",
                record.len(),
                names.len()
            )));
        }
        for (col, field) in record.iter().enumerate() {
            cells[col].push(field.to_string());
        }
    }

    let columns = cells.iter().map(|data| infer_column(data)).collect();
    PlateFrame::new(names, columns)
}

/// Write a frame as a delimited file. Missing values become empty fields.
pub fn write_delimited(
    path: impl AsRef<Path>,
    frame: &PlateFrame,
    delimiter: u8,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path.as_ref())
        .map_err(csv_error)?;

    writer
        .write_record(frame.column_names())
        .map_err(csv_error)?;
    for row in 0..frame.num_rows() {
        let fields: Vec<String> = frame.row(row).iter().map(|v| v.to_string()).collect();
        writer.write_record(&fields).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> PlateError {
    PlateError::Format(format!("delimited parse error: {}", e))
}

/// Infer a typed column from raw string fields. A column with no non-empty
/// values stays Str here; the reader retypes it after loading.
fn infer_column(data: &[String]) -> Column {
    let present: Vec<&String> = data.iter().filter(|s| !s.is_empty()).collect();

    if !present.is_empty() && present.iter().all(|s| s.parse::<i64>().is_ok()) {
        return Column::Integer(
            data.iter()
                .map(|s| {
                    if s.is_empty() {
                        None
                    } else {
                        s.parse::<i64>().ok()
                    }
                })
                .collect(),
        );
    }

    if !present.is_empty() && present.iter().all(|s| s.parse::<f64>().is_ok()) {
        return Column::Float(
            data.iter()
                .map(|s| {
                    if s.is_empty() {
                        None
                    } else {
                        s.parse::<f64>().ok()
                    }
                })
                .collect(),
        );
    }

    Column::Str(
        data.iter()
            .map(|s| {
                if s.is_empty() {
                    None
                } else {
                    Some(Arc::from(s.as_str()))
                }
            })
            .collect(),
    )
}
