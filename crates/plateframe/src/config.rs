//! Schema constants for the analysis metadata store and the raw result
//! files.
//!
//! The metadata columns mirror the `image_analyses_per_plate` listing the
//! injected [`crate::MetadataSource`] returns; the file prefixes address
//! the per-plate result files inside each analysis' results directory.

/// Project name column in the analysis metadata.
pub const PROJECT_COLUMN: &str = "project";

/// Physical plate identifier; shared by replicated analyses.
pub const PLATE_BARCODE_COLUMN: &str = "plate_barcode";

/// Acquisition identifier stamped onto every measurement row.
pub const ACQ_ID_COLUMN: &str = "plate_acq_id";

/// Unique identifier of one executed analysis run.
pub const ANALYSIS_ID_COLUMN: &str = "analysis_id";

/// Completion date of the analysis; the metadata source filters null dates.
pub const ANALYSIS_DATE_COLUMN: &str = "analysis_date";

/// Directory the analysis wrote its result files into.
pub const RESULTS_COLUMN: &str = "results";

/// Data-type tag selecting quality-control records.
pub const QC_DATA_TYPE: &str = "cp-qc";

/// Data-type tag selecting cell-morphology records.
pub const MORPHOLOGY_DATA_TYPE: &str = "cp-features";

/// Filename prefix of the per-plate image quality table.
pub const QC_FILE_PREFIX: &str = "qcRAW_images_";

/// Object types with per-object feature files.
pub const MORPHOLOGY_OBJECTS: [&str; 3] = ["nuclei", "cells", "cytoplasm"];

/// Filename prefix of one object type's per-plate feature table.
pub fn morphology_file_prefix(object: &str) -> String {
    format!("featICF_{}_", object)
}
