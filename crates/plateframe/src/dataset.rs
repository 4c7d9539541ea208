//! Raw-data assembly: from resolved analysis metadata to one unified
//! measurement table per data kind.

use std::collections::BTreeMap;

use log::{info, warn};

use plateframe_io::{read_table, ReadOptions};
use plateframe_query::{merge_plates, MergeOptions, MergePolicy, PlateSource};
use plateframe_types::{PlateError, PlateFrame, Result, Value};

use crate::config::{
    morphology_file_prefix, ACQ_ID_COLUMN, MORPHOLOGY_DATA_TYPE, PLATE_BARCODE_COLUMN,
    QC_DATA_TYPE, QC_FILE_PREFIX, RESULTS_COLUMN,
};
use crate::metadata::{fetch_analysis_info, MetadataFilter, MetadataSource};
use crate::replicates::ReplicatePolicy;

/// Knobs for dataset assembly.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub replicates: ReplicatePolicy,
    pub merge_policy: MergePolicy,
    pub merge: MergeOptions,
    pub read: ReadOptions,
    pub filter: Option<MetadataFilter>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions {
            replicates: ReplicatePolicy::Auto,
            merge_policy: MergePolicy::Strict,
            merge: MergeOptions::default(),
            read: ReadOptions::default(),
            filter: None,
        }
    }
}

/// Load one raw table per metadata row, addressed as
/// `<results>/<prefix><barcode>`. A missing file is recoverable: the plate
/// is skipped with a warning and counted.
pub fn load_plate_sources(
    info: &PlateFrame,
    prefix: &str,
    read: &ReadOptions,
) -> Result<(Vec<PlateSource>, usize)> {
    let mut sources = Vec::new();
    let mut skipped = 0usize;

    for row in 0..info.num_rows() {
        let barcode = match info.value(PLATE_BARCODE_COLUMN, row)? {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        };
        let acquisition_id = match info.value(ACQ_ID_COLUMN, row)? {
            Value::Integer(id) => id,
            other => {
                warn!(
                    "plate {} has no usable acquisition id ({}), skipping",
                    barcode, other
                );
                skipped += 1;
                continue;
            }
        };
        let results = match info.value(RESULTS_COLUMN, row)? {
            Value::Str(s) => s.to_string(),
            _ => {
                warn!("plate {} has no results directory, skipping", barcode);
                skipped += 1;
                continue;
            }
        };

        let mut base = results;
        if !base.ends_with('/') {
            base.push('/');
        }
        base.push_str(prefix);
        base.push_str(&barcode);

        match read_table(&base, read) {
            Ok(table) => {
                info!(
                    "imported {} rows x {} columns: {}",
                    table.num_rows(),
                    table.num_columns(),
                    base
                );
                sources.push(PlateSource {
                    barcode,
                    acquisition_id,
                    table,
                });
            }
            Err(PlateError::FileNotFound { base, tried }) => {
                warn!("no result file for {} (tried {:?})", base, tried);
                skipped += 1;
            }
            Err(other) => return Err(other),
        }
    }

    Ok((sources, skipped))
}

/// Assemble the unified quality-control table for the given analysis
/// metadata.
pub fn get_quality_data(info: &PlateFrame, options: &DatasetOptions) -> Result<PlateFrame> {
    let (sources, skipped) = load_plate_sources(info, QC_FILE_PREFIX, &options.read)?;
    if sources.is_empty() {
        return Err(PlateError::Format(format!(
            "no quality control files could be loaded ({} plates skipped)",
            skipped
        )));
    }
    info!(
        "quality control data of {} plates imported, {} skipped",
        sources.len(),
        skipped
    );
    merge_plates(&sources, options.merge_policy, &options.merge)
}

/// Assemble one unified feature table per object type.
pub fn get_morphology_data(
    info: &PlateFrame,
    objects: &[&str],
    options: &DatasetOptions,
) -> Result<BTreeMap<String, PlateFrame>> {
    let mut by_object = BTreeMap::new();
    for &object in objects {
        let prefix = morphology_file_prefix(object);
        let (sources, skipped) = load_plate_sources(info, &prefix, &options.read)?;
        if sources.is_empty() {
            warn!(
                "no {} feature files could be loaded ({} plates skipped)",
                object, skipped
            );
            continue;
        }
        info!(
            "{} feature data of {} plates imported, {} skipped",
            object,
            sources.len(),
            skipped
        );
        let merged = merge_plates(&sources, options.merge_policy, &options.merge)?;
        by_object.insert(object.to_string(), merged);
    }
    Ok(by_object)
}

/// The assembled quality-control view of one project: the resolved
/// analysis metadata, the merged measurement table, and sorted unique
/// listings derived from both.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub info: PlateFrame,
    pub data: PlateFrame,
    pub projects: Vec<String>,
    pub barcodes: Vec<String>,
    pub acquisition_ids: Vec<i64>,
    pub analysis_ids: Vec<i64>,
    pub wells: Vec<String>,
    pub plate_rows: Vec<String>,
    pub plate_columns: Vec<String>,
}

impl Experiment {
    /// Fetch the quality-control metadata for `name`, resolve replicates,
    /// load and merge the per-plate files, and derive the listings.
    pub fn load(
        source: &dyn MetadataSource,
        name: &str,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let info = fetch_analysis_info(
            source,
            name,
            QC_DATA_TYPE,
            &options.replicates,
            options.filter.as_ref(),
        )?;
        let data = get_quality_data(&info, options)?;

        let wells = unique_strings(&data, &options.merge.well_column)?;
        let plate_rows = dedup_sorted(
            wells
                .iter()
                .filter_map(|w| w.get(..1).map(str::to_string))
                .collect(),
        );
        let plate_columns = dedup_sorted(
            wells
                .iter()
                .filter_map(|w| w.get(1..).map(str::to_string))
                .collect(),
        );

        Ok(Experiment {
            projects: unique_strings(&info, crate::config::PROJECT_COLUMN)?,
            barcodes: unique_strings(&info, PLATE_BARCODE_COLUMN)?,
            acquisition_ids: unique_ints(&info, ACQ_ID_COLUMN)?,
            analysis_ids: unique_ints(&info, crate::config::ANALYSIS_ID_COLUMN)?,
            wells,
            plate_rows,
            plate_columns,
            info,
            data,
        })
    }

    /// The project name, when the metadata resolved to exactly one study.
    pub fn project_name(&self) -> Option<&str> {
        match self.projects.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Fetch the morphology metadata for the same options and assemble the
    /// per-object feature tables.
    pub fn morphology(
        source: &dyn MetadataSource,
        name: &str,
        objects: &[&str],
        options: &DatasetOptions,
    ) -> Result<BTreeMap<String, PlateFrame>> {
        let info = fetch_analysis_info(
            source,
            name,
            MORPHOLOGY_DATA_TYPE,
            &options.replicates,
            options.filter.as_ref(),
        )?;
        get_morphology_data(&info, objects, options)
    }
}

fn unique_strings(frame: &PlateFrame, column: &str) -> Result<Vec<String>> {
    let col = frame.column_by_name(column)?;
    let values = (0..frame.num_rows())
        .filter_map(|row| match col.get(row) {
            Value::Undefined => None,
            other => Some(other.to_string()),
        })
        .collect();
    Ok(dedup_sorted(values))
}

fn unique_ints(frame: &PlateFrame, column: &str) -> Result<Vec<i64>> {
    let col = frame.column_by_name(column)?;
    let mut values: Vec<i64> = (0..frame.num_rows())
        .filter_map(|row| match col.get(row) {
            Value::Integer(id) => Some(id),
            _ => None,
        })
        .collect();
    values.sort_unstable();
    values.dedup();
    Ok(values)
}

fn dedup_sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ANALYSIS_ID_COLUMN;
    use plateframe_io::delimited::write_delimited;
    use plateframe_types::ValueKind;

    fn metadata(dir: &str, rows: &[(&str, i64, i64)]) -> PlateFrame {
        let data: Vec<Vec<Value>> = rows
            .iter()
            .map(|(barcode, acq, analysis)| {
                vec![
                    Value::from(*barcode),
                    Value::Integer(*acq),
                    Value::Integer(*analysis),
                    Value::from(dir),
                ]
            })
            .collect();
        PlateFrame::from_rows(
            vec![
                PLATE_BARCODE_COLUMN.into(),
                ACQ_ID_COLUMN.into(),
                ANALYSIS_ID_COLUMN.into(),
                RESULTS_COLUMN.into(),
            ],
            &[
                ValueKind::Str,
                ValueKind::Integer,
                ValueKind::Integer,
                ValueKind::Str,
            ],
            &data,
        )
        .unwrap()
    }

    fn write_qc_file(dir: &std::path::Path, barcode: &str, body: &str) {
        let path = dir.join(format!("{}{}.csv", QC_FILE_PREFIX, barcode));
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_missing_plate_is_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        write_qc_file(
            dir.path(),
            "P1",
            "Metadata_Well,Metadata_Site,Count_nuclei\nA01,1,10\n",
        );
        let info = metadata(&dir.path().to_string_lossy(), &[("P1", 1, 1), ("P2", 2, 2)]);

        let (sources, skipped) =
            load_plate_sources(&info, QC_FILE_PREFIX, &ReadOptions::default()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(sources[0].barcode, "P1");
        assert_eq!(sources[0].acquisition_id, 1);
    }

    #[test]
    fn test_quality_data_merges_plates() {
        let dir = tempfile::tempdir().unwrap();
        write_qc_file(
            dir.path(),
            "P1",
            "Metadata_Well,Metadata_Site,Count_nuclei\nA01,1,10\nA02,1,20\n",
        );
        write_qc_file(
            dir.path(),
            "P2",
            "Metadata_Well,Metadata_Site,Count_nuclei\nA01,1,30\n",
        );
        let info = metadata(&dir.path().to_string_lossy(), &[("P1", 11, 1), ("P2", 12, 2)]);

        let data = get_quality_data(&info, &DatasetOptions::default()).unwrap();
        assert_eq!(data.num_rows(), 3);
        assert!(data.has_column("ImageID"));
        assert_eq!(data.value("Metadata_Barcode", 0).unwrap(), Value::from("P1"));
        assert_eq!(data.value("ImageID", 0).unwrap(), Value::from("11_A01_1"));
    }

    #[test]
    fn test_no_loadable_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let info = metadata(&dir.path().to_string_lossy(), &[("P1", 1, 1)]);
        let err = get_quality_data(&info, &DatasetOptions::default()).unwrap_err();
        assert!(matches!(err, PlateError::Format(_)));
    }

    #[test]
    fn test_morphology_loads_per_object() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Metadata_Well,Metadata_Site,ObjectNumber,Area\nA01,1,1,100.5\n";
        for object in ["nuclei", "cells"] {
            let path = dir
                .path()
                .join(format!("{}P1.csv", morphology_file_prefix(object)));
            std::fs::write(path, body).unwrap();
        }
        let info = metadata(&dir.path().to_string_lossy(), &[("P1", 1, 1)]);

        let by_object =
            get_morphology_data(&info, &["nuclei", "cells", "cytoplasm"], &DatasetOptions::default())
                .unwrap();
        assert_eq!(by_object.len(), 2);
        assert!(by_object.contains_key("nuclei"));
        assert!(by_object.contains_key("cells"));
        // No cytoplasm files existed; the object is absent, not an error.
        assert!(!by_object.contains_key("cytoplasm"));
    }

    #[test]
    fn test_mixed_serializations_merge() {
        let dir = tempfile::tempdir().unwrap();
        write_qc_file(
            dir.path(),
            "P1",
            "Metadata_Well,Metadata_Site,Count_nuclei\nA01,1,10\n",
        );
        // Second plate as the binary serialization.
        let table = PlateFrame::from_rows(
            vec![
                "Metadata_Well".into(),
                "Metadata_Site".into(),
                "Count_nuclei".into(),
            ],
            &[ValueKind::Str, ValueKind::Integer, ValueKind::Integer],
            &[vec![Value::from("B01"), Value::Integer(2), Value::Integer(7)]],
        )
        .unwrap();
        plateframe_io::columnar::write_table(
            dir.path().join(format!("{}P2.pfb", QC_FILE_PREFIX)),
            &table,
        )
        .unwrap();
        // Third plate tab-delimited.
        let tsv = PlateFrame::from_rows(
            vec![
                "Metadata_Well".into(),
                "Metadata_Site".into(),
                "Count_nuclei".into(),
            ],
            &[ValueKind::Str, ValueKind::Integer, ValueKind::Integer],
            &[vec![Value::from("C01"), Value::Integer(1), Value::Integer(9)]],
        )
        .unwrap();
        write_delimited(
            dir.path().join(format!("{}P3.tsv", QC_FILE_PREFIX)),
            &tsv,
            b'\t',
        )
        .unwrap();

        let info = metadata(
            &dir.path().to_string_lossy(),
            &[("P1", 1, 1), ("P2", 2, 2), ("P3", 3, 3)],
        );
        let data = get_quality_data(&info, &DatasetOptions::default()).unwrap();
        assert_eq!(data.num_rows(), 3);
    }
}
