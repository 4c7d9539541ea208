//! End-to-end pipeline tests: metadata → replicate resolution → file
//! loading → schema reconciliation → hierarchical roll-up.

use std::collections::BTreeMap;

use plateframe::config::{
    ACQ_ID_COLUMN, ANALYSIS_ID_COLUMN, PLATE_BARCODE_COLUMN, PROJECT_COLUMN, QC_FILE_PREFIX,
    RESULTS_COLUMN,
};
use plateframe::{
    merge_plates, roll_up, AggregationConfig, AggregationLevel, Column, DatasetOptions,
    Experiment, LocalReducer, MergeOptions, MergePolicy, MetadataSource, ParallelReducer,
    PlateFrame, PlateSource, ReplicatePolicy, Result, Value, ValueKind,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory stand-in for the metadata store.
struct StubStore {
    metadata: PlateFrame,
}

impl MetadataSource for StubStore {
    fn project_names(&self) -> Result<Vec<String>> {
        Ok(vec!["specs-rescreen".to_string()])
    }

    fn analysis_metadata(&self, project: &str, _data_type: &str) -> Result<PlateFrame> {
        self.metadata.filter(PROJECT_COLUMN, |v| match v {
            Value::Str(s) => s.contains(project),
            _ => false,
        })
    }
}

fn store(results_dir: &str, rows: &[(&str, i64, i64)]) -> StubStore {
    let data: Vec<Vec<Value>> = rows
        .iter()
        .map(|(barcode, acq, analysis)| {
            vec![
                Value::from("specs-rescreen"),
                Value::from(*barcode),
                Value::Integer(*acq),
                Value::Integer(*analysis),
                Value::from(results_dir),
            ]
        })
        .collect();
    StubStore {
        metadata: PlateFrame::from_rows(
            vec![
                PROJECT_COLUMN.into(),
                PLATE_BARCODE_COLUMN.into(),
                ACQ_ID_COLUMN.into(),
                ANALYSIS_ID_COLUMN.into(),
                RESULTS_COLUMN.into(),
            ],
            &[
                ValueKind::Str,
                ValueKind::Str,
                ValueKind::Integer,
                ValueKind::Integer,
                ValueKind::Str,
            ],
            &data,
        )
        .unwrap(),
    }
}

fn write_qc_csv(dir: &std::path::Path, barcode: &str, body: &str) {
    std::fs::write(dir.join(format!("{}{}.csv", QC_FILE_PREFIX, barcode)), body).unwrap();
}

#[test]
fn test_experiment_load_and_roll_up() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    // Two sites per well, two wells per plate, two plates. An old analysis
    // of P1 exists and must lose to the newer one under Auto resolution;
    // only the newer file exists on disk.
    write_qc_csv(
        dir.path(),
        "P1",
        "Metadata_Well,Metadata_Site,Count_nuclei,ImageQuality_Focus\n\
         A01,1,100,0.8\nA01,2,110,0.9\nA02,1,90,0.7\nA02,2,80,\n",
    );
    write_qc_csv(
        dir.path(),
        "P2",
        "Metadata_Well,Metadata_Site,Count_nuclei,ImageQuality_Focus\n\
         A01,1,200,0.5\nA01,2,220,0.6\nA02,1,210,0.4\nA02,2,230,0.3\n",
    );

    let source = store(
        &dir.path().to_string_lossy(),
        &[("P1", 11, 1), ("P1", 11, 2), ("P2", 12, 3)],
    );

    let experiment = Experiment::load(&source, "specs", &DatasetOptions::default()).unwrap();

    assert_eq!(experiment.projects, vec!["specs-rescreen".to_string()]);
    assert_eq!(experiment.project_name(), Some("specs-rescreen"));
    assert_eq!(experiment.barcodes, vec!["P1".to_string(), "P2".to_string()]);
    assert_eq!(experiment.analysis_ids, vec![2, 3]);
    assert_eq!(experiment.wells, vec!["A01".to_string(), "A02".to_string()]);
    assert_eq!(experiment.plate_rows, vec!["A".to_string()]);
    assert_eq!(experiment.plate_columns, vec!["01".to_string(), "02".to_string()]);

    // 8 rows: 2 plates x 2 wells x 2 sites, sorted by (barcode, well, site).
    assert_eq!(experiment.data.num_rows(), 8);
    assert_eq!(
        experiment.data.value("ImageID", 0).unwrap(),
        Value::from("11_A01_1")
    );

    // Roll up site → well → plate.
    let features = ["Count_nuclei", "ImageQuality_Focus"];
    let config = AggregationConfig::default();
    let per_plate = roll_up(
        &experiment.data,
        AggregationLevel::Site,
        AggregationLevel::Plate,
        &config,
        &features,
        &LocalReducer,
    )
    .unwrap();

    assert_eq!(per_plate.num_rows(), 2);
    // P1 nuclei mean: (100+110+90+80)/4 = 95 (balanced groups).
    let p1 = per_plate.value("Count_nuclei", 0).unwrap().as_f64().unwrap();
    assert!((p1 - 95.0).abs() < 1e-9);
    // The missing-aware mean ignores A02/site2's absent focus value.
    let p1_focus = per_plate
        .value("ImageQuality_Focus", 0)
        .unwrap()
        .as_f64()
        .unwrap();
    let expected = ((0.8 + 0.9) / 2.0 + 0.7) / 2.0; // well means, then plate
    assert!((p1_focus - expected).abs() < 1e-6);
}

#[test]
fn test_backends_agree_on_the_pipeline_output() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let mut body = String::from("Metadata_Well,Metadata_Site,Count_nuclei\n");
    for (w, well) in ["A01", "A02", "B01", "B02"].iter().enumerate() {
        for site in 1..=3 {
            body.push_str(&format!("{},{},{}\n", well, site, site * 7 + w as i32));
        }
    }
    write_qc_csv(dir.path(), "P9", &body);

    let source = store(&dir.path().to_string_lossy(), &[("P9", 90, 1)]);
    let experiment = Experiment::load(&source, "specs", &DatasetOptions::default()).unwrap();

    let config = AggregationConfig::default();
    let features = ["Count_nuclei"];

    let local = roll_up(
        &experiment.data,
        AggregationLevel::Site,
        AggregationLevel::Well,
        &config,
        &features,
        &LocalReducer,
    )
    .unwrap();

    let parallel_backend = ParallelReducer::new(3).unwrap();
    let parallel = roll_up(
        &experiment.data,
        AggregationLevel::Site,
        AggregationLevel::Well,
        &config,
        &features,
        &parallel_backend,
    )
    .unwrap();

    assert_eq!(local.num_rows(), parallel.num_rows());
    assert_eq!(local.column_names(), parallel.column_names());
    for row in 0..local.num_rows() {
        // Grouping keys must match exactly; both outputs are key-sorted.
        assert_eq!(
            local.value("Metadata_Well", row).unwrap(),
            parallel.value("Metadata_Well", row).unwrap()
        );
        let a = local.value("Count_nuclei", row).unwrap().as_f64().unwrap();
        let b = parallel.value("Count_nuclei", row).unwrap().as_f64().unwrap();
        assert!((a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0));
    }
}

#[test]
fn test_union_round_trip_recovers_each_table() {
    // Tables with disjoint non-key columns; the union merge then a
    // projection back to one table's columns reproduces that table.
    let t1 = PlateFrame::from_rows(
        vec!["Metadata_Well".into(), "focus".into()],
        &[ValueKind::Str, ValueKind::Float],
        &[
            vec![Value::from("A01"), Value::Float(0.25)],
            vec![Value::from("A02"), Value::Float(0.5)],
        ],
    )
    .unwrap();
    let t2 = PlateFrame::from_rows(
        vec!["Metadata_Well".into(), "count".into()],
        &[ValueKind::Str, ValueKind::Integer],
        &[vec![Value::from("A01"), Value::Integer(42)]],
    )
    .unwrap();

    let sources = vec![
        PlateSource {
            barcode: "P1".to_string(),
            acquisition_id: 1,
            table: t1.clone(),
        },
        PlateSource {
            barcode: "P2".to_string(),
            acquisition_id: 2,
            table: t2.clone(),
        },
    ];
    let merged = merge_plates(&sources, MergePolicy::UnionWithNulls, &MergeOptions::default())
        .unwrap();

    // Rows of P1, projected to t1's columns, equal t1 (sorted by well).
    let p1_rows = merged
        .filter("Metadata_Barcode", |v| matches!(v, Value::Str(s) if s.as_ref() == "P1"))
        .unwrap();
    let recovered = p1_rows.select(&["Metadata_Well", "focus"]).unwrap();
    assert_eq!(recovered, t1);

    let p2_rows = merged
        .filter("Metadata_Barcode", |v| matches!(v, Value::Str(s) if s.as_ref() == "P2"))
        .unwrap();
    let recovered = p2_rows.select(&["Metadata_Well", "count"]).unwrap();
    assert_eq!(recovered, t2);
}

#[test]
fn test_strict_mismatch_aborts_the_whole_merge() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_qc_csv(dir.path(), "P1", "Metadata_Well,a,b,c,d\nA01,1,2,3,4\n");
    write_qc_csv(dir.path(), "P2", "Metadata_Well,a,b,c,d,e\nA01,1,2,3,4,5\n");

    let source = store(&dir.path().to_string_lossy(), &[("P1", 1, 1), ("P2", 2, 2)]);
    let err = Experiment::load(&source, "specs", &DatasetOptions::default()).unwrap_err();
    match err {
        plateframe::PlateError::SchemaMismatch { tables, .. } => {
            assert_eq!(tables, vec![0, 1]);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn test_union_policy_accepts_heterogeneous_plates() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_qc_csv(dir.path(), "P1", "Metadata_Well,Metadata_Site,a\nA01,1,1\n");
    write_qc_csv(dir.path(), "P2", "Metadata_Well,Metadata_Site,b\nA01,1,2\n");

    let source = store(&dir.path().to_string_lossy(), &[("P1", 1, 1), ("P2", 2, 2)]);
    let options = DatasetOptions {
        merge_policy: MergePolicy::UnionWithNulls,
        ..DatasetOptions::default()
    };
    let experiment = Experiment::load(&source, "specs", &options).unwrap();

    assert_eq!(experiment.data.num_rows(), 2);
    assert_eq!(experiment.data.value("b", 0).unwrap(), Value::Undefined);
    assert_eq!(experiment.data.value("a", 1).unwrap(), Value::Undefined);
}

#[test]
fn test_replicate_examples_from_the_metadata_side() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_qc_csv(dir.path(), "B1", "Metadata_Well,Metadata_Site,v\nA01,1,5\n");

    // Auto: ids [3, 7, 5] resolve to 7.
    let source = store(
        &dir.path().to_string_lossy(),
        &[("B1", 1, 3), ("B1", 1, 7), ("B1", 1, 5)],
    );
    let experiment = Experiment::load(&source, "specs", &DatasetOptions::default()).unwrap();
    assert_eq!(experiment.analysis_ids, vec![7]);

    // Keep {3, 5}: exactly those two rows survive.
    let options = DatasetOptions {
        replicates: ReplicatePolicy::Keep(vec![3, 5]),
        ..DatasetOptions::default()
    };
    let experiment = Experiment::load(&source, "specs", &options).unwrap();
    assert_eq!(experiment.analysis_ids, vec![3, 5]);
}

#[test]
fn test_morphology_per_object_tables() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let body = "Metadata_Well,Metadata_Site,ObjectNumber,AreaShape_Area\nA01,1,1,120.5\nA01,1,2,98.0\n";
    for object in ["nuclei", "cells"] {
        std::fs::write(
            dir.path().join(format!("featICF_{}_P5.csv", object)),
            body,
        )
        .unwrap();
    }

    let source = store(&dir.path().to_string_lossy(), &[("P5", 50, 1)]);
    let by_object = Experiment::morphology(
        &source,
        "specs",
        &["nuclei", "cells", "cytoplasm"],
        &DatasetOptions::default(),
    )
    .unwrap();

    assert_eq!(by_object.len(), 2);
    let nuclei = &by_object["nuclei"];
    assert_eq!(nuclei.num_rows(), 2);
    assert_eq!(nuclei.value("ImageID", 0).unwrap(), Value::from("50_A01_1"));
}

#[test]
fn test_compound_level_joins_batch_metadata() {
    // Well-level measurements with a batch_id carried as metadata roll up
    // to one row per compound batch.
    let table = PlateFrame::new(
        vec![
            "Metadata_AcqID".into(),
            "Metadata_Barcode".into(),
            "Metadata_Well".into(),
            "batch_id".into(),
            "activity".into(),
        ],
        vec![
            Column::Integer(vec![Some(1), Some(1), Some(1), Some(1)]),
            Column::Str(vec![
                Some("P1".into()),
                Some("P1".into()),
                Some("P1".into()),
                Some("P1".into()),
            ]),
            Column::Str(vec![
                Some("A01".into()),
                Some("A02".into()),
                Some("B01".into()),
                Some("B02".into()),
            ]),
            Column::Str(vec![
                Some("BATCH-1".into()),
                Some("BATCH-1".into()),
                Some("BATCH-2".into()),
                Some("BATCH-2".into()),
            ]),
            Column::Float(vec![Some(1.0), Some(3.0), Some(10.0), Some(30.0)]),
        ],
    )
    .unwrap();

    let mut by_batch = BTreeMap::new();
    let rolled = roll_up(
        &table,
        AggregationLevel::Compound,
        AggregationLevel::Compound,
        &AggregationConfig::default(),
        &["activity"],
        &LocalReducer,
    )
    .unwrap();
    for row in 0..rolled.num_rows() {
        by_batch.insert(
            rolled.value("batch_id", row).unwrap().to_string(),
            rolled.value("activity", row).unwrap().as_f64().unwrap(),
        );
    }
    assert_eq!(by_batch.len(), 2);
    assert!((by_batch["BATCH-1"] - 2.0).abs() < 1e-9);
    assert!((by_batch["BATCH-2"] - 20.0).abs() < 1e-9);
}
