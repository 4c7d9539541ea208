//! Dataset assembly for microscopy plate analyses.
//!
//! This crate ties the lower layers together: it takes the analysis
//! metadata for a project (fetched through an injected [`MetadataSource`]),
//! resolves replicated analyses of the same physical plate, loads each
//! plate's raw result file, reconciles the per-file schemas into one
//! measurement table, and rolls measurements up the fixed hierarchy
//! cell → site → well → plate → compound.
//!
//! The SQL that produces the metadata, and any plotting of the results,
//! live outside this workspace; the core operates purely in memory on the
//! tables handed to it.

pub mod config;
pub mod dataset;
pub mod levels;
pub mod metadata;
pub mod replicates;

pub use dataset::{get_morphology_data, get_quality_data, DatasetOptions, Experiment};
pub use levels::{aggregate_level, roll_up, AggregationConfig, AggregationLevel, LevelConfig};
pub use metadata::{
    apply_metadata_filter, fetch_analysis_info, list_projects, MetadataFilter, MetadataSource,
};
pub use replicates::{resolve_replicates, ReplicatePolicy};

pub use plateframe_io::{read_table, ReadOptions};
pub use plateframe_query::{
    aggregate_measurements, merge_plates, normalize, GroupedReducer, LocalReducer, MergeOptions,
    MergePolicy, NormalizeMethod, ParallelReducer, PlateSource, Reduction,
};
pub use plateframe_types::{Column, PlateError, PlateFrame, Result, Value, ValueKind};
