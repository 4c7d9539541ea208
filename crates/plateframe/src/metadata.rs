//! The injected metadata-query contract and the project-level views built
//! on it.
//!
//! Query construction and transport live with the implementor; this crate
//! only consumes the resulting frames.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};

use plateframe_types::{PlateFrame, Result, Value};

use crate::config::{PLATE_BARCODE_COLUMN, PROJECT_COLUMN};
use crate::replicates::{resolve_replicates, ReplicatePolicy};

/// Supplier of analysis metadata for a named project.
///
/// `analysis_metadata` must return, per matching analysis, at least the
/// plate barcode, acquisition id, analysis id, analysis date, and
/// results-directory columns, restricted to the given data-type tag and to
/// rows with a non-null analysis date, ordered by plate barcode.
pub trait MetadataSource {
    /// All project names known to the store.
    fn project_names(&self) -> Result<Vec<String>>;

    /// Analysis metadata for every project whose name contains `project`,
    /// restricted to `data_type` records.
    fn analysis_metadata(&self, project: &str, data_type: &str) -> Result<PlateFrame>;
}

/// Sorted project names, empties removed, optionally filtered by a
/// case-insensitive substring lookup.
pub fn list_projects(source: &dyn MetadataSource, lookup: Option<&str>) -> Result<Vec<String>> {
    let mut projects: Vec<String> = source
        .project_names()?
        .into_iter()
        .filter(|name| !name.is_empty())
        .collect();
    if let Some(lookup) = lookup {
        let lookup = lookup.to_lowercase();
        projects.retain(|name| name.to_lowercase().contains(&lookup));
    }
    projects.sort();
    projects.dedup();
    Ok(projects)
}

/// Per-column substring conditions: patterns OR within a column, columns
/// AND together.
pub type MetadataFilter = HashMap<String, Vec<String>>;

/// Keep rows where, for every filter column, the value contains at least
/// one of the column's patterns.
pub fn apply_metadata_filter(frame: &PlateFrame, filter: &MetadataFilter) -> Result<PlateFrame> {
    let mut out = frame.clone();
    for (column, patterns) in filter {
        out = out.filter(column, |value| match value {
            Value::Str(s) => patterns.iter().any(|p| s.contains(p.as_str())),
            Value::Undefined => false,
            other => {
                let text = other.to_string();
                patterns.iter().any(|p| text.contains(p.as_str()))
            }
        })?;
    }
    Ok(out)
}

/// Fetch and prepare the analysis metadata for a project: query, summarize,
/// resolve replicates, then apply the optional metadata filter.
pub fn fetch_analysis_info(
    source: &dyn MetadataSource,
    name: &str,
    data_type: &str,
    policy: &ReplicatePolicy,
    filter: Option<&MetadataFilter>,
) -> Result<PlateFrame> {
    let info = source.analysis_metadata(name, data_type)?;
    log_project_summary(name, &info)?;

    let info = resolve_replicates(&info, policy)?;

    match filter {
        Some(filter) => apply_metadata_filter(&info, filter),
        None => Ok(info),
    }
}

fn log_project_summary(name: &str, info: &PlateFrame) -> Result<()> {
    if !info.has_column(PROJECT_COLUMN) || !info.has_column(PLATE_BARCODE_COLUMN) {
        warn!("metadata for {} lacks project/barcode columns", name);
        return Ok(());
    }

    let mut plates: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in 0..info.num_rows() {
        let project = info.value(PROJECT_COLUMN, row)?.to_string();
        let barcode = info.value(PLATE_BARCODE_COLUMN, row)?.to_string();
        plates.entry(project).or_default().push(barcode);
    }

    match plates.len() {
        0 => info!("querying for {} returned nothing", name),
        1 => info!(
            "querying for {} found 1 study: {:?}",
            name,
            plates.keys().collect::<Vec<_>>()
        ),
        n => info!(
            "querying for {} found {} studies: {:?}",
            name,
            n,
            plates.keys().collect::<Vec<_>>()
        ),
    }
    for (project, barcodes) in &plates {
        debug!("{}: {:?}", project, barcodes);
    }
    Ok(())
}
