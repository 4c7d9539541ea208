//! The aggregation hierarchy and its per-level configuration.
//!
//! Levels apply in the fixed order cell → site → well → plate → compound;
//! each level's output becomes the next level's input. The configuration is
//! an explicit structure with one entry per level, validated at load time,
//! rather than a string-keyed lookup resolved at call time.

use serde::Deserialize;

use plateframe_query::{aggregate_measurements, GroupedReducer, Reduction};
use plateframe_types::{PlateError, PlateFrame, Result};

/// One rollup level of the measurement hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationLevel {
    Cell,
    Site,
    Well,
    Plate,
    Compound,
}

impl AggregationLevel {
    /// All levels, finest first.
    pub const SEQUENCE: [AggregationLevel; 5] = [
        AggregationLevel::Cell,
        AggregationLevel::Site,
        AggregationLevel::Well,
        AggregationLevel::Plate,
        AggregationLevel::Compound,
    ];

    fn rank(&self) -> usize {
        match self {
            AggregationLevel::Cell => 0,
            AggregationLevel::Site => 1,
            AggregationLevel::Well => 2,
            AggregationLevel::Plate => 3,
            AggregationLevel::Compound => 4,
        }
    }
}

impl std::fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregationLevel::Cell => "cell",
            AggregationLevel::Site => "site",
            AggregationLevel::Well => "well",
            AggregationLevel::Plate => "plate",
            AggregationLevel::Compound => "compound",
        };
        write!(f, "{}", name)
    }
}

/// Grouping keys and reduction for one level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelConfig {
    pub grouping: Vec<String>,
    pub method: Reduction,
}

/// One entry per level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregationConfig {
    pub cell: LevelConfig,
    pub site: LevelConfig,
    pub well: LevelConfig,
    pub plate: LevelConfig,
    pub compound: LevelConfig,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        let keys = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        AggregationConfig {
            cell: LevelConfig {
                grouping: keys(&[
                    "Metadata_AcqID",
                    "Metadata_Barcode",
                    "Metadata_Well",
                    "Metadata_Site",
                    "ObjectNumber",
                ]),
                method: Reduction::Mean,
            },
            site: LevelConfig {
                grouping: keys(&[
                    "Metadata_AcqID",
                    "Metadata_Barcode",
                    "Metadata_Well",
                    "Metadata_Site",
                ]),
                method: Reduction::Mean,
            },
            well: LevelConfig {
                grouping: keys(&["Metadata_AcqID", "Metadata_Barcode", "Metadata_Well"]),
                method: Reduction::Mean,
            },
            plate: LevelConfig {
                grouping: keys(&["Metadata_AcqID", "Metadata_Barcode"]),
                method: Reduction::Mean,
            },
            compound: LevelConfig {
                grouping: keys(&["batch_id"]),
                method: Reduction::Mean,
            },
        }
    }
}

impl AggregationConfig {
    /// Parse from JSON and validate. An unknown reduction name surfaces
    /// `UnsupportedReduction` here, at load time.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: AggregationConfig = serde_json::from_str(text).map_err(|e| {
            // Reduction's TryFrom error threads its message through serde.
            let msg = e.to_string();
            if msg.contains("unsupported reduction operator") {
                let name = msg
                    .split('\'')
                    .nth(1)
                    .unwrap_or("unknown")
                    .to_string();
                PlateError::UnsupportedReduction(name)
            } else {
                PlateError::Format(format!("aggregation config: {}", e))
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn level(&self, level: AggregationLevel) -> &LevelConfig {
        match level {
            AggregationLevel::Cell => &self.cell,
            AggregationLevel::Site => &self.site,
            AggregationLevel::Well => &self.well,
            AggregationLevel::Plate => &self.plate,
            AggregationLevel::Compound => &self.compound,
        }
    }

    /// Check every level has keys and that each coarser level's keys are a
    /// subset of the finer level's. Compound is exempt: its `batch_id` key
    /// is carried as retained metadata through the finer levels.
    pub fn validate(&self) -> Result<()> {
        for level in AggregationLevel::SEQUENCE {
            if self.level(level).grouping.is_empty() {
                return Err(PlateError::Format(format!(
                    "level {} has no grouping keys",
                    level
                )));
            }
        }
        for pair in AggregationLevel::SEQUENCE.windows(2) {
            let (finer, coarser) = (pair[0], pair[1]);
            if coarser == AggregationLevel::Compound {
                continue;
            }
            for key in &self.level(coarser).grouping {
                if !self.level(finer).grouping.contains(key) {
                    return Err(PlateError::Format(format!(
                        "level {} key '{}' is not among level {} keys",
                        coarser, key, finer
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Aggregate `features` of `table` at one level of the hierarchy.
///
/// Every grouping key of the level must be present in the input; a missing
/// key means the caller tried to enter the hierarchy at a level whose keys
/// were never computed.
pub fn aggregate_level(
    table: &PlateFrame,
    level: AggregationLevel,
    config: &AggregationConfig,
    features: &[&str],
    reducer: &dyn GroupedReducer,
) -> Result<PlateFrame> {
    let spec = config.level(level);
    for key in &spec.grouping {
        if !table.has_column(key) {
            return Err(PlateError::Format(format!(
                "grouping key '{}' required for level {} is missing from the input",
                key, level
            )));
        }
    }
    let keys: Vec<&str> = spec.grouping.iter().map(String::as_str).collect();
    aggregate_measurements(table, &keys, features, spec.method, reducer)
}

/// Apply the hierarchy from `from` up to `to` inclusive, each level's
/// output feeding the next.
pub fn roll_up(
    table: &PlateFrame,
    from: AggregationLevel,
    to: AggregationLevel,
    config: &AggregationConfig,
    features: &[&str],
    reducer: &dyn GroupedReducer,
) -> Result<PlateFrame> {
    if from.rank() > to.rank() {
        return Err(PlateError::Format(format!(
            "cannot roll up from {} to the finer level {}",
            from, to
        )));
    }
    let mut current = table.clone();
    for &level in &AggregationLevel::SEQUENCE[from.rank()..=to.rank()] {
        current = aggregate_level(&current, level, config, features, reducer)?;
    }
    Ok(current)
}
