//! The algorithmic core: schema reconciliation, grouped reduction, and
//! normalization over [`plateframe_types::PlateFrame`] tables.
//!
//! Every operation is a pure function from input frames to an output frame.
//! The one place true parallelism appears is [`backend::ParallelReducer`],
//! which models the accelerated backend as an opaque worker pool: callers
//! hand it a grouped-reduction job and block until it completes or fails.

pub mod aggregate;
pub mod aggregators;
pub mod backend;
pub mod groupby;
pub mod join;
pub mod normalize;
pub mod reconcile;
pub mod sort;

pub use aggregate::aggregate_measurements;
pub use aggregators::{AggSpec, Aggregator, Reduction};
pub use backend::{GroupedReducer, LocalReducer, ParallelReducer};
pub use normalize::{normalize, NormalizeMethod};
pub use reconcile::{merge_plates, MergeOptions, MergePolicy, PlateSource};
