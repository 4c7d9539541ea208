//! Grouped-reduction backends.
//!
//! The backend duality is a polymorphic capability with exactly two
//! implementations. Callers pick one explicitly; the core never probes for
//! availability or falls back on its own. Both backends must agree on
//! grouping keys exactly and on reduced values within floating-point
//! tolerance once the output is sorted by key.

use std::sync::Arc;

use futures::future::join_all;

use plateframe_types::{PlateError, PlateFrame, Result};

use crate::aggregators::AggSpec;
use crate::groupby::{group_by, GroupState};

/// A grouped-reduction engine.
pub trait GroupedReducer: Send + Sync {
    /// Partition `table` by the key columns and run each spec's aggregator
    /// per partition. Blocks until the job completes or fails.
    fn reduce(
        &self,
        table: &PlateFrame,
        key_columns: &[usize],
        specs: &[AggSpec],
    ) -> Result<PlateFrame>;

    fn name(&self) -> &'static str;
}

/// Single-process synchronous engine.
pub struct LocalReducer;

impl GroupedReducer for LocalReducer {
    fn reduce(
        &self,
        table: &PlateFrame,
        key_columns: &[usize],
        specs: &[AggSpec],
    ) -> Result<PlateFrame> {
        group_by(table, key_columns, specs)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Worker-pool engine: the table is split into ordered row chunks, each
/// chunk is aggregated on a pool thread, and the partial states are merged
/// in chunk order (which keeps `first`/`last` semantics intact).
///
/// There is no partial-result streaming and no cancellation; a submitted
/// job runs to completion or errors out.
pub struct ParallelReducer {
    runtime: tokio::runtime::Runtime,
    workers: usize,
}

impl ParallelReducer {
    /// Build the worker pool. Fails with `BackendUnavailable` when the
    /// runtime cannot be constructed or `workers` is zero.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(PlateError::BackendUnavailable(
                "worker count must be at least 1".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("plateframe-reduce")
            .build()
            .map_err(|e| PlateError::BackendUnavailable(format!("runtime: {}", e)))?;
        Ok(ParallelReducer { runtime, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl GroupedReducer for ParallelReducer {
    fn reduce(
        &self,
        table: &PlateFrame,
        key_columns: &[usize],
        specs: &[AggSpec],
    ) -> Result<PlateFrame> {
        let num_rows = table.num_rows();
        if num_rows == 0 {
            return group_by(table, key_columns, specs);
        }

        let shared = Arc::new(table.clone());
        let keys: Arc<Vec<usize>> = Arc::new(key_columns.to_vec());
        let specs_arc: Arc<Vec<AggSpec>> = Arc::new(specs.to_vec());

        let chunk_size = num_rows.div_ceil(self.workers);
        let handles: Vec<_> = (0..num_rows)
            .step_by(chunk_size)
            .map(|start| {
                let end = (start + chunk_size).min(num_rows);
                let table = shared.clone();
                let keys = keys.clone();
                let specs = specs_arc.clone();
                self.runtime.spawn(async move {
                    let mut state = GroupState::new();
                    state.accumulate(&table, start..end, &keys, &specs);
                    state
                })
            })
            .collect();

        let partials = self.runtime.block_on(join_all(handles));

        let mut merged = GroupState::new();
        for partial in partials {
            let state = partial
                .map_err(|e| PlateError::Format(format!("aggregation worker failed: {}", e)))?;
            merged.merge(state);
        }
        merged.finish(table, key_columns, specs)
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}
