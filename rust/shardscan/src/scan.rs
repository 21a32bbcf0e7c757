//! Parallel scan of all shards of a data source.

use std::{
    ops::Add,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use rayon::prelude::*;
use shardscan_arrow::partition::Partition;
use shardscan_client::CallContext;
use shardscan_common::{Result, error::Error, verify_arg};

use crate::{handle::ShardHandle, source::DataSource};

/// Totals of a completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Shards read to completion.
    pub shards: u64,
    /// Partitions handed to the sink, the empty terminating ones included.
    pub partitions: u64,
    pub rows: u64,
}

impl Add for ScanSummary {
    type Output = ScanSummary;

    fn add(self, other: ScanSummary) -> ScanSummary {
        ScanSummary {
            shards: self.shards + other.shards,
            partitions: self.partitions + other.partitions,
            rows: self.rows + other.rows,
        }
    }
}

impl DataSource {
    /// Reads every shard of the index on a pool of at most `max_parallelism`
    /// threads, one shard per task, and hands each sealed partition to `sink`.
    ///
    /// Stops at the first error returned by a shard or by `sink`; shards still
    /// running close their scroll sessions at their next partition boundary.
    pub fn scan_parallel<F>(
        self: &Arc<Self>,
        ctx: &CallContext,
        max_parallelism: usize,
        sink: F,
    ) -> Result<ScanSummary>
    where
        F: Fn(Partition) -> Result<()> + Sync,
    {
        verify_arg!(max_parallelism, max_parallelism > 0);
        let handles = self.analyze(ctx)?.collect::<Vec<_>>();
        if handles.is_empty() {
            return Ok(ScanSummary::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_parallelism.min(handles.len()))
            .thread_name(|i| format!("shardscan-{i}"))
            .build()
            .map_err(|e| Error::invalid_operation(format!("scan thread pool: {e}")))?;

        let failed = AtomicBool::new(false);
        let summary = pool.install(|| {
            handles
                .par_iter()
                .map(|handle| {
                    let res = scan_shard(handle, ctx, &sink, &failed);
                    if res.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    res
                })
                .try_reduce(ScanSummary::default, |a, b| Ok(a + b))
        })?;
        log::debug!(
            "scanned index '{}': {} shards, {} partitions, {} rows",
            self.index(),
            summary.shards,
            summary.partitions,
            summary.rows
        );
        Ok(summary)
    }
}

fn scan_shard<F>(
    handle: &ShardHandle,
    ctx: &CallContext,
    sink: &F,
    failed: &AtomicBool,
) -> Result<ScanSummary>
where
    F: Fn(Partition) -> Result<()> + Sync,
{
    let iterator = handle.load();
    let mut summary = ScanSummary::default();
    while iterator.has_next_partition() {
        if failed.load(Ordering::Relaxed) {
            iterator.close();
            return Ok(summary);
        }
        let res = iterator.next_partition(ctx).and_then(|partition| {
            summary.partitions += 1;
            summary.rows += partition.num_rows() as u64;
            sink(partition)
        });
        if let Err(e) = res {
            iterator.close();
            return Err(e);
        }
    }
    summary.shards = 1;
    Ok(summary)
}
