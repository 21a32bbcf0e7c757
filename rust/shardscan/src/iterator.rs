use std::sync::{Arc, Mutex};

use arrow_schema::SchemaRef;
use shardscan_arrow::{
    column_paths::ColumnPaths,
    partition::{Partition, build_partition},
};
use shardscan_client::{CallContext, Completion, DocumentScroller, ScrollState};
use shardscan_common::{Result, error::Error};

use crate::source::DataSource;

/// Produces the partitions of one shard, one scroll page per partition.
///
/// The scroll session is created on the first [`next_partition`] call. The
/// last partition of a shard is empty. Calls are serialized by an internal
/// lock, so the iterator may be shared between threads.
///
/// [`next_partition`]: PartitionIterator::next_partition
pub struct PartitionIterator {
    source: Arc<DataSource>,
    shard: u64,
    paths: ColumnPaths,
    state: Mutex<IteratorState>,
}

#[derive(Default)]
struct IteratorState {
    scroller: Option<Box<dyn DocumentScroller>>,
    produced: u64,
}

impl PartitionIterator {
    pub(crate) fn new(source: Arc<DataSource>, shard: u64) -> PartitionIterator {
        let paths = source.column_paths().clone();
        PartitionIterator {
            source,
            shard,
            paths,
            state: Default::default(),
        }
    }

    pub fn shard(&self) -> u64 {
        self.shard
    }

    /// Arrow schema shared by every partition of the shard.
    pub fn arrow_schema(&self) -> SchemaRef {
        self.source.arrow_schema()
    }

    /// Number of partitions produced so far.
    pub fn partitions_produced(&self) -> u64 {
        self.state.lock().unwrap().produced
    }

    /// True until the shard's scroll session has finished.
    pub fn has_next_partition(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.scroller.as_ref().is_none_or(|s| !s.is_finished())
    }

    /// Pulls the next page of the shard and materializes it.
    ///
    /// # Errors
    /// * `Exhausted` once the session has been drained.
    /// * `Aborted` once the session has been abandoned, by [`close`] or by a
    ///   failure that left the backend session in an unknown state.
    /// * Any error of the underlying scroller; backend and transport errors
    ///   leave the session intact, so the call may be retried.
    /// * `Coercion` when a value does not fit its column. The page is lost but
    ///   the session stays open: the next call continues with the following
    ///   page, or the caller may [`close`] the shard.
    ///
    /// [`close`]: PartitionIterator::close
    pub fn next_partition(&self, ctx: &CallContext) -> Result<Partition> {
        let mut guard = self.state.lock().unwrap();
        let IteratorState { scroller, produced } = &mut *guard;
        let scroller = scroller.get_or_insert_with(|| {
            log::debug!("shard {}: opening scroll session", self.shard);
            self.source
                .client()
                .create_scroller(self.source.scroll_params(self.shard))
        });
        match scroller.state() {
            ScrollState::Finished(Completion::Drained) => {
                return Err(Error::exhausted("shard partitions"));
            }
            ScrollState::Finished(Completion::Aborted) => {
                return Err(Error::aborted(format!("shard {} partitions", self.shard)));
            }
            ScrollState::NotStarted | ScrollState::Scrolling => (),
        }

        let hits = scroller.pull_page(ctx)?;
        let partition = build_partition(
            self.source.schema(),
            &self.paths,
            self.source.page_size(),
            &hits,
            self.shard,
            *produced,
        )
        .inspect_err(|e| {
            log::warn!(
                "shard {}: dropping page of {} hits: {e}",
                self.shard,
                hits.len()
            )
        })?;
        *produced += 1;
        Ok(partition)
    }

    /// Abandons the scroll session, if any. Later calls to
    /// [`next_partition`](Self::next_partition) fail with `Aborted`.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(scroller) = state.scroller.as_mut() {
            scroller.close();
        }
    }

    /// Iterates over the remaining partitions, stopping after the last one or
    /// at the first error.
    pub fn partitions<'a>(&'a self, ctx: &'a CallContext) -> Partitions<'a> {
        Partitions {
            iterator: self,
            ctx,
            done: false,
        }
    }
}

/// Iterator adapter returned by [`PartitionIterator::partitions`].
pub struct Partitions<'a> {
    iterator: &'a PartitionIterator,
    ctx: &'a CallContext,
    done: bool,
}

impl Iterator for Partitions<'_> {
    type Item = Result<Partition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.iterator.has_next_partition() {
            return None;
        }
        match self.iterator.next_partition(self.ctx) {
            Ok(partition) => Some(Ok(partition)),
            Err(e) if e.is_exhausted() => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
