use std::sync::Arc;

use crate::{handle::ShardHandle, source::DataSource};

/// Lazy, finite sequence of shard handles `0..shard_count`.
///
/// An enumerator is a single-consumer cursor; threads that split the work
/// each hold their own.
pub struct ShardEnumerator {
    source: Arc<DataSource>,
    shard_count: u64,
    next_shard: u64,
}

impl ShardEnumerator {
    pub(crate) fn new(source: Arc<DataSource>, shard_count: u64) -> ShardEnumerator {
        ShardEnumerator {
            source,
            shard_count,
            next_shard: 0,
        }
    }

    pub fn shard_count(&self) -> u64 {
        self.shard_count
    }

    pub fn has_next(&self) -> bool {
        self.next_shard < self.shard_count
    }

    pub fn next_handle(&mut self) -> Option<ShardHandle> {
        if !self.has_next() {
            return None;
        }
        let handle = self.source.shard_handle(self.next_shard);
        self.next_shard += 1;
        Some(handle)
    }
}

impl Iterator for ShardEnumerator {
    type Item = ShardHandle;

    fn next(&mut self) -> Option<ShardHandle> {
        self.next_handle()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.shard_count - self.next_shard).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
