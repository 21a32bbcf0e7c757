use std::{fmt, sync::Arc};

use shardscan_client::CallContext;

use crate::{iterator::PartitionIterator, reader::PartitionRecordBatchReader, source::DataSource};

/// Serializable reference to one shard of a [`DataSource`].
///
/// The serialized form carries the shard index only; query and connection
/// settings come from the data source that deserializes it.
#[derive(Clone)]
pub struct ShardHandle {
    source: Arc<DataSource>,
    shard: u64,
}

impl ShardHandle {
    pub(crate) fn new(source: Arc<DataSource>, shard: u64) -> ShardHandle {
        ShardHandle { source, shard }
    }

    pub fn shard(&self) -> u64 {
        self.shard
    }

    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// The shard index as 8 little-endian bytes.
    pub fn serialize(&self) -> [u8; 8] {
        self.shard.to_le_bytes()
    }

    /// Returns an iterator over the partitions of this shard. No request is
    /// sent until the first partition is pulled.
    pub fn load(&self) -> PartitionIterator {
        PartitionIterator::new(self.source.clone(), self.shard)
    }

    /// Returns an Arrow record batch reader over the non-empty partitions of
    /// this shard.
    pub fn record_batch_reader(&self, ctx: CallContext) -> PartitionRecordBatchReader {
        PartitionRecordBatchReader::new(self.load(), ctx)
    }
}

impl fmt::Display for ShardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search shard loader: {}", self.shard)
    }
}

impl fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardHandle")
            .field("index", &self.source.index())
            .field("shard", &self.shard)
            .finish()
    }
}
