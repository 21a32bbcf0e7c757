//! Arrow record batch reader over the partitions of one shard.

use arrow_array::{RecordBatch, RecordBatchReader};
use arrow_schema::{ArrowError, SchemaRef};
use shardscan_arrow::arrow_error::ToArrowResult;
use shardscan_client::CallContext;
use shardscan_common::try_or_ret_some_err;

use crate::iterator::PartitionIterator;

/// Adapts a [`PartitionIterator`] to the Arrow [`RecordBatchReader`] interface.
///
/// Empty partitions (the terminating page of a shard) are skipped. The reader
/// ends after the last partition or after yielding the first error.
pub struct PartitionRecordBatchReader {
    iterator: PartitionIterator,
    ctx: CallContext,
    schema: SchemaRef,
    failed: bool,
}

impl PartitionRecordBatchReader {
    pub fn new(iterator: PartitionIterator, ctx: CallContext) -> PartitionRecordBatchReader {
        let schema = iterator.arrow_schema();
        PartitionRecordBatchReader {
            iterator,
            ctx,
            schema,
            failed: false,
        }
    }

    pub fn shard(&self) -> u64 {
        self.iterator.shard()
    }

    fn next_batch(&mut self) -> Option<Result<RecordBatch, ArrowError>> {
        while !self.failed && self.iterator.has_next_partition() {
            let partition = match self.iterator.next_partition(&self.ctx) {
                Err(e) if e.is_exhausted() => return None,
                res => {
                    self.failed = res.is_err();
                    try_or_ret_some_err!(res.to_arrow_res())
                }
            };
            if !partition.is_empty() {
                return Some(Ok(partition.into_record_batch()));
            }
        }
        None
    }
}

impl Iterator for PartitionRecordBatchReader {
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

impl RecordBatchReader for PartitionRecordBatchReader {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
