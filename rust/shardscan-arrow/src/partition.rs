//! Bounded row batches built from search hits.

use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::SchemaRef;
use shardscan_client::Hit;
use shardscan_common::{Result, error::Error, verify_arg};

use crate::{
    column_paths::ColumnPaths,
    schema::ColumnSchema,
    value_handler::{ValueHandler, create_value_handler},
};

/// One sealed page of rows from a single shard.
#[derive(Debug, Clone)]
pub struct Partition {
    shard: u64,
    ordinal: u64,
    capacity: usize,
    batch: RecordBatch,
}

impl Partition {
    /// Shard the rows were read from.
    pub fn shard(&self) -> u64 {
        self.shard
    }

    /// Zero-based position of this partition within its shard.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Maximum number of rows the partition could hold (the page size).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// A zero-row partition is the last one of its shard.
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_record_batch(self) -> RecordBatch {
        self.batch
    }
}

/// Appends one row per hit into per-column value handlers, up to a fixed
/// capacity, then seals the rows into a [`Partition`].
///
/// A failed [`append_hit`](Self::append_hit) may leave earlier columns of the
/// row written; the builder must be discarded after an error.
pub struct PartitionBuilder {
    schema: SchemaRef,
    handlers: Vec<Box<dyn ValueHandler>>,
    capacity: usize,
    rows: usize,
}

impl PartitionBuilder {
    pub fn try_new(schema: &ColumnSchema, capacity: usize) -> Result<PartitionBuilder> {
        verify_arg!(capacity, capacity > 0);
        let handlers = schema
            .columns()
            .iter()
            .map(|column| create_value_handler(column, capacity))
            .collect();
        Ok(PartitionBuilder {
            schema: schema.to_arrow_schema(),
            handlers,
            capacity,
            rows: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn is_full(&self) -> bool {
        self.rows >= self.capacity
    }

    /// Appends one row. `paths` must have been resolved from the same schema.
    pub fn append_hit(&mut self, paths: &ColumnPaths, hit: &Hit) -> Result<()> {
        if self.is_full() {
            return Err(Error::invalid_operation(format!(
                "append beyond partition capacity {}",
                self.capacity
            )));
        }
        verify_arg!(paths, paths.len() == self.handlers.len());
        for (i, handler) in self.handlers.iter_mut().enumerate() {
            handler.append(paths.get(i).value(hit))?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Seals the appended rows into a partition of `shard`.
    pub fn seal(mut self, shard: u64, ordinal: u64) -> Result<Partition> {
        let columns = self
            .handlers
            .iter_mut()
            .map(|handler| handler.finish())
            .collect::<Vec<_>>();
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        let batch = RecordBatch::try_new_with_options(self.schema, columns, &options)
            .map_err(|e| Error::arrow("seal partition", e))?;
        Ok(Partition {
            shard,
            ordinal,
            capacity: self.capacity,
            batch,
        })
    }
}

/// Materializes one page of hits into a sealed partition.
pub fn build_partition(
    schema: &ColumnSchema,
    paths: &ColumnPaths,
    capacity: usize,
    hits: &[Hit],
    shard: u64,
    ordinal: u64,
) -> Result<Partition> {
    let mut builder = PartitionBuilder::try_new(schema, capacity)?;
    for hit in hits {
        builder.append_hit(paths, hit)?;
    }
    builder.seal(shard, ordinal)
}
