//! The scan entry point: a search index bound to a column schema.

use std::{sync::Arc, time::Duration};

use arrow_schema::SchemaRef;
use shardscan_arrow::{column_paths::ColumnPaths, schema::ColumnSchema};
use shardscan_client::{
    CallContext, DEFAULT_KEEP_ALIVE, DEFAULT_PAGE_SIZE, ScrollParams, SearchClient,
};
use shardscan_common::{Result, error::Error};

use crate::{enumerator::ShardEnumerator, handle::ShardHandle};

/// A search index scanned shard by shard into partitions of a fixed column
/// schema.
///
/// A data source is shared (`Arc`) by every enumerator, handle and iterator
/// derived from it. The column schema always carries the `es._id` and
/// `es._score` metadata columns.
pub struct DataSource {
    client: Arc<dyn SearchClient>,
    schema: ColumnSchema,
    arrow_schema: SchemaRef,
    paths: ColumnPaths,
    page_size: usize,
    keep_alive: Duration,
}

impl DataSource {
    pub fn builder() -> DataSourceBuilder {
        DataSourceBuilder::new()
    }

    pub fn client(&self) -> &Arc<dyn SearchClient> {
        &self.client
    }

    pub fn index(&self) -> &str {
        self.client.index()
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        self.arrow_schema.clone()
    }

    /// Documents per page, and rows per partition.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// A search index is a bounded source.
    pub fn is_streaming(&self) -> bool {
        false
    }

    /// Discovers the shard count of the index and returns an enumerator over
    /// all shards.
    ///
    /// # Errors
    /// Returns the client's error when the shard count cannot be obtained.
    pub fn analyze(self: &Arc<Self>, ctx: &CallContext) -> Result<ShardEnumerator> {
        let shard_count = self.client.get_shard_count(ctx)?;
        log::debug!(
            "analyzed index '{}': {shard_count} shards, page size {}",
            self.index(),
            self.page_size
        );
        Ok(ShardEnumerator::new(self.clone(), shard_count))
    }

    /// Returns the handle of `shard` without consulting the backend.
    pub fn shard_handle(self: &Arc<Self>, shard: u64) -> ShardHandle {
        ShardHandle::new(self.clone(), shard)
    }

    /// Restores a handle from its [`ShardHandle::serialize`] form.
    ///
    /// # Errors
    /// Returns `InvalidFormat` unless `bytes` is exactly 8 bytes long.
    pub fn deserialize_handle(self: &Arc<Self>, bytes: &[u8]) -> Result<ShardHandle> {
        let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
            Error::invalid_format(
                "shard handle",
                format!("expected 8 bytes, got {}", bytes.len()),
            )
        })?;
        Ok(self.shard_handle(u64::from_le_bytes(bytes)))
    }

    pub(crate) fn column_paths(&self) -> &ColumnPaths {
        &self.paths
    }

    pub(crate) fn scroll_params(&self, shard: u64) -> ScrollParams {
        ScrollParams::new(shard, self.page_size, self.keep_alive)
    }
}

/// Builder for a [`DataSource`].
#[derive(Clone)]
pub struct DataSourceBuilder {
    client: Option<Arc<dyn SearchClient>>,
    schema: ColumnSchema,
    page_size: usize,
    keep_alive: Duration,
}

impl Default for DataSourceBuilder {
    fn default() -> Self {
        DataSourceBuilder {
            client: None,
            schema: ColumnSchema::new(),
            page_size: DEFAULT_PAGE_SIZE,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

impl DataSourceBuilder {
    pub fn new() -> DataSourceBuilder {
        Default::default()
    }

    pub fn with_client(self, client: Arc<dyn SearchClient>) -> Self {
        Self {
            client: Some(client),
            ..self
        }
    }

    /// Sets the body columns. The `es._id` and `es._score` columns are added
    /// at build time when absent.
    pub fn with_schema(self, schema: ColumnSchema) -> Self {
        Self { schema, ..self }
    }

    /// Sets the page size; zero selects the default of 128.
    pub fn with_page_size(self, page_size: usize) -> Self {
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        Self { page_size, ..self }
    }

    /// Sets the scroll keep-alive; zero selects the default of 10 minutes.
    pub fn with_keep_alive(self, keep_alive: Duration) -> Self {
        let keep_alive = if keep_alive.is_zero() {
            DEFAULT_KEEP_ALIVE
        } else {
            keep_alive
        };
        Self { keep_alive, ..self }
    }

    /// # Errors
    /// Returns a configuration error when no client is set or when a column
    /// uses the `es.` prefix with an unknown metadata field.
    pub fn build(self) -> Result<Arc<DataSource>> {
        let client = self
            .client
            .ok_or_else(|| Error::config("must specify a search client"))?;
        let schema = self.schema.with_metadata_columns();
        let paths = ColumnPaths::resolve(&schema)?;
        Ok(Arc::new(DataSource {
            client,
            arrow_schema: schema.to_arrow_schema(),
            schema,
            paths,
            page_size: self.page_size,
            keep_alive: self.keep_alive,
        }))
    }
}
