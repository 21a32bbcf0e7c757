//! # shardscan: shard-partitioned scans of a search index
//!
//! A [`DataSource`] reads every document of one search-engine index and hands
//! the documents out as typed, bounded partitions (Arrow record batches), one
//! shard at a time:
//!
//! * [`DataSource::analyze`] discovers the shard count and returns a
//!   [`ShardEnumerator`] producing one [`ShardHandle`] per shard;
//! * a [`ShardHandle`] serializes to 8 bytes, so handles can be shipped to
//!   other workers and restored with [`DataSource::deserialize_handle`];
//! * [`ShardHandle::load`] yields a [`PartitionIterator`], which drives a
//!   scroll session pinned to the shard and materializes each page into a
//!   [`Partition`] according to the caller's [`ColumnSchema`].
//!
//! [`DataSource::scan_parallel`] drives all shards on a thread pool.
//!
//! ## Crates
//!
//! * [`client`] - the version-abstracted search client and wire transport seam
//! * [`arrow`] - column schema, value coercion and partition building
//! * [`common`] - error type and shared utilities

pub mod config;
pub mod enumerator;
pub mod handle;
pub mod iterator;
pub mod reader;
pub mod scan;
pub mod source;

pub use shardscan_arrow as arrow;
pub use shardscan_client as client;
pub use shardscan_common as common;

pub use shardscan_arrow::{
    partition::Partition,
    schema::{Column, ColumnSchema, ColumnType},
};
pub use shardscan_client::{CallContext, CancellationToken, ProtocolVersion, SearchRequest};
pub use shardscan_common::{Result, error::Error};

pub use config::{ScanConfig, VersionSection};
pub use enumerator::ShardEnumerator;
pub use handle::ShardHandle;
pub use iterator::PartitionIterator;
pub use reader::PartitionRecordBatchReader;
pub use scan::ScanSummary;
pub use source::{DataSource, DataSourceBuilder};
