//! shardscan Arrow
//!
//! This crate materializes search hits into Apache Arrow record batches: the
//! caller-supplied column schema, the per-type value handlers that coerce JSON
//! values into typed cells, the column-name-to-document-path mapping and the
//! bounded partition builder.

pub mod arrow_error;
pub mod column_paths;
pub mod partition;
pub mod schema;
pub mod value_handler;
