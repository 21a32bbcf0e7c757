//! Core definitions (error type, result helpers, JSON path utilities), relied upon
//! by all shardscan-* crates.

pub mod error;
pub mod json_path;
pub mod macros;
pub mod result;

pub use result::Result;
