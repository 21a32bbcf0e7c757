//! Test utilities and helpers for the shardscan project.
//!
//! This crate provides:
//! - [`cluster::ScriptedCluster`], an in-memory search backend implementing
//!   the `Transport` trait, with per-shard documents, real scroll-session
//!   bookkeeping and one-shot fault injection
//! - [`data_gen`], synthetic document generation and an NDJSON sample of
//!   well-known star systems
//!
//! It is intended for use within the shardscan test suites.

pub mod cluster;
pub mod data_gen;
