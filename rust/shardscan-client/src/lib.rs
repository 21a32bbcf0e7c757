//! Version-abstracted search client.
//!
//! This crate defines the two capabilities the scan engine needs from a search
//! backend, [`SearchClient`] and [`DocumentScroller`], and provides a single
//! implementation of both ([`client::VersionedClient`] and
//! [`scroller::ShardScroller`]) parameterized by a [`dialect::Dialect`]: the
//! request/response field names of one wire-protocol generation.
//!
//! The wire client itself is abstracted by the [`transport::Transport`] trait;
//! the embedding environment supplies an implementation.

pub mod client;
pub mod context;
pub mod dialect;
pub mod hit;
pub mod query;
pub mod scroller;
pub mod settings;
pub mod time_value;
pub mod transport;

use std::time::Duration;

use shardscan_common::Result;

pub use client::{SearchClientBuilder, VersionedClient};
pub use context::{CallContext, CancellationToken};
pub use dialect::{Dialect, ProtocolVersion};
pub use hit::{Hit, MetadataField};
pub use query::SearchRequest;
pub use scroller::{Completion, ScrollState, ShardScroller};
pub use transport::{Endpoint, Method, Transport, WireRequest, WireResponse};

/// Default number of documents requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 128;

/// Default keep-alive of a scroll session between two page pulls.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10 * 60);

/// Capability over a search backend bound to one index and one query template.
///
/// Implementations must behave identically regardless of the wire-protocol
/// generation they speak.
pub trait SearchClient: Send + Sync + 'static {
    /// Name of the index this client scans.
    fn index(&self) -> &str;

    /// Queries the index settings and returns the number of primary shards.
    fn get_shard_count(&self, ctx: &CallContext) -> Result<u64>;

    /// Creates an unstarted scroll session pinned to `params.shard`.
    ///
    /// The scroller owns a deep copy of the query template, so scrollers over
    /// different shards never observe each other's shard-specific fields.
    fn create_scroller(&self, params: ScrollParams) -> Box<dyn DocumentScroller>;
}

/// A single paginated query session over one shard.
pub trait DocumentScroller: Send {
    /// Shard this session is pinned to.
    fn shard(&self) -> u64;

    /// Current lifecycle state.
    fn state(&self) -> ScrollState;

    fn is_finished(&self) -> bool {
        matches!(self.state(), ScrollState::Finished(_))
    }

    /// Fetches the next page of hits.
    ///
    /// An empty page means the session is drained and has been released; any
    /// further call fails with an `Exhausted` error. Calls after the session
    /// was abandoned fail with `Aborted`.
    fn pull_page(&mut self, ctx: &CallContext) -> Result<Vec<Hit>>;

    /// Abandons the session: releases any backend session best-effort and
    /// moves to `Finished(Aborted)`. No-op once finished.
    fn close(&mut self);
}

/// Shard-specific parameters of a scroll session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollParams {
    pub shard: u64,
    pub page_size: usize,
    pub keep_alive: Duration,
}

impl ScrollParams {
    pub fn new(shard: u64, page_size: usize, keep_alive: Duration) -> ScrollParams {
        ScrollParams {
            shard,
            page_size,
            keep_alive,
        }
    }
}
