//! The per-shard scroll session.
//!
//! ```text
//!  NotStarted --pull--> Scrolling --pull--> Scrolling ... --pull (0 hits)--> Finished(Drained)
//!      |                    |
//!      +---- in-flight cancellation / unreadable 2xx ----> Finished(Aborted)
//! ```
//!
//! Backend errors, transport errors and cancellations observed before sending
//! leave the session where it was: no token is captured on failure, so the same
//! pull can be retried.

use std::{fmt, sync::Arc};

use shardscan_common::{
    Result,
    error::{CancelPhase, Error, ErrorKind},
};

use crate::{
    DocumentScroller, ScrollParams,
    context::CallContext,
    dialect::Dialect,
    hit::Hit,
    query::SearchRequest,
    transport::{Transport, WireRequest, WireResponse},
};

/// How a finished session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A page returned zero hits; the session was released.
    Drained,
    /// The session state became unknown (e.g. cancelled while a request was on
    /// the wire) and was abandoned.
    Aborted,
}

/// Public view of a scroller's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    NotStarted,
    Scrolling,
    Finished(Completion),
}

impl fmt::Display for ScrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollState::NotStarted => f.write_str("not started"),
            ScrollState::Scrolling => f.write_str("scrolling"),
            ScrollState::Finished(Completion::Drained) => f.write_str("finished"),
            ScrollState::Finished(Completion::Aborted) => f.write_str("aborted"),
        }
    }
}

#[derive(Debug)]
enum Session {
    NotStarted,
    Scrolling { scroll_id: String },
    Finished(Completion),
}

/// Scroll session over one shard, shared by all protocol generations.
pub struct ShardScroller {
    transport: Arc<dyn Transport>,
    dialect: &'static Dialect,
    query: SearchRequest,
    params: ScrollParams,
    session: Session,
    pages: u64,
}

impl ShardScroller {
    /// Creates an unstarted session. `query` must already be this shard's own
    /// copy of the template; its shard-specific fields are set here.
    pub fn new(
        transport: Arc<dyn Transport>,
        dialect: &'static Dialect,
        mut query: SearchRequest,
        params: ScrollParams,
    ) -> ShardScroller {
        query.preference = Some(format!("_shards:{}", params.shard));
        query.size = Some(params.page_size);
        query.scroll = Some(params.keep_alive);
        ShardScroller {
            transport,
            dialect,
            query,
            params,
            session: Session::NotStarted,
            pages: 0,
        }
    }

    /// The per-shard query this session was started (or will start) with.
    pub fn query(&self) -> &SearchRequest {
        &self.query
    }

    /// Current continuation token, if the session is live.
    pub fn scroll_id(&self) -> Option<&str> {
        match &self.session {
            Session::Scrolling { scroll_id } => Some(scroll_id),
            _ => None,
        }
    }

    /// Number of pages successfully pulled so far, the terminating empty page
    /// included.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    fn next_request(&self) -> Result<WireRequest> {
        match &self.session {
            Session::NotStarted => Ok(self.dialect.search_request(&self.query)),
            Session::Scrolling { scroll_id } => Ok(self
                .dialect
                .scroll_request(scroll_id, self.params.keep_alive)),
            Session::Finished(Completion::Drained) => Err(Error::exhausted(format!(
                "scroller for shard {}",
                self.params.shard
            ))),
            Session::Finished(Completion::Aborted) => Err(Error::aborted(format!(
                "scroller for shard {}",
                self.params.shard
            ))),
        }
    }

    fn send(&mut self, ctx: &CallContext, request: &WireRequest) -> Result<WireResponse> {
        match self.transport.send(ctx, request) {
            Ok(response) => Ok(response),
            Err(e) => {
                if matches!(
                    e.kind(),
                    ErrorKind::Cancelled {
                        phase: CancelPhase::InFlight
                    }
                ) {
                    self.abort();
                }
                Err(e)
            }
        }
    }

    /// Abandons the session after its backend state became unknown.
    fn abort(&mut self) {
        let session = std::mem::replace(&mut self.session, Session::Finished(Completion::Aborted));
        match session {
            Session::Scrolling { scroll_id } => self.release(&scroll_id),
            Session::NotStarted => log::debug!(
                "shard {}: initial search abandoned, any backend session expires after its keep-alive",
                self.params.shard
            ),
            Session::Finished(_) => (),
        }
    }

    /// Best-effort release of the backend session. Failures are logged and
    /// otherwise ignored: they cannot affect already-returned data.
    fn release(&self, scroll_id: &str) {
        let request = self.dialect.clear_scroll_request(scroll_id);
        let outcome = self
            .transport
            .send(&CallContext::background(), &request)
            .and_then(|response| {
                if response.is_error() {
                    Err(response.to_backend_error())
                } else {
                    Ok(())
                }
            });
        if let Err(e) = outcome {
            log::warn!(
                "shard {}: failed to clear scroll session: {e}",
                self.params.shard
            );
        }
    }
}

impl DocumentScroller for ShardScroller {
    fn shard(&self) -> u64 {
        self.params.shard
    }

    fn state(&self) -> ScrollState {
        match self.session {
            Session::NotStarted => ScrollState::NotStarted,
            Session::Scrolling { .. } => ScrollState::Scrolling,
            Session::Finished(completion) => ScrollState::Finished(completion),
        }
    }

    fn close(&mut self) {
        self.abort();
    }

    fn pull_page(&mut self, ctx: &CallContext) -> Result<Vec<Hit>> {
        let request = self.next_request()?;
        ctx.check()?;

        let response = self.send(ctx, &request)?;
        if response.is_error() {
            return Err(response.to_backend_error());
        }

        let page = match response
            .json(&request.endpoint.to_string())
            .and_then(|body| self.dialect.parse_page(&body))
        {
            Ok(page) => page,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        self.pages += 1;

        if page.hits.is_empty() {
            if let Some(scroll_id) = page.scroll_id.as_deref() {
                self.release(scroll_id);
            }
            self.session = Session::Finished(Completion::Drained);
            log::debug!(
                "shard {}: scroll drained after {} pages",
                self.params.shard,
                self.pages
            );
            return Ok(Vec::new());
        }

        let Some(scroll_id) = page.scroll_id else {
            self.abort();
            return Err(Error::invalid_response(
                request.endpoint.to_string(),
                "non-empty page without a continuation token",
            ));
        };
        if matches!(self.session, Session::NotStarted) {
            log::debug!(
                "shard {}: scroll started (page size {})",
                self.params.shard,
                self.params.page_size
            );
        }
        log::trace!(
            "shard {}: page {} with {} hits",
            self.params.shard,
            self.pages,
            page.hits.len()
        );
        self.session = Session::Scrolling { scroll_id };
        Ok(page.hits)
    }
}
