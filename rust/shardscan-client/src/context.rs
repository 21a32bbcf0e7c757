//! Per-call deadline and cancellation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use shardscan_common::{
    Result,
    error::{CancelPhase, Error},
};

/// A shareable flag signalling that the work it guards should stop.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        Default::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Carries the deadline and cancellation token of a logical operation down to
/// the network round trip.
///
/// [`Transport`](crate::Transport) implementations are expected to stop waiting
/// once [`CallContext::is_done`] turns `true`, and report it as
/// `Cancelled { phase: InFlight }` when the request already left.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl CallContext {
    /// A context without deadline that can never be cancelled.
    pub fn background() -> CallContext {
        Default::default()
    }

    pub fn with_deadline(self, deadline: Instant) -> CallContext {
        CallContext {
            deadline: Some(deadline),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> CallContext {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(self, token: CancellationToken) -> CallContext {
        CallContext {
            cancellation: Some(token),
            ..self
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `true` once the context was cancelled or its deadline passed.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Fails with `Cancelled { phase: BeforeSend }` if the context is done.
    pub fn check(&self) -> Result<()> {
        if self.is_done() {
            Err(Error::cancelled(CancelPhase::BeforeSend))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_never_done() {
        let ctx = CallContext::background();
        assert!(!ctx.is_done());
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let ctx = CallContext::background().with_cancellation(token.clone());
        assert!(ctx.check().is_ok());
        token.cancel();
        assert!(ctx.clone().is_cancelled());
        let err = ctx.check().unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = CallContext::background().with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert!(ctx.check().is_err());
    }
}
