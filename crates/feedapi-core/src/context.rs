//! Caller context for a fetch: cancellation and deadline.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context cancelled together with `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `Err` once the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<(), FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(FetchError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_live() {
        assert!(FetchContext::new().check().is_ok());
        assert!(FetchContext::new().remaining().is_none());
    }

    #[test]
    fn cancel_is_observed() {
        let ctx = FetchContext::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(matches!(clone.check(), Err(FetchError::Cancelled)));
    }

    #[test]
    fn expired_deadline() {
        let ctx = FetchContext::new().with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(FetchError::DeadlineExceeded)));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn parent_token_cancels_child_context() {
        let parent = CancellationToken::new();
        let ctx = FetchContext::with_token(parent.child_token());
        parent.cancel();
        assert!(matches!(ctx.check(), Err(FetchError::Cancelled)));
    }
}
