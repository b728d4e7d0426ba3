//! Cooperative cancellation (spec.md §4.5 "Cancellation"; §5 "suspension
//! points").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ErrorKind, Result};

/// A cheaply-cloned flag checked at suspension points between batches or
/// tuples. Setting it does not itself tear anything down; the caller that
/// next checks it is responsible for discarding partial results, unlinking
/// any spill file, and returning [`ErrorKind::Cancelled`].
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Call at every suspension point; returns `Cancelled` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ErrorKind::Cancelled.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncancelled_token_checks_clean() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check().unwrap_err().kind(), ErrorKind::Cancelled));
    }
}
