//! Shutdown coordination for the server.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Root of the server's cancellation tree.
///
/// Every connection gets a child scope from [`Shutdown::child`]. Triggering
/// the root cancels all children; cancelling a child never reaches the root
/// or its siblings.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    root: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    /// Derive a child scope.
    pub fn child(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.root.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Resolves once the shutdown has been triggered.
    pub fn triggered(&self) -> WaitForCancellationFuture<'_> {
        self.root.cancelled()
    }
}
