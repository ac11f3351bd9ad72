//! Cooperative cancellation
//!
//! A `CancelHandle` flips a watch channel once; every cloned `CancelToken` observes it.
//! Used to abandon a trade attempt before it reaches the wallet, and to stop the quote
//! refresh loop.

use tokio::sync::watch;
use tracing::info;

/// Owner side. Dropping the handle does not cancel.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        if !self.tx.send_replace(true) {
            info!("Cancellation requested");
        }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancelToken {
    /// Token that is never cancelled
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Keep the channel open so `cancelled()` pends forever
        std::mem::forget(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
