//! Service-initiated shutdown.
//!
//! The pipeline raises a [`ShutdownSignal`] when it detects a composition
//! defect; `main` waits on it next to ctrl-c and drains the server.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable one-shot shutdown flag carrying the first reason raised.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl ShutdownSignal {
    /// Create an unsignalled flag.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Only the first reason is kept.
    pub fn signal(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let raised = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            true
        });
        if raised {
            tracing::error!(reason = %reason, "Shutdown requested");
        }
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_signalled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The reason passed to the first [`ShutdownSignal::signal`] call.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(Option::is_some).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn first_reason_wins() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_signalled());

        signal.signal("claims missing from context");
        signal.clone().signal("second");

        assert!(signal.is_signalled());
        assert_eq!(signal.reason().as_deref(), Some("claims missing from context"));
    }

    #[tokio::test]
    async fn wait_resolves_after_signal() {
        let signal = ShutdownSignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.signal("test");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_signalled() {
        let signal = ShutdownSignal::new();
        signal.signal("early");
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }
}
