//! Per-call deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{DEFAULT_TIMEOUT, ScalerConfig};
use crate::error::{ConnectionError, QueryError};

/// Why a call did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineExceeded(Duration),
    Cancelled,
}

impl From<Interrupted> for QueryError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::DeadlineExceeded(d) => QueryError::Timeout(d),
            Interrupted::Cancelled => QueryError::Cancelled,
        }
    }
}

impl From<Interrupted> for ConnectionError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::DeadlineExceeded(d) => ConnectionError::Timeout(d),
            Interrupted::Cancelled => ConnectionError::Cancelled,
        }
    }
}

/// Caller-supplied bounds for one call into a scaler.
///
/// The cancel flag is a `watch` channel: sending `true` aborts every call
/// running under a context cloned from the same receiver.
#[derive(Debug, Clone)]
pub struct CallContext {
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl CallContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: None,
        }
    }

    /// Context using the timeout configured for a scaler.
    pub fn from_config(config: &ScalerConfig) -> Self {
        Self::with_timeout(config.timeout)
    }

    /// Attach a cancel flag.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `fut` until it completes, the deadline passes, or the cancel
    /// flag is raised. The losing future is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            out = fut => Ok(out),
            _ = tokio::time::sleep(self.timeout) => {
                Err(Interrupted::DeadlineExceeded(self.timeout))
            }
            _ = cancelled(self.cancel.clone()) => Err(Interrupted::Cancelled),
        }
    }
}

/// Resolves once the flag is `true`. A dropped sender never cancels.
async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = cancel
        && rx.wait_for(|flag| *flag).await.is_ok()
    {
        return;
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_deadline() {
        let cx = CallContext::with_timeout(Duration::from_secs(1));
        assert_eq!(cx.run(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_future() {
        let cx = CallContext::with_timeout(Duration::from_millis(20));
        let result = cx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(
            result,
            Err(Interrupted::DeadlineExceeded(Duration::from_millis(20)))
        );
    }

    #[tokio::test]
    async fn cancel_flag_interrupts() {
        let (tx, rx) = watch::channel(false);
        let cx = CallContext::with_timeout(Duration::from_secs(10)).with_cancel(rx);

        let handle = tokio::spawn(async move {
            cx.run(tokio::time::sleep(Duration::from_secs(10))).await
        });
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn already_cancelled_context_fails_fast() {
        let (_tx, rx) = watch::channel(true);
        let cx = CallContext::default().with_cancel(rx);
        let result = cx.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let cx = CallContext::with_timeout(Duration::from_secs(1)).with_cancel(rx);
        assert_eq!(cx.run(async { "done" }).await, Ok("done"));
    }

    #[test]
    fn interruptions_map_to_error_classes() {
        let d = Duration::from_secs(1);
        assert!(matches!(
            QueryError::from(Interrupted::DeadlineExceeded(d)),
            QueryError::Timeout(_)
        ));
        assert!(matches!(
            ConnectionError::from(Interrupted::Cancelled),
            ConnectionError::Cancelled
        ));
    }
}
