//! Connection lifecycle for the data source.
//!
//! `Connector` opens handles and `Connection` is the handle itself. Both
//! are traits so tests can inject failures; `crate::postgres` provides the
//! `sqlx` implementation.
//!
//! # Lifecycle
//!
//! ```text
//! open_verified(descriptor)
//!   → Connector::open        (may be lazy, no I/O)
//!   → Connection::ping       (first round-trip)
//!       ├── ok   → handle returned, owned by one scaler
//!       └── err  → Connection::close, then the ping error
//! ```

use async_trait::async_trait;
use tracing::{debug, error, warn};

use sqlscale_core::{CallContext, ConnectionError, QueryError};

/// An open handle to the data source.
#[async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Liveness probe.
    async fn ping(&self) -> Result<(), ConnectionError>;

    /// Run `query` and read the single value of its single row.
    async fn query_scalar(&self, query: &str) -> Result<f64, QueryError>;

    /// Release the handle. Callers must call this exactly once.
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Factory for connections, injected for testability.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a handle from a connection descriptor.
    async fn open(&self, descriptor: &str) -> Result<Box<dyn Connection>, ConnectionError>;
}

/// Open a handle and verify it with a ping, bounded by `cx`.
///
/// Failure-atomic: if the ping fails or is interrupted, the handle that
/// was opened is closed before the error is returned.
pub async fn open_verified(
    connector: &dyn Connector,
    descriptor: &str,
    cx: &CallContext,
) -> Result<Box<dyn Connection>, ConnectionError> {
    let conn = match cx.run(connector.open(descriptor)).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            error!(error = %e, "found error opening connection");
            return Err(e);
        }
        Err(interrupted) => return Err(interrupted.into()),
    };

    let probe = match cx.run(conn.ping()).await {
        Ok(result) => result,
        Err(interrupted) => Err(interrupted.into()),
    };

    if let Err(e) = probe {
        error!(error = %e, "found error pinging data source");
        if let Err(close_err) = conn.close().await {
            warn!(error = %close_err, "failed to release connection after ping failure");
        }
        return Err(e);
    }

    debug!("connection verified");
    Ok(conn)
}

#[cfg(test)]
pub(crate) mod mock {
    //! Hand-rolled connector and connection for lifecycle tests.

    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Call counters shared between a mock connector and its handles.
    #[derive(Debug, Default)]
    pub struct Calls {
        pub opens: AtomicU64,
        pub pings: AtomicU64,
        pub queries: AtomicU64,
        pub closes: AtomicU64,
    }

    impl Calls {
        pub fn get(counter: &AtomicU64) -> u64 {
            counter.load(Ordering::SeqCst)
        }
    }

    /// What the next query returns.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Value(f64),
        NoRows,
        Decode(&'static str),
        Hang,
    }

    #[derive(Debug)]
    pub struct MockConnection {
        calls: Arc<Calls>,
        ping_ok: bool,
        ping_delay: Duration,
        close_ok: bool,
        reply: Arc<Mutex<Reply>>,
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn ping(&self) -> Result<(), ConnectionError> {
            self.calls.pings.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.ping_delay).await;
            if self.ping_ok {
                Ok(())
            } else {
                Err(ConnectionError::Ping("connection refused".into()))
            }
        }

        async fn query_scalar(&self, _query: &str) -> Result<f64, QueryError> {
            self.calls.queries.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.lock().unwrap().clone();
            match reply {
                Reply::Value(v) => Ok(v),
                Reply::NoRows => Err(QueryError::NoRows),
                Reply::Decode(msg) => Err(QueryError::Decode(msg.into())),
                Reply::Hang => std::future::pending().await,
            }
        }

        async fn close(&self) -> Result<(), ConnectionError> {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
            if self.close_ok {
                Ok(())
            } else {
                Err(ConnectionError::Close("socket already gone".into()))
            }
        }
    }

    #[derive(Debug)]
    pub struct MockConnector {
        pub calls: Arc<Calls>,
        pub reply: Arc<Mutex<Reply>>,
        pub open_ok: AtomicBool,
        pub ping_ok: AtomicBool,
        pub close_ok: AtomicBool,
        pub ping_delay: Duration,
        pub last_descriptor: Mutex<Option<String>>,
    }

    impl MockConnector {
        pub fn returning(value: f64) -> Self {
            Self {
                calls: Arc::new(Calls::default()),
                reply: Arc::new(Mutex::new(Reply::Value(value))),
                open_ok: AtomicBool::new(true),
                ping_ok: AtomicBool::new(true),
                close_ok: AtomicBool::new(true),
                ping_delay: Duration::ZERO,
                last_descriptor: Mutex::new(None),
            }
        }

        pub fn set_reply(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn open(&self, descriptor: &str) -> Result<Box<dyn Connection>, ConnectionError> {
            self.calls.opens.fetch_add(1, Ordering::SeqCst);
            *self.last_descriptor.lock().unwrap() = Some(descriptor.to_string());
            if !self.open_ok.load(Ordering::SeqCst) {
                return Err(ConnectionError::Open("invalid descriptor".into()));
            }
            Ok(Box::new(MockConnection {
                calls: self.calls.clone(),
                ping_ok: self.ping_ok.load(Ordering::SeqCst),
                ping_delay: self.ping_delay,
                close_ok: self.close_ok.load(Ordering::SeqCst),
                reply: self.reply.clone(),
            }))
        }
    }
}
