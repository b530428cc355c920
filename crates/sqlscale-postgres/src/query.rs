//! Single-sample query execution.
//!
//! One statement per call, bounded by the caller's context. No retries:
//! the orchestrator polls again on its own schedule.

use tracing::debug;

use sqlscale_core::{CallContext, QueryError};

use crate::connection::Connection;

/// Run `query` on `conn` and return its scalar result.
///
/// Interruption by deadline or cancel surfaces as `QueryError::Timeout`
/// or `QueryError::Cancelled`; the in-flight query future is dropped.
pub async fn execute(
    conn: &dyn Connection,
    query: &str,
    cx: &CallContext,
) -> Result<f64, QueryError> {
    let sample = cx.run(conn.query_scalar(query)).await??;
    debug!(sample, "query returned");
    Ok(sample)
}
