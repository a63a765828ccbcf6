//! Cooperative cancellation for in-flight queries.
//!
//! The caller holds a [`CancellationToken`] and cancels it; retrieval and
//! answering race their work against `token.cancelled()` and drop outstanding
//! probe calls when it fires. Partial results are discarded and the caller
//! sees [`EngineError::Cancelled`](crate::error::EngineError::Cancelled).

use std::future::Future;

pub use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};

/// Run `work` unless `cancel` fires first.
pub async fn run_until_cancelled<F, T>(cancel: &CancellationToken, work: F) -> EngineResult<T>
where
    F: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        value = work => Ok(value),
    }
}
