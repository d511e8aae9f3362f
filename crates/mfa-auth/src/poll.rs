//! Fixed-backoff retry combinator for out-of-band confirmation
//!
//! The strong-auth grant answers `authorization_pending` until the operator
//! approves the push/SMS/email out of band. There is no attempt limit: the loop
//! ends when the server answers anything else, or when the process is killed.

use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::error::Result;

/// Run `attempt` until `should_retry` rejects its result, sleeping `interval`
/// between attempts. Errors from `attempt` end the loop immediately.
pub async fn retry_while<T, F, Fut, P>(mut attempt: F, mut should_retry: P, interval: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let mut retries = 0u32;
    loop {
        let result = attempt().await?;
        if !should_retry(&result) {
            return Ok(result);
        }
        retries += 1;
        info!(
            retries,
            retry_in_secs = interval.as_secs_f64(),
            "authorization pending, retrying"
        );
        tokio::time::sleep(interval).await;
    }
}
