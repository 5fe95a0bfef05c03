//! Fetch Retry Logic
//!
//! Outbound fetches are retried immediately, with no backoff, up to a fixed
//! number of attempts. A fetch that never succeeds is a hard failure for the
//! organisation-period being processed.

use organogram_common::{Error, Result};

/// Retry a fetch until it succeeds or `max_attempts` is used up.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If a transient error (`Error::Fetch` or `Error::Io`):
///    a. If attempts remain: log WARN, retry immediately
///    b. Otherwise: log ERROR, return `Error::Fetch`
/// 4. If other error: return error immediately (no retry)
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "post listing page 3")
/// * `max_attempts` - Total attempts (from `linked_data.fetch_attempts`), at least 1
/// * `operation` - Async closure that performs the fetch
pub async fn with_retries<F, Fut, T>(operation_name: &str, max_attempts: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying fetch");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Fetch succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                let transient = matches!(err, Error::Fetch(_) | Error::Io(_));
                if !transient {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Fetch failed: attempts exhausted"
                    );
                    return Err(Error::Fetch(format!(
                        "{} failed after {} attempts: {}",
                        operation_name, attempt, err
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Fetch failed, retrying"
                );
            }
        }
    }
}
