use crate::error::Result;

/// Default number of full request/response round trips per operation.
pub const DEFAULT_MAX_TRIES: u32 = 3;

/// Run `attempt` until it succeeds, fails with a non-transient fault, or
/// `max_tries` attempts have been made.
///
/// `attempt` receives the 1-based attempt number. When the budget is
/// exhausted a timeout is returned as is; any other transient fault is
/// reported as a connection fault. A `max_tries` of 0 is treated as 1.
pub fn with_retries<T>(max_tries: u32, mut attempt: impl FnMut(u32) -> Result<T>) -> Result<T> {
    let max_tries = max_tries.max(1);
    let mut n = 1;
    loop {
        match attempt(n) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && n < max_tries => {
                tracing::debug!(attempt = n, max_tries, error = %err, "retrying request");
                n += 1;
            }
            Err(err) if err.is_transient() => {
                tracing::debug!(attempts = n, error = %err, "retries exhausted");
                return Err(err.into_exhausted());
            }
            Err(err) => return Err(err),
        }
    }
}
