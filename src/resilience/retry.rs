//! Exponential-backoff retry for `upstream_timeout` (§7).
//!
//! "`upstream_timeout` on a refresh flow retries up to 3 times with
//! exponential backoff (1s, 2s, 4s) before surfacing." Every other error
//! kind — including a *successful* HTTP response carrying an OAuth error
//! body, which classifies as `refresh_revoked`/`upstream_error`, not
//! `upstream_timeout` — surfaces to the caller on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::error::{AgentError, AgentResult};

/// The fixed backoff schedule §7 specifies: one retry after each delay,
/// three retries total. `pub(crate)` so call sites that can't go through
/// `retry_upstream_timeout` below (because the retried future has to borrow
/// `&mut` state across attempts, which an `FnMut` closure can't express)
/// can still drive the same schedule by hand.
pub(crate) const BACKOFF: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

/// Runs `op`, retrying on `AgentError::UpstreamTimeout` per the schedule
/// above. Any other error, or running out of retries, returns immediately.
///
/// `op` is `FnMut`, so it must not capture `&mut` state and return a future
/// borrowing it — that future would have to outlive the `&mut self` borrow
/// `call_mut` takes, which the compiler rejects. Fine for closures that only
/// capture shared references or owned copies (see the tests below); a
/// retried operation that needs fresh `&mut` access each attempt should
/// drive the loop by hand against `BACKOFF` instead.
pub async fn retry_upstream_timeout<F, Fut, T>(mut op: F) -> AgentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AgentResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(AgentError::UpstreamTimeout) if attempt < BACKOFF.len() => {
                tokio::time::sleep(BACKOFF[attempt]).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
