//! Resilience
//!
//! Local recovery (§7): the one backoff policy the spec names — three
//! retries of an `upstream_timeout`d refresh, at 1s/2s/4s — lives in
//! `retry`. No circuit breaker or rate limiter survives the transformation:
//! §7 names only this backoff policy as in-scope local recovery, and
//! neither pattern has a spec counterpart.

pub mod retry;

pub use retry::retry_upstream_timeout;
pub(crate) use retry::BACKOFF;
