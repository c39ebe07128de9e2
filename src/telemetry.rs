//! Telemetry
//!
//! Structured logging is emitted directly through `tracing::info!`/`warn!`/
//! `error!`/`debug!` call sites throughout the crate (see `agent`, `ipc`,
//! `store`) — there is no intermediate `Logger`/`Tracer` trait layer, per
//! SPEC_FULL §10.2. This module owns the one thing that *is* shared: the
//! binary's one-time subscriber setup, consistent with §9's "ambient logger
//! handle, not a global" instruction — library code only emits events, it
//! never configures where they go.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its filter from
/// `RUST_LOG` (defaulting to `info` when unset). Called exactly once, from
/// `main` in `src/bin/oidc-agentd.rs`; nothing in the library crate itself
/// calls this.
pub fn init_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
