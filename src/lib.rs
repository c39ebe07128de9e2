//! oidc-agent-rs
//!
//! A local OIDC agent daemon: an encrypted, long-lived account store behind
//! a Unix-domain IPC socket, handing out access tokens to short-lived CLI
//! clients without ever putting a refresh token or client secret on the
//! wire to them.
//!
//! # Architecture
//!
//! - `account`: `Account`/`LoadedAccount` — an account's static
//!   configuration plus its unsealed runtime secrets and cached token.
//! - `agent`: `Agent`/`run` — the composition root: owns the store, the
//!   HTTP fetcher, the discovery cache, in-flight flows; dispatches IPC
//!   verbs; drives the lifetime sweeper and signal handling.
//! - `config`: `AgentConfig` — startup configuration read from the
//!   environment.
//! - `config_format`: the on-disk encrypted account envelope, both the
//!   modern format and migration from the legacy one.
//! - `crypto`: `SensitiveBuffer`, `CryptoCodec` — key derivation, AEAD
//!   encryption, password hashing.
//! - `discovery`: `DiscoveryCache` — cached OIDC provider metadata.
//! - `error`: `AgentError` — the closed error-kind set every IPC response
//!   and internal `Result` is built from.
//! - `flows`: the grant implementations — refresh, client credentials,
//!   password, device authorization, authorization code with PKCE — plus
//!   the client-authentication and token-response plumbing they share.
//! - `ipc`: the Unix-domain socket transport — framing, peer
//!   authentication, the accept loop.
//! - `jwk`: `JwkKeyring` — RSA key generation/import/export and
//!   `private_key_jwt` client assertion signing.
//! - `resilience`: the one backoff policy in scope, `retry_upstream_timeout`.
//! - `store`: `AccountStore` — the in-memory account registry, locking,
//!   and lifetime expiry.
//! - `telemetry`: the binary's one-time `tracing` subscriber setup.
//! - `token`: `TokenCache` — cached-token freshness and refresh
//!   coalescing.
//! - `transport`: `HttpFetcher` — the upstream HTTP client abstraction.

pub mod account;
pub mod agent;
pub mod config;
pub mod config_format;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod flows;
pub mod ipc;
pub mod jwk;
pub mod resilience;
pub mod store;
pub mod telemetry;
pub mod token;
pub mod transport;

pub use account::{Account, LoadedAccount};
pub use agent::Agent;
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use store::AccountStore;
