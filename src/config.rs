//! AgentConfig
//!
//! Startup configuration read from the environment variables in §6. A
//! plain struct built once in `main`; no global/`OnceCell` config, per
//! SPEC_FULL §10.3.

use std::path::PathBuf;

use crate::crypto::SensitiveBuffer;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// `OIDC_CONFIG_DIR`, default `$XDG_CONFIG_HOME/oidc-agent` (falling
    /// back to `~/.config/oidc-agent`).
    pub config_dir: PathBuf,
    /// `OIDC_SOCK`, default `<config_dir>/oidc-agent.sock`.
    pub socket_path: PathBuf,
    /// `OIDC_ENCRYPTION_PW`, if set: unlocks the store non-interactively
    /// at startup instead of waiting for an explicit `unlock` verb.
    pub non_interactive_password: Option<SensitiveBuffer>,
}

impl AgentConfig {
    /// Reads `OIDC_CONFIG_DIR`, `OIDC_SOCK`, and `OIDC_ENCRYPTION_PW` from
    /// the process environment. `HTTP_PROXY`/`HTTPS_PROXY` are not read
    /// here — they are forwarded to `HttpFetcher` by `reqwest`'s own
    /// environment-proxy detection (§6).
    pub fn from_env() -> Self {
        let config_dir = std::env::var_os("OIDC_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_dir);
        let socket_path = std::env::var_os("OIDC_SOCK")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("oidc-agent.sock"));
        let non_interactive_password = std::env::var("OIDC_ENCRYPTION_PW")
            .ok()
            .map(|pw| SensitiveBuffer::from_str(&pw));

        Self { config_dir, socket_path, non_interactive_password }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("oidc-agent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_defaults_under_config_dir() {
        std::env::remove_var("OIDC_SOCK");
        std::env::set_var("OIDC_CONFIG_DIR", "/tmp/oidc-agent-test-config");
        let config = AgentConfig::from_env();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/oidc-agent-test-config/oidc-agent.sock"));
        std::env::remove_var("OIDC_CONFIG_DIR");
    }
}
