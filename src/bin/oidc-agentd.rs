//! oidc-agentd
//!
//! Thin entry point (§6): install the `tracing` subscriber, read
//! `AgentConfig` from the environment, build the agent, optionally unlock
//! the account store non-interactively, then run the IPC server until
//! shutdown. All behavior lives in the library crate; this binary only
//! wires it together and maps startup failures to the exit codes §6 names.

use std::process::ExitCode;
use std::sync::Arc;

use oidc_agent_rs::agent::{self, Agent};
use oidc_agent_rs::config::AgentConfig;
use oidc_agent_rs::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_subscriber();

    let config = AgentConfig::from_env();
    let fetcher = match agent::build_fetcher() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            tracing::error!(error = %e, "failed to build http client");
            return ExitCode::from(1);
        }
    };

    let agent = Arc::new(Agent::new(fetcher));

    if let Some(password) = &config.non_interactive_password {
        match agent.load_accounts_from_disk(&config.config_dir, password).await {
            Ok(count) => tracing::info!(accounts = count, "loaded accounts from disk"),
            Err(e) => {
                tracing::error!(error = %e, "failed to load accounts from disk");
                return ExitCode::from(1);
            }
        }
    }

    match agent::run(&config, agent).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "agent exited with error");
            ExitCode::from(1)
        }
    }
}
