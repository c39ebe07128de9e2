//! AgentLoop
//!
//! The composition root (§4.9): owns the `AccountStore`, the `HttpFetcher`,
//! the discovery cache, and in-flight device/authorization-code
//! `FlowContext`s; dispatches IPC verbs (§4.8) against them; and drives the
//! lifetime sweeper and signal handling. Single-threaded and cooperative —
//! every suspension point is an `.await`, serviced by tokio's executor
//! rather than by explicit locking across the whole store (§5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::account::{Account, CachedToken, LoadedAccount};
use crate::config::AgentConfig;
use crate::crypto::SensitiveBuffer;
use crate::discovery::DiscoveryCache;
use crate::error::{AgentError, AgentResult};
use crate::flows::{self, authorization_code, client_credentials, device, password, refresh, FlowContext};
use crate::ipc::{self, RequestHandler};
use crate::resilience::BACKOFF;
use crate::store::AccountStore;
use crate::token::{TokenCache, DEFAULT_MIN_VALID};
use crate::transport::{HttpFetcher, ReqwestHttpFetcher};

/// How long an authorization-code flow stays alive waiting for the
/// redirect callback before it times out (§4.5 `init → awaiting_callback`).
const CODE_FLOW_TIMEOUT: Duration = Duration::from_secs(600);
/// How often `AgentLoop::run` wakes the lifetime sweeper (§4.7, §4.9).
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// The agent's request-handling state: everything `IpcServer` dispatches
/// verbs against. Kept separate from `AgentLoop` so tests can drive
/// `Agent::handle_request` directly against a `MockHttpFetcher` without a
/// real socket.
pub struct Agent {
    store: Mutex<AccountStore>,
    fetcher: Arc<dyn HttpFetcher>,
    discovery: DiscoveryCache,
    /// In-flight device-code flows, keyed by account name. §3: at most one
    /// outstanding upstream call per account, so one in-flight device flow
    /// per account is all the model needs.
    device_flows: Mutex<HashMap<String, FlowContext>>,
    /// In-flight authorization-code flows, keyed by the `state` the
    /// eventual callback must present (§4.5's `awaiting_callback`).
    code_flows: Mutex<HashMap<String, (String, FlowContext)>>,
}

impl Agent {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            store: Mutex::new(AccountStore::new()),
            fetcher,
            discovery: DiscoveryCache::new(),
            device_flows: Mutex::new(HashMap::new()),
            code_flows: Mutex::new(HashMap::new()),
        }
    }

    /// Loads every encrypted account file under `config_dir` with
    /// `password`, per `OIDC_ENCRYPTION_PW` non-interactive unlock (§6).
    /// `issuer.config` and `pubclient.conf` are issuer/public-client
    /// defaults, not account documents, and are skipped (§6 layout).
    pub async fn load_accounts_from_disk(&self, config_dir: &std::path::Path, password: &SensitiveBuffer) -> AgentResult<usize> {
        let mut loaded = 0;
        let entries = match std::fs::read_dir(config_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AgentError::IoError(e)),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == "issuer.config" || name == "pubclient.conf" || name.ends_with(".sock") {
                continue;
            }
            let bytes = std::fs::read(entry.path())?;
            let plaintext = crate::config_format::load(&bytes, password)?;
            let account: Account = serde_json::from_slice(&plaintext)?;
            let mut store = self.store.lock().await;
            store.add(account, None, false)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    async fn access_token(
        &self,
        name: &str,
        scope: std::collections::HashSet<String>,
        audience: std::collections::HashSet<String>,
        min_valid: Duration,
    ) -> AgentResult<AccessTokenOutcome> {
        let handle = self.store.lock().await.get(name)?;
        let mut loaded = handle.lock().await;
        let fetcher = self.fetcher.as_ref();
        let discovery = &self.discovery;

        let token = TokenCache::get_or_refresh(&mut loaded, &scope, &audience, min_valid, |loaded| async move {
            if loaded_has_refresh_token(loaded) {
                refresh_with_backoff(loaded, fetcher, discovery, &scope, &audience).await
            } else if loaded.account.is_confidential() {
                client_credentials::execute(loaded, fetcher, discovery, &scope).await
            } else {
                Err(AgentError::ArgInvalid(
                    "account has no refresh token and is not a confidential client".into(),
                ))
            }
        })
        .await?;
        Ok(AccessTokenOutcome { token: token.expose_secret().to_string(), confirm: loaded.confirm })
    }

    async fn handle(&self, verb: &str, payload: Value) -> AgentResult<Value> {
        match verb {
            "add" | "gen" => {
                let account: Account = serde_json::from_value(
                    payload.get("account").cloned().ok_or(AgentError::ArgNull)?,
                )?;
                let lifetime = payload.get("lifetime").and_then(Value::as_u64).map(Duration::from_secs);
                let confirm = payload.get("confirm").and_then(Value::as_bool).unwrap_or(false);
                self.store.lock().await.add(account, lifetime, confirm)?;
                Ok(serde_json::json!({"status": "success"}))
            }
            "register" => Err(AgentError::NotImplemented(
                "dynamic client registration is not part of this agent's core".into(),
            )),
            "remove" => {
                let name = require_str(&payload, "name")?;
                self.store.lock().await.remove(&name)?;
                Ok(serde_json::json!({"status": "success"}))
            }
            "remove_all" => {
                self.store.lock().await.remove_all();
                Ok(serde_json::json!({"status": "success"}))
            }
            "list" => {
                let names = self.store.lock().await.list();
                Ok(serde_json::json!({"status": "success", "accounts": names}))
            }
            "lock" => {
                let password = SensitiveBuffer::from_str(&require_str(&payload, "password")?);
                self.store.lock().await.lock(&password).await?;
                Ok(serde_json::json!({"status": "success"}))
            }
            "unlock" => {
                let password = SensitiveBuffer::from_str(&require_str(&payload, "password")?);
                self.store.lock().await.unlock(&password).await?;
                Ok(serde_json::json!({"status": "success"}))
            }
            "check" => {
                let name = require_str(&payload, "name")?;
                self.store.lock().await.get(&name)?;
                Ok(serde_json::json!({"status": "success", "name": name}))
            }
            "access_token" => {
                let name = require_str(&payload, "name")?;
                let scope = string_set(&payload, "scope");
                let audience = string_set(&payload, "audience");
                let min_valid = payload
                    .get("min_valid")
                    .and_then(Value::as_u64)
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_MIN_VALID);
                let outcome = self.access_token(&name, scope, audience, min_valid).await?;
                if outcome.confirm {
                    Ok(serde_json::json!({"status": "confirmation_required", "name": name}))
                } else {
                    Ok(serde_json::json!({"status": "success", "access_token": outcome.token}))
                }
            }
            "device_init" => {
                let name = require_str(&payload, "name")?;
                let handle = self.store.lock().await.get(&name)?;
                // The account lock is released before taking `device_flows`'s
                // lock below: `poll_device_flow_to_completion` nests them the
                // other way round (flows outer, account inner), so the two
                // locks must never be held at once here to avoid a lock-order
                // inversion between concurrent connections.
                let (ctx, result) = {
                    let mut loaded = handle.lock().await;
                    device::init(&mut loaded, self.fetcher.as_ref(), &self.discovery).await?
                };
                self.device_flows.lock().await.insert(name, ctx);
                Ok(serde_json::json!({
                    "status": "success",
                    "user_code": result.user_code,
                    "verification_uri": result.verification_uri,
                    "verification_uri_complete": result.verification_uri_complete,
                    "interval": result.interval.as_secs(),
                }))
            }
            "device_done" => {
                let name = require_str(&payload, "name")?;
                self.poll_device_flow_to_completion(&name).await
            }
            "code_url" => {
                let name = require_str(&payload, "name")?;
                let redirect_uri = require_str(&payload, "redirect_uri")?;
                let handle = self.store.lock().await.get(&name)?;
                let loaded = handle.lock().await;
                let (ctx, url) = authorization_code::init(&loaded.account, &redirect_uri, CODE_FLOW_TIMEOUT);
                let state = ctx.state.clone().unwrap_or_default();
                self.code_flows.lock().await.insert(state, (name, ctx));
                Ok(serde_json::json!({"status": "success", "url": url}))
            }
            "code_exchange" => {
                let state = require_str(&payload, "state")?;
                let redirect_uri = require_str(&payload, "redirect_uri")?;
                let callback: HashMap<String, String> = payload
                    .get("callback_params")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()?
                    .unwrap_or_default();

                let Some((name, ctx)) = self.code_flows.lock().await.remove(&state) else {
                    return Err(AgentError::ArgInvalid("no authorization-code flow for that state".into()));
                };
                let handle = self.store.lock().await.get(&name)?;
                let mut loaded = handle.lock().await;
                let token = authorization_code::exchange(
                    &ctx,
                    &mut loaded,
                    &redirect_uri,
                    &callback,
                    self.fetcher.as_ref(),
                    &self.discovery,
                )
                .await?;
                Ok(serde_json::json!({"status": "success", "access_token": token.access_token.expose_secret()}))
            }
            "term" => Ok(serde_json::json!({"status": "success"})),
            other => Err(AgentError::NotImplemented(format!("unknown verb {other:?}"))),
        }
    }

    /// Polls a previously-`device_init`'d flow at its advertised interval
    /// until it resolves or times out (§4.5). Runs entirely within this one
    /// IPC request/response pair — the per-connection task this handler
    /// runs under is what lets other connections keep making progress
    /// while this one's client waits (§5).
    async fn poll_device_flow_to_completion(&self, name: &str) -> AgentResult<Value> {
        loop {
            let mut flows = self.device_flows.lock().await;
            let Some(ctx) = flows.get_mut(name) else {
                return Err(AgentError::ArgInvalid("no device flow in progress for that account".into()));
            };
            if ctx.is_timed_out() {
                flows.remove(name);
                return Err(AgentError::UpstreamTimeout);
            }
            let interval = ctx.poll_interval.unwrap_or(Duration::from_secs(5));
            let handle = self.store.lock().await.get(name)?;
            let mut loaded = handle.lock().await;
            let outcome = device::poll_once(ctx, &mut loaded, self.fetcher.as_ref(), &self.discovery).await?;
            match outcome {
                device::PollOutcome::Done(token) => {
                    flows.remove(name);
                    return Ok(serde_json::json!({
                        "status": "success",
                        "access_token": token.access_token.expose_secret(),
                    }));
                }
                device::PollOutcome::Denied => {
                    flows.remove(name);
                    return Err(AgentError::UpstreamError { status: None, body: "access_denied".into() });
                }
                device::PollOutcome::Expired => {
                    flows.remove(name);
                    return Err(AgentError::UpstreamTimeout);
                }
                device::PollOutcome::Pending | device::PollOutcome::SlowDown => {
                    drop(flows);
                    drop(loaded);
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    /// Drops every loaded account and in-flight flow, wiping secrets
    /// (§4.9 shutdown, §5 cancellation: account removal cancels any
    /// `FlowContext` holding a reference to it).
    pub async fn shutdown(&self) {
        self.store.lock().await.remove_all();
        self.device_flows.lock().await.clear();
        self.code_flows.lock().await.clear();
    }

    /// The lifetime sweeper (§4.7, §4.9): removes every account whose
    /// `lifetime` has elapsed.
    pub async fn sweep(&self) -> Vec<String> {
        self.store.lock().await.sweep_expired().await
    }
}

/// Result of an `access_token` lookup: the token, plus whether the
/// account's `confirm` flag (§4.7) means the IPC layer must surface a
/// confirmation-required status instead of handing the token out.
struct AccessTokenOutcome {
    token: String,
    confirm: bool,
}

fn loaded_has_refresh_token(loaded: &LoadedAccount) -> bool {
    loaded.account.refresh_token.is_some()
}

/// Runs the refresh-token grant, retrying on `AgentError::UpstreamTimeout`
/// per the fixed 1s/2s/4s schedule (§7). Driven by hand rather than through
/// `resilience::retry_upstream_timeout`: that helper takes an `FnMut`, and
/// this call needs a fresh `&mut LoadedAccount` reborrow on every attempt,
/// which an `FnMut`'s returned future can't carry across calls.
async fn refresh_with_backoff(
    loaded: &mut LoadedAccount,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
    scope: &std::collections::HashSet<String>,
    audience: &std::collections::HashSet<String>,
) -> AgentResult<CachedToken> {
    let mut attempt = 0;
    loop {
        match refresh::execute(loaded, fetcher, discovery, scope, audience).await {
            Ok(value) => return Ok(value),
            Err(AgentError::UpstreamTimeout) if attempt < BACKOFF.len() => {
                tokio::time::sleep(BACKOFF[attempt]).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn require_str(payload: &Value, field: &str) -> AgentResult<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AgentError::ArgInvalid(format!("missing required field {field:?}")))
}

fn string_set(payload: &Value, field: &str) -> std::collections::HashSet<String> {
    payload
        .get(field)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl RequestHandler for Agent {
    async fn handle(&self, verb: &str, payload: Value) -> Value {
        match self.handle(verb, payload).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(verb, error = %err, kind = err.kind(), "ipc request failed");
                serde_json::json!({
                    "status": "failure",
                    "error": err.kind(),
                    "error_description": err.to_string(),
                })
            }
        }
    }
}

/// Binds the IPC socket, then runs the accept loop, the lifetime sweeper,
/// and signal handling concurrently until `SIGTERM`/`SIGINT` (§4.9).
/// `SIGHUP` is received but deliberately ignored.
pub async fn run(config: &AgentConfig, agent: Arc<Agent>) -> AgentResult<()> {
    let listener = ipc::bind(&config.socket_path)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let accept_handler = agent.clone();
    let accept_task = tokio::spawn(ipc::accept_loop(listener, accept_handler, shutdown_rx.clone()));

    let sweep_agent = agent.clone();
    let mut sweep_shutdown = shutdown_rx.clone();
    let sweep_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                    for name in sweep_agent.sweep().await {
                        tracing::info!(account = %name, "account lifetime expired, removed");
                    }
                }
                _ = sweep_shutdown.changed() => {
                    if *sweep_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    wait_for_shutdown_signal().await?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = accept_task.await;
    let _ = sweep_task.await;
    agent.shutdown().await;
    let _ = std::fs::remove_file(&config.socket_path);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> AgentResult<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).map_err(AgentError::IoError)?;
    let mut int = signal(SignalKind::interrupt()).map_err(AgentError::IoError)?;
    let mut hup = signal(SignalKind::hangup()).map_err(AgentError::IoError)?;
    loop {
        tokio::select! {
            _ = term.recv() => return Ok(()),
            _ = int.recv() => return Ok(()),
            _ = hup.recv() => {
                tracing::debug!("SIGHUP received, ignored");
                continue;
            }
        }
    }
}

pub fn build_fetcher() -> AgentResult<Arc<dyn HttpFetcher>> {
    Ok(Arc::new(ReqwestHttpFetcher::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockHttpFetcher;
    use secrecy::SecretString;

    fn mock_agent() -> (Agent, Arc<MockHttpFetcher>) {
        let fetcher = Arc::new(MockHttpFetcher::new());
        (Agent::new(fetcher.clone()), fetcher)
    }

    fn account_payload(name: &str) -> Value {
        serde_json::json!({
            "account": {
                "name": name,
                "issuer_url": "https://idp.example",
                "client_id": "client-1",
                "refresh_token": "rt0",
                "scope": "",
                "redirect_uris": [],
            }
        })
    }

    #[tokio::test]
    async fn s1_add_then_access_token_then_cache_hit() {
        let (agent, fetcher) = mock_agent();
        agent.handle("add", account_payload("work")).await.unwrap();

        fetcher.queue_json(200, &serde_json::json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
        }));
        fetcher.queue_json(200, &serde_json::json!({"access_token": "at1", "expires_in": 3600}));

        let first = agent
            .handle("access_token", serde_json::json!({"name": "work"}))
            .await
            .unwrap();
        assert_eq!(first["access_token"], "at1");
        assert_eq!(fetcher.request_count(), 2);

        let second = agent
            .handle("access_token", serde_json::json!({"name": "work"}))
            .await
            .unwrap();
        assert_eq!(second["access_token"], "at1");
        assert_eq!(fetcher.request_count(), 2, "cache hit must not make another upstream call");
    }

    #[tokio::test]
    async fn access_token_surfaces_confirmation_required_instead_of_the_token() {
        let (agent, fetcher) = mock_agent();
        agent
            .handle(
                "add",
                serde_json::json!({
                    "account": {
                        "name": "work",
                        "issuer_url": "https://idp.example",
                        "client_id": "client-1",
                        "refresh_token": "rt0",
                        "scope": "",
                        "redirect_uris": [],
                    },
                    "confirm": true,
                }),
            )
            .await
            .unwrap();

        fetcher.queue_json(200, &serde_json::json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
        }));
        fetcher.queue_json(200, &serde_json::json!({"access_token": "at1", "expires_in": 3600}));

        let response = agent
            .handle("access_token", serde_json::json!({"name": "work"}))
            .await
            .unwrap();
        assert_eq!(response["status"], "confirmation_required");
        assert!(response.get("access_token").is_none());
    }

    #[tokio::test]
    async fn s2_remove_all_empties_list() {
        let (agent, _fetcher) = mock_agent();
        agent.handle("add", account_payload("a")).await.unwrap();
        agent.handle("add", account_payload("b")).await.unwrap();

        agent.handle("remove_all", Value::Null).await.unwrap();
        let list = agent.handle("list", Value::Null).await.unwrap();
        assert_eq!(list["accounts"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn s3_lock_blocks_access_token_until_correct_unlock() {
        let (agent, _fetcher) = mock_agent();
        agent.handle("add", account_payload("work")).await.unwrap();

        agent
            .handle("lock", serde_json::json!({"password": "right"}))
            .await
            .unwrap();

        let err = agent
            .handle("access_token", serde_json::json!({"name": "work"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "store_locked");

        let wrong = agent.handle("unlock", serde_json::json!({"password": "wrong"})).await.unwrap_err();
        assert_eq!(wrong.kind(), "password_wrong");

        agent.handle("unlock", serde_json::json!({"password": "right"})).await.unwrap();
        assert!(agent.handle("check", serde_json::json!({"name": "work"})).await.is_ok());
    }

    #[tokio::test]
    async fn access_token_falls_back_to_client_credentials_without_refresh_token() {
        let (agent, fetcher) = mock_agent();
        agent
            .handle(
                "add",
                serde_json::json!({"account": {
                    "name": "svc",
                    "issuer_url": "https://idp.example",
                    "client_id": "client-1",
                    "client_secret": "s3cr3t",
                    "scope": "",
                    "redirect_uris": [],
                }}),
            )
            .await
            .unwrap();

        fetcher.queue_json(200, &serde_json::json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
        }));
        fetcher.queue_json(200, &serde_json::json!({"access_token": "svc-token", "expires_in": 600}));

        let response = agent
            .handle("access_token", serde_json::json!({"name": "svc"}))
            .await
            .unwrap();
        assert_eq!(response["access_token"], "svc-token");

        let body = fetcher.requests()[1].body.clone().unwrap();
        assert!(body.contains("grant_type=client_credentials"));
    }

    #[tokio::test]
    async fn device_flow_end_to_end_through_agent() {
        let (agent, fetcher) = mock_agent();
        agent
            .handle(
                "add",
                serde_json::json!({"account": {
                    "name": "device-acc",
                    "issuer_url": "https://idp.example",
                    "client_id": "client-1",
                    "scope": "",
                    "redirect_uris": [],
                }}),
            )
            .await
            .unwrap();

        fetcher.queue_json(200, &serde_json::json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
            "device_authorization_endpoint": "https://idp.example/device",
        }));
        fetcher.queue_json(200, &serde_json::json!({
            "device_code": "devcode",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://idp.example/device",
            "interval": 0,
            "expires_in": 60,
        }));
        let init = agent
            .handle("device_init", serde_json::json!({"name": "device-acc"}))
            .await
            .unwrap();
        assert_eq!(init["user_code"], "ABCD-EFGH");

        fetcher.queue_json(200, &serde_json::json!({"access_token": "dat", "refresh_token": "drt", "expires_in": 3600}));
        let done = agent
            .handle("device_done", serde_json::json!({"name": "device-acc"}))
            .await
            .unwrap();
        assert_eq!(done["access_token"], "dat");
    }

    #[tokio::test]
    async fn code_exchange_with_wrong_state_is_rejected_and_leaves_flow_intact() {
        let (agent, _fetcher) = mock_agent();
        agent
            .handle(
                "add",
                serde_json::json!({"account": {
                    "name": "web",
                    "issuer_url": "https://idp.example",
                    "client_id": "client-1",
                    "scope": "",
                    "redirect_uris": ["http://127.0.0.1:9999/cb"],
                }}),
            )
            .await
            .unwrap();

        let url_response = agent
            .handle(
                "code_url",
                serde_json::json!({"name": "web", "redirect_uri": "http://127.0.0.1:9999/cb"}),
            )
            .await
            .unwrap();
        assert!(url_response["url"].as_str().unwrap().contains("code_challenge="));

        let err = agent
            .handle(
                "code_exchange",
                serde_json::json!({
                    "state": "not-a-real-state",
                    "redirect_uri": "http://127.0.0.1:9999/cb",
                    "callback_params": {"code": "c", "state": "not-a-real-state"},
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "arg_invalid");
    }

    #[tokio::test]
    async fn unknown_verb_is_not_implemented() {
        let (agent, _fetcher) = mock_agent();
        let response = RequestHandler::handle(&agent, "frobnicate", Value::Null).await;
        assert_eq!(response["status"], "failure");
        assert_eq!(response["error"], "not_implemented");
    }

    #[tokio::test]
    async fn register_verb_is_explicitly_not_implemented() {
        let (agent, _fetcher) = mock_agent();
        let err = agent.handle("register", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), "not_implemented");
    }

    #[test]
    fn secret_string_helper_is_usable_in_tests() {
        let s = SecretString::new("x".into());
        assert_eq!(secrecy::ExposeSecret::expose_secret(&s), "x");
    }
}
