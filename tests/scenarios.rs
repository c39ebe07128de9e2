//! Crate-level scenario tests (§8, SPEC_FULL §10.4): a full `Agent` driven
//! through the public IPC-verb surface (`RequestHandler::handle`), against
//! a real filesystem temp directory for the encrypted account store and a
//! `MockHttpFetcher` standing in for the upstream provider. The in-module
//! unit tests in `src/agent.rs` exercise the same grant flows against an
//! in-memory-only store; these tests additionally cross the disk
//! encryption boundary that `load_accounts_from_disk` and `config_format`
//! own.

use std::sync::Arc;

use oidc_agent_rs::account::Account;
use oidc_agent_rs::agent::Agent;
use oidc_agent_rs::config_format;
use oidc_agent_rs::crypto::SensitiveBuffer;
use oidc_agent_rs::ipc::RequestHandler;
use oidc_agent_rs::transport::MockHttpFetcher;
use secrecy::SecretString;
use serde_json::{json, Value};

fn write_account_file(dir: &std::path::Path, account: &Account, password: &SensitiveBuffer) {
    let plaintext = serde_json::to_vec(account).unwrap();
    let sealed = config_format::save(&plaintext, password).unwrap();
    std::fs::write(dir.join(&account.name), sealed).unwrap();
}

#[tokio::test]
async fn s1_disk_round_trip_then_refresh_then_cache_hit() {
    let dir = tempfile::tempdir().unwrap();
    let password = SensitiveBuffer::from_str("correct horse battery staple");

    let mut account = Account::new("work", "https://idp.example", "client-1");
    account.refresh_token = Some(SecretString::new("rt0".into()));
    write_account_file(dir.path(), &account, &password);

    // §6: issuer.config/pubclient.conf sit alongside account files and are
    // skipped by the loader, not mistaken for accounts.
    std::fs::write(dir.path().join("issuer.config"), b"not an account").unwrap();

    let fetcher = Arc::new(MockHttpFetcher::new());
    let agent = Agent::new(fetcher.clone());
    let loaded = agent.load_accounts_from_disk(dir.path(), &password).await.unwrap();
    assert_eq!(loaded, 1);

    let list = RequestHandler::handle(&agent, "list", Value::Null).await;
    assert_eq!(list["accounts"], json!(["work"]));

    fetcher.queue_json(
        200,
        &json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
        }),
    );
    fetcher.queue_json(200, &json!({"access_token": "at1", "expires_in": 3600}));

    let first = RequestHandler::handle(&agent, "access_token", json!({"name": "work"})).await;
    assert_eq!(first["access_token"], "at1");
    assert_eq!(fetcher.request_count(), 2);

    let second = RequestHandler::handle(&agent, "access_token", json!({"name": "work"})).await;
    assert_eq!(second["access_token"], "at1");
    assert_eq!(fetcher.request_count(), 2, "cache hit must not make another upstream call");
}

#[tokio::test]
async fn s3_lock_survives_across_multiple_accounts_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let password = SensitiveBuffer::from_str("store-password");

    for name in ["alpha", "beta"] {
        let mut account = Account::new(name, "https://idp.example", "client-1");
        account.refresh_token = Some(SecretString::new("rt".into()));
        write_account_file(dir.path(), &account, &password);
    }

    let agent = Agent::new(Arc::new(MockHttpFetcher::new()));
    let loaded = agent.load_accounts_from_disk(dir.path(), &password).await.unwrap();
    assert_eq!(loaded, 2);

    RequestHandler::handle(&agent, "lock", json!({"password": "lockpw"})).await;

    let blocked = RequestHandler::handle(&agent, "access_token", json!({"name": "alpha"})).await;
    assert_eq!(blocked["status"], "failure");
    assert_eq!(blocked["error"], "store_locked");

    let wrong = RequestHandler::handle(&agent, "unlock", json!({"password": "nope"})).await;
    assert_eq!(wrong["error"], "password_wrong");

    let right = RequestHandler::handle(&agent, "unlock", json!({"password": "lockpw"})).await;
    assert_eq!(right["status"], "success");

    let check = RequestHandler::handle(&agent, "check", json!({"name": "beta"})).await;
    assert_eq!(check["status"], "success");
}

#[tokio::test]
async fn s5_device_flow_end_to_end_via_public_ipc_handle() {
    let fetcher = Arc::new(MockHttpFetcher::new());
    let agent = Agent::new(fetcher.clone());

    let add = RequestHandler::handle(
        &agent,
        "add",
        json!({"account": {
            "name": "tv-app",
            "issuer_url": "https://idp.example",
            "client_id": "client-1",
            "scope": "",
            "redirect_uris": [],
        }}),
    )
    .await;
    assert_eq!(add["status"], "success");

    fetcher.queue_json(
        200,
        &json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
            "device_authorization_endpoint": "https://idp.example/device",
        }),
    );
    fetcher.queue_json(
        200,
        &json!({
            "device_code": "devcode",
            "user_code": "WDJB-MJHT",
            "verification_uri": "https://idp.example/device",
            "interval": 0,
            "expires_in": 60,
        }),
    );
    let init = RequestHandler::handle(&agent, "device_init", json!({"name": "tv-app"})).await;
    assert_eq!(init["user_code"], "WDJB-MJHT");

    fetcher.queue_json(200, &json!({"access_token": "tv-token", "refresh_token": "tv-rt", "expires_in": 3600}));
    let done = RequestHandler::handle(&agent, "device_done", json!({"name": "tv-app"})).await;
    assert_eq!(done["access_token"], "tv-token");
}

#[tokio::test]
async fn s6_authorization_code_pkce_rejects_wrong_state_with_zero_http_calls() {
    let fetcher = Arc::new(MockHttpFetcher::new());
    let agent = Agent::new(fetcher.clone());

    RequestHandler::handle(
        &agent,
        "add",
        json!({"account": {
            "name": "web",
            "issuer_url": "https://idp.example",
            "client_id": "client-1",
            "scope": "",
            "redirect_uris": ["http://127.0.0.1:9999/cb"],
        }}),
    )
    .await;

    let url = RequestHandler::handle(
        &agent,
        "code_url",
        json!({"name": "web", "redirect_uri": "http://127.0.0.1:9999/cb"}),
    )
    .await;
    assert!(url["url"].as_str().unwrap().contains("code_challenge="));

    let rejected = RequestHandler::handle(
        &agent,
        "code_exchange",
        json!({
            "state": "forged-state",
            "redirect_uri": "http://127.0.0.1:9999/cb",
            "callback_params": {"code": "c", "state": "forged-state"},
        }),
    )
    .await;
    assert_eq!(rejected["status"], "failure");
    assert_eq!(rejected["error"], "arg_invalid");
    assert_eq!(fetcher.request_count(), 0, "state is checked before any upstream call is made");
}
