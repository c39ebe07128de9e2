//! Authorization-code flow with PKCE
//!
//! States `init → awaiting_callback → exchanging → done|failed|timeout`
//! (§4.5, RFC 6749 §4.1 + RFC 7636). `init` generates a verifier/challenge
//! pair and a `state`, returning a fully-formed authorization URL.
//! `exchange` is driven once the IPC client delivers the redirect's query
//! parameters; it checks `state` before ever POSTing to the token endpoint.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::account::{CachedToken, LoadedAccount};
use crate::discovery::DiscoveryCache;
use crate::error::{AgentError, AgentResult};
use crate::flows::{
    apply_client_auth, apply_token_response, classify_token_error, encode_form, ensure_discovery,
    now_unix, FlowContext, GrantType, TokenEndpointResponse,
};
use crate::transport::{HttpFetcher, HttpMethod, HttpRequest};

const PKCE_UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
const PKCE_VERIFIER_LEN: usize = 64;

fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    (0..PKCE_VERIFIER_LEN)
        .map(|_| *PKCE_UNRESERVED.choose(&mut rng).unwrap() as char)
        .collect()
}

fn code_challenge(verifier: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn generate_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// `init`: builds the fully-formed authorization URL and a `FlowContext`
/// carrying the PKCE verifier and `state` for the later `exchange` call.
pub fn init(account: &crate::account::Account, redirect_uri: &str, timeout: Duration) -> (FlowContext, String) {
    let verifier = generate_code_verifier();
    let challenge = code_challenge(&verifier);
    let state = generate_state();

    let mut ctx = FlowContext::new(GrantType::AuthorizationCode, timeout);
    ctx.pkce_verifier = Some(verifier);
    ctx.pkce_challenge = Some(challenge.clone());
    ctx.state = Some(state.clone());

    let mut params = vec![
        ("response_type".to_string(), "code".to_string()),
        ("client_id".to_string(), account.client_id.clone()),
        ("redirect_uri".to_string(), redirect_uri.to_string()),
        ("code_challenge".to_string(), challenge),
        ("code_challenge_method".to_string(), "S256".to_string()),
        ("state".to_string(), state),
    ];
    if !account.scope.is_empty() {
        params.push(("scope".to_string(), account.scope_string()));
    }

    let authorization_endpoint = account
        .discovery_document
        .as_ref()
        .and_then(|d| d.get("authorization_endpoint"))
        .and_then(|v| v.as_str())
        .unwrap_or(&account.issuer_url)
        .to_string();

    let url = format!("{authorization_endpoint}?{}", encode_form(&params));
    (ctx, url)
}

/// `awaiting_callback` → `exchanging`: verifies `state` against the
/// callback's query parameters and, if it matches, POSTs the code exchange
/// with the saved `code_verifier`. A `state` mismatch fails with
/// `state_mismatch` without ever reaching the token endpoint.
pub async fn exchange(
    ctx: &FlowContext,
    loaded: &mut LoadedAccount,
    redirect_uri: &str,
    callback_params: &HashMap<String, String>,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
) -> AgentResult<CachedToken> {
    if ctx.is_timed_out() {
        return Err(AgentError::UpstreamTimeout);
    }
    if let Some(error) = callback_params.get("error") {
        return Err(AgentError::UpstreamError { status: None, body: error.clone() });
    }

    let expected_state = ctx.state.as_deref().unwrap_or_default();
    let received_state = callback_params.get("state").map(String::as_str).unwrap_or_default();
    if expected_state != received_state {
        return Err(AgentError::StateMismatch);
    }

    let code = callback_params
        .get("code")
        .ok_or_else(|| AgentError::ArgInvalid("callback is missing the authorization code".into()))?;
    let verifier = ctx
        .pkce_verifier
        .as_ref()
        .ok_or_else(|| AgentError::Internal("flow context has no pkce verifier".into()))?;

    let doc = ensure_discovery(&mut loaded.account, fetcher, discovery).await?;
    let jti = crate::crypto::CryptoCodec::random_alphanumeric_string(16);
    let iat = now_unix();
    let (mut extra_fields, extra_headers) =
        apply_client_auth(&loaded.account, &doc.token_endpoint, &jti, iat)?;

    let mut fields = vec![
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("code".to_string(), code.clone()),
        ("redirect_uri".to_string(), redirect_uri.to_string()),
        ("code_verifier".to_string(), verifier.clone()),
    ];
    fields.append(&mut extra_fields);

    let mut headers: HashMap<String, String> = [
        ("content-type".to_string(), "application/x-www-form-urlencoded".to_string()),
        ("accept".to_string(), "application/json".to_string()),
    ]
    .into_iter()
    .collect();
    headers.extend(extra_headers);

    let response = fetcher
        .send(HttpRequest {
            method: HttpMethod::Post,
            url: doc.token_endpoint.clone(),
            headers,
            body: Some(encode_form(&fields)),
            timeout: Some(Duration::from_secs(30)),
        })
        .await?;

    if response.status != 200 {
        return Err(classify_token_error(response.status, &response.body));
    }
    let parsed: TokenEndpointResponse = serde_json::from_str(&response.body)
        .map_err(|e| AgentError::FormatInvalid(format!("invalid token response: {e}")))?;
    let scope = loaded.account.scope.iter().cloned().collect();
    Ok(apply_token_response(loaded, &parsed, &scope, &Default::default()))
}
