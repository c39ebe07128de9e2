//! Device-code flow
//!
//! States `init → authorizing → polling → done|failed|timeout` (§4.5,
//! RFC 8628). `init` returns the user-facing fields immediately; `poll_once`
//! is driven by the caller (typically `AgentLoop`'s scheduler) at the
//! server-advertised interval, with `slow_down` backing it off by 5s and a
//! wall-clock deadline of `expires_in` capping the whole flow.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::account::LoadedAccount;
use crate::discovery::DiscoveryCache;
use crate::error::{AgentError, AgentResult};
use crate::flows::{
    apply_client_auth, apply_token_response, encode_form, ensure_discovery, now_unix, FlowContext,
    GrantType, OAuthErrorResponse, TokenEndpointResponse,
};
use crate::transport::{HttpFetcher, HttpMethod, HttpRequest};

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// The user-facing fields returned to the IPC caller immediately after
/// `init` (§4.5).
#[derive(Debug, Clone)]
pub struct DeviceInitResult {
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub interval: Duration,
}

/// `init`: POSTs to the device authorization endpoint and starts a
/// `FlowContext` the caller should keep around for the subsequent polls.
pub async fn init(
    loaded: &mut LoadedAccount,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
) -> AgentResult<(FlowContext, DeviceInitResult)> {
    let doc = ensure_discovery(&mut loaded.account, fetcher, discovery).await?;
    let endpoint = loaded
        .account
        .device_authorization_endpoint
        .clone()
        .or(doc.device_authorization_endpoint.clone())
        .ok_or_else(|| AgentError::ArgInvalid("issuer has no device authorization endpoint".into()))?;

    let mut fields = vec![("client_id".to_string(), loaded.account.client_id.clone())];
    if !loaded.account.scope.is_empty() {
        fields.push(("scope".to_string(), loaded.account.scope_string()));
    }

    let response = fetcher
        .send(HttpRequest {
            method: HttpMethod::Post,
            url: endpoint,
            headers: [
                ("content-type".to_string(), "application/x-www-form-urlencoded".to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ]
            .into_iter()
            .collect(),
            body: Some(encode_form(&fields)),
            timeout: Some(Duration::from_secs(30)),
        })
        .await?;

    if response.status != 200 {
        return Err(AgentError::UpstreamError { status: Some(response.status), body: response.body });
    }
    let parsed: DeviceAuthorizationResponse = serde_json::from_str(&response.body)
        .map_err(|e| AgentError::FormatInvalid(format!("invalid device authorization response: {e}")))?;

    let mut ctx = FlowContext::new(GrantType::DeviceCode, Duration::from_secs(parsed.expires_in));
    ctx.device_code = Some(parsed.device_code.clone());
    ctx.user_code = Some(parsed.user_code.clone());
    ctx.poll_interval = Some(Duration::from_secs(parsed.interval));

    let result = DeviceInitResult {
        user_code: parsed.user_code,
        verification_uri: parsed.verification_uri,
        verification_uri_complete: parsed.verification_uri_complete,
        interval: Duration::from_secs(parsed.interval),
    };
    Ok((ctx, result))
}

/// Outcome of a single poll against the token endpoint.
pub enum PollOutcome {
    Pending,
    SlowDown,
    Done(crate::account::CachedToken),
    Denied,
    Expired,
}

/// `polling`: one POST to the token endpoint using `urn:ietf:params:oauth:
/// grant-type:device_code`. On `slow_down`, bumps `ctx.poll_interval` by 5s
/// per §4.5 so the caller's scheduler backs off. Fails the whole flow with
/// `upstream_timeout` if `ctx.is_timed_out()` — callers should check that
/// before calling `poll_once` again.
pub async fn poll_once(
    ctx: &mut FlowContext,
    loaded: &mut LoadedAccount,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
) -> AgentResult<PollOutcome> {
    if ctx.is_timed_out() {
        return Ok(PollOutcome::Expired);
    }
    let device_code = ctx
        .device_code
        .clone()
        .ok_or_else(|| AgentError::Internal("poll_once called without a device_code".into()))?;

    let doc = ensure_discovery(&mut loaded.account, fetcher, discovery).await?;
    let jti = crate::crypto::CryptoCodec::random_alphanumeric_string(16);
    let iat = now_unix();
    let (mut extra_fields, extra_headers) =
        apply_client_auth(&loaded.account, &doc.token_endpoint, &jti, iat)?;

    let mut fields = vec![
        ("grant_type".to_string(), "urn:ietf:params:oauth:grant-type:device_code".to_string()),
        ("device_code".to_string(), device_code),
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

    if response.status == 200 {
        let parsed: TokenEndpointResponse = serde_json::from_str(&response.body)
            .map_err(|e| AgentError::FormatInvalid(format!("invalid token response: {e}")))?;
        let token = apply_token_response(
            loaded,
            &parsed,
            &loaded.account.scope.iter().cloned().collect(),
            &Default::default(),
        );
        return Ok(PollOutcome::Done(token));
    }

    if let Ok(err) = serde_json::from_str::<OAuthErrorResponse>(&response.body) {
        return Ok(match err.error.as_str() {
            "authorization_pending" => PollOutcome::Pending,
            "slow_down" => {
                ctx.poll_interval = Some(ctx.poll_interval.unwrap_or(Duration::from_secs(5)) + Duration::from_secs(5));
                PollOutcome::SlowDown
            }
            "access_denied" => PollOutcome::Denied,
            "expired_token" => PollOutcome::Expired,
            _ => return Err(AgentError::UpstreamError { status: Some(response.status), body: response.body }),
        });
    }
    Err(AgentError::UpstreamError { status: Some(response.status), body: response.body })
}
