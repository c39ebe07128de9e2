//! OIDCFlows
//!
//! State machines for each grant type (§4.5): refresh token, device code,
//! authorization code with PKCE, password, and client credentials. This
//! module holds the pieces shared by all of them — the discovery
//! preamble, `FlowContext`, client-authentication selection, and the
//! common token-endpoint response shape each flow's "postamble" applies
//! to a `LoadedAccount`.

pub mod authorization_code;
pub mod client_credentials;
pub mod device;
pub mod password;
pub mod refresh;

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::account::{Account, CachedToken, LoadedAccount};
use crate::discovery::DiscoveryCache;
use crate::error::{AgentError, AgentResult};
use crate::jwk::{client_assertion_claims, JwkKeyring};
use crate::transport::HttpFetcher;

/// The five grant types §2/§4.5 name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    RefreshToken,
    DeviceCode,
    AuthorizationCode,
    Password,
    ClientCredentials,
}

/// How the client authenticates itself at the token endpoint, chosen per
/// §4.5's "client authentication selection" in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    PrivateKeyJwt,
    ClientSecretBasic,
    None,
}

/// `private_key_jwt` if the account has a signing JWK; `client_secret_basic`
/// if a client secret exists; `none` otherwise (public client relying on
/// PKCE).
pub fn select_client_auth(account: &Account) -> ClientAuthMethod {
    if account.signing_jwk.is_some() {
        ClientAuthMethod::PrivateKeyJwt
    } else if account.client_secret.is_some() {
        ClientAuthMethod::ClientSecretBasic
    } else {
        ClientAuthMethod::None
    }
}

/// Applies the chosen client-authentication method to a token-endpoint
/// POST, returning the extra form fields and headers each method adds.
/// `jti`/`iat` are supplied by the caller so tests can pin them.
pub fn apply_client_auth(
    account: &Account,
    token_endpoint: &str,
    jti: &str,
    iat: i64,
) -> AgentResult<(Vec<(String, String)>, Vec<(String, String)>)> {
    match select_client_auth(account) {
        ClientAuthMethod::PrivateKeyJwt => {
            let jwk = account
                .signing_jwk
                .as_ref()
                .ok_or_else(|| AgentError::Internal("private_key_jwt selected without a signing jwk".into()))?;
            let claims = client_assertion_claims(&account.client_id, token_endpoint, jti, iat);
            let assertion = JwkKeyring::sign_jwt(jwk, &claims)?;
            Ok((
                vec![
                    (
                        "client_assertion_type".to_string(),
                        "urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_string(),
                    ),
                    ("client_assertion".to_string(), assertion),
                ],
                vec![],
            ))
        }
        ClientAuthMethod::ClientSecretBasic => {
            use base64::Engine;
            use secrecy::ExposeSecret;
            let secret = account
                .client_secret
                .as_ref()
                .ok_or_else(|| AgentError::Internal("client_secret_basic selected without a secret".into()))?;
            let basic = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", account.client_id, secret.expose_secret()));
            Ok((vec![], vec![("authorization".to_string(), format!("Basic {basic}"))]))
        }
        ClientAuthMethod::None => Ok((
            vec![("client_id".to_string(), account.client_id.clone())],
            vec![],
        )),
    }
}

/// URL-encode a set of form fields as `application/x-www-form-urlencoded`.
pub fn encode_form(fields: &[(String, String)]) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        out.append_pair(k, v);
    }
    out.finish()
}

/// Ensures `account`'s discovery document is cached, per §4.5's common
/// preamble. Fetches and stores it on the account on a miss.
pub async fn ensure_discovery(
    account: &mut Account,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
) -> AgentResult<crate::discovery::DiscoveryDocument> {
    let doc = discovery.ensure_cached(fetcher, &account.issuer_url).await?;
    account.discovery_document = Some(serde_json::to_value(&doc)?);
    Ok(doc)
}

/// The raw token-endpoint JSON shape common to every grant (§4.5's
/// postamble reads `access_token`/`refresh_token`/`expires_in`/`scope`
/// from this before updating the account and token cache).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEndpointResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// An OAuth2 `error`/`error_description` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Current time as a Unix timestamp, for `iat`/`jti`-bearing client
/// assertions (§4.4). Every grant's client-authentication step needs one.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Classifies a non-200 token-endpoint response per §4.5/§7: `invalid_grant`
/// on a refresh means the refresh token was revoked, everything else is an
/// opaque upstream error.
pub fn classify_token_error(status: u16, body: &str) -> AgentError {
    if status == 400 {
        if let Ok(err) = serde_json::from_str::<OAuthErrorResponse>(body) {
            if err.error == "invalid_grant" {
                return AgentError::RefreshRevoked;
            }
        }
    }
    AgentError::UpstreamError { status: Some(status), body: body.to_string() }
}

/// Applies a successful token-endpoint response to `loaded`'s account and
/// token cache (§4.5's common postamble): updates the refresh token if a
/// new one was issued, and replaces the cached access token.
pub fn apply_token_response(
    loaded: &mut LoadedAccount,
    response: &TokenEndpointResponse,
    requested_scope: &std::collections::HashSet<String>,
    audience: &std::collections::HashSet<String>,
) -> CachedToken {
    use secrecy::SecretString;

    if let Some(rt) = &response.refresh_token {
        loaded.account.refresh_token = Some(SecretString::new(rt.clone().into()));
    }

    let scope: std::collections::HashSet<String> = match &response.scope {
        Some(s) => s.split_whitespace().map(str::to_string).collect(),
        None => requested_scope.clone(),
    };
    let expires_at = Instant::now() + Duration::from_secs(response.expires_in.unwrap_or(3600));
    let cached = CachedToken {
        access_token: SecretString::new(response.access_token.clone().into()),
        expires_at,
        scope,
        audience: audience.clone(),
    };
    loaded.token_cache = Some(cached.clone());
    cached
}

/// The transient state of one in-flight grant (§3's `FlowContext`).
/// Created and owned by the flow module that started it; dropped on
/// completion, cancellation, or timeout.
pub struct FlowContext {
    pub grant_type: GrantType,
    pub created_at: Instant,
    pub deadline: Instant,
    pub pkce_verifier: Option<String>,
    pub pkce_challenge: Option<String>,
    pub state: Option<String>,
    pub device_code: Option<String>,
    pub user_code: Option<String>,
    pub poll_interval: Option<Duration>,
}

impl FlowContext {
    pub fn new(grant_type: GrantType, timeout: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            grant_type,
            created_at,
            deadline: created_at + timeout,
            pkce_verifier: None,
            pkce_challenge: None,
            state: None,
            device_code: None,
            user_code: None,
            poll_interval: None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
