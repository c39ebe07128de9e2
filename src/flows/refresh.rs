//! Refresh token flow
//!
//! States `ready → posting → done|failed` (§4.5). A single POST with
//! client authentication; `invalid_grant` clears the stored refresh token.

use std::collections::HashSet;
use std::time::Duration;

use crate::account::{CachedToken, LoadedAccount};
use crate::discovery::DiscoveryCache;
use crate::error::{AgentError, AgentResult};
use crate::flows::{
    apply_client_auth, apply_token_response, classify_token_error, encode_form, ensure_discovery,
    now_unix, TokenEndpointResponse,
};
use crate::transport::{HttpFetcher, HttpMethod, HttpRequest};

/// Executes the refresh-token grant for `loaded`, returning the freshly
/// cached access token on success.
///
/// On `invalid_grant` the account's stored refresh token is cleared and
/// `refresh_revoked` is returned; the caller (`TokenCache`) is responsible
/// for not retrying without user intervention.
pub async fn execute(
    loaded: &mut LoadedAccount,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
    scope: &HashSet<String>,
    audience: &HashSet<String>,
) -> AgentResult<CachedToken> {
    let refresh_token = loaded
        .account
        .refresh_token
        .as_ref()
        .map(|s| secrecy::ExposeSecret::expose_secret(s).to_string())
        .ok_or_else(|| AgentError::ArgInvalid("account has no refresh token".into()))?;

    let doc = ensure_discovery(&mut loaded.account, fetcher, discovery).await?;

    let jti = crate::crypto::CryptoCodec::random_alphanumeric_string(16);
    let iat = now_unix();
    let (mut extra_fields, extra_headers) =
        apply_client_auth(&loaded.account, &doc.token_endpoint, &jti, iat)?;

    let mut fields = vec![
        ("grant_type".to_string(), "refresh_token".to_string()),
        ("refresh_token".to_string(), refresh_token),
    ];
    if !scope.is_empty() {
        fields.push(("scope".to_string(), scope.iter().cloned().collect::<Vec<_>>().join(" ")));
    }
    fields.append(&mut extra_fields);

    let mut headers: std::collections::HashMap<String, String> = [
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
        let err = classify_token_error(response.status, &response.body);
        if matches!(err, AgentError::RefreshRevoked) {
            loaded.account.refresh_token = None;
        }
        return Err(err);
    }

    let parsed: TokenEndpointResponse = serde_json::from_str(&response.body)
        .map_err(|e| AgentError::FormatInvalid(format!("invalid token response: {e}")))?;
    Ok(apply_token_response(loaded, &parsed, scope, audience))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::transport::MockHttpFetcher;
    use secrecy::SecretString;

    fn account_with_refresh_token(rt: &str) -> Account {
        let mut acc = Account::new("a", "https://idp.example", "client-1");
        acc.refresh_token = Some(SecretString::new(rt.into()));
        acc
    }

    fn discovery_doc(issuer: &str) -> serde_json::Value {
        serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
        })
    }

    #[tokio::test]
    async fn success_posts_refresh_token_and_caches_access_token() {
        let fetcher = MockHttpFetcher::new();
        fetcher.queue_json(200, &discovery_doc("https://idp.example"));
        fetcher.queue_json(200, &serde_json::json!({"access_token": "at1", "expires_in": 3600}));

        let mut loaded = LoadedAccount::new(account_with_refresh_token("rt0"), None, false);
        let cache = DiscoveryCache::new();
        let token = execute(&mut loaded, &fetcher, &cache, &HashSet::new(), &HashSet::new())
            .await
            .unwrap();

        assert_eq!(secrecy::ExposeSecret::expose_secret(&token.access_token), "at1");
        let requests = fetcher.requests();
        let body = requests[1].body.as_ref().unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=rt0"));
    }

    #[tokio::test]
    async fn invalid_grant_clears_refresh_token() {
        let fetcher = MockHttpFetcher::new();
        fetcher.queue_json(200, &discovery_doc("https://idp.example"));
        fetcher.queue_response(crate::transport::HttpResponse {
            status: 400,
            headers: Default::default(),
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        });

        let mut loaded = LoadedAccount::new(account_with_refresh_token("rt0"), None, false);
        let cache = DiscoveryCache::new();
        let err = execute(&mut loaded, &fetcher, &cache, &HashSet::new(), &HashSet::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "refresh_revoked");
        assert!(loaded.account.refresh_token.is_none());
    }
}
