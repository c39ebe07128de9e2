//! Client-credentials flow
//!
//! A single-round POST with the client's own authentication and no user
//! involved (§4.5, RFC 6749 §4.4), classified with the same
//! success/failure rules as the refresh flow.

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

pub async fn execute(
    loaded: &mut LoadedAccount,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
    scope: &HashSet<String>,
) -> AgentResult<CachedToken> {
    if !loaded.account.is_confidential() {
        return Err(AgentError::ArgInvalid(
            "client_credentials requires a client_secret or signing_jwk".into(),
        ));
    }

    let doc = ensure_discovery(&mut loaded.account, fetcher, discovery).await?;
    let jti = crate::crypto::CryptoCodec::random_alphanumeric_string(16);
    let iat = now_unix();
    let (mut extra_fields, extra_headers) =
        apply_client_auth(&loaded.account, &doc.token_endpoint, &jti, iat)?;

    let mut fields = vec![("grant_type".to_string(), "client_credentials".to_string())];
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
        return Err(classify_token_error(response.status, &response.body));
    }
    let parsed: TokenEndpointResponse = serde_json::from_str(&response.body)
        .map_err(|e| AgentError::FormatInvalid(format!("invalid token response: {e}")))?;
    Ok(apply_token_response(loaded, &parsed, scope, &Default::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::transport::MockHttpFetcher;
    use secrecy::SecretString;

    fn discovery_doc(issuer: &str) -> serde_json::Value {
        serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
        })
    }

    #[tokio::test]
    async fn requires_confidential_client() {
        let fetcher = MockHttpFetcher::new();
        let mut loaded = LoadedAccount::new(Account::new("a", "https://idp.example", "client"), None, false);
        let cache = DiscoveryCache::new();
        let err = execute(&mut loaded, &fetcher, &cache, &HashSet::new()).await.unwrap_err();
        assert_eq!(err.kind(), "arg_invalid");
    }

    #[tokio::test]
    async fn success_posts_client_credentials_grant() {
        let fetcher = MockHttpFetcher::new();
        fetcher.queue_json(200, &discovery_doc("https://idp.example"));
        fetcher.queue_json(200, &serde_json::json!({"access_token": "at", "expires_in": 600}));

        let mut account = Account::new("a", "https://idp.example", "client");
        account.client_secret = Some(SecretString::new("s3cr3t".into()));
        let mut loaded = LoadedAccount::new(account, None, false);
        let cache = DiscoveryCache::new();
        let token = execute(&mut loaded, &fetcher, &cache, &HashSet::new()).await.unwrap();
        assert_eq!(secrecy::ExposeSecret::expose_secret(&token.access_token), "at");

        let body = fetcher.requests()[1].body.clone().unwrap();
        assert!(body.contains("grant_type=client_credentials"));
    }
}
