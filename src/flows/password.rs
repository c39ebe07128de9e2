//! Resource-owner password-credentials flow
//!
//! A single-round POST (§4.5), classified the same way as the refresh
//! flow. The username and password are supplied fresh by the IPC caller
//! for every call and never stored on the `Account` (§1 non-goal: this
//! system does not store passwords).

use std::collections::HashSet;
use std::time::Duration;

use crate::account::{CachedToken, LoadedAccount};
use crate::crypto::SensitiveBuffer;
use crate::discovery::DiscoveryCache;
use crate::error::AgentResult;
use crate::flows::{
    apply_client_auth, apply_token_response, classify_token_error, encode_form, ensure_discovery,
    now_unix, TokenEndpointResponse,
};
use crate::transport::{HttpFetcher, HttpMethod, HttpRequest};

pub async fn execute(
    loaded: &mut LoadedAccount,
    username: &str,
    password: &SensitiveBuffer,
    fetcher: &dyn HttpFetcher,
    discovery: &DiscoveryCache,
    scope: &HashSet<String>,
) -> AgentResult<CachedToken> {
    let doc = ensure_discovery(&mut loaded.account, fetcher, discovery).await?;
    let jti = crate::crypto::CryptoCodec::random_alphanumeric_string(16);
    let iat = now_unix();
    let (mut extra_fields, extra_headers) =
        apply_client_auth(&loaded.account, &doc.token_endpoint, &jti, iat)?;

    let password_str = std::str::from_utf8(password.as_bytes())
        .map_err(|_| crate::error::AgentError::ArgInvalid("password is not valid utf-8".into()))?;
    let mut fields = vec![
        ("grant_type".to_string(), "password".to_string()),
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password_str.to_string()),
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
        return Err(classify_token_error(response.status, &response.body));
    }
    let parsed: TokenEndpointResponse = serde_json::from_str(&response.body)
        .map_err(|e| crate::error::AgentError::FormatInvalid(format!("invalid token response: {e}")))?;
    Ok(apply_token_response(loaded, &parsed, scope, &Default::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::transport::MockHttpFetcher;

    fn discovery_doc(issuer: &str) -> serde_json::Value {
        serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
        })
    }

    #[tokio::test]
    async fn success_posts_password_grant_without_persisting_credentials() {
        let fetcher = MockHttpFetcher::new();
        fetcher.queue_json(200, &discovery_doc("https://idp.example"));
        fetcher.queue_json(200, &serde_json::json!({"access_token": "at", "expires_in": 600}));

        let mut loaded = LoadedAccount::new(Account::new("a", "https://idp.example", "client"), None, false);
        let cache = DiscoveryCache::new();
        let password = SensitiveBuffer::from_str("hunter2");
        let token = execute(&mut loaded, "alice", &password, &fetcher, &cache, &HashSet::new())
            .await
            .unwrap();

        assert_eq!(secrecy::ExposeSecret::expose_secret(&token.access_token), "at");
        assert!(loaded.account.redirect_uris.is_empty());

        let body = fetcher.requests()[1].body.clone().unwrap();
        assert!(body.contains("grant_type=password"));
        assert!(body.contains("username=alice"));
    }
}
