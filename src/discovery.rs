//! OIDC discovery document cache.
//!
//! `OIDCFlows`'s common preamble (§4.5): ensure the issuer discovery
//! document is cached, fetching `<issuer>/.well-known/openid-configuration`
//! on a miss. Grounded on `core/discovery.rs`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};
use crate::transport::{HttpFetcher, HttpMethod, HttpRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_authorization_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

struct CacheEntry {
    document: DiscoveryDocument,
    expires_at: Instant,
}

/// Caches discovery documents per normalized issuer for an hour.
pub struct DiscoveryCache {
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(3600))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn normalize(issuer: &str) -> String {
        issuer.trim_end_matches('/').to_string()
    }

    /// Returns the cached document, fetching and caching it first on a
    /// miss or expiry.
    pub async fn ensure_cached(
        &self,
        fetcher: &dyn HttpFetcher,
        issuer: &str,
    ) -> AgentResult<DiscoveryDocument> {
        let key = Self::normalize(issuer);
        if let Some(doc) = self.get(&key) {
            return Ok(doc);
        }

        let url = format!("{key}/.well-known/openid-configuration");
        let response = fetcher
            .send(HttpRequest {
                method: HttpMethod::Get,
                url,
                headers: [("accept".to_string(), "application/json".to_string())]
                    .into_iter()
                    .collect(),
                body: None,
                timeout: None,
            })
            .await?;

        if response.status != 200 {
            return Err(AgentError::UpstreamError {
                status: Some(response.status),
                body: "discovery request failed".into(),
            });
        }

        let document: DiscoveryDocument = serde_json::from_str(&response.body)
            .map_err(|e| AgentError::FormatInvalid(format!("invalid discovery document: {e}")))?;

        self.set(&key, document.clone());
        Ok(document)
    }

    fn get(&self, key: &str) -> Option<DiscoveryDocument> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(entry) = cache.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.document.clone());
            }
            cache.remove(key);
        }
        None
    }

    fn set(&self, key: &str, document: DiscoveryDocument) {
        self.cache.lock().unwrap().insert(
            key.to_string(),
            CacheEntry {
                document,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockHttpFetcher;

    fn sample_document(issuer: &str) -> DiscoveryDocument {
        DiscoveryDocument {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            device_authorization_endpoint: Some(format!("{issuer}/device")),
            revocation_endpoint: None,
            introspection_endpoint: None,
            jwks_uri: Some(format!("{issuer}/jwks")),
            scopes_supported: vec!["openid".into()],
        }
    }

    #[tokio::test]
    async fn fetches_once_and_caches_on_second_call() {
        let fetcher = MockHttpFetcher::new();
        let issuer = "https://idp.example";
        fetcher.queue_json(200, &sample_document(issuer));

        let cache = DiscoveryCache::new();
        let first = cache.ensure_cached(&fetcher, issuer).await.unwrap();
        let second = cache.ensure_cached(&fetcher, issuer).await.unwrap();

        assert_eq!(first.token_endpoint, second.token_endpoint);
        assert_eq!(fetcher.request_count(), 1);
    }
}
