//! TokenCache
//!
//! Per-account cached-access-token freshness policy and refresh
//! coalescing (§4.6). A cache hit requires the stored token's scope and
//! audience sets to cover what was requested and at least `min_valid`
//! (default 60s) of remaining life; anything else triggers `refresh`.
//!
//! Coalescing is structural rather than an explicit broadcast channel:
//! callers reach a `LoadedAccount` through the single
//! `tokio::sync::Mutex` the `store` module guards it with, so concurrent
//! `access_token` requests for the same account are already serialized by
//! the time they reach `get_or_refresh` — the second waiter re-checks the
//! cache after acquiring the lock and sees the first waiter's result
//! instead of issuing its own upstream call.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use secrecy::SecretString;

use crate::account::LoadedAccount;
use crate::error::AgentResult;

/// Default minimum remaining lifetime for a cached token to be served
/// without a refresh (§4.6, §8 property 7).
pub const DEFAULT_MIN_VALID: Duration = Duration::from_secs(60);

pub struct TokenCache;

impl TokenCache {
    /// Returns a cached access token if one satisfies `scope`/`audience`
    /// with at least `min_valid` remaining life; otherwise awaits
    /// `refresh` (handed the same `loaded` account, once the freshness
    /// check's borrow has ended) and caches its result before returning it.
    pub async fn get_or_refresh<F, Fut>(
        loaded: &mut LoadedAccount,
        scope: &HashSet<String>,
        audience: &HashSet<String>,
        min_valid: Duration,
        refresh: F,
    ) -> AgentResult<SecretString>
    where
        F: FnOnce(&mut LoadedAccount) -> Fut,
        Fut: Future<Output = AgentResult<crate::account::CachedToken>>,
    {
        if let Some(cached) = Self::fresh_hit(loaded, scope, audience, min_valid) {
            return Ok(cached);
        }
        let fresh = refresh(loaded).await?;
        let access_token = fresh.access_token.clone();
        loaded.token_cache = Some(fresh);
        Ok(access_token)
    }

    fn fresh_hit(
        loaded: &LoadedAccount,
        scope: &HashSet<String>,
        audience: &HashSet<String>,
        min_valid: Duration,
    ) -> Option<SecretString> {
        let cached = loaded.token_cache.as_ref()?;
        if cached.satisfies(scope, audience, min_valid) {
            Some(cached.access_token.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, CachedToken};
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn fresh_account() -> LoadedAccount {
        LoadedAccount::new(Account::new("a", "https://idp.example", "client"), None, false)
    }

    #[tokio::test]
    async fn cache_hit_skips_refresh() {
        let mut loaded = fresh_account();
        loaded.token_cache = Some(CachedToken {
            access_token: SecretString::new("cached".into()),
            expires_at: Instant::now() + Duration::from_secs(3600),
            scope: HashSet::new(),
            audience: HashSet::new(),
        });

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let token = TokenCache::get_or_refresh(&mut loaded, &HashSet::new(), &HashSet::new(), DEFAULT_MIN_VALID, |_loaded| async move {
            calls2.fetch_add(1, Ordering::SeqCst);
            unreachable!("refresh must not be called on a cache hit")
        })
        .await
        .unwrap();

        assert_eq!(token.expose_secret(), "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn near_expiry_token_triggers_refresh() {
        let mut loaded = fresh_account();
        loaded.token_cache = Some(CachedToken {
            access_token: SecretString::new("stale".into()),
            expires_at: Instant::now() + Duration::from_secs(30),
            scope: HashSet::new(),
            audience: HashSet::new(),
        });

        let token = TokenCache::get_or_refresh(&mut loaded, &HashSet::new(), &HashSet::new(), DEFAULT_MIN_VALID, |_loaded| async {
            Ok(CachedToken {
                access_token: SecretString::new("fresh".into()),
                expires_at: Instant::now() + Duration::from_secs(3600),
                scope: HashSet::new(),
                audience: HashSet::new(),
            })
        })
        .await
        .unwrap();

        assert_eq!(token.expose_secret(), "fresh");
    }

    #[tokio::test]
    async fn scope_superset_miss_triggers_refresh() {
        let mut loaded = fresh_account();
        loaded.token_cache = Some(CachedToken {
            access_token: SecretString::new("narrow".into()),
            expires_at: Instant::now() + Duration::from_secs(3600),
            scope: ["openid".to_string()].into_iter().collect(),
            audience: HashSet::new(),
        });

        let requested: HashSet<String> = ["openid".to_string(), "email".to_string()].into_iter().collect();
        let token = TokenCache::get_or_refresh(&mut loaded, &requested, &HashSet::new(), DEFAULT_MIN_VALID, |_loaded| async {
            Ok(CachedToken {
                access_token: SecretString::new("wider".into()),
                expires_at: Instant::now() + Duration::from_secs(3600),
                scope: ["openid".to_string(), "email".to_string()].into_iter().collect(),
                audience: HashSet::new(),
            })
        })
        .await
        .unwrap();

        assert_eq!(token.expose_secret(), "wider");
    }
}
