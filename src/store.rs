//! AccountStore
//!
//! The set of loaded accounts (§3, §4.7): add/remove/list, lock/unlock,
//! and the lifetime sweeper. Each account lives behind its own
//! `tokio::sync::Mutex` — that lock is what gives §4.6's refresh
//! coalescing and §5's "at most one outstanding upstream call per
//! account, independent accounts proceed in parallel" for free, without a
//! store-wide lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::account::{Account, LoadedAccount};
use crate::crypto::{hash_password, verify_password, SensitiveBuffer};
use crate::error::{AgentError, AgentResult};

/// Consecutive wrong-password unlock attempts before the 5s throttle
/// kicks in (§4.7).
const UNLOCK_FAILURE_THROTTLE_THRESHOLD: u32 = 3;
const UNLOCK_FAILURE_THROTTLE_DELAY: Duration = Duration::from_secs(5);

pub struct AccountStore {
    accounts: HashMap<String, Arc<Mutex<LoadedAccount>>>,
    /// Insertion order, for `list()` (§3: "insertion order irrelevant for
    /// lookup but preserved for listing").
    order: Vec<String>,
    locked: bool,
    lock_password_hash: Option<String>,
    failed_unlock_attempts: u32,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            order: Vec::new(),
            locked: false,
            lock_password_hash: None,
            failed_unlock_attempts: 0,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Adds `account` under its own name, replacing any existing account
    /// of the same name. Fails with `store_locked` while locked (§4.7).
    pub fn add(&mut self, account: Account, lifetime: Option<Duration>, confirm: bool) -> AgentResult<()> {
        if self.locked {
            return Err(AgentError::StoreLocked);
        }
        account.validate()?;
        let name = account.name.clone();
        if !self.accounts.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.accounts
            .insert(name, Arc::new(Mutex::new(LoadedAccount::new(account, lifetime, confirm))));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> AgentResult<()> {
        if self.accounts.remove(name).is_none() {
            return Err(AgentError::AccountNotFound { name: name.to_string() });
        }
        self.order.retain(|n| n != name);
        Ok(())
    }

    /// Drops every loaded account. Each `LoadedAccount`'s `Drop` impl
    /// wipes its secrets (§3, scenario S2).
    pub fn remove_all(&mut self) {
        self.accounts.clear();
        self.order.clear();
    }

    /// Names of every currently-loaded account, in insertion order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Returns a handle to the named account's lock. Callers `.lock().await`
    /// it to read or mutate the account; holding that lock for the
    /// duration of a token request is what serializes upstream calls per
    /// account (§4.6, §5).
    pub fn get(&self, name: &str) -> AgentResult<Arc<Mutex<LoadedAccount>>> {
        if self.locked {
            return Err(AgentError::StoreLocked);
        }
        self.accounts
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::AccountNotFound { name: name.to_string() })
    }

    /// Removes every account whose `lifetime` has elapsed, returning
    /// their names (§4.7, §8 property 5). Intended to be called
    /// periodically by `AgentLoop`'s sweeper timer.
    pub async fn sweep_expired(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for name in self.order.clone() {
            if let Some(handle) = self.accounts.get(&name) {
                if handle.lock().await.is_expired() {
                    expired.push(name);
                }
            }
        }
        for name in &expired {
            self.accounts.remove(name);
            self.order.retain(|n| n != name);
        }
        expired
    }

    /// Hashes `password`, re-encrypts every account's secrets under it,
    /// and marks the store locked (§4.7). While locked, `get`/`add` fail
    /// with `store_locked`.
    pub async fn lock(&mut self, password: &SensitiveBuffer) -> AgentResult<()> {
        if self.locked {
            return Ok(());
        }
        let hash = hash_password(password)?;
        for name in self.order.clone() {
            if let Some(handle) = self.accounts.get(&name) {
                handle.lock().await.seal(password)?;
            }
        }
        self.lock_password_hash = Some(hash);
        self.locked = true;
        Ok(())
    }

    /// Verifies `password` against the stored hash and, on success,
    /// decrypts every account's secrets back in place. After 3
    /// consecutive wrong-password attempts, imposes a 5s delay before
    /// returning `password_wrong` (§4.7).
    pub async fn unlock(&mut self, password: &SensitiveBuffer) -> AgentResult<()> {
        let Some(hash) = self.lock_password_hash.clone() else {
            // Never locked: unlocking is a harmless no-op.
            self.locked = false;
            return Ok(());
        };
        if !verify_password(password, &hash) {
            self.failed_unlock_attempts += 1;
            if self.failed_unlock_attempts >= UNLOCK_FAILURE_THROTTLE_THRESHOLD {
                tokio::time::sleep(UNLOCK_FAILURE_THROTTLE_DELAY).await;
            }
            return Err(AgentError::PasswordWrong);
        }
        for name in self.order.clone() {
            if let Some(handle) = self.accounts.get(&name) {
                handle.lock().await.unseal(password)?;
            }
        }
        self.failed_unlock_attempts = 0;
        self.locked = false;
        Ok(())
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn account(name: &str) -> Account {
        Account::new(name, "https://idp.example", "client")
    }

    #[tokio::test]
    async fn list_reflects_add_remove_and_remove_all() {
        let mut store = AccountStore::new();
        store.add(account("a"), None, false).unwrap();
        store.add(account("b"), None, false).unwrap();
        store.add(account("c"), None, false).unwrap();
        assert_eq!(store.list(), vec!["a", "b", "c"]);

        store.remove("b").unwrap();
        assert_eq!(store.list(), vec!["a", "c"]);

        store.remove_all();
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_account_fails_not_found() {
        let mut store = AccountStore::new();
        let err = store.remove("ghost").unwrap_err();
        assert_eq!(err.kind(), "account_not_found");
    }

    #[tokio::test]
    async fn s4_lifetime_expiry_removes_account() {
        let mut store = AccountStore::new();
        store.add(account("a"), Some(Duration::from_millis(10)), false).unwrap();
        assert!(store.get("a").is_ok());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let expired = store.sweep_expired().await;
        assert_eq!(expired, vec!["a".to_string()]);
        assert_eq!(store.get("a").unwrap_err().kind(), "account_not_found");
    }

    #[tokio::test]
    async fn s3_lock_then_wrong_then_right_password() {
        let mut store = AccountStore::new();
        store.add(account("a"), None, false).unwrap();

        let password = SensitiveBuffer::from_str("correct");
        store.lock(&password).await.unwrap();
        assert_eq!(store.get("a").unwrap_err().kind(), "store_locked");

        let wrong = SensitiveBuffer::from_str("incorrect");
        assert_eq!(store.unlock(&wrong).await.unwrap_err().kind(), "password_wrong");

        store.unlock(&password).await.unwrap();
        assert!(store.get("a").is_ok());
    }

    #[tokio::test]
    async fn lock_seals_refresh_tokens_and_unlock_restores_them() {
        let mut store = AccountStore::new();
        let mut acc = account("a");
        acc.refresh_token = Some(SecretString::new("rt0".into()));
        store.add(acc, None, false).unwrap();

        let password = SensitiveBuffer::from_str("lockpw");
        store.lock(&password).await.unwrap();
        store.unlock(&password).await.unwrap();

        let handle = store.get("a").unwrap();
        let loaded = handle.lock().await;
        assert_eq!(
            secrecy::ExposeSecret::expose_secret(loaded.account.refresh_token.as_ref().unwrap()),
            "rt0"
        );
    }

    #[tokio::test]
    async fn add_fails_while_locked() {
        let mut store = AccountStore::new();
        store.lock(&SensitiveBuffer::from_str("pw")).await.unwrap();
        let err = store.add(account("a"), None, false).unwrap_err();
        assert_eq!(err.kind(), "store_locked");
    }
}
