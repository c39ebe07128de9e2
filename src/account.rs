//! AccountModel
//!
//! The JSON-serializable account document (§4.3) and its runtime wrapper,
//! `LoadedAccount` (data model §3).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoCodec, KdfParams, SensitiveBuffer};
use crate::error::{AgentError, AgentResult};
use crate::jwk::Jwk;

/// `scope` is a space-separated list on the wire (§4.3) but a `Vec<String>`
/// in memory everywhere else in the crate; this adapter is the only place
/// that joins/splits it.
mod space_separated_scope {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(scope: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&scope.join(" "))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let joined = String::deserialize(deserializer)?;
        Ok(joined.split_whitespace().map(str::to_string).collect())
    }
}

/// Device-authorization state cached between `device_init` and a
/// successful poll, so a crashed/restarted agent does not need to restart
/// the whole flow. Optional on `Account` per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub interval_secs: u64,
}

/// A named account configuration, as persisted on disk (§4.3). `Default`
/// is intentionally not derived: `name` and `issuer_url` must always be
/// supplied explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub issuer_url: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<SecretString>,
    /// Space-separated in the wire document (§4.3); kept as a `Vec<String>`
    /// in memory with duplicates rejected at construction.
    #[serde(with = "space_separated_scope")]
    pub scope: Vec<String>,
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_authorization_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daesetbyuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_access_token: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_device_authorization: Option<CachedDeviceAuthorization>,
    /// Cached `.well-known/openid-configuration` document, as raw JSON —
    /// OIDCFlows owns parsing it into endpoint fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_document: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<serde_json::Value>,
}

impl Account {
    pub fn new(name: impl Into<String>, issuer_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            issuer_url: issuer_url.into(),
            client_id: client_id.into(),
            client_secret: None,
            refresh_token: None,
            scope: Vec::new(),
            redirect_uris: Vec::new(),
            device_authorization_endpoint: None,
            cert_path: None,
            daesetbyuser: None,
            signing_jwk: None,
            registration_access_token: None,
            registration_endpoint: None,
            cached_device_authorization: None,
            discovery_document: None,
            jwks: None,
        }
    }

    /// Validates the invariants in §4.3 / §3: non-empty name and issuer,
    /// no duplicate scopes, a confidential client needs a secret or a
    /// signing JWK, and (if redirect URIs are present at all) at least one
    /// must be a loopback form for the authorization-code flow to ever be
    /// usable.
    pub fn validate(&self) -> AgentResult<()> {
        if self.name.is_empty() {
            return Err(AgentError::ArgInvalid("account name must not be empty".into()));
        }
        if self.issuer_url.is_empty() {
            return Err(AgentError::ArgInvalid("issuer_url must not be empty".into()));
        }
        let unique: HashSet<&String> = self.scope.iter().collect();
        if unique.len() != self.scope.len() {
            return Err(AgentError::ArgInvalid("scope must not contain duplicates".into()));
        }
        if !self.redirect_uris.is_empty()
            && !self.redirect_uris.iter().any(|uri| is_loopback_redirect(uri))
        {
            return Err(AgentError::ArgInvalid(
                "at least one redirect_uri must be a localhost loopback form".into(),
            ));
        }
        Ok(())
    }

    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some() || self.signing_jwk.is_some()
    }

    pub fn scope_string(&self) -> String {
        self.scope.join(" ")
    }
}

fn is_loopback_redirect(uri: &str) -> bool {
    uri.contains("://127.0.0.1")
        || uri.contains("://localhost")
        || uri.contains("://[::1]")
}

/// An access token cached for a loaded account (§4.6's TokenCache entry,
/// stored inline on the owning `LoadedAccount` per §3's ownership rule).
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: SecretString,
    pub expires_at: Instant,
    pub scope: HashSet<String>,
    pub audience: HashSet<String>,
}

impl CachedToken {
    /// True if this token covers the requested scope/audience supersets
    /// and still has at least `min_valid` of life left (§4.6, default 60s).
    pub fn satisfies(&self, scope: &HashSet<String>, audience: &HashSet<String>, min_valid: Duration) -> bool {
        scope.is_subset(&self.scope)
            && audience.is_subset(&self.audience)
            && self.expires_at.saturating_duration_since(Instant::now()) >= min_valid
    }
}

/// The subset of `Account` fields that are secret. Sealed as one blob when
/// the store locks (§4.7) so only this much needs re-deriving a key for.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretFields {
    client_secret: Option<SecretString>,
    refresh_token: Option<SecretString>,
    signing_jwk: Option<Jwk>,
    registration_access_token: Option<SecretString>,
}

/// Ciphertext of a `LoadedAccount`'s `SecretFields`, produced by `seal`
/// with the store's lock password (§4.7). Same shape as the parameters
/// `CryptoCodec::encrypt` returns; kept separate from `config_format`
/// because this never touches disk.
struct SealedSecrets {
    salt: Vec<u8>,
    nonce: Vec<u8>,
    params: KdfParams,
    ciphertext: Vec<u8>,
}

/// An `Account` plus its runtime state (§3's `LoadedAccount`).
pub struct LoadedAccount {
    pub account: Account,
    pub loaded_at: Instant,
    pub expires_at: Option<Instant>,
    pub confirm: bool,
    pub token_cache: Option<CachedToken>,
    sealed: Option<SealedSecrets>,
}

impl LoadedAccount {
    pub fn new(account: Account, lifetime: Option<Duration>, confirm: bool) -> Self {
        let loaded_at = Instant::now();
        Self {
            account,
            loaded_at,
            expires_at: lifetime.map(|d| loaded_at + d),
            confirm,
            token_cache: None,
            sealed: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    /// Overwrite every secret this account holds so a removed/expired
    /// account never leaves readable key material behind in memory.
    pub fn wipe(&mut self) {
        self.account.client_secret = None;
        self.account.refresh_token = None;
        self.account.signing_jwk = None;
        self.account.registration_access_token = None;
        self.token_cache = None;
        self.sealed = None;
    }

    /// Re-encrypt this account's secret fields under the store's lock
    /// password and clear their cleartext, per §4.7's `lock` behavior.
    pub fn seal(&mut self, lock_password: &SensitiveBuffer) -> AgentResult<()> {
        let secrets = SecretFields {
            client_secret: self.account.client_secret.clone(),
            refresh_token: self.account.refresh_token.clone(),
            signing_jwk: self.account.signing_jwk.clone(),
            registration_access_token: self.account.registration_access_token.clone(),
        };
        let plaintext = serde_json::to_vec(&secrets)?;
        let (salt, nonce, params, ciphertext) = CryptoCodec::encrypt(&plaintext, lock_password)?;
        self.sealed = Some(SealedSecrets { salt, nonce, params, ciphertext });
        self.account.client_secret = None;
        self.account.refresh_token = None;
        self.account.signing_jwk = None;
        self.account.registration_access_token = None;
        self.token_cache = None;
        Ok(())
    }

    /// Inverse of `seal`: decrypts the sealed secrets back into the
    /// cleartext fields. A no-op if the account was never sealed.
    pub fn unseal(&mut self, lock_password: &SensitiveBuffer) -> AgentResult<()> {
        let Some(sealed) = self.sealed.take() else {
            return Ok(());
        };
        let plaintext = match CryptoCodec::decrypt(
            &sealed.salt,
            &sealed.nonce,
            sealed.params,
            &sealed.ciphertext,
            lock_password,
        ) {
            Ok(pt) => pt,
            Err(e) => {
                self.sealed = Some(sealed);
                return Err(e);
            }
        };
        let secrets: SecretFields = serde_json::from_slice(&plaintext)?;
        self.account.client_secret = secrets.client_secret;
        self.account.refresh_token = secrets.refresh_token;
        self.account.signing_jwk = secrets.signing_jwk;
        self.account.registration_access_token = secrets.registration_access_token;
        Ok(())
    }
}

impl Drop for LoadedAccount {
    fn drop(&mut self) {
        self.wipe();
    }
}
