//! CryptoCodec
//!
//! Authenticated symmetric encryption, password-based key derivation, and
//! zeroizing buffers for secret material. Used by `config_format` to seal
//! and open account documents, and by `store` to protect in-memory secrets
//! while the store is locked.

use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::Engine;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AgentError, AgentResult};

pub const NONCE_LEN: usize = 24;
pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// A secret byte buffer that is wiped on drop. Holds passwords, derived
/// keys, refresh tokens, and JWK private parameters — anything that must
/// never end up in a log line or an error message.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBuffer(Vec<u8>);

impl SensitiveBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// No `Debug`/`Display` on purpose: a `SensitiveBuffer` must never be
/// formattable by accident.
impl std::fmt::Debug for SensitiveBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SensitiveBuffer(<redacted>)")
    }
}

/// Key-derivation parameters recorded alongside the ciphertext so a
/// different process can reproduce the same key from the same password.
#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost_kib: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// `random_bytes(n)`, `random_alphanumeric_string(n)`, and the
/// encrypt/decrypt pair from §4.1.
pub struct CryptoCodec;

impl CryptoCodec {
    pub fn random_bytes(n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        rand::thread_rng().fill_bytes(&mut buf);
        buf
    }

    /// Random string whose first character is alphanumeric, preserved for
    /// compatibility with legacy clients that use the result as an
    /// identifier prefix (original `randomString` in cryptUtils.c). Never
    /// use this for key material, nonces, or salts — those always come
    /// from `random_bytes`.
    pub fn random_alphanumeric_string(n: usize) -> String {
        loop {
            let raw = Self::random_bytes(n);
            let mut encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&raw);
            encoded.truncate(n);
            if encoded.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
                return encoded;
            }
            // Shift left one position and retry, matching the original's
            // oidc_memshiftr-driven retry loop rather than rejecting the
            // whole string outright.
            for _ in 0..n {
                if encoded.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
                    return encoded;
                }
                encoded.remove(0);
                if encoded.len() < n {
                    break;
                }
            }
        }
    }

    fn derive_key(password: &[u8], salt: &[u8], params: KdfParams) -> AgentResult<[u8; KEY_LEN]> {
        let argon2_params = argon2::Params::new(params.m_cost_kib, params.t_cost, params.p_cost, Some(KEY_LEN))
            .map_err(|e| AgentError::FormatInvalid(format!("bad kdf params: {e}")))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon2_params);
        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(password, salt, &mut key)
            .map_err(|e| AgentError::Internal(format!("kdf failure: {e}")))?;
        Ok(key)
    }

    /// Encrypt `plaintext` under a key derived from `password`. Returns
    /// `(salt, nonce, kdf_params, ciphertext_with_tag)` — the caller (the
    /// `config_format` module) is responsible for the on-disk envelope
    /// layout.
    pub fn encrypt(
        plaintext: &[u8],
        password: &SensitiveBuffer,
    ) -> AgentResult<(Vec<u8>, Vec<u8>, KdfParams, Vec<u8>)> {
        let salt = Self::random_bytes(SALT_LEN);
        let nonce_bytes = Self::random_bytes(NONCE_LEN);
        let params = KdfParams::default();
        let key = Self::derive_key(password.as_bytes(), &salt, params)?;

        let cipher = XSalsa20Poly1305::new_from_slice(&key)
            .map_err(|e| AgentError::Internal(format!("bad key length: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AgentError::Internal(format!("encryption failure: {e}")))?;

        Ok((salt, nonce_bytes, params, ciphertext))
    }

    /// Decrypt a ciphertext produced by `encrypt`. Fails with
    /// `mac_mismatch` if the password is wrong or the data was tampered
    /// with.
    pub fn decrypt(
        salt: &[u8],
        nonce_bytes: &[u8],
        params: KdfParams,
        ciphertext: &[u8],
        password: &SensitiveBuffer,
    ) -> AgentResult<Vec<u8>> {
        if nonce_bytes.len() != NONCE_LEN {
            return Err(AgentError::FormatInvalid("wrong nonce length".into()));
        }
        let key = Self::derive_key(password.as_bytes(), salt, params)?;
        let cipher = XSalsa20Poly1305::new_from_slice(&key)
            .map_err(|e| AgentError::Internal(format!("bad key length: {e}")))?;
        let nonce = Nonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AgentError::MacMismatch)
    }
}

/// Zeroizing allocator marker type. All password material and derived keys
/// pass through `SensitiveBuffer`, which is the only scoped buffer type
/// this crate uses for secrets; `SecureAllocator` exists as the seam that
/// would back a custom allocator if one were ever needed, mirroring §4.1's
/// separation between "the allocator" and "the buffer type".
pub struct SecureAllocator;

impl SecureAllocator {
    pub fn alloc(bytes: Vec<u8>) -> SensitiveBuffer {
        SensitiveBuffer::new(bytes)
    }
}

/// A hash of a lock/unlock password, used by `store::AccountStore::lock`.
/// Not reversible; verified with `verify_password`.
pub fn hash_password(password: &SensitiveBuffer) -> AgentResult<String> {
    use argon2::password_hash::PasswordHasher;
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AgentError::Internal(format!("hash failure: {e}")))
}

pub fn verify_password(password: &SensitiveBuffer, hash: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
