//! JwkKeyring
//!
//! RSA JWK generation, import, export, and JWS signing for
//! `private_key_jwt` client authentication (§4.4). Grounded on
//! `original_source/oidc-agent/oidcd/jose/oidc_jwk.c`.

use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, AgentResult};

pub const RSA_KEY_BITS: usize = 2048;
pub const RSA_PUBLIC_EXPONENT: u64 = 65537;

/// An in-memory RSA JWK. Private parameters are present only for
/// account-owned signing keys; keys imported from a remote JWKS never
/// carry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    pub alg: String,
    pub n: String,
    pub e: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl Jwk {
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }
}

fn b64url(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Thumbprint per RFC 7638, used as `kid`.
fn thumbprint(n: &str, e: &str) -> String {
    let canonical = format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#);
    use sha2::{Digest, Sha256};
    b64url(&Sha256::digest(canonical.as_bytes()))
}

pub struct JwkKeyring;

impl JwkKeyring {
    /// Generate a fresh RSA signing key: default modulus 2048 bits, public
    /// exponent 65537 (matches the original `createRSAKey`).
    pub fn generate_signing_key() -> AgentResult<Jwk> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| AgentError::Internal(format!("rsa keygen failed: {e}")))?;
        let public_key = private_key.to_public_key();

        let n = b64url(&public_key.n().to_bytes_be());
        let e = b64url(&public_key.e().to_bytes_be());
        let d = b64url(&private_key.d().to_bytes_be());
        let primes = private_key.primes();
        let p = primes.first().map(|p| b64url(&p.to_bytes_be()));
        let q = primes.get(1).map(|q| b64url(&q.to_bytes_be()));

        let kid = thumbprint(&n, &e);

        Ok(Jwk {
            kty: "RSA".into(),
            kid,
            use_: None,
            alg: "RS256".into(),
            n,
            e,
            d: Some(d),
            p,
            q,
        })
    }

    /// Export `key` as a JSON JWK, adding a `use` member (`"sig"` or
    /// `"enc"`); strips private parameters unless `include_private`.
    pub fn export_jwk(key: &Jwk, include_private: bool, use_: &str) -> Value {
        let mut exported = key.clone();
        exported.use_ = Some(use_.to_string());
        if !include_private {
            exported.d = None;
            exported.p = None;
            exported.q = None;
        }
        serde_json::to_value(exported).expect("Jwk always serializes")
    }

    pub fn export_jwk_sig(key: &Jwk, include_private: bool) -> Value {
        Self::export_jwk(key, include_private, "sig")
    }

    pub fn export_jwk_enc(key: &Jwk, include_private: bool) -> Value {
        Self::export_jwk(key, include_private, "enc")
    }

    pub fn import_jwk(json_text: &str) -> AgentResult<Jwk> {
        serde_json::from_str(json_text).map_err(|e| AgentError::JwkParse(e.to_string()))
    }

    /// Select the sole key from a JWKS document, or disambiguate a
    /// multi-key set by matching `kid`, then `use`, then `alg` against
    /// the hints supplied by the caller (typically the JWS header we are
    /// about to produce or verify). Per §9(a) this replaces the original
    /// `OIDC_NOTIMPL` placeholder for the multi-key case.
    pub fn select_key<'a>(
        keys: &'a [Jwk],
        want_kid: Option<&str>,
        want_use: Option<&str>,
        want_alg: Option<&str>,
    ) -> AgentResult<&'a Jwk> {
        if keys.is_empty() {
            return Err(AgentError::JwkParse("JWKS contains no keys".into()));
        }
        if keys.len() == 1 {
            return Ok(&keys[0]);
        }
        if let Some(kid) = want_kid {
            let matches: Vec<&Jwk> = keys.iter().filter(|k| k.kid == kid).collect();
            if matches.len() == 1 {
                return Ok(matches[0]);
            }
        }
        let mut candidates: Vec<&Jwk> = keys.iter().collect();
        if let Some(use_) = want_use {
            let narrowed: Vec<&Jwk> = candidates
                .iter()
                .copied()
                .filter(|k| k.use_.as_deref() == Some(use_))
                .collect();
            if !narrowed.is_empty() {
                candidates = narrowed;
            }
        }
        if let Some(alg) = want_alg {
            let narrowed: Vec<&Jwk> = candidates.iter().copied().filter(|k| k.alg == alg).collect();
            if !narrowed.is_empty() {
                candidates = narrowed;
            }
        }
        match candidates.len() {
            1 => Ok(candidates[0]),
            _ => Err(AgentError::JwksAmbiguous),
        }
    }

    /// Parse a fetched JWKS document's `keys` array and apply
    /// `select_key`. The HTTP fetch itself belongs to `transport`/`flows`;
    /// this function only does the parsing/disambiguation half of
    /// `import_jwk_from_uri`.
    pub fn select_from_jwks_document(
        document: &Value,
        want_kid: Option<&str>,
        want_use: Option<&str>,
        want_alg: Option<&str>,
    ) -> AgentResult<Jwk> {
        let keys_value = document
            .get("keys")
            .ok_or_else(|| AgentError::JwkParse("JWKS document missing 'keys'".into()))?;
        let keys: Vec<Jwk> =
            serde_json::from_value(keys_value.clone()).map_err(|e| AgentError::JwkParse(e.to_string()))?;
        Self::select_key(&keys, want_kid, want_use, want_alg).cloned()
    }

    /// Build a signed JWS compact serialization for `private_key_jwt`
    /// client authentication (§4.4). `claims` must already carry
    /// `iss`/`sub`/`aud`/`jti`/`iat`/`exp`; this function only attaches
    /// the header (`alg`, `kid`) and signs.
    pub fn sign_jwt(key: &Jwk, claims: &Value) -> AgentResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());

        let pem = Self::to_pkcs1_pem(key)?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AgentError::Internal(format!("bad signing key: {e}")))?;

        jsonwebtoken::encode(&header, claims, &encoding_key)
            .map_err(|e| AgentError::Internal(format!("jwt signing failed: {e}")))
    }

    fn to_pkcs1_pem(key: &Jwk) -> AgentResult<String> {
        let d = key
            .d
            .as_ref()
            .ok_or_else(|| AgentError::JwkParse("key has no private parameters".into()))?;
        let n = rsa::BigUint::from_bytes_be(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(&key.n)
                .map_err(|_| AgentError::JwkParse("invalid n".into()))?,
        );
        let e = rsa::BigUint::from_bytes_be(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(&key.e)
                .map_err(|_| AgentError::JwkParse("invalid e".into()))?,
        );
        let d = rsa::BigUint::from_bytes_be(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(d)
                .map_err(|_| AgentError::JwkParse("invalid d".into()))?,
        );
        let (p, q) = match (&key.p, &key.q) {
            (Some(p), Some(q)) => (
                rsa::BigUint::from_bytes_be(
                    &base64::engine::general_purpose::URL_SAFE_NO_PAD
                        .decode(p)
                        .map_err(|_| AgentError::JwkParse("invalid p".into()))?,
                ),
                rsa::BigUint::from_bytes_be(
                    &base64::engine::general_purpose::URL_SAFE_NO_PAD
                        .decode(q)
                        .map_err(|_| AgentError::JwkParse("invalid q".into()))?,
                ),
            ),
            _ => return Err(AgentError::JwkParse("key missing prime factors".into())),
        };
        let private_key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|err| AgentError::JwkParse(format!("invalid key components: {err}")))?;
        private_key
            .to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| AgentError::Internal(format!("pem encoding failed: {e}")))
    }
}

/// Build the `private_key_jwt` assertion claims for `client_id` against
/// `token_endpoint` (§4.4: `iss=sub=client_id`, `aud=token_endpoint`,
/// random `jti`, `exp = iat + 300`).
pub fn client_assertion_claims(client_id: &str, token_endpoint: &str, jti: &str, iat: i64) -> Value {
    serde_json::json!({
        "iss": client_id,
        "sub": client_id,
        "aud": token_endpoint,
        "jti": jti,
        "iat": iat,
        "exp": iat + 300,
    })
}
