//! ConfigFormat
//!
//! On-disk envelope: Modern (base64 payload + version line) and Legacy
//! (colon-delimited hex, read-only). Grounded on the original
//! `decryptFileContent`/`decryptHexFileContent`/`encryptWithVersionLine`
//! in `cryptUtils.c`.

use base64::Engine;

use crate::crypto::{CryptoCodec, KdfParams, SensitiveBuffer};
use crate::error::{AgentError, AgentResult};

pub const PRODUCING_VERSION: &str = "4.2.0";
const MODERN_SINCE: &str = "2.1.0";
const VERSION_PREFIX: &str = "@oidc-agent ";

/// Compare two dotted-numeric version strings component-wise, treating a
/// missing component as zero and a missing version entirely as `0.0.0`.
fn version_at_least(version: &str, floor: &str) -> bool {
    fn parts(v: &str) -> Vec<u64> {
        v.split('.').map(|p| p.parse().unwrap_or(0)).collect()
    }
    let a = parts(version);
    let b = parts(floor);
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> AgentResult<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(AgentError::FormatInvalid("odd-length hex".into()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| AgentError::FormatInvalid("invalid hex digit".into()))
        })
        .collect()
}

/// Encode `salt || nonce || kdf_params || ciphertext_with_tag` as the
/// Modern format's base64url payload. `kdf_params` is serialized as three
/// little-endian u32s ahead of the ciphertext so a peer can reconstruct
/// the Argon2 parameters without guessing.
fn pack_modern_payload(salt: &[u8], nonce: &[u8], params: KdfParams, ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(salt.len() + nonce.len() + 12 + ciphertext.len());
    out.extend_from_slice(salt);
    out.extend_from_slice(nonce);
    out.extend_from_slice(&params.m_cost_kib.to_le_bytes());
    out.extend_from_slice(&params.t_cost.to_le_bytes());
    out.extend_from_slice(&params.p_cost.to_le_bytes());
    out.extend_from_slice(ciphertext);
    out
}

fn unpack_modern_payload(payload: &[u8]) -> AgentResult<(Vec<u8>, Vec<u8>, KdfParams, Vec<u8>)> {
    const SALT_LEN: usize = crate::crypto::SALT_LEN;
    const NONCE_LEN: usize = crate::crypto::NONCE_LEN;
    let header_len = SALT_LEN + NONCE_LEN + 12;
    if payload.len() < header_len {
        return Err(AgentError::FormatInvalid("envelope too short".into()));
    }
    let salt = payload[..SALT_LEN].to_vec();
    let nonce = payload[SALT_LEN..SALT_LEN + NONCE_LEN].to_vec();
    let params_bytes = &payload[SALT_LEN + NONCE_LEN..header_len];
    let params = KdfParams {
        m_cost_kib: u32::from_le_bytes(params_bytes[0..4].try_into().unwrap()),
        t_cost: u32::from_le_bytes(params_bytes[4..8].try_into().unwrap()),
        p_cost: u32::from_le_bytes(params_bytes[8..12].try_into().unwrap()),
    };
    let ciphertext = payload[header_len..].to_vec();
    Ok((salt, nonce, params, ciphertext))
}

/// Decrypt raw file `bytes` with `password`, returning the plaintext JSON
/// document. Dispatches to Modern or Legacy decoding per §4.2.
pub fn load(bytes: &[u8], password: &SensitiveBuffer) -> AgentResult<Vec<u8>> {
    let text = std::str::from_utf8(bytes).map_err(|_| AgentError::FormatInvalid("not utf-8".into()))?;
    let mut lines = text.lines();
    let first = lines.next().ok_or_else(|| AgentError::FormatInvalid("empty file".into()))?;
    let second = lines.next();

    if let Some(version_line) = second {
        if let Some(version) = version_line.strip_prefix(VERSION_PREFIX) {
            if version_at_least(version, MODERN_SINCE) {
                return load_modern(first, password);
            }
        }
    }
    load_legacy(first, password)
}

fn load_modern(payload_line: &str, password: &SensitiveBuffer) -> AgentResult<Vec<u8>> {
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_line)
        .map_err(|_| AgentError::FormatInvalid("invalid base64 envelope".into()))?;
    let (salt, nonce, params, ciphertext) = unpack_modern_payload(&payload)?;
    CryptoCodec::decrypt(&salt, &nonce, params, &ciphertext, password)
}

fn load_legacy(line: &str, password: &SensitiveBuffer) -> AgentResult<Vec<u8>> {
    let fields: Vec<&str> = line.splitn(4, ':').collect();
    let [cipher_len, salt_hex, nonce_hex, cipher_hex] = fields[..] else {
        return Err(AgentError::FormatInvalid("legacy format must have 4 fields".into()));
    };
    let cipher = decode_hex(cipher_hex)?;
    let declared_len: usize = cipher_len
        .parse()
        .map_err(|_| AgentError::FormatInvalid("bad legacy length prefix".into()))?;
    if declared_len != cipher.len() {
        return Err(AgentError::FormatInvalid("legacy length prefix mismatch".into()));
    }
    let salt = decode_hex(salt_hex)?;
    let nonce = decode_hex(nonce_hex)?;
    // Legacy files predate recorded KDF parameters; they were always
    // produced with the implicit defaults.
    CryptoCodec::decrypt(&salt, &nonce, KdfParams::default(), &cipher, password)
}

/// Encrypt `plaintext` and emit it in Modern format — re-saves are always
/// Modern, never Legacy (§4.2).
pub fn save(plaintext: &[u8], password: &SensitiveBuffer) -> AgentResult<Vec<u8>> {
    let (salt, nonce, params, ciphertext) = CryptoCodec::encrypt(plaintext, password)?;
    let payload = pack_modern_payload(&salt, &nonce, params, &ciphertext);
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload);
    let mut out = encoded.into_bytes();
    out.push(b'\n');
    out.extend_from_slice(format!("{VERSION_PREFIX}{PRODUCING_VERSION}").as_bytes());
    out.push(b'\n');
    Ok(out)
}
