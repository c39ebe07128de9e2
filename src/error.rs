//! Error kinds
//!
//! A single closed error enum. Every variant maps to exactly one wire-level
//! error kind returned to IPC clients (see `kind()`); there is no nested
//! per-concern hierarchy and no process-wide error state.

use thiserror::Error;

/// The agent's error type. Variant names describe the failure; `kind()`
/// gives the stable string sent to clients over IPC.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("required argument was null")]
    ArgNull,

    #[error("invalid argument: {0}")]
    ArgInvalid(String),

    #[error("malformed encrypted document: {0}")]
    FormatInvalid(String),

    #[error("authentication tag mismatch (wrong password or tampered data)")]
    MacMismatch,

    #[error("wrong password")]
    PasswordWrong,

    #[error("account store is locked")]
    StoreLocked,

    #[error("no account named {name:?}")]
    AccountNotFound { name: String },

    #[error("account {name:?} already exists")]
    AccountExists { name: String },

    #[error("refresh token was revoked by the provider")]
    RefreshRevoked,

    #[error("upstream error: {status:?} {body}")]
    UpstreamError { status: Option<u16>, body: String },

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("state parameter mismatch")]
    StateMismatch,

    #[error("could not parse JWK: {0}")]
    JwkParse(String),

    #[error("JWKS contains multiple keys and none can be uniquely selected")]
    JwksAmbiguous,

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("IPC frame exceeded the maximum size")]
    FrameTooLarge,

    #[error("peer is not authorized to use this socket")]
    UnauthorizedPeer,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// The stable wire-level kind string used in IPC failure responses
    /// (`{"status":"failure","error":"<kind>", ...}`, §7).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArgNull => "arg_null",
            Self::ArgInvalid(_) => "arg_invalid",
            Self::FormatInvalid(_) => "format_invalid",
            Self::MacMismatch => "mac_mismatch",
            Self::PasswordWrong => "password_wrong",
            Self::StoreLocked => "store_locked",
            Self::AccountNotFound { .. } => "account_not_found",
            Self::AccountExists { .. } => "account_exists",
            Self::RefreshRevoked => "refresh_revoked",
            Self::UpstreamError { .. } => "upstream_error",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::StateMismatch => "state_mismatch",
            Self::JwkParse(_) => "jwk_parse",
            Self::JwksAmbiguous => "jwks_ambiguous",
            Self::NotImplemented(_) => "not_implemented",
            Self::FrameTooLarge => "frame_too_large",
            Self::UnauthorizedPeer => "unauthorized_peer",
            Self::IoError(_) => "io_error",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether a local retry loop may attempt this operation again
    /// (§7: `upstream_timeout` gets exponential-backoff retries).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout)
    }

    /// `true` for errors reserved for conditions the caller cannot act on.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::IoError(_))
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_spec_closed_set() {
        assert_eq!(AgentError::ArgNull.kind(), "arg_null");
        assert_eq!(
            AgentError::AccountNotFound { name: "a".into() }.kind(),
            "account_not_found"
        );
        assert_eq!(AgentError::JwksAmbiguous.kind(), "jwks_ambiguous");
        assert_eq!(AgentError::FrameTooLarge.kind(), "frame_too_large");
    }

    #[test]
    fn only_upstream_timeout_is_retryable() {
        assert!(AgentError::UpstreamTimeout.is_retryable());
        assert!(!AgentError::RefreshRevoked.is_retryable());
        assert!(!AgentError::MacMismatch.is_retryable());
    }

    #[test]
    fn internal_errors_are_not_actionable() {
        assert!(AgentError::Internal("x".into()).is_internal());
        assert!(!AgentError::PasswordWrong.is_internal());
    }
}
