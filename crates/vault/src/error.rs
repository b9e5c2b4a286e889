//! Error taxonomy for the vault engine.
//!
//! Every variant here is deliberately coarse: callers decide whether to
//! retry, re-prompt, or surface a restore-from-backup flow, but no variant
//! ever carries plaintext or key material in its payload.

use thiserror::Error;

/// The reason a container failed to decode (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptKind {
    InvalidMagic,
    UnsupportedVersion,
    Truncated,
    Malformed,
}

impl std::fmt::Display for CorruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidMagic => "invalid magic",
            Self::UnsupportedVersion => "unsupported version",
            Self::Truncated => "truncated container",
            Self::Malformed => "malformed container",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid master password")]
    InvalidPassword,

    #[error("master password does not meet minimum strength requirements")]
    WeakPassword,

    #[error("authentication failed: ciphertext, nonce or associated data mismatch")]
    AuthFailure,

    #[error("vault container is corrupt: {0}")]
    Corrupt(CorruptKind),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coordinated storage access failed: {0}")]
    Coordination(String),

    #[error("item not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("vault is locked")]
    Locked,

    #[error("replicas diverge and cannot be fast-forwarded")]
    Conflict,

    #[error("biometric/user-presence authentication cancelled")]
    AuthCancelled,

    #[error("json serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported vault version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid engine state for this operation: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
