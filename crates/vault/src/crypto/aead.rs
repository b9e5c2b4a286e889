//! AEAD primitive (spec §4.2): AES-256-GCM, 96-bit random nonces, 128-bit
//! tags. The wire layout is `nonce || sealed || tag`; nonce generation is
//! internal to `aead_encrypt` so the API surface cannot be misused into
//! nonce reuse under the same key.

use crate::error::{Result, VaultError};
use crate::secret::Key32;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypts `plaintext` under `key`, binding `aad` into the tag. Returns the
/// self-contained `nonce || sealed || tag` blob described in spec §4.2/§4.4.
///
/// # Arguments
/// * `key` - The 256-bit AES-GCM key. One of `vault_key`/`search_key`
///   (never `master_key` directly — spec §4.1 keeps sealing keys and the
///   master key separate so a leaked ciphertext key can be rotated without
///   re-deriving the whole hierarchy).
/// * `plaintext` - The bytes to seal. No length restriction beyond what
///   fits in a `u32` length prefix in the container (spec §4.4).
/// * `aad` - Associated data authenticated but not encrypted — here always
///   `blob_aad(version, field_label)` (spec §4.2), so a ciphertext copied
///   into the wrong field fails authentication instead of silently
///   decrypting as the wrong type.
///
/// # Returns
/// `nonce (12 bytes) || ciphertext || tag (16 bytes)`, self-describing so
/// [`aead_decrypt`] needs nothing but `key` and `aad` to invert it.
///
/// # Errors
/// [`VaultError::Coordination`] if the nonce RNG fails;
/// [`VaultError::AuthFailure`] if the underlying cipher rejects the
/// operation (in practice only when `plaintext` exceeds AES-GCM's
/// per-key message limit, far beyond anything this crate seals).
///
/// # Security considerations
/// The nonce is generated internally and never accepted as a parameter, so
/// the only way to reuse a nonce under the same key is an RNG failure —
/// the one thing that would catastrophically break AES-GCM's
/// confidentiality and integrity guarantees.
pub fn aead_encrypt(key: &Key32, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new((&key.0).into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce_bytes).map_err(|e| VaultError::Coordination(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| VaultError::AuthFailure)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypts a `nonce || sealed || tag` blob produced by [`aead_encrypt`].
///
/// # Arguments
/// * `key` - Must be the same key `aad` and `blob` were sealed under; any
///   other key fails authentication rather than producing garbage
///   plaintext (GCM has no notion of "decrypt with the wrong key").
/// * `blob` - The `nonce || ciphertext || tag` wire format [`aead_encrypt`]
///   produces.
/// * `aad` - Must match the associated data passed to [`aead_encrypt`]
///   exactly; a mismatch (e.g. the wrong field label) fails the same way a
///   bit-flipped ciphertext would.
///
/// # Returns
/// The original plaintext, once the GCM tag has verified every byte of
/// `blob` and `aad`.
///
/// # Errors
/// [`VaultError::AuthFailure`] if `blob` is shorter than a nonce plus tag,
/// if any byte of `blob` or `aad` has been altered since sealing, or if
/// `key` doesn't match the key `blob` was sealed under (spec §8 invariant
/// 3: a single flipped bit anywhere must fail, never silently decrypt).
pub fn aead_decrypt(key: &Key32, blob: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::AuthFailure);
    }
    let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new((&key.0).into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: sealed, aad })
        .map_err(|_| VaultError::AuthFailure)
}
