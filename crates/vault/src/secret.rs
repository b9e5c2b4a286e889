//! Owning byte buffers that zeroize on drop.
//!
//! Generalizes the teacher's fixed-size `KeyMaterial` into a variable-length
//! buffer so it can also hold decrypted item blobs, not just 32-byte keys.

use zeroize::Zeroize;

/// A heap-allocated byte buffer that is wiped on drop.
///
/// Cloning is explicit (`clone_secret`) and intentionally not `Clone` —
/// accidental clones of key material are the easiest way to leak a copy
/// that outlives the original's `zeroize`.
#[derive(Debug)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn clone_secret(&self) -> Self {
        Self(self.0.clone())
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A fixed-size 256-bit key that zeroizes on drop. Used for every member of
/// the derived key set (spec §3).
///
/// Cloning is explicit (`clone_key`) and intentionally not `Clone` — the
/// same reasoning as [`SecretBytes`]: an accidental derive-based clone is
/// the easiest way to leak a copy of live key material that outlives the
/// original's zeroize-on-drop.
pub struct Key32(pub [u8; 32]);

impl Key32 {
    #[must_use]
    pub fn random() -> Self {
        let mut k = [0u8; 32];
        // Reuse under the same key context is the catastrophic failure
        // mode this type exists to prevent; getrandom::fill is infallible
        // on every supported target here, so a failure means the host
        // cannot be trusted to produce randomness at all.
        getrandom::fill(&mut k).expect("failed to get random bytes");
        Self(k)
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn clone_key(&self) -> Self {
        Self(self.0)
    }
}

impl std::fmt::Debug for Key32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key32(REDACTED)")
    }
}

impl Drop for Key32 {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
