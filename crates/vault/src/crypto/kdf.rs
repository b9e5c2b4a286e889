//! Key hierarchy (spec §4.1): PBKDF2 turns the master password into a master
//! key; HKDF fans the master key out into purpose-specific sub-keys so that
//! vault payloads, the search blind-index and standalone backups never share
//! key material.

use crate::secret::Key32;
use hmac::Hmac;
use sha2::Sha256;

/// Format-level constant. Changing it requires a vault format version bump
/// (spec §4.1) since every existing container was sealed at this cost.
pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const SALT_LEN: usize = 32;

const VAULT_KEY_LABEL: &[u8] = b"dodopass-vault-key";
const SEARCH_KEY_LABEL: &[u8] = b"dodopass-search-key";
const BACKUP_KEY_LABEL: &[u8] = b"dodopass-backup-key";

/// The full key set held only in memory while `Unlocked` (spec §3): the
/// master key plus the three purpose-specific sub-keys derived from it.
///
/// `vault_key` seals item/metadata payloads, `search_key` drives the blind
/// index, `backup_key` is reserved for standalone backup exports (spec
/// §4.1). Keeping them in one struct means every call site that needs one
/// sub-key derives all three at once rather than re-deriving piecemeal.
pub struct DerivedKeys {
    pub master_key: Key32,
    pub vault_key: Key32,
    pub search_key: Key32,
    pub backup_key: Key32,
}

impl DerivedKeys {
    /// Derives `vault_key`, `search_key` and `backup_key` from an
    /// already-derived `master_key` and bundles all four together.
    ///
    /// # Arguments
    /// * `master_key` - The password-derived master key, typically the
    ///   output of [`derive_master_key`].
    ///
    /// # Returns
    /// A [`DerivedKeys`] holding `master_key` alongside its three sub-keys.
    /// Each sub-key is independent: recovering one reveals nothing about
    /// the others or about `master_key` itself (HKDF's one-wayness).
    #[must_use]
    pub fn from_master(master_key: Key32) -> Self {
        let vault_key = derive_sub_key(&master_key, VAULT_KEY_LABEL);
        let search_key = derive_sub_key(&master_key, SEARCH_KEY_LABEL);
        let backup_key = derive_sub_key(&master_key, BACKUP_KEY_LABEL);
        Self {
            master_key,
            vault_key,
            search_key,
            backup_key,
        }
    }
}

/// Derives the master key from the user's password: `PBKDF2-HMAC-SHA256(
/// password_utf8, salt, iterations=600_000, dkLen=32)`.
///
/// # Arguments
/// * `password` - The master password, taken as UTF-8 bytes. Not
///   length-checked here; callers that need to reject weak passwords (spec
///   §4.7's `WeakPassword`) do so before calling this.
/// * `salt` - The 32-byte salt stored alongside the vault container. Must be
///   freshly random per vault (spec §4.1) and never reused across vaults,
///   since salt reuse lets an attacker precompute one rainbow table for two
///   different vaults' keys.
///
/// # Returns
/// The 32-byte master key, wrapped in [`Key32`] so it zeroizes on drop.
/// Deterministic: the same `(password, salt)` pair always derives the same
/// key, which is what makes `unlock` re-derivable without storing the key.
///
/// # Panics
/// Never in practice — `pbkdf2::pbkdf2` only errors on an output buffer of
/// the wrong length, and `out` here is always exactly 32 bytes.
#[must_use]
pub fn derive_master_key(password: &str, salt: &[u8; SALT_LEN]) -> Key32 {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out)
        .expect("pbkdf2 output length is fixed and always valid");
    Key32::from_bytes(out)
}

/// Fans a sub-key out of the master key: `HKDF-SHA256(ikm=master_key,
/// salt=empty, info=label, L=32)`.
///
/// # Arguments
/// * `master_key` - The password-derived master key this sub-key is fanned
///   out from.
/// * `label` - A fixed, purpose-specific byte string (see
///   `VAULT_KEY_LABEL`/`SEARCH_KEY_LABEL`/`BACKUP_KEY_LABEL`). Labels are
///   stable across versions: changing one changes every sub-key derived
///   under it, which is equivalent to a silent, undetectable format break
///   and must instead go through a migration (spec §4.1).
///
/// # Returns
/// The 32-byte sub-key. HKDF's extract-then-expand construction means two
/// different labels under the same `master_key` produce keys with no
/// exploitable relationship to each other, so a leaked `search_key` never
/// compromises `vault_key` or `backup_key`.
///
/// # Panics
/// Never in practice — HKDF-SHA256's expand limit is `255 * 32` bytes;
/// this function only ever asks for 32.
#[must_use]
pub fn derive_sub_key(master_key: &Key32, label: &[u8]) -> Key32 {
    let hk = hkdf::Hkdf::<Sha256>::new(None, &master_key.0);
    let mut out = [0u8; 32];
    hk.expand(label, &mut out)
        .expect("32-byte output is well within HKDF-SHA256's expand limit");
    Key32::from_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_master_key_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_master_key("correct horse battery staple", &salt);
        let b = derive_master_key("correct horse battery staple", &salt);
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn different_salt_changes_the_key() {
        let a = derive_master_key("pw", &[1u8; SALT_LEN]);
        let b = derive_master_key("pw", &[2u8; SALT_LEN]);
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn different_password_changes_the_key() {
        let salt = [9u8; SALT_LEN];
        let a = derive_master_key("password-a", &salt);
        let b = derive_master_key("password-b", &salt);
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn sub_keys_are_distinct_and_stable() {
        let master = derive_master_key("pw", &[0u8; SALT_LEN]);
        let keys = DerivedKeys::from_master(Key32::from_bytes(master.0));
        assert_ne!(keys.vault_key.0, keys.search_key.0);
        assert_ne!(keys.vault_key.0, keys.backup_key.0);
        assert_ne!(keys.search_key.0, keys.backup_key.0);

        let vk2 = derive_sub_key(&Key32::from_bytes(master.0), VAULT_KEY_LABEL);
        assert_eq!(keys.vault_key.0, vk2.0);
    }
}
