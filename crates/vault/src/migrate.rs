//! Migration engine (spec §4.5). Each step is a pure function over the
//! decrypted, parsed domain objects, never over ciphertext; the caller
//! re-encrypts once the whole chain of steps has completed. Today there is
//! exactly one version, so the chain is empty — but it still rejects bogus
//! `from`/`to` values rather than silently succeeding.

use crate::codec::CURRENT_VERSION;
use crate::error::{Result, VaultError};
use crate::item::Item;
use crate::metadata::VaultMetadata;

/// The decoded, decrypted domain objects a migration step operates on.
pub struct DecodedVault {
    pub metadata: VaultMetadata,
    pub items: Vec<Item>,
}

/// Runs every single-step upgrade from `from` to `to`, in order.
///
/// # Errors
/// [`VaultError::UnsupportedVersion`] if either endpoint is not a version
/// this codec recognizes.
pub fn migrate(mut vault: DecodedVault, from: u32, to: u32) -> Result<DecodedVault> {
    if from == 0 || from > CURRENT_VERSION || to == 0 || to > CURRENT_VERSION {
        return Err(VaultError::UnsupportedVersion(if from > CURRENT_VERSION { from } else { to }));
    }
    if from > to {
        return Err(VaultError::UnsupportedVersion(from));
    }

    let mut version = from;
    while version < to {
        vault = apply_step(vault, version)?;
        version += 1;
    }
    Ok(vault)
}

/// Applies the single step from `version` to `version + 1`. There are no
/// steps defined yet (spec §4.5: "version 1 only"); this match exists so the
/// next format bump has an obvious place to land.
fn apply_step(_vault: DecodedVault, version: u32) -> Result<DecodedVault> {
    Err(VaultError::UnsupportedVersion(version + 1))
}
