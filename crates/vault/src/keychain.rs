//! Keychain/biometric collaborator (spec §6): an abstract interface, not a
//! concrete OS integration. A caller wires in a platform-specific
//! implementation (Keychain Services, libsecret, Windows Credential Manager);
//! the engine only ever talks to this trait.

use crate::error::Result;

pub trait KeyStore: Send + Sync {
    /// Persists the 32-byte master key under biometric/user-presence
    /// protection.
    fn store_master_key(&self, master_key: &[u8; 32]) -> Result<()>;

    /// Retrieves the stored master key, possibly prompting the user.
    ///
    /// # Errors
    /// [`crate::error::VaultError::AuthCancelled`] if the user dismisses the
    /// prompt, [`crate::error::VaultError::NotFound`]-shaped absence is
    /// represented as `Ok(None)` since it is not a failure.
    fn retrieve_master_key(&self) -> Result<Option<[u8; 32]>>;

    fn delete_master_key(&self) -> Result<()>;

    /// Non-prompting probe: does a key exist without asking the user.
    fn has_master_key(&self) -> Result<bool>;
}

/// An in-memory `KeyStore` for tests and headless deployments with no
/// platform keychain available. Never use for anything that leaves the
/// process.
#[derive(Default)]
pub struct InMemoryKeyStore {
    slot: std::sync::Mutex<Option<[u8; 32]>>,
}

impl KeyStore for InMemoryKeyStore {
    fn store_master_key(&self, master_key: &[u8; 32]) -> Result<()> {
        *self.slot.lock().unwrap() = Some(*master_key);
        Ok(())
    }

    fn retrieve_master_key(&self) -> Result<Option<[u8; 32]>> {
        Ok(*self.slot.lock().unwrap())
    }

    fn delete_master_key(&self) -> Result<()> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }

    fn has_master_key(&self) -> Result<bool> {
        Ok(self.slot.lock().unwrap().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_store_and_retrieve() {
        let store = InMemoryKeyStore::default();
        assert!(!store.has_master_key().unwrap());
        store.store_master_key(&[7u8; 32]).unwrap();
        assert!(store.has_master_key().unwrap());
        assert_eq!(store.retrieve_master_key().unwrap(), Some([7u8; 32]));
        store.delete_master_key().unwrap();
        assert_eq!(store.retrieve_master_key().unwrap(), None);
    }
}
