//! Vault Engine (spec §4.7): the `Empty → Locked → Unlocked` state machine
//! that ties key derivation, the codec, migration, the item model, the
//! search index and the storage driver together behind one API surface.
//!
//! The engine itself enforces no internal mutual exclusion — spec §5 leaves
//! that to the host (a `Mutex<Vault<_>>`, a single-threaded actor task, …).
//! What it guarantees is that every operation either fully commits (bytes
//! renamed onto the vault path) or leaves the prior on-disk state untouched.

use crate::codec::{CURRENT_VERSION, Container};
use crate::crypto::aead::{aead_decrypt, aead_encrypt};
use crate::crypto::kdf::derive_master_key;
use crate::error::{Result, VaultError};
use crate::events::{AuditCategory, AuditLevel, ChangeEvent, EventSinks};
use crate::item::{Item, from_canonical_json, to_canonical_json};
use crate::metadata::VaultMetadata;
use crate::migrate::{self, DecodedVault};
use crate::search::SearchIndex;
use crate::secret::Key32;
use crate::storage::StorageDriver;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

const VERIFIER_PLAINTEXT: &[u8; 4] = crate::codec::MAGIC;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    Empty,
    Locked,
    Unlocked,
}

struct Unlocked {
    vault_key: Key32,
    search_key: Key32,
    master_key: Key32,
    salt: [u8; 32],
    enc_verifier: Vec<u8>,
    metadata: VaultMetadata,
    items: Vec<Item>,
    search_index: SearchIndex,
}

enum Inner {
    Empty,
    Locked,
    Unlocked(Box<Unlocked>),
}

pub struct Vault<S: StorageDriver> {
    storage: S,
    client_id: String,
    events: EventSinks,
    inner: Inner,
}

impl<S: StorageDriver> Vault<S> {
    /// Probes `storage` to decide the initial state: `Empty` if nothing is
    /// there yet, `Locked` if a container already exists.
    ///
    /// # Errors
    /// Any I/O failure other than "file not found".
    pub fn open(storage: S, events: EventSinks, client_id: String) -> Result<Self> {
        let inner = match storage.read() {
            Ok(_) => Inner::Locked,
            Err(VaultError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Inner::Empty,
            Err(e) => return Err(e),
        };
        Ok(Self {
            storage,
            client_id,
            events,
            inner,
        })
    }

    #[must_use]
    pub fn state(&self) -> VaultState {
        match self.inner {
            Inner::Empty => VaultState::Empty,
            Inner::Locked => VaultState::Locked,
            Inner::Unlocked(_) => VaultState::Unlocked,
        }
    }

    fn require_unlocked(&self) -> Result<&Unlocked> {
        match &self.inner {
            Inner::Unlocked(u) => Ok(u),
            _ => Err(VaultError::Locked),
        }
    }

    fn require_unlocked_mut(&mut self) -> Result<&mut Unlocked> {
        match &mut self.inner {
            Inner::Unlocked(u) => Ok(u),
            _ => Err(VaultError::Locked),
        }
    }

    /// `Empty → Unlocked`: generates a fresh salt and verifier, derives keys,
    /// writes an empty container.
    ///
    /// # Errors
    /// [`VaultError::WeakPassword`] if `password` is under 8 bytes,
    /// [`VaultError::InvalidState`] if a vault already exists,
    /// [`VaultError::Io`] on write failure.
    pub fn create(&mut self, password: &str, now: OffsetDateTime) -> Result<()> {
        if !matches!(self.inner, Inner::Empty) {
            return Err(VaultError::InvalidState("create requires an empty vault".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(VaultError::WeakPassword);
        }

        let mut salt = [0u8; 32];
        getrandom::fill(&mut salt).map_err(|e| VaultError::Coordination(e.to_string()))?;
        let master_key = derive_master_key(password, &salt);
        let (vault_key, search_key) = sub_keys(&master_key);

        let metadata = VaultMetadata::new(self.client_id.clone(), now);
        let items: Vec<Item> = Vec::new();
        let enc_verifier = aead_encrypt(&vault_key, VERIFIER_PLAINTEXT, &blob_aad(CURRENT_VERSION, b"verifier"))?;

        let unlocked = Unlocked {
            vault_key,
            search_key,
            master_key,
            salt,
            enc_verifier,
            metadata,
            items,
            search_index: SearchIndex::empty(),
        };
        self.inner = Inner::Unlocked(Box::new(unlocked));
        self.persist()?;

        self.events.audit(AuditCategory::Vault, AuditLevel::Info, "vault created");
        self.events.notify(ChangeEvent::Unlocked);
        Ok(())
    }

    /// `Locked → Unlocking → Unlocked`: derives keys from `password` and the
    /// container's salt, decrypts the verifier to prove correctness, then
    /// decrypts metadata and items and rebuilds the search index.
    ///
    /// # Errors
    /// [`VaultError::InvalidPassword`] if the verifier fails to decrypt,
    /// [`VaultError::Corrupt`] if the container is malformed,
    /// [`VaultError::InvalidState`] if the vault isn't `Locked`.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        if !matches!(self.inner, Inner::Locked) {
            return Err(VaultError::InvalidState("unlock requires a locked vault".into()));
        }
        let bytes = self.storage.read()?;
        let container = Container::parse(&bytes)?;
        let master_key = derive_master_key(password, &container.salt);
        let (vault_key, search_key) = sub_keys(&master_key);

        match aead_decrypt(&vault_key, &container.enc_verifier, &blob_aad(container.version, b"verifier")) {
            Ok(_) => {}
            Err(_) => {
                self.events.audit(AuditCategory::Auth, AuditLevel::Warning, "unlock failed: wrong password");
                return Err(VaultError::InvalidPassword);
            }
        }

        self.finish_unlock(container, vault_key, search_key, master_key)
    }

    /// `Locked → Unlocking → Unlocked` using an externally-supplied master
    /// key (spec §6, keychain/biometric collaborator) instead of a password.
    ///
    /// # Errors
    /// [`VaultError::AuthFailure`] if the key doesn't match this container.
    pub fn unlock_with_stored_key(&mut self, master_key_bytes: [u8; 32]) -> Result<()> {
        if !matches!(self.inner, Inner::Locked) {
            return Err(VaultError::InvalidState("unlock requires a locked vault".into()));
        }
        let bytes = self.storage.read()?;
        let container = Container::parse(&bytes)?;
        let master_key = Key32::from_bytes(master_key_bytes);
        let (vault_key, search_key) = sub_keys(&master_key);

        aead_decrypt(&vault_key, &container.enc_verifier, &blob_aad(container.version, b"verifier")).map_err(|_| {
            VaultError::AuthFailure
        })?;

        self.finish_unlock(container, vault_key, search_key, master_key)
    }

    fn finish_unlock(&mut self, container: Container, vault_key: Key32, search_key: Key32, master_key: Key32) -> Result<()> {
        let metadata: VaultMetadata =
            serde_json::from_slice(&aead_decrypt(&vault_key, &container.enc_metadata, &blob_aad(container.version, b"metadata"))?)?;
        let items = from_canonical_json(&aead_decrypt(&vault_key, &container.enc_items, &blob_aad(container.version, b"items"))?)?;

        let DecodedVault { metadata, items } = if container.version == CURRENT_VERSION {
            DecodedVault { metadata, items }
        } else {
            migrate::migrate(DecodedVault { metadata, items }, container.version, CURRENT_VERSION)?
        };

        let search_index = SearchIndex::rebuild(&search_key, &items);
        self.inner = Inner::Unlocked(Box::new(Unlocked {
            vault_key,
            search_key,
            master_key,
            salt: container.salt,
            enc_verifier: container.enc_verifier,
            metadata,
            items,
            search_index,
        }));

        self.events.audit(AuditCategory::Vault, AuditLevel::Info, "vault unlocked");
        self.events.notify(ChangeEvent::Unlocked);
        Ok(())
    }

    /// `Unlocked → Locking → Locked`: drops the key set, items and search
    /// index. Idempotent — locking an already-locked/empty vault is a no-op.
    pub fn lock(&mut self) {
        if matches!(self.inner, Inner::Unlocked(_)) {
            self.inner = Inner::Locked;
            self.events.audit(AuditCategory::Vault, AuditLevel::Info, "vault locked");
            self.events.notify(ChangeEvent::Locked);
        }
    }

    /// Re-derives the full key set under a new salt, re-encrypts every blob,
    /// and writes a new container. The prior container is never overwritten
    /// in place — see [`crate::storage::FileStorageDriver`]'s atomic rename.
    ///
    /// # Errors
    /// [`VaultError::InvalidPassword`] if `old` doesn't match the current
    /// master key, [`VaultError::WeakPassword`] if `new` is under 8 bytes.
    pub fn change_password(&mut self, old: &str, new: &str, now: OffsetDateTime) -> Result<()> {
        let current = self.require_unlocked()?;
        let candidate = derive_master_key(old, &current.salt);
        if candidate.0.ct_eq(&current.master_key.0).unwrap_u8() == 0 {
            return Err(VaultError::InvalidPassword);
        }
        if new.len() < MIN_PASSWORD_LEN {
            return Err(VaultError::WeakPassword);
        }

        let mut salt = [0u8; 32];
        getrandom::fill(&mut salt).map_err(|e| VaultError::Coordination(e.to_string()))?;
        let master_key = derive_master_key(new, &salt);
        let (vault_key, search_key) = sub_keys(&master_key);
        let enc_verifier = aead_encrypt(&vault_key, VERIFIER_PLAINTEXT, &blob_aad(CURRENT_VERSION, b"verifier"))?;

        let unlocked = self.require_unlocked_mut()?;
        unlocked.master_key = master_key;
        unlocked.vault_key = vault_key;
        unlocked.search_key = search_key;
        unlocked.salt = salt;
        unlocked.enc_verifier = enc_verifier;
        unlocked.search_index = SearchIndex::rebuild(&unlocked.search_key, &unlocked.items);
        unlocked.metadata.record_mutation(unlocked.items.len(), now);

        self.persist()?;
        self.events.audit(AuditCategory::Security, AuditLevel::Info, "master password changed");
        Ok(())
    }

    /// `Unlocked → Unlocked`: inserts `item`, bumps metadata, persists.
    ///
    /// # Errors
    /// [`VaultError::Locked`] if not unlocked, [`VaultError::Io`] on write
    /// failure.
    pub fn add_item(&mut self, item: Item, now: OffsetDateTime) -> Result<Uuid> {
        let id = item.id;
        let unlocked = self.require_unlocked_mut()?;
        unlocked.items.push(item);
        unlocked.metadata.record_mutation(unlocked.items.len(), now);
        unlocked.search_index = SearchIndex::rebuild(&unlocked.search_key, &unlocked.items);
        self.persist()?;
        self.events.notify(ChangeEvent::ItemsChanged);
        Ok(id)
    }

    /// Replaces the item matching `item.id`, touching `modified_at`.
    ///
    /// # Errors
    /// [`VaultError::NotFound`] if no item has that id.
    pub fn update_item(&mut self, mut item: Item, now: OffsetDateTime) -> Result<()> {
        let unlocked = self.require_unlocked_mut()?;
        let slot = unlocked
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or(VaultError::NotFound(item.id))?;
        item.touch(now);
        *slot = item;
        unlocked.metadata.record_mutation(unlocked.items.len(), now);
        unlocked.search_index = SearchIndex::rebuild(&unlocked.search_key, &unlocked.items);
        self.persist()?;
        self.events.notify(ChangeEvent::ItemsChanged);
        Ok(())
    }

    /// Removes the item with `id`.
    ///
    /// # Errors
    /// [`VaultError::NotFound`] if no item has that id.
    pub fn delete_item(&mut self, id: Uuid, now: OffsetDateTime) -> Result<()> {
        let unlocked = self.require_unlocked_mut()?;
        let before = unlocked.items.len();
        unlocked.items.retain(|i| i.id != id);
        if unlocked.items.len() == before {
            return Err(VaultError::NotFound(id));
        }
        unlocked.metadata.record_mutation(unlocked.items.len(), now);
        unlocked.search_index = SearchIndex::rebuild(&unlocked.search_key, &unlocked.items);
        self.persist()?;
        self.events.notify(ChangeEvent::ItemsChanged);
        Ok(())
    }

    /// Tokenizes `query`, HMACs it under the current search key, and returns
    /// matching item ids ordered `(favorite desc, modified_at desc)`.
    ///
    /// # Errors
    /// [`VaultError::Locked`] if not unlocked.
    pub fn search(&self, query: &str) -> Result<Vec<Uuid>> {
        let unlocked = self.require_unlocked()?;
        Ok(unlocked.search_index.query(&unlocked.search_key, query))
    }

    /// Snapshot read of every item currently in memory. Order matches
    /// however the in-memory set was last built up (insertion order within
    /// the current session); the on-disk blob is always id-sorted
    /// regardless, see [`to_canonical_json`].
    ///
    /// # Errors
    /// [`VaultError::Locked`] if not unlocked.
    pub fn items(&self) -> Result<&[Item]> {
        Ok(&self.require_unlocked()?.items)
    }

    /// `Unlocked → Empty`: scrubs memory and deletes the file.
    ///
    /// # Errors
    /// [`VaultError::Io`] on delete failure.
    pub fn destroy(&mut self) -> Result<()> {
        self.require_unlocked()?;
        self.storage.delete()?;
        self.inner = Inner::Empty;
        self.events.audit(AuditCategory::Vault, AuditLevel::Info, "vault destroyed");
        Ok(())
    }

    /// Applies the result of [`crate::sync::resolve`]: replaces the in-memory
    /// metadata and items with `resolved`, rebuilds the search index (the
    /// merge may have introduced items under ids the index has never seen),
    /// re-encrypts everything under the live `vault_key`/AAD scheme, and
    /// writes the resulting container through both this vault's storage
    /// driver and `remote` (spec §4.9: a reconciled vault is "re-encrypted
    /// with the current `vault_key`, re-framed, and written through both
    /// storage drivers").
    ///
    /// # Errors
    /// [`VaultError::Locked`] if not unlocked, [`VaultError::Io`] if either
    /// write fails.
    pub fn reconcile_and_persist(&mut self, resolved: DecodedVault, remote: &dyn StorageDriver) -> Result<()> {
        let unlocked = self.require_unlocked_mut()?;
        unlocked.metadata = resolved.metadata;
        unlocked.items = resolved.items;
        unlocked.search_index = SearchIndex::rebuild(&unlocked.search_key, &unlocked.items);

        let bytes = encode_container(unlocked)?;
        self.storage.write(&bytes)?;
        remote.write(&bytes)?;

        self.events.audit(AuditCategory::Sync, AuditLevel::Info, "vault reconciled");
        self.events.notify(ChangeEvent::SyncStatusChanged);
        Ok(())
    }

    /// Re-encrypts metadata and items (and the cached verifier) and writes a
    /// new container through the storage driver's atomic rename.
    fn persist(&mut self) -> Result<()> {
        let bytes = encode_container(self.require_unlocked()?)?;
        self.storage.write(&bytes)
    }
}

/// Re-encrypts `unlocked`'s metadata and items under its current keys and
/// frames them into a container's on-disk bytes. Shared by `persist` and
/// `reconcile_and_persist` so both paths use the same AAD scheme.
fn encode_container(unlocked: &Unlocked) -> Result<Vec<u8>> {
    let enc_metadata = aead_encrypt(
        &unlocked.vault_key,
        &serde_json::to_vec(&unlocked.metadata)?,
        &blob_aad(CURRENT_VERSION, b"metadata"),
    )?;
    let enc_items = aead_encrypt(
        &unlocked.vault_key,
        &to_canonical_json(&unlocked.items)?,
        &blob_aad(CURRENT_VERSION, b"items"),
    )?;
    let container = Container {
        version: CURRENT_VERSION,
        salt: unlocked.salt,
        enc_verifier: unlocked.enc_verifier.clone(),
        enc_metadata,
        enc_items,
    };
    container.to_bytes()
}

/// Derives the vault and search sub-keys together, since every caller that
/// needs one needs the other.
fn sub_keys(master_key: &Key32) -> (Key32, Key32) {
    let keys = crate::crypto::kdf::DerivedKeys::from_master(Key32::from_bytes(master_key.0));
    (keys.vault_key, keys.search_key)
}

/// Domain-separates the three payload blobs so a ciphertext swap between
/// fields (e.g. pasting `enc_items` where `enc_metadata` belongs) fails AEAD
/// verification instead of silently parsing as the wrong type.
fn blob_aad(version: u32, label: &[u8]) -> Vec<u8> {
    let mut aad = version.to_le_bytes().to_vec();
    aad.extend_from_slice(label);
    aad
}
