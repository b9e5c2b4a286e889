pub mod aead;
pub mod kdf;

pub use aead::{aead_decrypt, aead_encrypt};
pub use kdf::{derive_master_key, derive_sub_key, DerivedKeys, PBKDF2_ITERATIONS, SALT_LEN};
