//! Cryptographic functions for mongo-backup
//!
//! The encryption envelope seals staged dumps with either the external
//! `openssl` tool or an in-process AES-256-GCM cipher keyed through
//! Argon2id.

pub mod envelope;
pub mod key_derivation;
pub mod native;
pub mod openssl;
pub mod secure_memory;

pub use envelope::{Cipher, EncryptionEnvelope};
pub use key_derivation::{derive_key, DerivedKey, KeyDerivationParams};
pub use native::NativeCipher;
pub use openssl::OpensslCipher;
pub use secure_memory::SecureString;
