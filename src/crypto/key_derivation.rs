//! Key derivation using Argon2id
//!
//! Derives the artifact encryption key from the passphrase and a per-artifact
//! random salt. The cost parameters travel with each artifact, so changing
//! the configured defaults never breaks older backups.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BackupError, BackupResult};

/// Salt length in bytes
pub const SALT_SIZE: usize = 16;

/// Largest accepted memory cost in KiB (2 GiB)
pub const MAX_MEMORY_COST: u32 = 2 * 1024 * 1024;
/// Largest accepted time cost
pub const MAX_TIME_COST: u32 = 64;
/// Largest accepted parallelism
pub const MAX_PARALLELISM: u32 = 64;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    pub fn with_values(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Reject costs above the fixed ceilings
    ///
    /// Parameters read back from an artifact are untrusted; an unchecked
    /// memory cost would make Argon2 allocate whatever the header claims.
    pub fn check_limits(&self) -> Result<(), String> {
        if self.memory_cost > MAX_MEMORY_COST {
            return Err(format!(
                "memory cost {} KiB exceeds the {} KiB limit",
                self.memory_cost, MAX_MEMORY_COST
            ));
        }
        if self.time_cost > MAX_TIME_COST {
            return Err(format!(
                "time cost {} exceeds the limit of {}",
                self.time_cost, MAX_TIME_COST
            ));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(format!(
                "parallelism {} exceeds the limit of {}",
                self.parallelism, MAX_PARALLELISM
            ));
        }
        Ok(())
    }
}

/// A derived 256-bit encryption key, zeroed on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; 32],
}

impl DerivedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive an encryption key from a passphrase
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KeyDerivationParams,
) -> BackupResult<DerivedKey> {
    params
        .check_limits()
        .map_err(|e| BackupError::Config(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| BackupError::Config(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| BackupError::Encryption(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey { key })
}
