//! Encryption envelope around staged dump archives
//!
//! `seal` turns `<staging>/<name>.gz` into `<staging>/<name>.aes` and removes
//! the plaintext; `open` reverses it. The cipher itself is pluggable.
//!
//! The passphrase is the database password supplied by the operator. There
//! is no separate key store, so anyone holding the database password can
//! read every backup taken with it.

use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use crate::backup::ArtifactNamer;
use crate::error::{BackupError, BackupResult};

/// A file-to-file symmetric cipher keyed by a passphrase
pub trait Cipher {
    /// Short label for logs
    fn name(&self) -> &'static str;

    /// Encrypt `input` into `output`
    fn encrypt_file(&self, input: &Path, output: &Path, passphrase: &str) -> BackupResult<()>;

    /// Decrypt `input` into `output`
    fn decrypt_file(&self, input: &Path, output: &Path, passphrase: &str) -> BackupResult<()>;
}

/// Seals and opens staged archives for a logical backup name
pub struct EncryptionEnvelope {
    namer: ArtifactNamer,
    cipher: Box<dyn Cipher>,
}

impl EncryptionEnvelope {
    pub fn new(namer: ArtifactNamer, cipher: Box<dyn Cipher>) -> Self {
        Self { namer, cipher }
    }

    pub fn namer(&self) -> &ArtifactNamer {
        &self.namer
    }

    /// Encrypt the plaintext dump for `name`, then delete the plaintext
    ///
    /// On `Encryption` failure the plaintext is left in place and any
    /// partial encrypted output is removed. On `Cleanup` failure the
    /// encrypted artifact is complete but the plaintext still exists.
    pub fn seal(&self, name: &str, passphrase: &str) -> BackupResult<()> {
        let plain = self.namer.dump_path(name);
        let sealed = self.namer.encrypted_path(name);

        info!(backup = name, cipher = self.cipher.name(), "Encrypting {}", plain.display());

        if let Err(e) = self.cipher.encrypt_file(&plain, &sealed, passphrase) {
            discard_partial(&sealed);
            error!(
                backup = name,
                plaintext = %plain.display(),
                "Encryption failed; unencrypted dump left on disk"
            );
            return Err(match e {
                BackupError::Encryption(_) => e,
                other => BackupError::Encryption(other.to_string()),
            });
        }

        fs::remove_file(&plain).map_err(|e| BackupError::cleanup(&plain, e))?;
        info!(backup = name, "Encryption completed: {}", sealed.display());
        Ok(())
    }

    /// Decrypt the artifact for `name` back into the staged dump path
    ///
    /// Any partial plaintext is removed on failure.
    pub fn open(&self, name: &str, passphrase: &str) -> BackupResult<()> {
        let sealed = self.namer.encrypted_path(name);
        let plain = self.namer.dump_path(name);

        if !sealed.is_file() {
            return Err(BackupError::Decryption(format!(
                "no encrypted artifact at {}",
                sealed.display()
            )));
        }

        info!(backup = name, cipher = self.cipher.name(), "Decrypting {}", sealed.display());

        if let Err(e) = self.cipher.decrypt_file(&sealed, &plain, passphrase) {
            discard_partial(&plain);
            return Err(match e {
                BackupError::Decryption(_) => e,
                other => BackupError::Decryption(other.to_string()),
            });
        }

        info!(backup = name, "Decryption completed");
        Ok(())
    }
}

fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Could not remove partial output");
        }
    }
}
