//! Artifact cipher backed by the `openssl` command
//!
//! Produces the same artifacts as `openssl enc -aes-256-cbc -salt -pbkdf2`,
//! so backups can be opened by hand with stock tooling. The passphrase is
//! handed over through the child's environment, never its argument list.
//!
//! CBC carries no authentication tag, and a wrong passphrase gets past
//! openssl's padding check roughly once in 256 attempts. Every decrypted
//! output is therefore decoded in full as gzip before it is accepted; the
//! gzip trailer's CRC-32 rejects the garbage the padding check misses.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::MultiGzDecoder;

use super::envelope::Cipher;
use crate::error::{BackupError, BackupResult};
use crate::process::{CommandLine, ProcessRunner};

/// Environment variable carrying the passphrase to the child process
pub const PASSPHRASE_ENV: &str = "MONGO_BACKUP_PASSPHRASE";

/// Leading bytes of every gzip member
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// AES-256-CBC with salted PBKDF2 via the external `openssl` binary
pub struct OpensslCipher {
    program: String,
    runner: Arc<dyn ProcessRunner>,
    encrypt_timeout: Duration,
    decrypt_timeout: Duration,
}

impl OpensslCipher {
    pub fn new(
        program: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        encrypt_timeout: Duration,
        decrypt_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            runner,
            encrypt_timeout,
            decrypt_timeout,
        }
    }

    fn command(&self, decrypt: bool, input: &Path, output: &Path, passphrase: &str) -> CommandLine {
        let mut cmd = CommandLine::new(&self.program).args(["enc", "-aes-256-cbc"]);
        if decrypt {
            cmd = cmd.arg("-d");
        }
        cmd.args(["-salt", "-pbkdf2", "-in"])
            .arg(input.display().to_string())
            .arg("-out")
            .arg(output.display().to_string())
            .arg("-pass")
            .arg(format!("env:{}", PASSPHRASE_ENV))
            .env(PASSPHRASE_ENV, passphrase)
    }
}

impl Cipher for OpensslCipher {
    fn name(&self) -> &'static str {
        "openssl aes-256-cbc"
    }

    fn encrypt_file(&self, input: &Path, output: &Path, passphrase: &str) -> BackupResult<()> {
        let cmd = self.command(false, input, output, passphrase);
        self.runner
            .run(&cmd, self.encrypt_timeout)
            .map(|_| ())
            .map_err(|e| BackupError::Encryption(e.to_string()))
    }

    fn decrypt_file(&self, input: &Path, output: &Path, passphrase: &str) -> BackupResult<()> {
        let cmd = self.command(true, input, output, passphrase);
        self.runner
            .run(&cmd, self.decrypt_timeout)
            .map_err(|e| BackupError::Decryption(e.to_string()))?;

        verify_gzip(output).map_err(|e| {
            BackupError::Decryption(format!(
                "wrong passphrase or corrupted artifact: {} is not a valid archive ({})",
                output.display(),
                e
            ))
        })
    }
}

/// Decode `path` to the end as gzip, discarding the output
fn verify_gzip(path: &Path) -> io::Result<()> {
    let mut file = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 2];
    file.read_exact(&mut magic)?;
    if magic != GZIP_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "missing gzip header"));
    }

    let mut decoder = MultiGzDecoder::new(magic.as_slice().chain(file));
    io::copy(&mut decoder, &mut io::sink())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{FailureCause, ProcessFailure};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::cell::RefCell;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(CommandLine, Duration)>>,
        fail_with: Option<String>,
        // Written to the `-out` path on success
        writes: Option<Vec<u8>>,
    }

    impl ProcessRunner for Recorder {
        fn run(&self, command: &CommandLine, timeout: Duration) -> Result<String, ProcessFailure> {
            self.calls.borrow_mut().push((command.clone(), timeout));
            match &self.fail_with {
                Some(out) => Err(ProcessFailure::new(
                    command.program(),
                    FailureCause::Exit(Some(1)),
                    out.clone(),
                )),
                None => {
                    if let (Some(bytes), Some(out)) = (&self.writes, command.value_after("-out")) {
                        fs::write(out, bytes).unwrap();
                    }
                    Ok(String::new())
                }
            }
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn decrypt_to(writes: Vec<u8>) -> (TempDir, BackupResult<()>) {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(Recorder {
            writes: Some(writes),
            ..Default::default()
        });
        let result = cipher(runner).decrypt_file(
            &dir.path().join("x.aes"),
            &dir.path().join("x.gz"),
            "hunter2",
        );
        (dir, result)
    }

    fn cipher(runner: Arc<Recorder>) -> OpensslCipher {
        OpensslCipher::new(
            "openssl",
            runner,
            Duration::from_secs(180),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_encrypt_command() {
        let runner = Arc::new(Recorder::default());
        cipher(runner.clone())
            .encrypt_file(Path::new("/tmp/x.gz"), Path::new("/tmp/x.aes"), "hunter2")
            .unwrap();

        let calls = runner.calls.borrow();
        let (cmd, timeout) = &calls[0];
        assert_eq!(*timeout, Duration::from_secs(180));
        assert!(cmd.has_arg("-salt") && cmd.has_arg("-pbkdf2"));
        assert!(!cmd.has_arg("-d"));
        assert_eq!(cmd.value_after("-in"), Some("/tmp/x.gz"));
        assert_eq!(cmd.value_after("-out"), Some("/tmp/x.aes"));
        assert!(!cmd.argv().iter().any(|a| a.contains("hunter2")));
        assert_eq!(
            cmd.env_vars(),
            &[(PASSPHRASE_ENV.to_string(), "hunter2".to_string())]
        );
    }

    #[test]
    fn test_decrypt_command_and_failure() {
        let runner = Arc::new(Recorder {
            fail_with: Some("bad decrypt".into()),
            ..Default::default()
        });
        let err = cipher(runner.clone())
            .decrypt_file(Path::new("/tmp/x.aes"), Path::new("/tmp/x.gz"), "wrong")
            .unwrap_err();

        assert!(matches!(err, BackupError::Decryption(_)));
        assert!(err.to_string().contains("bad decrypt"));
        let calls = runner.calls.borrow();
        assert!(calls[0].0.has_arg("-d"));
        assert_eq!(calls[0].1, Duration::from_secs(300));
    }

    #[test]
    fn test_decrypt_accepts_gzip_output() {
        let (_dir, result) = decrypt_to(gzip(b"mongodump archive"));
        result.unwrap();
    }

    #[test]
    fn test_decrypt_rejects_garbage_that_passed_padding() {
        let (_dir, result) = decrypt_to(vec![89, 245, 66, 241, 3, 17, 200, 9]);
        let err = result.unwrap_err();
        assert!(matches!(err, BackupError::Decryption(_)));
        assert!(err.to_string().contains("wrong passphrase or corrupted artifact"));
    }

    #[test]
    fn test_decrypt_rejects_bad_gzip_checksum() {
        let mut archive = gzip(b"mongodump archive");
        // The CRC-32 sits in the 8-byte trailer
        let crc = archive.len() - 8;
        archive[crc] ^= 0xFF;

        let (_dir, result) = decrypt_to(archive);
        assert!(matches!(result, Err(BackupError::Decryption(_))));
    }

    #[test]
    fn test_decrypt_rejects_empty_output() {
        let (_dir, result) = decrypt_to(Vec::new());
        assert!(matches!(result, Err(BackupError::Decryption(_))));
    }

    #[cfg(unix)]
    mod system {
        use super::*;
        use crate::backup::ArtifactNamer;
        use crate::crypto::EncryptionEnvelope;
        use crate::process::SystemRunner;

        const NAME: &str = "orders-1700000000";

        fn openssl_available() -> bool {
            std::process::Command::new("openssl")
                .arg("version")
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false)
        }

        fn sealed_envelope(dir: &TempDir, archive: &[u8]) -> EncryptionEnvelope {
            let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());
            let envelope = EncryptionEnvelope::new(
                ArtifactNamer::new(dir.path()),
                Box::new(OpensslCipher::new(
                    "openssl",
                    runner,
                    Duration::from_secs(30),
                    Duration::from_secs(30),
                )),
            );
            fs::write(envelope.namer().dump_path(NAME), archive).unwrap();
            envelope.seal(NAME, "hunter2").unwrap();
            envelope
        }

        #[test]
        fn test_round_trip_through_openssl() {
            if !openssl_available() {
                eprintln!("openssl not on PATH, skipping");
                return;
            }
            let dir = TempDir::new().unwrap();
            let archive = gzip(b"mongodump archive bytes");
            let envelope = sealed_envelope(&dir, &archive);

            let plain = envelope.namer().dump_path(NAME);
            assert!(!plain.exists());
            assert!(envelope.namer().encrypted_path(NAME).exists());

            envelope.open(NAME, "hunter2").unwrap();
            assert_eq!(fs::read(&plain).unwrap(), archive);
        }

        #[test]
        fn test_wrong_passphrases_never_yield_output() {
            if !openssl_available() {
                eprintln!("openssl not on PATH, skipping");
                return;
            }
            let dir = TempDir::new().unwrap();
            let envelope = sealed_envelope(&dir, &gzip(b"mongodump archive bytes"));
            let plain = envelope.namer().dump_path(NAME);

            // Enough attempts that some get past the CBC padding check
            for i in 0..512 {
                let passphrase = format!("wrong-{}", i);
                let err = envelope.open(NAME, &passphrase).unwrap_err();
                assert!(
                    matches!(err, BackupError::Decryption(_)),
                    "{} gave {}",
                    passphrase,
                    err
                );
                assert!(!plain.exists(), "{} left output behind", passphrase);
            }
        }
    }
}
