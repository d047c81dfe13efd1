//! In-process AES-256-GCM artifact cipher
//!
//! Artifacts are encrypted in fixed-size chunks so dumps of any size stream
//! through a bounded buffer. Layout:
//!
//! ```text
//! header: "MBAK" | version u8 | memory_cost u32 | time_cost u32 | parallelism u32
//!         | salt [16] | nonce prefix [7]
//! frame:  last u8 | length u32 | ciphertext+tag [length]     (repeated)
//! ```
//!
//! Each chunk nonce is `prefix | counter u32 | last u8`, so reordered,
//! dropped or truncated frames fail authentication. Integers are big-endian.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::{rand_core::RngCore, Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};

use super::envelope::Cipher;
use super::key_derivation::{derive_key, generate_salt, KeyDerivationParams, SALT_SIZE};
use crate::error::{BackupError, BackupResult};

const MAGIC: &[u8; 4] = b"MBAK";
const FORMAT_VERSION: u8 = 1;
const NONCE_PREFIX_SIZE: usize = 7;
const TAG_SIZE: usize = 16;

/// Default plaintext chunk size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

// Upper bound on a single frame, so a corrupted length can't force a huge allocation
const MAX_FRAME: usize = 64 * 1024 * 1024 + TAG_SIZE;

/// Argon2id + AES-256-GCM cipher running inside this process
#[derive(Debug, Clone)]
pub struct NativeCipher {
    params: KeyDerivationParams,
    chunk_size: usize,
}

impl NativeCipher {
    pub fn new(params: KeyDerivationParams) -> Self {
        Self {
            params,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the plaintext chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_FRAME - TAG_SIZE);
        self
    }
}

impl Cipher for NativeCipher {
    fn name(&self) -> &'static str {
        "native aes-256-gcm"
    }

    fn encrypt_file(&self, input: &Path, output: &Path, passphrase: &str) -> BackupResult<()> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            BackupError::Encryption(format!("{}: {}", what, e))
        };

        let source = File::open(input)
            .map_err(|e| fail(&format!("cannot read {}", input.display()), &e))?;

        let salt = generate_salt();
        let mut prefix = [0u8; NONCE_PREFIX_SIZE];
        OsRng.fill_bytes(&mut prefix);

        let key = derive_key(passphrase, &salt, &self.params)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| fail("failed to create cipher", &e))?;

        write_atomically(output, |writer| {
            write_header(writer, &self.params, &salt, &prefix)?;
            seal_chunks(&cipher, &prefix, self.chunk_size, BufReader::new(source), writer)
        })
        .map_err(|e| fail(&format!("cannot write {}", output.display()), &e))
    }

    fn decrypt_file(&self, input: &Path, output: &Path, passphrase: &str) -> BackupResult<()> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            BackupError::Decryption(format!("{}: {}", what, e))
        };

        let file = File::open(input)
            .map_err(|e| fail(&format!("cannot read {}", input.display()), &e))?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader).map_err(|e| fail("invalid artifact header", &e))?;
        let key = derive_key(passphrase, &header.salt, &header.params)
            .map_err(|e| fail("cannot derive key", &e))?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| fail("failed to create cipher", &e))?;

        write_atomically(output, |writer| {
            open_chunks(&cipher, &header.prefix, &mut reader, writer)
        })
        .map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => fail("wrong passphrase or corrupted artifact", &e),
            _ => fail(&format!("cannot write {}", output.display()), &e),
        })
    }
}

struct Header {
    params: KeyDerivationParams,
    salt: [u8; SALT_SIZE],
    prefix: [u8; NONCE_PREFIX_SIZE],
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn chunk_nonce(prefix: &[u8; NONCE_PREFIX_SIZE], counter: u32, last: bool) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..NONCE_PREFIX_SIZE].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_SIZE..11].copy_from_slice(&counter.to_be_bytes());
    nonce[11] = u8::from(last);
    nonce
}

fn write_header<W: Write>(
    writer: &mut W,
    params: &KeyDerivationParams,
    salt: &[u8; SALT_SIZE],
    prefix: &[u8; NONCE_PREFIX_SIZE],
) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])?;
    writer.write_all(&params.memory_cost.to_be_bytes())?;
    writer.write_all(&params.time_cost.to_be_bytes())?;
    writer.write_all(&params.parallelism.to_be_bytes())?;
    writer.write_all(salt)?;
    writer.write_all(prefix)
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_header<R: Read>(reader: &mut R) -> io::Result<Header> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(invalid("not a mongo-backup artifact"));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != FORMAT_VERSION {
        return Err(invalid(format!("unsupported artifact version {}", version[0])));
    }

    let params = KeyDerivationParams::with_values(
        read_u32(reader)?,
        read_u32(reader)?,
        read_u32(reader)?,
    );
    params.check_limits().map_err(invalid)?;

    let mut salt = [0u8; SALT_SIZE];
    reader.read_exact(&mut salt)?;
    let mut prefix = [0u8; NONCE_PREFIX_SIZE];
    reader.read_exact(&mut prefix)?;

    Ok(Header {
        params,
        salt,
        prefix,
    })
}

/// Fill `buf` from `reader`, stopping early only at end of input
fn read_chunk<R: Read>(reader: &mut R, chunk_size: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

fn seal_chunks<R: Read, W: Write>(
    cipher: &Aes256Gcm,
    prefix: &[u8; NONCE_PREFIX_SIZE],
    chunk_size: usize,
    mut reader: R,
    writer: &mut W,
) -> io::Result<()> {
    let mut counter: u32 = 0;
    let mut current = read_chunk(&mut reader, chunk_size)?;

    loop {
        // A full chunk may still be the last one; look ahead to find out
        let next = if current.len() == chunk_size {
            read_chunk(&mut reader, chunk_size)?
        } else {
            Vec::new()
        };
        let last = next.is_empty();

        let nonce = chunk_nonce(prefix, counter, last);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), current.as_slice())
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "chunk encryption failed"))?;

        writer.write_all(&[u8::from(last)])?;
        writer.write_all(&(sealed.len() as u32).to_be_bytes())?;
        writer.write_all(&sealed)?;

        if last {
            return Ok(());
        }

        counter = counter
            .checked_add(1)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "input too large"))?;
        current = next;
    }
}

fn open_chunks<R: Read, W: Write>(
    cipher: &Aes256Gcm,
    prefix: &[u8; NONCE_PREFIX_SIZE],
    reader: &mut R,
    writer: &mut W,
) -> io::Result<()> {
    let mut counter: u32 = 0;

    loop {
        let mut flag = [0u8; 1];
        reader.read_exact(&mut flag).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => invalid("artifact is truncated"),
            _ => e,
        })?;
        let last = match flag[0] {
            0 => false,
            1 => true,
            other => return Err(invalid(format!("bad frame marker {}", other))),
        };

        let len = read_u32(reader).map_err(|_| invalid("artifact is truncated"))? as usize;
        if !(TAG_SIZE..=MAX_FRAME).contains(&len) {
            return Err(invalid(format!("bad frame length {}", len)));
        }

        let mut sealed = vec![0u8; len];
        reader
            .read_exact(&mut sealed)
            .map_err(|_| invalid("artifact is truncated"))?;

        let nonce = chunk_nonce(prefix, counter, last);
        let plain = cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| invalid("authentication failed"))?;
        writer.write_all(&plain)?;

        if last {
            let mut trailing = [0u8; 1];
            if reader.read(&mut trailing)? != 0 {
                return Err(invalid("unexpected data after final frame"));
            }
            return Ok(());
        }

        counter = counter
            .checked_add(1)
            .ok_or_else(|| invalid("too many frames"))?;
    }
}

/// Sibling temp path used while an output file is being produced
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write through a temp file and rename into place, so `path` is either
/// complete or absent
fn write_atomically<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let temp = temp_path(path);
    let result = File::create(&temp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    });

    match result.and_then(|_| fs::rename(&temp, path)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&temp);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cipher() -> NativeCipher {
        NativeCipher::new(KeyDerivationParams::with_values(1024, 1, 1))
    }

    fn round_trip(cipher: &NativeCipher, data: &[u8]) -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("a.gz");
        let sealed = dir.path().join("a.aes");
        let restored = dir.path().join("b.gz");
        fs::write(&plain, data).unwrap();

        cipher.encrypt_file(&plain, &sealed, "hunter2").unwrap();
        cipher.decrypt_file(&sealed, &restored, "hunter2").unwrap();
        fs::read(&restored).unwrap()
    }

    #[test]
    fn test_round_trip_small() {
        assert_eq!(round_trip(&cipher(), b"Hello, World!"), b"Hello, World!");
    }

    #[test]
    fn test_round_trip_empty() {
        assert!(round_trip(&cipher(), b"").is_empty());
    }

    #[test]
    fn test_round_trip_multiple_chunks() {
        let data: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
        let small = cipher().with_chunk_size(1000);
        assert_eq!(round_trip(&small, &data), data);

        // Exact multiple of the chunk size
        let exact: Vec<u8> = data[..3000].to_vec();
        assert_eq!(round_trip(&small, &exact), exact);
    }

    #[test]
    fn test_output_is_not_plaintext() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("a.gz");
        let sealed = dir.path().join("a.aes");
        fs::write(&plain, b"very recognizable plaintext").unwrap();

        cipher().encrypt_file(&plain, &sealed, "pw").unwrap();
        let bytes = fs::read(&sealed).unwrap();
        assert!(bytes.starts_with(MAGIC));
        assert!(!bytes
            .windows(b"recognizable".len())
            .any(|w| w == b"recognizable"));
        assert!(!temp_path(&sealed).exists());
    }

    #[test]
    fn test_wrong_passphrase_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("a.gz");
        let sealed = dir.path().join("a.aes");
        let restored = dir.path().join("b.gz");
        fs::write(&plain, b"secret data").unwrap();

        cipher().encrypt_file(&plain, &sealed, "right").unwrap();
        let err = cipher().decrypt_file(&sealed, &restored, "wrong").unwrap_err();

        assert!(matches!(err, BackupError::Decryption(_)));
        assert!(!restored.exists());
        assert!(!temp_path(&restored).exists());
    }

    #[test]
    fn test_tampered_artifact_fails() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("a.gz");
        let sealed = dir.path().join("a.aes");
        let restored = dir.path().join("b.gz");
        fs::write(&plain, b"secret data").unwrap();
        cipher().encrypt_file(&plain, &sealed, "pw").unwrap();

        let mut bytes = fs::read(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&sealed, &bytes).unwrap();

        let err = cipher().decrypt_file(&sealed, &restored, "pw").unwrap_err();
        assert!(matches!(err, BackupError::Decryption(_)));
    }

    #[test]
    fn test_truncated_artifact_fails() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("a.gz");
        let sealed = dir.path().join("a.aes");
        let restored = dir.path().join("b.gz");
        let data: Vec<u8> = (0..5000).map(|i| i as u8).collect();
        fs::write(&plain, &data).unwrap();

        let small = cipher().with_chunk_size(1000);
        small.encrypt_file(&plain, &sealed, "pw").unwrap();

        // Drop the final frame entirely
        let bytes = fs::read(&sealed).unwrap();
        let frame = 1 + 4 + 1000 + TAG_SIZE;
        fs::write(&sealed, &bytes[..bytes.len() - frame]).unwrap();

        let err = small.decrypt_file(&sealed, &restored, "pw").unwrap_err();
        assert!(matches!(err, BackupError::Decryption(_)));
        assert!(!restored.exists());
    }

    #[test]
    fn test_not_an_artifact() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("a.aes");
        fs::write(&bogus, b"Salted__garbage").unwrap();

        let err = cipher()
            .decrypt_file(&bogus, &dir.path().join("a.gz"), "pw")
            .unwrap_err();
        assert!(err.to_string().contains("invalid artifact header"));
    }

    #[test]
    fn test_oversized_header_costs_rejected() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("a.gz");
        let sealed = dir.path().join("a.aes");
        let restored = dir.path().join("b.gz");
        fs::write(&plain, b"secret data").unwrap();
        cipher().encrypt_file(&plain, &sealed, "pw").unwrap();

        // memory_cost follows the magic and version byte
        let mut bytes = fs::read(&sealed).unwrap();
        bytes[5..9].copy_from_slice(&u32::MAX.to_be_bytes());
        fs::write(&sealed, &bytes).unwrap();

        let err = cipher().decrypt_file(&sealed, &restored, "pw").unwrap_err();
        assert!(matches!(err, BackupError::Decryption(_)));
        assert!(err.to_string().contains("memory cost"));
        assert!(!restored.exists());
    }

    #[test]
    fn test_missing_input_is_encryption_error() {
        let dir = TempDir::new().unwrap();
        let err = cipher()
            .encrypt_file(&dir.path().join("nope.gz"), &dir.path().join("nope.aes"), "pw")
            .unwrap_err();
        assert!(matches!(err, BackupError::Encryption(_)));
    }
}
