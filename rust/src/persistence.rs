//! Writes one container per file and restores it.
//!
//! The file written for a container is the bincode encoding of a small frame:
//! magic, format version, and a body that is either the plain `Envelope` or,
//! when the handler was built with a vault, the sealed bincode bytes of that
//! envelope. Writes land in a uniquely named temporary file beside the target
//! and are renamed over it, so callers never observe a half-written file.
//!
//! Both directions take an exclusive, non-blocking lock on the existing target
//! file. When two operations overlap on one path, the one that finds the lock
//! taken fails with `PersistError::Io` (kind `WouldBlock`) without touching
//! the file.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::container::Container;
use crate::crypto::secrets::{SealedPayload, SecretVault};
use crate::envelope::{Envelope, EnvelopeKind};
use crate::single::SingleValueContainer;

const MAGIC: [u8; 4] = *b"BCF1";
const FORMAT_VERSION: u16 = 1;
const FILE_KEY_INFO: &[u8] = b"binconf:envelope:v1";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot persist: {0}")]
    CannotPersist(String),
    #[error("cannot restore a {expected}: the file holds a {found}")]
    CannotRestore {
        expected: EnvelopeKind,
        found: EnvelopeKind,
    },
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("vault error: {0}")]
    Vault(String),
}

#[derive(Serialize, Deserialize)]
enum Body {
    Plain(Envelope),
    Sealed(SealedPayload),
}

#[derive(Serialize, Deserialize)]
struct StoredFile {
    magic: [u8; 4],
    version: u16,
    body: Body,
}

fn associated_data() -> Vec<u8> {
    let mut aad = MAGIC.to_vec();
    aad.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    aad
}

fn lock_exclusive(file: &File, path: &Path) -> Result<(), PersistError> {
    file.try_lock().map_err(|err| match err {
        TryLockError::WouldBlock => PersistError::Io(io::Error::new(
            io::ErrorKind::WouldBlock,
            format!("{} is locked by another operation", path.display()),
        )),
        TryLockError::Error(err) => PersistError::Io(err),
    })
}

/// Opens and locks the current target, if there is one. The guard is held
/// until the replacement has been renamed into place.
fn lock_existing_target(path: &Path) -> Result<Option<File>, PersistError> {
    match OpenOptions::new().write(true).open(path) {
        Ok(file) => {
            lock_exclusive(&file, path)?;
            Ok(Some(file))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn staging_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn encoding_error(err: bincode::Error) -> PersistError {
    PersistError::Encoding(format!("{err}"))
}

/// Stateless between calls apart from the optional file key: every write or
/// read opens, transfers the whole payload, and closes before returning.
#[derive(Debug, Default)]
pub struct PersistenceHandler {
    file_key: Option<SecretVault>,
}

impl PersistenceHandler {
    /// Handler that stores envelopes without any confidentiality transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that seals every envelope under a file key derived from `master`.
    pub fn sealed(master: &SecretVault) -> Result<Self, PersistError> {
        let file_key = master
            .derive_subkey(FILE_KEY_INFO)
            .map_err(|e| PersistError::Vault(format!("{e}")))?;
        Ok(Self {
            file_key: Some(file_key),
        })
    }

    pub fn is_sealed(&self) -> bool {
        self.file_key.is_some()
    }

    /// Persists a `Container` or `SingleValueContainer` to the path named by
    /// the container, replacing any previous content. Returns that path.
    pub fn write(&self, item: impl Into<Envelope>) -> Result<PathBuf, PersistError> {
        let envelope = item.into();
        let kind = envelope.kind();
        let path = match envelope.target() {
            None => {
                return Err(PersistError::CannotPersist(
                    "no container was supplied".to_string(),
                ))
            }
            Some("") => {
                return Err(PersistError::CannotPersist(
                    "container name is empty".to_string(),
                ))
            }
            Some(name) => PathBuf::from(name),
        };

        let bytes = self.encode(envelope)?;
        let _guard = lock_existing_target(&path)?;

        // Dropping the staged file on any error path removes it.
        let mut staged = NamedTempFile::new_in(staging_dir(&path))?;
        staged.write_all(&bytes)?;
        staged.flush()?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|err| PersistError::Io(err.error))?;

        debug!(path = %path.display(), %kind, bytes = bytes.len(), sealed = self.is_sealed(), "container written");
        Ok(path)
    }

    /// Like `write`, reporting failure as `false` instead of an error.
    pub fn try_write(&self, item: impl Into<Envelope>) -> bool {
        match self.write(item) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "container write failed");
                false
            }
        }
    }

    /// Restores whatever envelope is stored at `path`.
    pub fn read_envelope(&self, path: impl AsRef<Path>) -> Result<Envelope, PersistError> {
        let path = path.as_ref();
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PersistError::FileNotFound(path.to_path_buf()))
            }
            Err(err) => return Err(err.into()),
        };
        lock_exclusive(&file, path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        drop(file);
        let envelope = self.decode(&bytes)?;
        debug!(path = %path.display(), kind = %envelope.kind(), bytes = bytes.len(), "envelope read");
        Ok(envelope)
    }

    /// Restores a `Container`; fails with `CannotRestore` when the file holds
    /// another kind.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Container, PersistError> {
        let envelope = self.read_envelope(path)?;
        let found = envelope.kind();
        envelope.into_container().ok_or(PersistError::CannotRestore {
            expected: EnvelopeKind::Container,
            found,
        })
    }

    /// Restores a `SingleValueContainer`; fails with `CannotRestore` when the
    /// file holds another kind.
    pub fn read_single(&self, path: impl AsRef<Path>) -> Result<SingleValueContainer, PersistError> {
        let envelope = self.read_envelope(path)?;
        let found = envelope.kind();
        envelope.into_single().ok_or(PersistError::CannotRestore {
            expected: EnvelopeKind::Single,
            found,
        })
    }

    pub fn try_read(&self, path: impl AsRef<Path>) -> Option<Container> {
        self.read(path)
            .map_err(|err| warn!(error = %err, "container read failed"))
            .ok()
    }

    pub fn try_read_single(&self, path: impl AsRef<Path>) -> Option<SingleValueContainer> {
        self.read_single(path)
            .map_err(|err| warn!(error = %err, "single-value container read failed"))
            .ok()
    }

    fn encode(&self, envelope: Envelope) -> Result<Vec<u8>, PersistError> {
        let body = match &self.file_key {
            None => Body::Plain(envelope),
            Some(vault) => {
                let plain = bincode::serialize(&envelope).map_err(encoding_error)?;
                let sealed = vault
                    .seal(&plain, &associated_data())
                    .map_err(|e| PersistError::Vault(format!("{e}")))?;
                Body::Sealed(sealed)
            }
        };
        let stored = StoredFile {
            magic: MAGIC,
            version: FORMAT_VERSION,
            body,
        };
        bincode::serialize(&stored).map_err(encoding_error)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, PersistError> {
        let stored: StoredFile = bincode::deserialize(bytes).map_err(encoding_error)?;
        if stored.magic != MAGIC {
            return Err(PersistError::Encoding("not a binconf file".to_string()));
        }
        if stored.version != FORMAT_VERSION {
            return Err(PersistError::Encoding(format!(
                "unsupported format version {}",
                stored.version
            )));
        }

        match (stored.body, &self.file_key) {
            (Body::Plain(envelope), None) => Ok(envelope),
            (Body::Sealed(sealed), Some(vault)) => {
                let plain = vault
                    .open(&sealed, &associated_data())
                    .map_err(|e| PersistError::Vault(format!("{e}")))?;
                bincode::deserialize(&plain).map_err(encoding_error)
            }
            (Body::Plain(_), Some(_)) => Err(PersistError::Vault(
                "file is not sealed but this handler requires sealing".to_string(),
            )),
            (Body::Sealed(_), None) => Err(PersistError::Vault(
                "file is sealed and no vault is configured".to_string(),
            )),
        }
    }
}
