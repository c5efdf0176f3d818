//! Configuration loader. A config file decides whether stored containers are
//! sealed and, if so, where the vault key comes from.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;

use crate::crypto::secrets::SecretVault;
use crate::persistence::PersistenceHandler;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("vault error: {0}")]
    Vault(String),
    #[error("no usable vault key source configured")]
    MissingKeySource,
}

#[derive(Debug, Default, Deserialize)]
pub struct VaultConfig {
    /// Base64-encoded 32 byte key stored in an environment variable.
    pub key_env: Option<String>,
    /// Path to a file that contains the base64-encoded key.
    pub key_path: Option<PathBuf>,
    /// Environment variable that stores a local passphrase (for Argon2id KDF).
    pub passphrase_env: Option<String>,
    /// Base64-encoded salt used alongside the passphrase.
    pub salt_b64: Option<String>,
}

impl VaultConfig {
    fn build_vault(&self) -> Result<SecretVault, ConfigError> {
        if let Some(var) = &self.key_env {
            return SecretVault::from_env_var(var).map_err(|e| ConfigError::Vault(format!("{e}")));
        }
        if let Some(path) = &self.key_path {
            return SecretVault::from_key_file(path).map_err(|e| ConfigError::Vault(format!("{e}")));
        }
        if let (Some(pass_env), Some(salt_b64)) = (&self.passphrase_env, &self.salt_b64) {
            let passphrase = std::env::var(pass_env)
                .map_err(|e| ConfigError::Vault(format!("{pass_env}: {e}")))?;
            let salt = STANDARD_NO_PAD
                .decode(salt_b64.as_bytes())
                .map_err(|e| ConfigError::Vault(format!("{e}")))?;
            return SecretVault::derive_from_passphrase(&passphrase, &salt)
                .map_err(|e| ConfigError::Vault(format!("{e}")));
        }
        Err(ConfigError::MissingKeySource)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    pub vault: Option<VaultConfig>,
    #[serde(rename = "debugLevel")]
    pub debug_level: Option<String>,
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub handler: PersistenceHandler,
    pub debug_level: Option<String>,
}

impl RawConfig {
    /// Resolves the vault key source, if any, into a ready handler.
    pub fn into_runtime(self) -> Result<RuntimeConfig, ConfigError> {
        let handler = match &self.vault {
            Some(vault_config) => {
                let master = vault_config.build_vault()?;
                PersistenceHandler::sealed(&master).map_err(|e| ConfigError::Vault(format!("{e}")))?
            }
            None => PersistenceHandler::new(),
        };
        Ok(RuntimeConfig {
            handler,
            debug_level: self.debug_level,
        })
    }
}

/// Loads the JSON configuration file and builds the persistence handler it
/// describes. Key material never leaves this function unwrapped.
pub fn load_config(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    let raw_config: RawConfig =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;
    raw_config.into_runtime()
}

#[cfg(test)]
mod tests {
    use super::{load_config, ConfigError};
    use crate::container::Container;
    use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
    use serde_json::json;
    use std::fs;
    use tempfile::{tempdir, NamedTempFile};

    fn write_config(payload: serde_json::Value) -> NamedTempFile {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), serde_json::to_vec(&payload).unwrap()).unwrap();
        file
    }

    #[test]
    fn plain_handler_without_vault() {
        let file = write_config(json!({ "debugLevel": "debug" }));
        let config = load_config(file.path()).expect("config should load");
        assert!(!config.handler.is_sealed());
        assert_eq!(config.debug_level.as_deref(), Some("debug"));
    }

    #[test]
    fn sealed_handler_from_passphrase() {
        let salt = b"static-test-salt-123";
        let passphrase_var = "BINCONF_TEST_PASSPHRASE";
        std::env::set_var(passphrase_var, "pa55phrase");

        let file = write_config(json!({
            "vault": {
                "key_env": null,
                "key_path": null,
                "passphrase_env": passphrase_var,
                "salt_b64": STANDARD_NO_PAD.encode(salt)
            }
        }));
        let config = load_config(file.path()).expect("config should load");
        assert!(config.handler.is_sealed());

        let dir = tempdir().expect("temp dir");
        let name = dir.path().join("cfg.bin").to_string_lossy().into_owned();
        let container = Container::with_values(name.clone(), ["a", "b"]).unwrap();
        config.handler.write(&container).expect("sealed write");

        let reloaded = load_config(file.path()).expect("config should load again");
        assert_eq!(reloaded.handler.read(&name).expect("sealed read"), container);
    }

    #[test]
    fn sealed_handler_from_key_env() {
        let key_var = "BINCONF_TEST_KEY";
        std::env::set_var(key_var, STANDARD_NO_PAD.encode([11u8; 32]));
        let file = write_config(json!({ "vault": { "key_env": key_var } }));
        assert!(load_config(file.path()).expect("config should load").handler.is_sealed());
    }

    #[test]
    fn vault_without_key_source_is_rejected() {
        let file = write_config(json!({ "vault": {} }));
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKeySource));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), b"{ not json").unwrap();
        assert!(matches!(load_config(file.path()).unwrap_err(), ConfigError::Parse(_)));
    }
}
