//! Backup export and import
//!
//! The manager ties format, KDF, and AEAD together. Exports always use the
//! manager's preferred algorithms unless overridden per call; imports accept
//! any supported algorithm combination regardless of preferences, so changing
//! preferences never strands old backups.

use crate::backup::aead;
use crate::backup::format::*;
use crate::backup::kdf::derive_key;
use crate::keys::{KeyPair, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Per-export options
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Label stored in the backup metadata
    pub label: Option<String>,
    /// KDF override for this export
    pub kdf: Option<String>,
    /// AEAD override for this export
    pub encryption: Option<String>,
    /// KDF parameter overrides, floors still apply
    pub kdf_params: Option<CustomKdfParams>,
}

/// Caller-supplied KDF parameter overrides
#[derive(Debug, Clone, Default)]
pub struct CustomKdfParams {
    pub iterations: Option<u32>,
    pub memory: Option<u32>,
    pub parallelism: Option<u32>,
}

/// Exports and imports encrypted Ed25519 key backups
#[derive(Debug)]
pub struct KeyBackupManager {
    preferred_kdf: String,
    preferred_encryption: String,
}

impl Default for KeyBackupManager {
    fn default() -> Self {
        Self {
            preferred_kdf: "argon2id".to_string(),
            preferred_encryption: "xchacha20-poly1305".to_string(),
        }
    }
}

impl KeyBackupManager {
    /// Manager with the default argon2id + xchacha20-poly1305 preferences
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with explicit algorithm preferences
    pub fn with_preferences(kdf: &str, encryption: &str) -> BackupResult<Self> {
        validate_algorithms(kdf, encryption)?;
        Ok(Self {
            preferred_kdf: kdf.to_string(),
            preferred_encryption: encryption.to_string(),
        })
    }

    /// Export a key pair as an encrypted JSON backup
    pub fn export_key(
        &self,
        key_pair: &KeyPair,
        passphrase: &str,
        options: ExportOptions,
    ) -> BackupResult<String> {
        validate_passphrase(passphrase)?;

        let kdf = options.kdf.unwrap_or_else(|| self.preferred_kdf.clone());
        let encryption = options
            .encryption
            .unwrap_or_else(|| self.preferred_encryption.clone());
        validate_algorithms(&kdf, &encryption)?;

        let kdf_params = resolve_kdf_params(&kdf, options.kdf_params.as_ref())?;

        let mut salt = [0u8; PREFERRED_SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = vec![0u8; nonce_length(&encryption)?];
        OsRng.fill_bytes(&mut nonce);

        let encryption_key = derive_key(passphrase, &salt, &kdf, &kdf_params)?;

        // Plaintext is the 32 secret bytes followed by the 32 public bytes
        let mut plaintext = Zeroizing::new(Vec::with_capacity(64));
        plaintext.extend_from_slice(&key_pair.secret_key_bytes());
        plaintext.extend_from_slice(&key_pair.public_key_bytes());

        let ciphertext = aead::encrypt(&encryption, &encryption_key, &nonce, &plaintext)?;

        let record = BackupRecord {
            version: BACKUP_FORMAT_VERSION,
            kdf,
            kdf_params: KdfParams {
                salt: general_purpose::STANDARD.encode(salt),
                ..kdf_params
            },
            encryption,
            nonce: general_purpose::STANDARD.encode(&nonce),
            ciphertext: general_purpose::STANDARD.encode(&ciphertext),
            created: Utc::now().to_rfc3339(),
            metadata: options.label.map(|label| BackupMetadata {
                key_type: "ed25519".to_string(),
                label: Some(label),
            }),
        };

        log::debug!(
            "exported key backup ({} / {})",
            record.kdf,
            record.encryption
        );

        serde_json::to_string_pretty(&record)
            .map_err(|e| BackupError::Serialization(e.to_string()))
    }

    /// Import a key pair from an encrypted JSON backup
    ///
    /// With `verify_integrity` the stored public half must match the one
    /// derived from the recovered secret key.
    pub fn import_key(
        &self,
        backup_data: &str,
        passphrase: &str,
        verify_integrity: bool,
    ) -> BackupResult<(KeyPair, Option<BackupMetadata>)> {
        let record: BackupRecord = serde_json::from_str(backup_data)
            .map_err(|e| BackupError::InvalidFormat(format!("invalid JSON: {}", e)))?;
        validate_record(&record)?;

        let salt = decode_field(&record.kdf_params.salt, "salt")?;
        if salt.len() < MIN_SALT_LENGTH {
            return Err(BackupError::CorruptedBackup(format!(
                "salt length {} below minimum {}",
                salt.len(),
                MIN_SALT_LENGTH
            )));
        }
        let nonce = decode_field(&record.nonce, "nonce")?;
        let ciphertext = decode_field(&record.ciphertext, "ciphertext")?;

        let decryption_key = derive_key(passphrase, &salt, &record.kdf, &record.kdf_params)?;
        let plaintext = Zeroizing::new(aead::decrypt(
            &record.encryption,
            &decryption_key,
            &nonce,
            &ciphertext,
        )?);

        if plaintext.len() != SECRET_KEY_LENGTH + PUBLIC_KEY_LENGTH {
            return Err(BackupError::CorruptedBackup(format!(
                "decrypted key material is {} bytes, expected {}",
                plaintext.len(),
                SECRET_KEY_LENGTH + PUBLIC_KEY_LENGTH
            )));
        }

        let key_pair = KeyPair::from_secret_bytes(&plaintext[..SECRET_KEY_LENGTH])
            .map_err(|e| BackupError::CorruptedBackup(e.to_string()))?;

        if verify_integrity
            && key_pair.public_key_bytes()[..] != plaintext[SECRET_KEY_LENGTH..]
        {
            return Err(BackupError::CorruptedBackup(
                "stored public key does not match the recovered secret key".to_string(),
            ));
        }

        Ok((key_pair, record.metadata))
    }
}

fn validate_passphrase(passphrase: &str) -> BackupResult<()> {
    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(BackupError::WeakPassphrase(format!(
            "passphrase must be at least {} characters",
            MIN_PASSPHRASE_LENGTH
        )));
    }
    Ok(())
}

fn resolve_kdf_params(kdf: &str, custom: Option<&CustomKdfParams>) -> BackupResult<KdfParams> {
    let params = match kdf {
        "argon2id" => KdfParams {
            salt: String::new(),
            iterations: custom
                .and_then(|p| p.iterations)
                .unwrap_or(ARGON2_MIN_ITERATIONS),
            memory: Some(custom.and_then(|p| p.memory).unwrap_or(ARGON2_MIN_MEMORY)),
            parallelism: Some(
                custom
                    .and_then(|p| p.parallelism)
                    .unwrap_or(ARGON2_MIN_PARALLELISM),
            ),
            hash: None,
        },
        "pbkdf2" => KdfParams {
            salt: String::new(),
            iterations: custom
                .and_then(|p| p.iterations)
                .unwrap_or(PBKDF2_MIN_ITERATIONS),
            memory: None,
            parallelism: None,
            hash: Some("SHA-256".to_string()),
        },
        other => {
            return Err(BackupError::UnsupportedAlgorithm(format!(
                "unsupported KDF: {}",
                other
            )))
        }
    };
    validate_kdf_floors(kdf, params.iterations, params.memory, params.parallelism)?;
    Ok(params)
}

fn decode_field(value: &str, field: &str) -> BackupResult<Vec<u8>> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|e| BackupError::InvalidFormat(format!("invalid {} encoding: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str = "correct horse battery staple";

    #[test]
    fn test_export_import_round_trip() {
        let manager = KeyBackupManager::new();
        let original = KeyPair::generate();

        let backup = manager
            .export_key(&original, PASSPHRASE, ExportOptions::default())
            .unwrap();
        let (restored, metadata) = manager.import_key(&backup, PASSPHRASE, true).unwrap();

        assert_eq!(original.public_key_bytes(), restored.public_key_bytes());
        assert!(metadata.is_none());
    }

    #[test]
    fn test_label_produces_metadata() {
        let manager = KeyBackupManager::new();
        let key_pair = KeyPair::generate();
        let options = ExportOptions {
            label: Some("workstation".to_string()),
            ..Default::default()
        };

        let backup = manager.export_key(&key_pair, PASSPHRASE, options).unwrap();
        let (_, metadata) = manager.import_key(&backup, PASSPHRASE, true).unwrap();

        let metadata = metadata.expect("label carried through");
        assert_eq!(metadata.key_type, "ed25519");
        assert_eq!(metadata.label.as_deref(), Some("workstation"));
    }

    #[test]
    fn test_short_passphrase_rejected() {
        let manager = KeyBackupManager::new();
        let key_pair = KeyPair::generate();
        assert!(matches!(
            manager.export_key(&key_pair, "short", ExportOptions::default()),
            Err(BackupError::WeakPassphrase(_))
        ));
    }

    #[test]
    fn test_below_floor_custom_params_rejected() {
        let manager = KeyBackupManager::new();
        let key_pair = KeyPair::generate();
        let options = ExportOptions {
            kdf_params: Some(CustomKdfParams {
                iterations: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            manager.export_key(&key_pair, PASSPHRASE, options),
            Err(BackupError::InsufficientKdfParams(_))
        ));
    }

    #[test]
    fn test_preferences_validated_up_front() {
        assert!(KeyBackupManager::with_preferences("argon2id", "aes-gcm").is_ok());
        assert!(KeyBackupManager::with_preferences("bcrypt", "aes-gcm").is_err());
        assert!(KeyBackupManager::with_preferences("pbkdf2", "des").is_err());
    }
}
