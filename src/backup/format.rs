//! Encrypted key backup wire format
//!
//! A backup is a JSON document carrying everything needed for decryption
//! except the passphrase: format version, KDF name and parameters, AEAD
//! algorithm, nonce, and ciphertext. Binary fields are standard base64.

use serde::{Deserialize, Serialize};

/// Current backup format version
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Minimum accepted salt length in bytes
pub const MIN_SALT_LENGTH: usize = 16;

/// Salt length used for new exports
pub const PREFERRED_SALT_LENGTH: usize = 32;

/// Nonce length for xchacha20-poly1305
pub const XCHACHA20_NONCE_LENGTH: usize = 24;

/// Nonce length for aes-gcm
pub const AES_GCM_NONCE_LENGTH: usize = 12;

// Argon2id parameter floors (preferred KDF)
pub const ARGON2_MIN_ITERATIONS: u32 = 3;
pub const ARGON2_MIN_MEMORY: u32 = 65536; // KiB
pub const ARGON2_MIN_PARALLELISM: u32 = 2;

// PBKDF2 parameter floor (compatibility KDF)
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// Minimum passphrase length in characters
pub const MIN_PASSPHRASE_LENGTH: usize = 8;

/// Errors from backup export and import
///
/// Decryption failures from a wrong passphrase and from corrupted ciphertext
/// are deliberately indistinguishable; the AEAD cannot tell them apart and
/// reporting a difference would be an oracle.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Weak passphrase: {0}")]
    WeakPassphrase(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    #[error("Insufficient KDF parameters: {0}")]
    InsufficientKdfParams(String),

    #[error("Corrupted backup: {0}")]
    CorruptedBackup(String),

    #[error("Decryption failed: wrong passphrase or corrupted backup")]
    WrongPassphraseOrCorrupted,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

/// Serialized backup document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub version: u32,
    /// KDF name, `argon2id` or `pbkdf2`
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// AEAD name, `xchacha20-poly1305` or `aes-gcm`
    pub encryption: String,
    /// Base64 nonce, length fixed by the AEAD
    pub nonce: String,
    /// Base64 AEAD ciphertext over the 64-byte key material
    pub ciphertext: String,
    /// RFC 3339 export timestamp
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BackupMetadata>,
}

/// KDF parameters embedded in a backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Base64 salt
    pub salt: String,
    /// Iteration count (argon2id passes or pbkdf2 rounds)
    pub iterations: u32,
    /// Memory cost in KiB, argon2id only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    /// Lane count, argon2id only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
    /// PRF hash, pbkdf2 only; `SHA-256` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Optional descriptive metadata attached to a backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub key_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Check the names a KDF/AEAD pair against the supported set
pub fn validate_algorithms(kdf: &str, encryption: &str) -> BackupResult<()> {
    if !["argon2id", "pbkdf2"].contains(&kdf) {
        return Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported KDF: {}",
            kdf
        )));
    }
    if !["xchacha20-poly1305", "aes-gcm"].contains(&encryption) {
        return Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported encryption: {}",
            encryption
        )));
    }
    Ok(())
}

/// Expected nonce length for an AEAD name
pub fn nonce_length(encryption: &str) -> BackupResult<usize> {
    match encryption {
        "xchacha20-poly1305" => Ok(XCHACHA20_NONCE_LENGTH),
        "aes-gcm" => Ok(AES_GCM_NONCE_LENGTH),
        other => Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported encryption: {}",
            other
        ))),
    }
}

/// Validate a parsed record's version, algorithms, and KDF parameter floors
pub fn validate_record(record: &BackupRecord) -> BackupResult<()> {
    if record.version != BACKUP_FORMAT_VERSION {
        return Err(BackupError::UnsupportedVersion(record.version));
    }
    validate_algorithms(&record.kdf, &record.encryption)?;
    validate_kdf_floors(
        &record.kdf,
        record.kdf_params.iterations,
        record.kdf_params.memory,
        record.kdf_params.parallelism,
    )
}

/// Reject KDF parameters below the accepted floors
pub fn validate_kdf_floors(
    kdf: &str,
    iterations: u32,
    memory: Option<u32>,
    parallelism: Option<u32>,
) -> BackupResult<()> {
    match kdf {
        "argon2id" => {
            if iterations < ARGON2_MIN_ITERATIONS {
                return Err(BackupError::InsufficientKdfParams(format!(
                    "argon2id iterations {} below minimum {}",
                    iterations, ARGON2_MIN_ITERATIONS
                )));
            }
            let memory = memory.ok_or_else(|| {
                BackupError::InsufficientKdfParams("argon2id requires memory".to_string())
            })?;
            if memory < ARGON2_MIN_MEMORY {
                return Err(BackupError::InsufficientKdfParams(format!(
                    "argon2id memory {} KiB below minimum {}",
                    memory, ARGON2_MIN_MEMORY
                )));
            }
            let parallelism = parallelism.ok_or_else(|| {
                BackupError::InsufficientKdfParams("argon2id requires parallelism".to_string())
            })?;
            if parallelism < ARGON2_MIN_PARALLELISM {
                return Err(BackupError::InsufficientKdfParams(format!(
                    "argon2id parallelism {} below minimum {}",
                    parallelism, ARGON2_MIN_PARALLELISM
                )));
            }
            Ok(())
        }
        "pbkdf2" => {
            if iterations < PBKDF2_MIN_ITERATIONS {
                return Err(BackupError::InsufficientKdfParams(format!(
                    "pbkdf2 iterations {} below minimum {}",
                    iterations, PBKDF2_MIN_ITERATIONS
                )));
            }
            Ok(())
        }
        other => Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported KDF: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BackupRecord {
        BackupRecord {
            version: BACKUP_FORMAT_VERSION,
            kdf: "argon2id".to_string(),
            kdf_params: KdfParams {
                salt: "c2FsdHNhbHRzYWx0c2FsdA==".to_string(),
                iterations: 3,
                memory: Some(65536),
                parallelism: Some(2),
                hash: None,
            },
            encryption: "xchacha20-poly1305".to_string(),
            nonce: String::new(),
            ciphertext: String::new(),
            created: "2025-01-01T00:00:00Z".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_valid_record_passes() {
        validate_record(&record()).expect("meets all floors");
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut r = record();
        r.version = 2;
        assert!(matches!(
            validate_record(&r),
            Err(BackupError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_below_floor_argon2_params_rejected() {
        let mut r = record();
        r.kdf_params.iterations = 1;
        assert!(matches!(
            validate_record(&r),
            Err(BackupError::InsufficientKdfParams(_))
        ));

        let mut r = record();
        r.kdf_params.memory = Some(1024);
        assert!(validate_record(&r).is_err());

        let mut r = record();
        r.kdf_params.memory = None;
        assert!(validate_record(&r).is_err());
    }

    #[test]
    fn test_pbkdf2_iteration_floor() {
        let mut r = record();
        r.kdf = "pbkdf2".to_string();
        r.kdf_params.iterations = 99_999;
        assert!(validate_record(&r).is_err());

        r.kdf_params.iterations = 100_000;
        validate_record(&r).expect("at the floor");
    }

    #[test]
    fn test_unsupported_algorithms() {
        assert!(validate_algorithms("scrypt", "aes-gcm").is_err());
        assert!(validate_algorithms("argon2id", "chacha20").is_err());
        validate_algorithms("pbkdf2", "aes-gcm").expect("supported pair");
    }

    #[test]
    fn test_optional_fields_omitted_from_json() {
        let mut r = record();
        r.kdf_params.hash = None;
        r.metadata = None;
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("\"hash\""));
        assert!(!json.contains("\"metadata\""));
    }
}
