//! Encrypted Ed25519 key backups
//!
//! A versioned JSON format with negotiable KDF (argon2id, pbkdf2) and AEAD
//! (xchacha20-poly1305, aes-gcm), designed so backups written by one
//! implementation decrypt on any other that honors the same format.

pub mod aead;
pub mod format;
pub mod kdf;
pub mod manager;

pub use format::{
    BackupError, BackupMetadata, BackupRecord, BackupResult, KdfParams, BACKUP_FORMAT_VERSION,
};
pub use manager::{CustomKdfParams, ExportOptions, KeyBackupManager};
