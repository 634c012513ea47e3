//! AEAD encryption for backup ciphertexts
//!
//! Dispatches by algorithm name to XChaCha20-Poly1305 (24-byte nonce) or
//! AES-256-GCM (12-byte nonce). A failed decryption gives a single merged
//! error; the tag check cannot distinguish a wrong key from flipped bytes.

use crate::backup::format::{nonce_length, BackupError, BackupResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::XChaCha20Poly1305;

/// Encrypt plaintext under a 32-byte key with the named AEAD
pub fn encrypt(
    encryption: &str,
    key: &[u8; 32],
    nonce: &[u8],
    plaintext: &[u8],
) -> BackupResult<Vec<u8>> {
    check_nonce(encryption, nonce)?;
    match encryption {
        "xchacha20-poly1305" => {
            let cipher = XChaCha20Poly1305::new(key.into());
            cipher
                .encrypt(chacha20poly1305::XNonce::from_slice(nonce), plaintext)
                .map_err(|_| BackupError::KeyDerivation("encryption failed".to_string()))
        }
        "aes-gcm" => {
            let cipher = Aes256Gcm::new(key.into());
            cipher
                .encrypt(aes_gcm::Nonce::from_slice(nonce), plaintext)
                .map_err(|_| BackupError::KeyDerivation("encryption failed".to_string()))
        }
        other => Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported encryption: {}",
            other
        ))),
    }
}

/// Decrypt a backup ciphertext; authentication failure yields the merged
/// wrong-passphrase-or-corrupted error
pub fn decrypt(
    encryption: &str,
    key: &[u8; 32],
    nonce: &[u8],
    ciphertext: &[u8],
) -> BackupResult<Vec<u8>> {
    check_nonce(encryption, nonce)?;
    match encryption {
        "xchacha20-poly1305" => {
            let cipher = XChaCha20Poly1305::new(key.into());
            cipher
                .decrypt(chacha20poly1305::XNonce::from_slice(nonce), ciphertext)
                .map_err(|_| BackupError::WrongPassphraseOrCorrupted)
        }
        "aes-gcm" => {
            let cipher = Aes256Gcm::new(key.into());
            cipher
                .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| BackupError::WrongPassphraseOrCorrupted)
        }
        other => Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported encryption: {}",
            other
        ))),
    }
}

fn check_nonce(encryption: &str, nonce: &[u8]) -> BackupResult<()> {
    let expected = nonce_length(encryption)?;
    if nonce.len() != expected {
        return Err(BackupError::CorruptedBackup(format!(
            "nonce length {} does not match {} (expected {})",
            nonce.len(),
            encryption,
            expected
        )));
    }
    Ok(())
}
