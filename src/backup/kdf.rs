//! Passphrase key derivation for backups
//!
//! Two KDFs are supported: argon2id (preferred for new exports) and PBKDF2
//! with HMAC-SHA-256 or HMAC-SHA-512 (compatibility with older tooling).
//! Both derive a 32-byte AEAD key.

use crate::backup::format::{BackupError, BackupResult, KdfParams};
use argon2::{Algorithm, Argon2, Params, Version};
use ring::pbkdf2;
use std::num::NonZeroU32;
use zeroize::Zeroizing;

/// Derived AEAD key length in bytes
pub const DERIVED_KEY_LENGTH: usize = 32;

/// Derive an AEAD key from a passphrase and decoded salt
///
/// `params` must already satisfy the format floors; this function only
/// rejects values the underlying primitives cannot take at all.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    kdf: &str,
    params: &KdfParams,
) -> BackupResult<Zeroizing<[u8; DERIVED_KEY_LENGTH]>> {
    match kdf {
        "argon2id" => derive_argon2id(passphrase, salt, params),
        "pbkdf2" => derive_pbkdf2(passphrase, salt, params),
        other => Err(BackupError::UnsupportedAlgorithm(format!(
            "unsupported KDF: {}",
            other
        ))),
    }
}

fn derive_argon2id(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> BackupResult<Zeroizing<[u8; DERIVED_KEY_LENGTH]>> {
    let memory = params.memory.ok_or_else(|| {
        BackupError::InsufficientKdfParams("argon2id requires memory".to_string())
    })?;
    let parallelism = params.parallelism.ok_or_else(|| {
        BackupError::InsufficientKdfParams("argon2id requires parallelism".to_string())
    })?;

    let argon2_params = Params::new(
        memory,
        params.iterations,
        parallelism,
        Some(DERIVED_KEY_LENGTH),
    )
    .map_err(|e| BackupError::KeyDerivation(format!("invalid argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut())
        .map_err(|e| BackupError::KeyDerivation(format!("argon2id derivation failed: {}", e)))?;
    Ok(key)
}

fn derive_pbkdf2(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> BackupResult<Zeroizing<[u8; DERIVED_KEY_LENGTH]>> {
    let algorithm = match params.hash.as_deref().unwrap_or("SHA-256") {
        "SHA-256" => pbkdf2::PBKDF2_HMAC_SHA256,
        "SHA-512" => pbkdf2::PBKDF2_HMAC_SHA512,
        other => {
            return Err(BackupError::UnsupportedAlgorithm(format!(
                "unsupported PBKDF2 hash: {}",
                other
            )))
        }
    };

    let iterations = NonZeroU32::new(params.iterations).ok_or_else(|| {
        BackupError::InsufficientKdfParams("pbkdf2 iterations must be non-zero".to_string())
    })?;

    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
    pbkdf2::derive(
        algorithm,
        iterations,
        salt,
        passphrase.as_bytes(),
        key.as_mut(),
    );
    Ok(key)
}
