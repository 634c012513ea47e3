//! Ed25519 key generation and management
//!
//! Thin wrappers around `ed25519-dalek` keeping key material typed and
//! zeroizing secret bytes on drop.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroize;

/// Ed25519 public key length in bytes
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 secret key length in bytes
pub const SECRET_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes
pub const SIGNATURE_LENGTH: usize = 64;

/// Errors from key handling and raw signature operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Invalid signature format")]
    InvalidSignature,

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Result type for key operations
pub type KeyResult<T> = Result<T, KeyError>;

/// An Ed25519 public key used to verify message signatures
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a PublicKey from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> KeyResult<Self> {
        let array: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            KeyError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        // Reject the degenerate all-zeros key outright
        if array == [0u8; PUBLIC_KEY_LENGTH] {
            return Err(KeyError::InvalidPublicKey(
                "all-zeros public key is not allowed".to_string(),
            ));
        }
        let inner = VerifyingKey::from_bytes(&array)
            .map_err(|_| KeyError::InvalidPublicKey("not a valid curve point".to_string()))?;
        Ok(Self { inner })
    }

    /// Serialize to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.inner.to_bytes()
    }

    /// Verify a signature over a message
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> KeyResult<()> {
        let signature =
            Signature::try_from(&signature[..]).map_err(|_| KeyError::InvalidSignature)?;
        self.inner
            .verify(message, &signature)
            .map_err(|_| KeyError::VerificationFailed)
    }
}

/// An Ed25519 key pair for signing requests and exporting backups
///
/// Secret key bytes are zeroized when the pair is dropped.
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Self::from_signing_key(signing_key)
    }

    /// Wrap an existing signing key
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey {
            inner: signing_key.verifying_key(),
        };
        Self {
            signing_key,
            public_key,
        }
    }

    /// Reconstruct a key pair from 32 secret key bytes
    pub fn from_secret_bytes(secret: &[u8]) -> KeyResult<Self> {
        let array: [u8; SECRET_KEY_LENGTH] = secret.try_into().map_err(|_| {
            KeyError::InvalidSecretKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LENGTH,
                secret.len()
            ))
        })?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&array)))
    }

    /// The public half of the pair
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Public key as raw bytes
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.public_key.to_bytes()
    }

    /// Secret key as raw bytes (handle with care)
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// Sign a message, returning the raw 64-byte signature
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a signature with this pair's public key
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> KeyResult<()> {
        self.public_key.verify(message, signature)
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        let mut secret = self.signing_key.to_bytes();
        secret.zeroize();
    }
}

/// Verify a raw signature against raw public key bytes
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature: &[u8; SIGNATURE_LENGTH],
) -> KeyResult<()> {
    PublicKey::from_bytes(public_key_bytes)?.verify(message, signature)
}
