//! Top-level error type for encrypt/decrypt calls.

use envelope::{CiphertextError, MalformedCiphertext};
use thiserror::Error;

use crate::keyring::KeyRingError;

/// Errors returned by [`Encrypter`](crate::Encrypter) implementations.
///
/// Every variant is returned to the caller as a value; nothing is retried.
/// [`EncryptionError::InvalidKeyRing`] and [`EncryptionError::InvalidOptions`]
/// only occur while constructing an encrypter and should abort setup.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The input could not be decoded as an envelope.
    #[error(transparent)]
    Malformed(#[from] MalformedCiphertext),

    /// The key ring was not created by [`AesGcmEncrypter::create_key_ring`](crate::AesGcmEncrypter::create_key_ring).
    #[error("provided key ring is not the one configured by the encrypter")]
    InvalidKeyRing,

    /// Key lookup or key validation failed (including `KeyNotFound` after rotation).
    #[error(transparent)]
    KeyRing(#[from] KeyRingError),

    /// Tag verification failed: the data was tampered with or the key is wrong.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Cipher output does not fit the envelope. Indicates an internal bug or
    /// an oversized plaintext, never a caller-supplied envelope.
    #[error("envelope invariant violated: {0}")]
    Ciphertext(#[from] CiphertextError),

    /// Encrypter options are out of range.
    #[error("invalid encrypter options: {0}")]
    InvalidOptions(String),

    /// The envelope carries an IV length the cipher is not built for.
    #[error("unsupported IV length: {0} bytes")]
    UnsupportedIvLength(usize),

    /// The AEAD primitive refused to encrypt.
    #[error("cipher failure")]
    CipherFailure,

    /// The remote KMS call failed.
    #[error("kms request failed: {0}")]
    Kms(String),

    /// Decrypted bytes were requested as text but are not UTF-8.
    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

impl EncryptionError {
    /// Returns `true` if the referenced key is absent from the ring.
    ///
    /// Expected for envelopes whose key has been rotated out.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, EncryptionError::KeyRing(KeyRingError::KeyNotFound(_)))
    }
}
