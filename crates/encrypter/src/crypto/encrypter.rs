//! [`Encrypter`]: the capability callers hold, whatever does the encryption.

use std::future::Future;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use envelope::MalformedCiphertext;

use super::gcm::AesGcmEncrypter;
use super::kms::KmsEncrypter;
use crate::error::EncryptionError;

/// Seal and open opaque payloads.
///
/// [`AesGcmEncrypter`] produces envelope bytes; [`KmsEncrypter`] produces a
/// KMS ciphertext blob. Callers should treat the sealed bytes as opaque and
/// hand them back to the same kind of encrypter.
pub trait Encrypter: Send + Sync {
    /// Encrypt `plaintext`.
    fn seal(&self, plaintext: &[u8]) -> impl Future<Output = Result<Vec<u8>, EncryptionError>> + Send;

    /// Decrypt bytes previously returned by [`Encrypter::seal`].
    fn open(&self, sealed: &[u8]) -> impl Future<Output = Result<Vec<u8>, EncryptionError>> + Send;

    /// Encrypt a string and return the sealed bytes as base64.
    fn seal_str(&self, plaintext: &str) -> impl Future<Output = Result<String, EncryptionError>> + Send {
        async move {
            let sealed = self.seal(plaintext.as_bytes()).await?;
            Ok::<_, EncryptionError>(STANDARD.encode(sealed))
        }
    }

    /// Decrypt base64 from [`Encrypter::seal_str`] back into a string.
    fn open_str(&self, sealed: &str) -> impl Future<Output = Result<String, EncryptionError>> + Send {
        async move {
            let bytes = STANDARD
                .decode(sealed)
                .map_err(|_| EncryptionError::from(MalformedCiphertext::InvalidBase64))?;
            let plaintext = self.open(&bytes).await?;
            String::from_utf8(plaintext).map_err(|_| EncryptionError::InvalidUtf8)
        }
    }
}

/// Runtime choice between the local and the KMS-backed encrypter.
#[derive(Debug, Clone)]
pub enum AnyEncrypter {
    AesGcm(AesGcmEncrypter),
    Kms(KmsEncrypter),
}

impl AnyEncrypter {
    /// Short backend name, for logs.
    pub fn backend(&self) -> &'static str {
        match self {
            AnyEncrypter::AesGcm(_) => "aes-gcm",
            AnyEncrypter::Kms(_) => "kms",
        }
    }
}

impl Encrypter for AnyEncrypter {
    async fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        match self {
            AnyEncrypter::AesGcm(e) => e.seal(plaintext).await,
            AnyEncrypter::Kms(e) => e.seal(plaintext).await,
        }
    }

    async fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        match self {
            AnyEncrypter::AesGcm(e) => e.open(sealed).await,
            AnyEncrypter::Kms(e) => e.open(sealed).await,
        }
    }
}

impl From<AesGcmEncrypter> for AnyEncrypter {
    fn from(e: AesGcmEncrypter) -> Self {
        AnyEncrypter::AesGcm(e)
    }
}

impl From<KmsEncrypter> for AnyEncrypter {
    fn from(e: KmsEncrypter) -> Self {
        AnyEncrypter::Kms(e)
    }
}
