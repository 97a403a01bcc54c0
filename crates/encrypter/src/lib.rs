//! Key-ring AEAD encryption with key rotation.
//!
//! Callers encrypt under one of several active keys and later decrypt without
//! knowing which key was used: the key id travels inside the
//! [`Ciphertext`] envelope.
//!
//! ```text
//! KeyRing ──► AesGcmEncrypter ──► KeyMaterialCache ──► AES-GCM
//!                   │
//!                   └──► envelope::Ciphertext (wire format)
//! ```
//!
//! [`KmsEncrypter`] offers the same [`Encrypter`] capability backed by AWS KMS.

pub mod config;
pub mod crypto;
pub mod error;
pub mod keyring;
pub mod telemetry;

pub use crypto::{
    AesGcmEncrypter, AesGcmOptions, AnyEncrypter, Encrypter, KeyMaterialCache, KmsEncrypter, Sealed,
};
pub use envelope::{Ciphertext, CiphertextError, MalformedCiphertext};
pub use error::EncryptionError;
pub use keyring::{KeyEntry, KeyRing, KeyRingError, SecretKey};
