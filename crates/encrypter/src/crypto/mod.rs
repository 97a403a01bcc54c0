//! Encrypters and the key-material cache.
//!
//! # Envelope format
//!
//! [`AesGcmEncrypter`] emits [`envelope::Ciphertext`] values:
//!
//! ```text
//! u8 len | key id | u8 len | iv | u16 BE len | ciphertext+tag
//! ```
//!
//! The key id lets decryption find the right key after rotation without any
//! out-of-band context.
//!
//! # Module invariants
//!
//! - Plaintext and key bytes never appear in logs or `Debug` output.
//! - Key-ring size validation happens once, at `add_key`; the encrypt/decrypt
//!   paths trust every key they get from a ring built by
//!   [`AesGcmEncrypter::create_key_ring`].

pub mod cache;
pub mod encrypter;
pub mod gcm;
pub mod kms;

pub use cache::{KeyMaterialCache, PreparedKey};
pub use encrypter::{AnyEncrypter, Encrypter};
pub use gcm::{AesGcmEncrypter, AesGcmOptions, Sealed};
pub use kms::KmsEncrypter;
