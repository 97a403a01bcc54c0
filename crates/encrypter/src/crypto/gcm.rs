//! [`AesGcmEncrypter`]: local AES-GCM encryption over a key ring.
//!
//! Each call picks a key (random, or by id), draws a fresh random IV, and
//! seals with a 128-bit tag appended to the output. The key id and IV go into
//! the envelope so decryption needs nothing but the ring.

use std::borrow::Cow;
use std::sync::Arc;

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts;
use aes_gcm::aead::generic_array::ArrayLength;
use aes_gcm::aead::Aead;
use aes_gcm::{AesGcm, Nonce};
use envelope::{Ciphertext, MalformedCiphertext};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use tracing::{error, warn};

use super::cache::{KeyMaterialCache, PreparedKey};
use super::encrypter::Encrypter;
use crate::error::EncryptionError;
use crate::keyring::ring::Origin;
use crate::keyring::{KeyEntry, KeyRing, KeyRingError};

/// Default IV length in bytes (96 bits).
pub const DEFAULT_IV_LENGTH: usize = 12;

/// Smallest configurable IV length in bytes.
pub const MIN_IV_LENGTH: usize = 12;

/// Largest configurable IV length in bytes.
pub const MAX_IV_LENGTH: usize = 64;

/// Key sizes accepted by rings from [`AesGcmEncrypter::create_key_ring`].
pub const ALLOWED_KEY_BITS: [usize; 3] = [128, 192, 256];

/// Options for [`AesGcmEncrypter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AesGcmOptions {
    /// Length of the random IV generated per call, in bytes.
    #[serde(default = "default_iv_length")]
    pub iv_length: usize,
}

fn default_iv_length() -> usize {
    DEFAULT_IV_LENGTH
}

impl Default for AesGcmOptions {
    fn default() -> Self {
        Self {
            iv_length: DEFAULT_IV_LENGTH,
        }
    }
}

impl AesGcmOptions {
    /// # Errors
    ///
    /// Returns [`EncryptionError::InvalidOptions`] if `iv_length` is outside
    /// [`MIN_IV_LENGTH`]..=[`MAX_IV_LENGTH`].
    pub fn validate(&self) -> Result<(), EncryptionError> {
        if !(MIN_IV_LENGTH..=MAX_IV_LENGTH).contains(&self.iv_length) {
            return Err(EncryptionError::InvalidOptions(format!(
                "iv_length must be in {MIN_IV_LENGTH}..={MAX_IV_LENGTH}, got {}",
                self.iv_length
            )));
        }
        Ok(())
    }
}

/// Anything [`AesGcmEncrypter::decrypt`] accepts: a parsed envelope, its raw
/// bytes, or its base64 text form.
#[derive(Debug, Clone, Copy)]
pub enum Sealed<'a> {
    Envelope(&'a Ciphertext),
    Bytes(&'a [u8]),
    Text(&'a str),
}

impl<'a> Sealed<'a> {
    fn parse(self) -> Result<Cow<'a, Ciphertext>, MalformedCiphertext> {
        match self {
            Sealed::Envelope(c) => Ok(Cow::Borrowed(c)),
            Sealed::Bytes(b) => Ciphertext::from_bytes(b).map(Cow::Owned),
            Sealed::Text(s) => s.parse().map(Cow::Owned),
        }
    }
}

impl<'a> From<&'a Ciphertext> for Sealed<'a> {
    fn from(c: &'a Ciphertext) -> Self {
        Sealed::Envelope(c)
    }
}

impl<'a> From<&'a [u8]> for Sealed<'a> {
    fn from(b: &'a [u8]) -> Self {
        Sealed::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for Sealed<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        Sealed::Bytes(b)
    }
}

impl<'a> From<&'a str> for Sealed<'a> {
    fn from(s: &'a str) -> Self {
        Sealed::Text(s)
    }
}

impl<'a> From<&'a String> for Sealed<'a> {
    fn from(s: &'a String) -> Self {
        Sealed::Text(s)
    }
}

/// AES-GCM encrypter bound to one validated key ring.
///
/// Cheap to clone; clones share the ring and the key-material cache.
#[derive(Debug, Clone)]
pub struct AesGcmEncrypter {
    key_ring: Arc<KeyRing>,
    options: AesGcmOptions,
    cache: KeyMaterialCache,
}

impl AesGcmEncrypter {
    /// Create an empty key ring that only accepts 128, 192 or 256-bit keys.
    ///
    /// This is the only way to obtain a ring [`AesGcmEncrypter::new`] accepts.
    pub fn create_key_ring() -> KeyRing {
        KeyRing::with_origin(Origin::AesGcm, Some(validate_key_entry))
    }

    /// Create an encrypter with default options.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::InvalidKeyRing`] if `key_ring` did not come
    /// from [`AesGcmEncrypter::create_key_ring`].
    pub fn new(key_ring: Arc<KeyRing>) -> Result<Self, EncryptionError> {
        Self::with_options(key_ring, AesGcmOptions::default())
    }

    /// Create an encrypter with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::InvalidKeyRing`] for a foreign ring, or
    /// [`EncryptionError::InvalidOptions`] for out-of-range options.
    pub fn with_options(key_ring: Arc<KeyRing>, options: AesGcmOptions) -> Result<Self, EncryptionError> {
        if key_ring.origin() != Origin::AesGcm {
            return Err(EncryptionError::InvalidKeyRing);
        }
        options.validate()?;
        Ok(Self {
            key_ring,
            options,
            cache: KeyMaterialCache::new(),
        })
    }

    /// Use `cache` instead of a private one, e.g. to share imports between
    /// encrypters over the same keys.
    pub fn with_cache(mut self, cache: KeyMaterialCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn key_ring(&self) -> &Arc<KeyRing> {
        &self.key_ring
    }

    pub fn options(&self) -> AesGcmOptions {
        self.options
    }

    pub fn cache(&self) -> &KeyMaterialCache {
        &self.cache
    }

    /// Encrypt `plaintext` under the key `key_id`, or a random key if `None`.
    ///
    /// # Errors
    ///
    /// - `KeyRing(KeyNotFound)` if `key_id` is not in the ring.
    /// - `KeyRing(Empty)` if no `key_id` is given and the ring is empty.
    /// - [`EncryptionError::Ciphertext`] if the output does not fit the
    ///   envelope (plaintext larger than 65518 bytes).
    pub async fn encrypt(&self, plaintext: &[u8], key_id: Option<&str>) -> Result<Ciphertext, EncryptionError> {
        let entry = self.select_key(key_id)?;

        let mut iv = vec![0u8; self.options.iv_length];
        OsRng.fill_bytes(&mut iv);

        let key = self.cache.prepare(entry.key().expose()).await?;
        let encrypted = seal(&key, &iv, plaintext)?;

        Ciphertext::new(entry.id(), iv, encrypted).map_err(|e| {
            error!(key_id = %entry.id(), plaintext_len = plaintext.len(), error = %e, "cipher output does not fit the envelope");
            e.into()
        })
    }

    /// Decrypt an envelope given parsed, as raw bytes, or as base64 text.
    ///
    /// # Errors
    ///
    /// - [`EncryptionError::Malformed`] if the input does not decode.
    /// - `KeyRing(KeyNotFound)` if the envelope's key is no longer in the ring.
    /// - [`EncryptionError::UnsupportedIvLength`] for IVs outside 12..=64 bytes.
    /// - [`EncryptionError::AuthenticationFailure`] on tag mismatch.
    pub async fn decrypt<'a>(&self, input: impl Into<Sealed<'a>>) -> Result<Vec<u8>, EncryptionError> {
        let ciphertext = input.into().parse()?;

        let key = self
            .key_ring
            .assert_key_by_id(ciphertext.key_id())
            .map_err(|e| {
                warn!(key_id = %ciphertext.key_id(), "decryption key not in ring");
                e
            })?;
        let prepared = self.cache.prepare(key.expose()).await?;

        open(&prepared, ciphertext.iv(), ciphertext.encrypted()).map_err(|e| {
            if matches!(e, EncryptionError::AuthenticationFailure) {
                warn!(key_id = %ciphertext.key_id(), "ciphertext failed authentication");
            }
            e
        })
    }

    /// Decrypt and interpret the plaintext as UTF-8.
    ///
    /// # Errors
    ///
    /// As [`AesGcmEncrypter::decrypt`], plus [`EncryptionError::InvalidUtf8`].
    pub async fn decrypt_to_string<'a>(&self, input: impl Into<Sealed<'a>>) -> Result<String, EncryptionError> {
        String::from_utf8(self.decrypt(input).await?).map_err(|_| EncryptionError::InvalidUtf8)
    }

    fn select_key(&self, key_id: Option<&str>) -> Result<Arc<KeyEntry>, KeyRingError> {
        match key_id {
            Some(id) => self.key_ring.assert_entry_by_id(id),
            None => self.key_ring.get_random_key(),
        }
    }
}

impl Encrypter for AesGcmEncrypter {
    /// Encrypt under a random key and return the envelope's wire bytes.
    async fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        Ok(self.encrypt(plaintext, None).await?.to_bytes())
    }

    async fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        self.decrypt(sealed).await
    }
}

fn validate_key_entry(entry: &KeyEntry) -> Result<(), KeyRingError> {
    let bits = entry.key().bit_len();
    if !ALLOWED_KEY_BITS.contains(&bits) {
        return Err(KeyRingError::InvalidKeySize { bits });
    }
    Ok(())
}

/// Monomorphise `$func::<N>` for every supported IV length and dispatch on
/// the runtime length.
macro_rules! by_iv_length {
    ($len:expr, $func:ident $args:tt) => {
        by_iv_length!(@arms $len, $func $args;
            12 U12 13 U13 14 U14 15 U15 16 U16 17 U17 18 U18 19 U19
            20 U20 21 U21 22 U22 23 U23 24 U24 25 U25 26 U26 27 U27
            28 U28 29 U29 30 U30 31 U31 32 U32 33 U33 34 U34 35 U35
            36 U36 37 U37 38 U38 39 U39 40 U40 41 U41 42 U42 43 U43
            44 U44 45 U45 46 U46 47 U47 48 U48 49 U49 50 U50 51 U51
            52 U52 53 U53 54 U54 55 U55 56 U56 57 U57 58 U58 59 U59
            60 U60 61 U61 62 U62 63 U63 64 U64)
    };
    (@arms $len:expr, $func:ident $args:tt; $($n:literal $size:ident)+) => {
        match $len {
            $($n => $func::<consts::$size> $args,)+
            other => Err(EncryptionError::UnsupportedIvLength(other)),
        }
    };
}

fn seal(key: &PreparedKey, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    by_iv_length!(iv.len(), seal_with(key, iv, plaintext))
}

fn open(key: &PreparedKey, iv: &[u8], encrypted: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    by_iv_length!(iv.len(), open_with(key, iv, encrypted))
}

fn seal_with<N: ArrayLength<u8>>(key: &PreparedKey, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let nonce = Nonce::<N>::from_slice(iv);
    let out = match key {
        PreparedKey::Aes128(c) => AesGcm::<Aes128, N>::from(c.clone()).encrypt(nonce, plaintext),
        PreparedKey::Aes192(c) => AesGcm::<Aes192, N>::from(c.clone()).encrypt(nonce, plaintext),
        PreparedKey::Aes256(c) => AesGcm::<Aes256, N>::from(c.clone()).encrypt(nonce, plaintext),
    };
    out.map_err(|_| EncryptionError::CipherFailure)
}

fn open_with<N: ArrayLength<u8>>(key: &PreparedKey, iv: &[u8], encrypted: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let nonce = Nonce::<N>::from_slice(iv);
    let out = match key {
        PreparedKey::Aes128(c) => AesGcm::<Aes128, N>::from(c.clone()).decrypt(nonce, encrypted),
        PreparedKey::Aes192(c) => AesGcm::<Aes192, N>::from(c.clone()).decrypt(nonce, encrypted),
        PreparedKey::Aes256(c) => AesGcm::<Aes256, N>::from(c.clone()).decrypt(nonce, encrypted),
    };
    out.map_err(|_| EncryptionError::AuthenticationFailure)
}
