//! [`Ciphertext`]: the immutable, self-describing envelope value.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{CiphertextError, MalformedCiphertext};

/// Maximum key id length in bytes (one length byte on the wire).
pub const MAX_KEY_ID_LEN: usize = 255;

/// Maximum IV length in bytes (one length byte on the wire).
pub const MAX_IV_LEN: usize = 255;

/// Maximum encrypted payload length in bytes, authentication tag included.
pub const MAX_ENCRYPTED_LEN: usize = 65534;

/// An encrypted payload together with the id of the key and the IV used.
///
/// Instances only come out of [`Ciphertext::new`] or one of the decoders, all of
/// which validate every field, so a value in hand always satisfies the envelope
/// bounds. Fields are private and there are no setters.
///
/// Serialises as its base64 text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ciphertext {
    key_id: String,
    iv: Vec<u8>,
    encrypted: Vec<u8>,
}

impl Ciphertext {
    /// Build a validated envelope.
    ///
    /// # Errors
    ///
    /// Returns the first [`CiphertextError`] found, checking the key id, then
    /// the IV, then the encrypted data.
    pub fn new(
        key_id: impl Into<String>,
        iv: impl Into<Vec<u8>>,
        encrypted: impl Into<Vec<u8>>,
    ) -> Result<Self, CiphertextError> {
        let key_id = key_id.into();
        let iv = iv.into();
        let encrypted = encrypted.into();

        validate_key_id(&key_id)?;

        if iv.is_empty() {
            return Err(CiphertextError::IvEmpty);
        }
        if iv.len() > MAX_IV_LEN {
            return Err(CiphertextError::IvTooLong(iv.len()));
        }

        if encrypted.is_empty() {
            return Err(CiphertextError::EncryptedEmpty);
        }
        if encrypted.len() > MAX_ENCRYPTED_LEN {
            return Err(CiphertextError::EncryptedTooLong(encrypted.len()));
        }

        Ok(Self {
            key_id,
            iv,
            encrypted,
        })
    }

    /// Decode an envelope from its raw wire bytes.
    ///
    /// # Errors
    ///
    /// See [`codec::decode`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedCiphertext> {
        codec::decode(bytes)
    }

    /// Id of the key the payload was encrypted under.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Initialisation vector.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Cipher output, authentication tag appended.
    pub fn encrypted(&self) -> &[u8] {
        &self.encrypted
    }

    /// Encode to raw wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Consume the envelope, returning `(key_id, iv, encrypted)`.
    pub fn into_parts(self) -> (String, Vec<u8>, Vec<u8>) {
        (self.key_id, self.iv, self.encrypted)
    }
}

/// Check that `key_id` is a non-empty ASCII string of at most
/// [`MAX_KEY_ID_LEN`] bytes.
///
/// # Errors
///
/// Returns the matching [`CiphertextError`] variant.
pub fn validate_key_id(key_id: &str) -> Result<(), CiphertextError> {
    if key_id.is_empty() {
        return Err(CiphertextError::KeyIdEmpty);
    }
    if !key_id.is_ascii() {
        return Err(CiphertextError::KeyIdNotAscii);
    }
    if key_id.len() > MAX_KEY_ID_LEN {
        return Err(CiphertextError::KeyIdTooLong(key_id.len()));
    }
    Ok(())
}

impl fmt::Display for Ciphertext {
    /// Base64 text form of the wire bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.to_bytes()))
    }
}

impl FromStr for Ciphertext {
    type Err = MalformedCiphertext;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|_| MalformedCiphertext::InvalidBase64)?;
        codec::decode(&bytes)
    }
}

impl TryFrom<&[u8]> for Ciphertext {
    type Error = MalformedCiphertext;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        codec::decode(bytes)
    }
}

impl TryFrom<String> for Ciphertext {
    type Error = MalformedCiphertext;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ciphertext> for String {
    fn from(c: Ciphertext) -> Self {
        c.to_string()
    }
}
