//! Legacy `<iv>:<encrypted>` text value.
//!
//! Predates the keyed envelope and carries no key id, so it can only be opened
//! with a key known from context. Kept for reading values stored in that form.
//!
//! Parsing follows the stored values exactly: hex must be lowercase, and only
//! the first two `:`-separated fields are read, so `aa:bb:cc` parses as
//! `aa:bb`.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Text encoding of the two halves of an [`EncryptedValue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Hex,
    Base64,
}

/// Errors from building or parsing an [`EncryptedValue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptedValueError {
    #[error("malformed encrypted string")]
    MissingSeparator,

    #[error("IV or encrypted value are empty")]
    Empty,

    #[error("invalid value for encoding: {0:?}")]
    InvalidEncoding(TextEncoding),
}

/// An IV and cipher output pair without a key id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    iv: Vec<u8>,
    encrypted: Vec<u8>,
}

impl EncryptedValue {
    /// # Errors
    ///
    /// Returns [`EncryptedValueError::Empty`] if either half is empty.
    pub fn new(iv: impl Into<Vec<u8>>, encrypted: impl Into<Vec<u8>>) -> Result<Self, EncryptedValueError> {
        let iv = iv.into();
        let encrypted = encrypted.into();
        if iv.is_empty() || encrypted.is_empty() {
            return Err(EncryptedValueError::Empty);
        }
        Ok(Self { iv, encrypted })
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn encrypted(&self) -> &[u8] {
        &self.encrypted
    }

    /// Render as `<iv>:<encrypted>` using `encoding` for both halves.
    pub fn to_string_with(&self, encoding: TextEncoding) -> String {
        format!(
            "{}:{}",
            encode(&self.iv, encoding),
            encode(&self.encrypted, encoding)
        )
    }

    /// Parse `<iv>:<encrypted>`.
    ///
    /// # Errors
    ///
    /// - [`EncryptedValueError::MissingSeparator`] if there is no `:`.
    /// - [`EncryptedValueError::Empty`] if either half is blank.
    /// - [`EncryptedValueError::InvalidEncoding`] if a half is not valid
    ///   `encoding` (for hex, lowercase digits only).
    pub fn parse(s: &str, encoding: TextEncoding) -> Result<Self, EncryptedValueError> {
        let mut fields = s.split(':');
        let iv = fields.next().unwrap_or_default();
        let encrypted = fields.next().ok_or(EncryptedValueError::MissingSeparator)?;

        if iv.trim().is_empty() || encrypted.trim().is_empty() {
            return Err(EncryptedValueError::Empty);
        }

        Self::new(decode(iv, encoding)?, decode(encrypted, encoding)?)
    }
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(TextEncoding::Hex))
    }
}

fn encode(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Hex => hex::encode(bytes),
        TextEncoding::Base64 => STANDARD.encode(bytes),
    }
}

fn decode(s: &str, encoding: TextEncoding) -> Result<Vec<u8>, EncryptedValueError> {
    let decoded = match encoding {
        TextEncoding::Hex if !is_lower_hex(s) => None,
        TextEncoding::Hex => hex::decode(s).ok(),
        TextEncoding::Base64 => STANDARD.decode(s).ok(),
    };
    decoded.ok_or(EncryptedValueError::InvalidEncoding(encoding))
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
