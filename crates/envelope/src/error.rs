//! Errors produced while building or decoding a [`Ciphertext`](crate::Ciphertext).

use thiserror::Error;

use crate::ciphertext::{MAX_ENCRYPTED_LEN, MAX_IV_LEN, MAX_KEY_ID_LEN};

/// A field of the envelope is out of range.
///
/// Checked in field order: key id, then IV, then encrypted data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CiphertextError {
    /// The key id is the empty string.
    #[error("key id cannot be empty")]
    KeyIdEmpty,

    /// The key id does not fit in a single length byte.
    #[error("key id is too long: {0} bytes (max {MAX_KEY_ID_LEN})")]
    KeyIdTooLong(usize),

    /// The key id contains non-ASCII characters.
    #[error("key id must be ASCII")]
    KeyIdNotAscii,

    /// The IV is empty.
    #[error("IV cannot be empty")]
    IvEmpty,

    /// The IV does not fit in a single length byte.
    #[error("IV is too long: {0} bytes (max {MAX_IV_LEN})")]
    IvTooLong(usize),

    /// The encrypted data is empty.
    #[error("encrypted data cannot be empty")]
    EncryptedEmpty,

    /// The encrypted data is 65535 bytes or longer.
    #[error("encrypted data is too long: {0} bytes (max {MAX_ENCRYPTED_LEN})")]
    EncryptedTooLong(usize),
}

/// The input is not a well-formed envelope.
///
/// Each truncation point has its own variant so callers and logs can tell
/// exactly where decoding stopped. No partial envelope is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCiphertext {
    #[error("malformed ciphertext: missing key id length")]
    MissingKeyIdLength,

    #[error("malformed ciphertext: missing key id")]
    MissingKeyId,

    #[error("malformed ciphertext: missing IV length")]
    MissingIvLength,

    #[error("malformed ciphertext: missing IV")]
    MissingIv,

    #[error("malformed ciphertext: missing encrypted data length")]
    MissingEncryptedLength,

    #[error("malformed ciphertext: missing encrypted data")]
    MissingEncrypted,

    /// Bytes remain after the encrypted data field.
    #[error("malformed ciphertext: {0} bytes of extra data")]
    ExtraData(usize),

    /// The textual form is not valid base64.
    #[error("malformed ciphertext: invalid base64")]
    InvalidBase64,

    /// All fields were read but one of them is out of range.
    #[error("malformed ciphertext: {0}")]
    Invalid(#[from] CiphertextError),
}
