//! Ciphertext envelope types shared by the `encrypter` crate.
//!
//! # Wire format
//!
//! ```text
//! u8 len | key id (ASCII) | u8 len | iv | u16 BE len | encrypted (incl. tag)
//! ```
//!
//! The textual transport form is standard, padded base64 of the bytes above.

pub mod ciphertext;
pub mod codec;
pub mod error;
pub mod legacy;

pub use ciphertext::Ciphertext;
pub use error::{CiphertextError, MalformedCiphertext};
pub use legacy::{EncryptedValue, EncryptedValueError, TextEncoding};
