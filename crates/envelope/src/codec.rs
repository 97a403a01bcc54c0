//! Binary encode/decode of the envelope wire format.
//!
//! ```text
//! offset  field              size
//! 0       key id length      1 byte (1..=255)
//! 1       key id             key id length bytes, ASCII
//! -       iv length          1 byte (1..=255)
//! -       iv                 iv length bytes
//! -       encrypted length   2 bytes, big-endian (1..=65534)
//! -       encrypted          encrypted length bytes, tag included
//! ```

use crate::ciphertext::Ciphertext;
use crate::error::{CiphertextError, MalformedCiphertext};

/// Encode `ciphertext` into its wire bytes.
///
/// Lengths always fit their prefix because [`Ciphertext`] cannot be built with
/// out-of-range fields.
pub fn encode(ciphertext: &Ciphertext) -> Vec<u8> {
    let key_id = ciphertext.key_id().as_bytes();
    let iv = ciphertext.iv();
    let encrypted = ciphertext.encrypted();

    let mut out = Vec::with_capacity(1 + key_id.len() + 1 + iv.len() + 2 + encrypted.len());
    out.push(key_id.len() as u8);
    out.extend_from_slice(key_id);
    out.push(iv.len() as u8);
    out.extend_from_slice(iv);
    out.extend_from_slice(&(encrypted.len() as u16).to_be_bytes());
    out.extend_from_slice(encrypted);
    out
}

/// Decode wire bytes into a validated [`Ciphertext`].
///
/// Every field is bounds-checked before it is consumed and the input must be
/// exhausted exactly once the encrypted data has been read.
///
/// # Errors
///
/// Returns the [`MalformedCiphertext`] variant for the first field that cannot
/// be read in full, [`MalformedCiphertext::ExtraData`] for trailing bytes, or
/// [`MalformedCiphertext::Invalid`] if a fully read field is out of range.
pub fn decode(input: &[u8]) -> Result<Ciphertext, MalformedCiphertext> {
    let mut reader = Reader::new(input);

    let key_id_len = reader.read_u8(MalformedCiphertext::MissingKeyIdLength)?;
    let key_id = reader.take(usize::from(key_id_len), MalformedCiphertext::MissingKeyId)?;

    let iv_len = reader.read_u8(MalformedCiphertext::MissingIvLength)?;
    let iv = reader.take(usize::from(iv_len), MalformedCiphertext::MissingIv)?;

    let encrypted_len = reader.read_u16_be(MalformedCiphertext::MissingEncryptedLength)?;
    let encrypted = reader.take(
        usize::from(encrypted_len),
        MalformedCiphertext::MissingEncrypted,
    )?;

    if !reader.is_empty() {
        return Err(MalformedCiphertext::ExtraData(reader.remaining()));
    }

    let key_id = std::str::from_utf8(key_id).map_err(|_| CiphertextError::KeyIdNotAscii)?;
    Ok(Ciphertext::new(key_id, iv, encrypted)?)
}

/// Forward-only cursor over the input that never reads past its end.
struct Reader<'a> {
    input: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    fn take(&mut self, len: usize, missing: MalformedCiphertext) -> Result<&'a [u8], MalformedCiphertext> {
        if self.input.len() < len {
            return Err(missing);
        }
        let (head, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(head)
    }

    fn read_u8(&mut self, missing: MalformedCiphertext) -> Result<u8, MalformedCiphertext> {
        Ok(self.take(1, missing)?[0])
    }

    fn read_u16_be(&mut self, missing: MalformedCiphertext) -> Result<u16, MalformedCiphertext> {
        let bytes = self.take(2, missing)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn remaining(&self) -> usize {
        self.input.len()
    }

    fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: &str = "some_key_id";

    fn key_part() -> Vec<u8> {
        let mut out = vec![KEY.len() as u8];
        out.extend_from_slice(KEY.as_bytes());
        out
    }

    fn iv_part() -> Vec<u8> {
        let mut out = vec![12u8];
        out.extend_from_slice(&[0xA5; 12]);
        out
    }

    fn encrypted_part() -> Vec<u8> {
        let mut out = 50u16.to_be_bytes().to_vec();
        out.extend_from_slice(&[0x3C; 50]);
        out
    }

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn encode_layout() {
        let c = Ciphertext::new("keyId", b"some_iv".to_vec(), b"some_encrypted".to_vec()).unwrap();
        let bytes = encode(&c);
        assert_eq!(bytes[0], 5);
        assert_eq!(&bytes[1..6], b"keyId");
        assert_eq!(bytes[6], 7);
        assert_eq!(&bytes[7..14], b"some_iv");
        assert_eq!(&bytes[14..16], &[0x00, 0x0E]);
        assert_eq!(&bytes[16..], b"some_encrypted");
    }

    #[test]
    fn decodes_complete_envelope() {
        let bytes = concat(&[&key_part(), &iv_part(), &encrypted_part()]);
        let c = decode(&bytes).unwrap();
        assert_eq!(c.key_id(), KEY);
        assert_eq!(c.iv(), &[0xA5; 12][..]);
        assert_eq!(c.encrypted(), &[0x3C; 50][..]);
    }

    #[test]
    fn empty_input() {
        assert_eq!(decode(&[]).unwrap_err(), MalformedCiphertext::MissingKeyIdLength);
    }

    #[test]
    fn missing_key_id() {
        let bytes = [KEY.len() as u8];
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::MissingKeyId);
    }

    #[test]
    fn short_key_id() {
        let bytes = concat(&[&[KEY.len() as u8], &[1, 2, 3, 4]]);
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::MissingKeyId);
    }

    #[test]
    fn missing_iv_length() {
        assert_eq!(decode(&key_part()).unwrap_err(), MalformedCiphertext::MissingIvLength);
    }

    #[test]
    fn missing_iv() {
        let bytes = concat(&[&key_part(), &[12]]);
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::MissingIv);
    }

    #[test]
    fn short_iv() {
        let bytes = concat(&[&key_part(), &[12], &[1, 2, 3, 4]]);
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::MissingIv);
    }

    #[test]
    fn missing_encrypted_length() {
        let bytes = concat(&[&key_part(), &iv_part()]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::MissingEncryptedLength
        );
        // Half of the length prefix is still missing.
        let bytes = concat(&[&key_part(), &iv_part(), &[0]]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::MissingEncryptedLength
        );
    }

    #[test]
    fn missing_encrypted() {
        let bytes = concat(&[&key_part(), &iv_part(), &50u16.to_be_bytes()]);
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::MissingEncrypted);
    }

    #[test]
    fn short_encrypted() {
        let bytes = concat(&[&key_part(), &iv_part(), &50u16.to_be_bytes(), &[1, 2, 3, 4]]);
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::MissingEncrypted);
    }

    #[test]
    fn extra_data() {
        let bytes = concat(&[&key_part(), &iv_part(), &encrypted_part(), &[0u8; 10]]);
        assert_eq!(decode(&bytes).unwrap_err(), MalformedCiphertext::ExtraData(10));
    }

    #[test]
    fn zero_lengths_fail_validation() {
        let bytes = concat(&[&[0], &iv_part(), &encrypted_part()]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::Invalid(CiphertextError::KeyIdEmpty)
        );

        let bytes = concat(&[&key_part(), &[0], &encrypted_part()]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::Invalid(CiphertextError::IvEmpty)
        );

        let bytes = concat(&[&key_part(), &iv_part(), &[0, 0]]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::Invalid(CiphertextError::EncryptedEmpty)
        );
    }

    #[test]
    fn max_u16_encrypted_length_is_invalid() {
        let mut bytes = concat(&[&key_part(), &iv_part(), &u16::MAX.to_be_bytes()]);
        bytes.extend(std::iter::repeat(0u8).take(usize::from(u16::MAX)));
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::Invalid(CiphertextError::EncryptedTooLong(65535))
        );
    }

    #[test]
    fn non_ascii_key_id_is_invalid() {
        let bytes = concat(&[&[2, 0xC3, 0xA9], &iv_part(), &encrypted_part()]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::Invalid(CiphertextError::KeyIdNotAscii)
        );
        let bytes = concat(&[&[1, 0xFF], &iv_part(), &encrypted_part()]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            MalformedCiphertext::Invalid(CiphertextError::KeyIdNotAscii)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn decode_inverts_encode(
            key_id in "[ -~]{1,255}",
            iv in proptest::collection::vec(any::<u8>(), 1..=255),
            encrypted in proptest::collection::vec(any::<u8>(), 1..=2048),
        ) {
            let c = Ciphertext::new(key_id.clone(), iv.clone(), encrypted.clone()).unwrap();
            let decoded = decode(&encode(&c)).unwrap();
            prop_assert_eq!(decoded.key_id(), key_id.as_str());
            prop_assert_eq!(decoded.iv(), iv.as_slice());
            prop_assert_eq!(decoded.encrypted(), encrypted.as_slice());
        }

        #[test]
        fn every_strict_prefix_is_rejected(
            iv in proptest::collection::vec(any::<u8>(), 1..=32),
            encrypted in proptest::collection::vec(any::<u8>(), 1..=64),
        ) {
            let bytes = encode(&Ciphertext::new("k", iv, encrypted).unwrap());
            for cut in 0..bytes.len() {
                prop_assert!(decode(&bytes[..cut]).is_err());
            }
        }
    }
}
