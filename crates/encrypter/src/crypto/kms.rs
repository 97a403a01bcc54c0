//! [`KmsEncrypter`]: delegates sealing to AWS KMS under one KMS key.
//!
//! The KMS ciphertext blob already identifies its key, so it is returned as-is
//! rather than wrapped in an envelope. KMS caps plaintext at 4 KiB.

use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use tracing::warn;

use super::encrypter::Encrypter;
use crate::error::EncryptionError;

/// Remote encrypter backed by the KMS `Encrypt` / `Decrypt` APIs.
#[derive(Debug, Clone)]
pub struct KmsEncrypter {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl KmsEncrypter {
    /// # Errors
    ///
    /// Returns [`EncryptionError::InvalidOptions`] if `key_id` is blank.
    pub fn new(client: aws_sdk_kms::Client, key_id: impl Into<String>) -> Result<Self, EncryptionError> {
        let key_id = key_id.into();
        if key_id.trim().is_empty() {
            return Err(EncryptionError::InvalidOptions(
                "kms key id must not be empty".into(),
            ));
        }
        Ok(Self { client, key_id })
    }

    /// KMS key id, ARN, or alias used for every call.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl Encrypter for KmsEncrypter {
    async fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let resp = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(|e| EncryptionError::Kms(DisplayErrorContext(&e).to_string()))?;

        let blob = resp
            .ciphertext_blob()
            .ok_or_else(|| EncryptionError::Kms("encrypt response contained no ciphertext".into()))?;
        Ok(blob.as_ref().to_vec())
    }

    async fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let resp = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(sealed))
            .send()
            .await
            .map_err(|e| {
                let invalid = e
                    .as_service_error()
                    .is_some_and(|se| se.is_invalid_ciphertext_exception());
                if invalid {
                    warn!(kms_key_id = %self.key_id, "kms rejected ciphertext");
                    EncryptionError::AuthenticationFailure
                } else {
                    EncryptionError::Kms(DisplayErrorContext(&e).to_string())
                }
            })?;

        let plaintext = resp
            .plaintext()
            .ok_or_else(|| EncryptionError::Kms("decrypt response contained no plaintext".into()))?;
        Ok(plaintext.as_ref().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_kms::config::{BehaviorVersion, Region};
    use aws_sdk_kms::operation::decrypt::{DecryptError, DecryptOutput};
    use aws_sdk_kms::operation::encrypt::{EncryptError, EncryptOutput};
    use aws_sdk_kms::types::error::{InvalidCiphertextException, NotFoundException};
    use aws_smithy_mocks::{mock, mock_client};

    use super::*;
    use crate::crypto::AnyEncrypter;

    const KEY_ID: &str = "alias/orders";
    const BLOB: &[u8] = b"kms-ciphertext-blob";

    fn offline_client() -> aws_sdk_kms::Client {
        let conf = aws_sdk_kms::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .build();
        aws_sdk_kms::Client::from_conf(conf)
    }

    #[test]
    fn rejects_blank_key_id() {
        let err = KmsEncrypter::new(offline_client(), "  ").unwrap_err();
        assert!(matches!(err, EncryptionError::InvalidOptions(_)));
    }

    #[test]
    fn keeps_key_id() {
        let e = KmsEncrypter::new(offline_client(), "alias/my-key").unwrap();
        assert_eq!(e.key_id(), "alias/my-key");
        assert_eq!(AnyEncrypter::from(e).backend(), "kms");
    }

    #[tokio::test]
    async fn seal_then_open_round_trips_through_kms() {
        let encrypt = mock!(aws_sdk_kms::Client::encrypt)
            .match_requests(|req| {
                req.key_id() == Some(KEY_ID) && req.plaintext() == Some(&Blob::new("foobar"))
            })
            .then_output(|| EncryptOutput::builder().ciphertext_blob(Blob::new(BLOB)).build());
        let decrypt = mock!(aws_sdk_kms::Client::decrypt)
            .match_requests(|req| {
                req.key_id() == Some(KEY_ID) && req.ciphertext_blob() == Some(&Blob::new(BLOB))
            })
            .then_output(|| DecryptOutput::builder().plaintext(Blob::new("foobar")).build());
        let client = mock_client!(aws_sdk_kms, [&encrypt, &decrypt]);
        let encrypter = KmsEncrypter::new(client, KEY_ID).unwrap();

        let sealed = encrypter.seal(b"foobar").await.unwrap();
        assert_eq!(sealed, BLOB);
        assert_eq!(encrypter.open(&sealed).await.unwrap(), b"foobar");
    }

    #[tokio::test]
    async fn string_helpers_base64_the_kms_blob() {
        let encrypt = mock!(aws_sdk_kms::Client::encrypt)
            .then_output(|| EncryptOutput::builder().ciphertext_blob(Blob::new(BLOB)).build());
        let decrypt = mock!(aws_sdk_kms::Client::decrypt)
            .match_requests(|req| req.ciphertext_blob() == Some(&Blob::new(BLOB)))
            .then_output(|| DecryptOutput::builder().plaintext(Blob::new("somerandomstring")).build());
        let client = mock_client!(aws_sdk_kms, [&encrypt, &decrypt]);
        let encrypter = AnyEncrypter::from(KmsEncrypter::new(client, KEY_ID).unwrap());

        let sealed = encrypter.seal_str("somerandomstring").await.unwrap();
        assert_eq!(sealed, "a21zLWNpcGhlcnRleHQtYmxvYg==");
        assert_eq!(encrypter.open_str(&sealed).await.unwrap(), "somerandomstring");
    }

    #[tokio::test]
    async fn invalid_ciphertext_is_an_authentication_failure() {
        let decrypt = mock!(aws_sdk_kms::Client::decrypt).then_error(|| {
            DecryptError::InvalidCiphertextException(
                InvalidCiphertextException::builder()
                    .message("the ciphertext is invalid")
                    .build(),
            )
        });
        let client = mock_client!(aws_sdk_kms, [&decrypt]);
        let encrypter = KmsEncrypter::new(client, KEY_ID).unwrap();

        let err = encrypter.open(b"tampered").await.unwrap_err();
        assert!(matches!(err, EncryptionError::AuthenticationFailure));
    }

    #[tokio::test]
    async fn other_service_errors_are_kms_errors() {
        let encrypt = mock!(aws_sdk_kms::Client::encrypt).then_error(|| {
            EncryptError::NotFoundException(
                NotFoundException::builder().message("no such key").build(),
            )
        });
        let decrypt = mock!(aws_sdk_kms::Client::decrypt).then_error(|| {
            DecryptError::NotFoundException(
                NotFoundException::builder().message("no such key").build(),
            )
        });
        let client = mock_client!(aws_sdk_kms, [&encrypt, &decrypt]);
        let encrypter = KmsEncrypter::new(client, KEY_ID).unwrap();

        assert!(matches!(
            encrypter.seal(b"foobar").await.unwrap_err(),
            EncryptionError::Kms(_)
        ));
        assert!(matches!(
            encrypter.open(BLOB).await.unwrap_err(),
            EncryptionError::Kms(_)
        ));
    }

    #[tokio::test]
    async fn empty_responses_are_kms_errors() {
        let encrypt = mock!(aws_sdk_kms::Client::encrypt).then_output(|| EncryptOutput::builder().build());
        let decrypt = mock!(aws_sdk_kms::Client::decrypt).then_output(|| DecryptOutput::builder().build());
        let client = mock_client!(aws_sdk_kms, [&encrypt, &decrypt]);
        let encrypter = KmsEncrypter::new(client, KEY_ID).unwrap();

        let err = encrypter.seal(b"foobar").await.unwrap_err();
        assert!(matches!(&err, EncryptionError::Kms(msg) if msg.contains("no ciphertext")));

        let err = encrypter.open(BLOB).await.unwrap_err();
        assert!(matches!(&err, EncryptionError::Kms(msg) if msg.contains("no plaintext")));
    }
}
