//! Configuration loading and validation for an encrypter.
//!
//! Values are read from `ENCRYPTION_*` environment variables. Setup should
//! abort with the returned error if any value is missing or invalid.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::info;

use crate::crypto::gcm::{MAX_IV_LENGTH, MIN_IV_LENGTH};
use crate::crypto::{AesGcmEncrypter, AesGcmOptions, AnyEncrypter, KmsEncrypter};
use crate::keyring::KeyRing;
use crate::telemetry;

/// Which encrypter [`Config::build_encrypter`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    AesGcm,
    Kms,
}

/// Validated encrypter configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// `aes-gcm` or `kms`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// IV length in bytes for the AES-GCM backend.
    #[serde(default = "default_iv_length")]
    pub iv_length: usize,

    /// Comma-separated `id=<base64 key>` pairs. **Required** for `aes-gcm`.
    #[serde(default)]
    pub keys: String,

    /// KMS key id, ARN or alias. **Required** for `kms`.
    #[serde(default)]
    pub kms_key_id: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backend() -> String {
    "aes-gcm".into()
}
fn default_iv_length() -> usize {
    12
}
fn default_log_level() -> String {
    "info".into()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `keys` holds raw key material.
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("iv_length", &self.iv_length)
            .field("keys", &"[REDACTED]")
            .field("kms_key_id", &self.kms_key_id)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load and validate configuration from `ENCRYPTION_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is invalid or a backend requirement is unmet.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENCRYPTION"))
            .build()
            .context("failed to build encryption configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise encryption configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parsed [`Backend`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown backend name.
    pub fn backend(&self) -> Result<Backend> {
        match self.backend.trim() {
            "aes-gcm" => Ok(Backend::AesGcm),
            "kms" => Ok(Backend::Kms),
            other => anyhow::bail!("ENCRYPTION_BACKEND must be `aes-gcm` or `kms`, got `{other}`"),
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if !(MIN_IV_LENGTH..=MAX_IV_LENGTH).contains(&self.iv_length) {
            anyhow::bail!("ENCRYPTION_IV_LENGTH must be in {MIN_IV_LENGTH}..={MAX_IV_LENGTH}");
        }
        telemetry::filter_for(&self.log_level).context("ENCRYPTION_LOG_LEVEL is invalid")?;
        match self.backend()? {
            Backend::AesGcm => {
                if self.parse_keys()?.is_empty() {
                    anyhow::bail!("ENCRYPTION_KEYS is required for the aes-gcm backend");
                }
            }
            Backend::Kms => {
                let key_id = self.kms_key_id.as_deref().unwrap_or_default();
                if key_id.trim().is_empty() {
                    anyhow::bail!("ENCRYPTION_KMS_KEY_ID is required for the kms backend");
                }
            }
        }
        Ok(())
    }

    /// Install the JSON log subscriber at `log_level`.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init_telemetry(&self) -> Result<()> {
        telemetry::init(&self.log_level)?;
        info!(log_level = %self.log_level, backend = %self.backend, "telemetry initialised");
        Ok(())
    }

    /// Split `keys` into `(id, raw key)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending entry (never its key bytes).
    pub fn parse_keys(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.keys
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .enumerate()
            .map(|(i, pair)| {
                let (id, key) = pair
                    .split_once('=')
                    .with_context(|| format!("ENCRYPTION_KEYS entry {i} must be `id=<base64 key>`"))?;
                let key = STANDARD
                    .decode(key.trim())
                    .with_context(|| format!("ENCRYPTION_KEYS entry `{}` is not valid base64", id.trim()))?;
                Ok((id.trim().to_owned(), key))
            })
            .collect()
    }

    /// Build a validated AES-GCM key ring from `keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be parsed or the ring rejects it
    /// (bad id, size other than 128/192/256 bits, duplicate id).
    pub fn build_key_ring(&self) -> Result<KeyRing> {
        let ring = AesGcmEncrypter::create_key_ring();
        for (id, key) in self.parse_keys()? {
            ring.add_key(id.clone(), key)
                .with_context(|| format!("failed to add key `{id}` to the key ring"))?;
        }
        Ok(ring)
    }

    /// Build the encrypter selected by `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key ring or encrypter cannot be constructed.
    pub async fn build_encrypter(&self) -> Result<AnyEncrypter> {
        let encrypter: AnyEncrypter = match self.backend()? {
            Backend::AesGcm => {
                let ring = Arc::new(self.build_key_ring()?);
                let options = AesGcmOptions {
                    iv_length: self.iv_length,
                };
                AesGcmEncrypter::with_options(ring, options)
                    .context("failed to construct aes-gcm encrypter")?
                    .into()
            }
            Backend::Kms => {
                let sdk = aws_config::defaults(BehaviorVersion::latest()).load().await;
                let client = aws_sdk_kms::Client::new(&sdk);
                KmsEncrypter::new(client, self.kms_key_id.clone().unwrap_or_default())
                    .context("failed to construct kms encrypter")?
                    .into()
            }
        };
        info!(backend = encrypter.backend(), "encrypter ready");
        Ok(encrypter)
    }
}
