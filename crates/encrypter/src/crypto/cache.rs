//! [`KeyMaterialCache`]: process-lifetime memo of imported AES keys.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::KeyInit;
use arc_swap::ArcSwap;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::EncryptionError;
use crate::keyring::KeyRingError;

/// SHA-256 of the raw key bytes. Identifies key material without holding it.
type Fingerprint = [u8; 32];

type Slot = Arc<OnceCell<Arc<PreparedKey>>>;

/// An AES block cipher with its key schedule already expanded.
///
/// The schedules are wiped when dropped.
#[derive(Clone)]
pub enum PreparedKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl PreparedKey {
    /// Expand `raw` into an AES key schedule sized by its length.
    ///
    /// # Errors
    ///
    /// Returns [`KeyRingError::InvalidKeySize`] unless `raw` is 16, 24 or 32 bytes.
    pub fn import(raw: &[u8]) -> Result<Self, EncryptionError> {
        check_len(raw)?;
        let invalid = || KeyRingError::InvalidKeySize {
            bits: raw.len() * 8,
        };
        let key = match raw.len() {
            16 => Self::Aes128(Aes128::new_from_slice(raw).map_err(|_| invalid())?),
            24 => Self::Aes192(Aes192::new_from_slice(raw).map_err(|_| invalid())?),
            32 => Self::Aes256(Aes256::new_from_slice(raw).map_err(|_| invalid())?),
            _ => return Err(invalid().into()),
        };
        Ok(key)
    }

    /// Key size in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Aes128(_) => 128,
            Self::Aes192(_) => 192,
            Self::Aes256(_) => 256,
        }
    }
}

impl fmt::Debug for PreparedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreparedKey(AES-{}, [REDACTED])", self.bits())
    }
}

/// Shared cache of [`PreparedKey`]s keyed by a fingerprint of the raw bytes.
///
/// Each distinct key gets one [`OnceCell`] slot. Concurrent callers for the
/// same key wait on that slot, so the import runs at most once per key. Keys
/// of an unusable size are rejected before a slot is created. A failed import
/// leaves the slot empty; the next caller retries and other keys are
/// unaffected. Slots are never evicted: the number of distinct keys is bounded
/// by the key rings that feed the cache.
///
/// Cloning is cheap and clones share entries.
#[derive(Clone)]
pub struct KeyMaterialCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    slots: ArcSwap<HashMap<Fingerprint, Slot>>,
    imports: AtomicUsize,
}

impl KeyMaterialCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                slots: ArcSwap::from_pointee(HashMap::new()),
                imports: AtomicUsize::new(0),
            }),
        }
    }

    /// Return the prepared form of `raw`, importing it on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`PreparedKey::import`] failures to every caller waiting on
    /// this key.
    pub async fn prepare(&self, raw: &[u8]) -> Result<Arc<PreparedKey>, EncryptionError> {
        check_len(raw)?;
        let slot = self.slot(fingerprint(raw));
        let prepared = slot
            .get_or_try_init(|| async {
                let key = PreparedKey::import(raw)?;
                self.inner.imports.fetch_add(1, Ordering::Relaxed);
                debug!(bits = key.bits(), "imported key material");
                Ok::<_, EncryptionError>(Arc::new(key))
            })
            .await?;
        Ok(Arc::clone(prepared))
    }

    /// Number of distinct keys seen, prepared or not.
    pub fn len(&self) -> usize {
        self.inner.slots.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.load().is_empty()
    }

    /// Number of successful imports since the cache was created.
    pub fn imports(&self) -> usize {
        self.inner.imports.load(Ordering::Relaxed)
    }

    /// Find or insert the slot for `fingerprint`. Racing inserts converge on
    /// whichever slot lands first.
    fn slot(&self, fingerprint: Fingerprint) -> Slot {
        if let Some(slot) = self.inner.slots.load().get(&fingerprint) {
            return Arc::clone(slot);
        }

        let fresh: Slot = Arc::new(OnceCell::new());
        self.inner.slots.rcu(|current| {
            let mut next = (**current).clone();
            next.entry(fingerprint).or_insert_with(|| Arc::clone(&fresh));
            next
        });

        // Slots are never removed, so the entry is present now.
        self.inner
            .slots
            .load()
            .get(&fingerprint)
            .cloned()
            .unwrap_or(fresh)
    }
}

impl Default for KeyMaterialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyMaterialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterialCache")
            .field("keys", &self.len())
            .field("imports", &self.imports())
            .finish()
    }
}

fn check_len(raw: &[u8]) -> Result<(), EncryptionError> {
    match raw.len() {
        16 | 24 | 32 => Ok(()),
        len => Err(KeyRingError::InvalidKeySize { bits: len * 8 }.into()),
    }
}

fn fingerprint(raw: &[u8]) -> Fingerprint {
    Sha256::digest(raw).into()
}
