//! [`KeyRing`]: lock-free map of key id to key material.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use envelope::ciphertext::validate_key_id;
use envelope::CiphertextError;
use rand::rngs::OsRng;
use rand::seq::IteratorRandom;
use thiserror::Error;
use tracing::info;

use super::secret::SecretKey;

/// Errors produced by the key ring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyRingError {
    /// The id cannot be carried in an envelope (empty, non-ASCII, or > 255 bytes).
    #[error("invalid key id: {0}")]
    InvalidKeyId(#[source] CiphertextError),

    /// The key has no bytes.
    #[error("key cannot be empty")]
    EmptyKey,

    /// The ring's validator rejected the key length.
    #[error("key size {bits} is not allowed")]
    InvalidKeySize { bits: usize },

    /// A key with this id is already present.
    #[error("key already exists: {0}")]
    DuplicateKey(String),

    /// No key with this id is present.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A random key was requested from an empty ring.
    #[error("key ring is empty")]
    Empty,
}

/// Check applied to every entry before it is added to a ring.
pub type KeyValidator = fn(&KeyEntry) -> Result<(), KeyRingError>;

/// Which constructor produced a ring. Only settable inside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Plain,
    AesGcm,
}

/// A key and the id it is stored under.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    id: String,
    key: SecretKey,
}

impl KeyEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &SecretKey {
        &self.key
    }
}

/// Shared collection of active keys, keyed by id.
///
/// Backed by [`ArcSwap`] so lookups on the encrypt/decrypt path never block;
/// `add_key`/`remove_key` swap in a new map atomically. Populate the ring
/// before traffic starts: mutations racing with in-flight calls are applied
/// atomically but in no defined order relative to them.
pub struct KeyRing {
    entries: ArcSwap<BTreeMap<String, Arc<KeyEntry>>>,
    validator: Option<KeyValidator>,
    origin: Origin,
}

impl KeyRing {
    /// Create an empty ring that accepts any non-empty key.
    pub fn new() -> Self {
        Self::with_origin(Origin::Plain, None)
    }

    /// Create an empty ring that runs `validator` on every added key.
    pub fn with_validator(validator: KeyValidator) -> Self {
        Self::with_origin(Origin::Plain, Some(validator))
    }

    pub(crate) fn with_origin(origin: Origin, validator: Option<KeyValidator>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(BTreeMap::new()),
            validator,
            origin,
        }
    }

    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    /// Add `key` under `id`.
    ///
    /// # Errors
    ///
    /// - [`KeyRingError::InvalidKeyId`] if `id` cannot be carried in an envelope.
    /// - [`KeyRingError::EmptyKey`] if `key` is empty.
    /// - Whatever the ring's validator returns (e.g. [`KeyRingError::InvalidKeySize`]).
    /// - [`KeyRingError::DuplicateKey`] if `id` is already present.
    pub fn add_key(&self, id: impl Into<String>, key: impl Into<Vec<u8>>) -> Result<(), KeyRingError> {
        let id = id.into();
        validate_key_id(&id).map_err(KeyRingError::InvalidKeyId)?;

        let entry = KeyEntry {
            id,
            key: SecretKey::new(key),
        };
        if entry.key.is_empty() {
            return Err(KeyRingError::EmptyKey);
        }
        if let Some(validate) = self.validator {
            validate(&entry)?;
        }

        let bits = entry.key.bit_len();
        let entry = Arc::new(entry);
        let mut duplicate = false;
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            duplicate = next.contains_key(entry.id());
            if !duplicate {
                next.insert(entry.id.clone(), Arc::clone(&entry));
            }
            next
        });

        if duplicate {
            return Err(KeyRingError::DuplicateKey(entry.id.clone()));
        }
        info!(key_id = %entry.id, bits, "key added to ring");
        Ok(())
    }

    /// Remove the key stored under `id`. Returns `true` if it was present.
    pub fn remove_key(&self, id: &str) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            removed = next.remove(id).is_some();
            next
        });
        if removed {
            info!(key_id = %id, "key removed from ring");
        }
        removed
    }

    /// Pick an entry uniformly at random.
    ///
    /// # Errors
    ///
    /// Returns [`KeyRingError::Empty`] if the ring has no keys.
    pub fn get_random_key(&self) -> Result<Arc<KeyEntry>, KeyRingError> {
        self.entries
            .load()
            .values()
            .choose(&mut OsRng)
            .cloned()
            .ok_or(KeyRingError::Empty)
    }

    /// Fetch the entry stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyRingError::KeyNotFound`] if `id` is absent.
    pub fn assert_entry_by_id(&self, id: &str) -> Result<Arc<KeyEntry>, KeyRingError> {
        self.entries
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| KeyRingError::KeyNotFound(id.to_owned()))
    }

    /// Fetch the key stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyRingError::KeyNotFound`] if `id` is absent.
    pub fn assert_key_by_id(&self, id: &str) -> Result<SecretKey, KeyRingError> {
        self.assert_entry_by_id(id).map(|entry| entry.key.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.load().contains_key(id)
    }

    /// Ids of all keys, in lexical order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.load().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("ids", &self.ids())
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn only_16_bytes(entry: &KeyEntry) -> Result<(), KeyRingError> {
        match entry.key().len() {
            16 => Ok(()),
            n => Err(KeyRingError::InvalidKeySize { bits: n * 8 }),
        }
    }

    #[test]
    fn add_and_lookup() {
        let ring = KeyRing::new();
        ring.add_key("key1", vec![1u8; 32]).unwrap();
        assert!(ring.contains("key1"));
        assert_eq!(ring.len(), 1);

        let entry = ring.assert_entry_by_id("key1").unwrap();
        assert_eq!(entry.id(), "key1");
        assert_eq!(entry.key().expose(), &[1u8; 32][..]);
        assert_eq!(ring.assert_key_by_id("key1").unwrap().len(), 32);
    }

    #[test]
    fn missing_key_is_key_not_found() {
        let ring = KeyRing::new();
        assert_eq!(
            ring.assert_key_by_id("nope").unwrap_err(),
            KeyRingError::KeyNotFound("nope".into())
        );
    }

    #[test]
    fn empty_ring_has_no_random_key() {
        let ring = KeyRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.get_random_key().unwrap_err(), KeyRingError::Empty);
    }

    #[test]
    fn random_key_covers_every_entry() {
        let ring = KeyRing::new();
        for id in ["a", "b", "c"] {
            ring.add_key(id, vec![9u8; 16]).unwrap();
        }
        let seen: HashSet<String> = (0..300)
            .map(|_| ring.get_random_key().unwrap().id().to_owned())
            .collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn rejects_bad_ids() {
        let ring = KeyRing::new();
        assert_eq!(
            ring.add_key("", vec![1u8; 16]).unwrap_err(),
            KeyRingError::InvalidKeyId(CiphertextError::KeyIdEmpty)
        );
        assert_eq!(
            ring.add_key("k".repeat(256), vec![1u8; 16]).unwrap_err(),
            KeyRingError::InvalidKeyId(CiphertextError::KeyIdTooLong(256))
        );
        assert_eq!(
            ring.add_key("clé", vec![1u8; 16]).unwrap_err(),
            KeyRingError::InvalidKeyId(CiphertextError::KeyIdNotAscii)
        );
    }

    #[test]
    fn rejects_empty_key_and_duplicates() {
        let ring = KeyRing::new();
        assert_eq!(ring.add_key("k", Vec::new()).unwrap_err(), KeyRingError::EmptyKey);
        ring.add_key("k", vec![1u8; 16]).unwrap();
        assert_eq!(
            ring.add_key("k", vec![2u8; 16]).unwrap_err(),
            KeyRingError::DuplicateKey("k".into())
        );
        assert_eq!(ring.assert_key_by_id("k").unwrap().expose(), &[1u8; 16][..]);
    }

    #[test]
    fn validator_runs_on_add() {
        let ring = KeyRing::with_validator(only_16_bytes);
        assert_eq!(
            ring.add_key("k", vec![1u8; 50]).unwrap_err(),
            KeyRingError::InvalidKeySize { bits: 400 }
        );
        assert!(ring.is_empty());
        ring.add_key("k", vec![1u8; 16]).unwrap();
    }

    #[test]
    fn remove_then_re_add() {
        let ring = KeyRing::new();
        ring.add_key("a", vec![1u8; 16]).unwrap();
        assert!(ring.remove_key("a"));
        assert!(!ring.remove_key("a"));
        assert!(ring.assert_entry_by_id("a").is_err());
        ring.add_key("a", vec![1u8; 16]).unwrap();
        assert!(ring.contains("a"));
    }

    #[test]
    fn public_constructors_are_plain() {
        assert_eq!(KeyRing::new().origin(), Origin::Plain);
        assert_eq!(KeyRing::with_validator(only_16_bytes).origin(), Origin::Plain);
    }

    #[test]
    fn debug_lists_ids_not_keys() {
        let ring = KeyRing::new();
        ring.add_key("visible-id", vec![0xABu8; 16]).unwrap();
        let printed = format!("{ring:?}");
        assert!(printed.contains("visible-id"));
        assert!(!printed.contains("171"));
    }
}
