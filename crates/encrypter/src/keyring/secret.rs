//! [`SecretKey`]: shared, zeroize-on-drop raw key bytes.

use std::fmt;
use std::sync::Arc;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw symmetric key material.
///
/// Cheap to clone: clones share one buffer, which is overwritten with zeroes
/// when the last clone is dropped.
#[derive(Clone)]
pub struct SecretKey(Arc<KeyBytes>);

#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyBytes(Box<[u8]>);

impl SecretKey {
    /// Take ownership of `bytes` as key material.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(KeyBytes(bytes.into().into_boxed_slice())))
    }

    /// Borrow the raw key bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0 .0
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0 .0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0 .0.is_empty()
    }

    /// Key length in bits.
    pub fn bit_len(&self) -> usize {
        self.len() * 8
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("SecretKey([REDACTED])")
    }
}
