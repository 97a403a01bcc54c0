//! Named collection of active symmetric keys.
//!
//! # Lifecycle
//!
//! 1. At setup, keys are added under stable ids with [`KeyRing::add_key`].
//!    A ring may carry a validator that rejects unsuitable keys at add time.
//! 2. Encryption picks a key uniformly at random ([`KeyRing::get_random_key`])
//!    or by id; the id travels inside the envelope.
//! 3. Decryption looks the key up by that id ([`KeyRing::assert_key_by_id`]).
//!    Rotating a key out makes its envelopes fail with `KeyNotFound` until it
//!    is added back.
//!
//! # Invariants
//!
//! - Key bytes are never logged or printed; [`SecretKey`] redacts its `Debug`
//!   output and zeroes its buffer when the last handle is dropped.
//! - Reads are lock-free and see one consistent snapshot of the ring.

pub mod ring;
pub mod secret;

pub use ring::{KeyEntry, KeyRing, KeyRingError, KeyValidator};
pub use secret::SecretKey;
