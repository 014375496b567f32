use std::fmt;

use bitcoin::hashes::{sha256d, Hash};
use parking_lot::RwLock;

/// Double SHA-256 over the canonical signature-hash preimage of a transaction.
pub type SigHash = sha256d::Hash;

/// Memoized signature hash owned by a single transaction value.
///
/// Filled on first use and only replaced when a recompute is requested
/// explicitly, so mutating a transaction after hashing it leaves the stale
/// value in place until then. Clones carry the memo over.
#[derive(Default)]
pub struct SigHashCache(RwLock<Option<SigHash>>);

impl SigHashCache {
    pub fn get_or_compute<F>(&self, recalculate: bool, preimage: F) -> SigHash
    where
        F: FnOnce() -> Vec<u8>,
    {
        if !recalculate {
            if let Some(hash) = *self.0.read() {
                return hash;
            }
        }
        let hash = sha256d::Hash::hash(&preimage());
        *self.0.write() = Some(hash);
        hash
    }
}

impl Clone for SigHashCache {
    fn clone(&self) -> Self {
        Self(RwLock::new(*self.0.read()))
    }
}

impl fmt::Debug for SigHashCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0.read() {
            Some(hash) => write!(f, "Some({hash})"),
            None => write!(f, "None"),
        }
    }
}
