//! The blocking nonce search, adapted from the teacher's `core/src/pow/sync_pow.rs`.
//! The trial value is `SHA512(SHA512(nonce_be ++ initial_hash))[0..8]` as a
//! big-endian u64; a nonce is accepted once that value is `<= target`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_bigint::BigUint;
use sha2::{Digest, Sha512};

/// Searches nonces starting from `start`, stepping by `stride`, stopping at the
/// first nonce whose trial value falls under `target`, or when `cancel` is set.
/// Returns `None` if cancelled before a solution was found.
pub(crate) fn search(
    target: &BigUint,
    initial_hash: &[u8],
    start: u64,
    stride: u64,
    cancel: &Arc<AtomicBool>,
) -> Option<u64> {
    let mut nonce = start;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }

        if trial_value(nonce, initial_hash) <= *target {
            return Some(nonce);
        }

        nonce = match nonce.checked_add(stride) {
            Some(n) => n,
            None => return None,
        }
    }
}

pub(crate) fn trial_value(nonce: u64, initial_hash: &[u8]) -> BigUint {
    let mut hasher = Sha512::new();
    hasher.update(nonce.to_be_bytes());
    hasher.update(initial_hash);
    let result_hash = Sha512::digest(hasher.finalize());
    BigUint::from_bytes_be(&result_hash[0..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_target_is_found_immediately() {
        let target = BigUint::from(u64::MAX);
        let cancel = Arc::new(AtomicBool::new(false));
        let found = search(&target, b"hello", 0, 1, &cancel);
        assert_eq!(found, Some(0));
    }

    #[test]
    fn cancellation_stops_the_search() {
        let target = BigUint::from(0u32); // practically unreachable
        let cancel = Arc::new(AtomicBool::new(true));
        let found = search(&target, b"hello", 0, 1, &cancel);
        assert_eq!(found, None);
    }
}
