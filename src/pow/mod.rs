//! Proof-of-work target computation and nonce search, split the way the
//! teacher splits it: a pure target/trial-value calculation, a blocking
//! search loop, and an async wrapper around that loop.

pub mod async_pow;
pub mod sync_pow;
mod target;

use num_bigint::BigUint;
use sha2::{Digest, Sha512};

use crate::error::Result;

/// Network-minimum nonce trials per byte, carried forward from the teacher's
/// `NETWORK_MIN_NONCE_TRIALS_PER_BYTE` constant; used whenever an `Address`
/// does not declare its own difficulty, or when `friend` mode is requested.
pub const NETWORK_MIN_NONCE_TRIALS_PER_BYTE: u64 = 1000;

/// Network-minimum payload-length extra bytes, carried forward from the
/// teacher's `NETWORK_MIN_EXTRA_BYTES` constant.
pub const NETWORK_MIN_EXTRA_BYTES: u64 = 1000;

/// Computes the POW target for a payload of `payload_length` octets (the
/// object *including* its 8-octet nonce field), a time-to-live of `ttl`
/// seconds, and the sender's declared difficulty parameters.
pub fn target(
    payload_length: u64,
    ttl: u64,
    nonce_trials_per_byte: u64,
    payload_length_extra_bytes: u64,
) -> BigUint {
    target::target(payload_length, ttl, nonce_trials_per_byte, payload_length_extra_bytes)
}

/// Finds a nonce for `obj` (the object header-without-nonce concatenated with
/// its payload) such that `SHA512(SHA512(nonce ++ SHA512(obj)))[0..8] <= target`.
pub async fn solve(target: BigUint, obj: &[u8]) -> Result<u64> {
    let initial_hash = Sha512::digest(obj).to_vec();
    async_pow::solve(target, initial_hash).await
}

/// Verifies that `nonce` is a valid solution for `obj` under `target`. Not
/// exercised by the codecs themselves (decode does not re-check POW), but
/// offered for external collaborators — e.g. an inventory/gossip layer
/// (out of scope here) — that need to reject underpowered objects before
/// accepting them.
pub fn verify_nonce(target: &BigUint, nonce: u64, obj: &[u8]) -> bool {
    let initial_hash = Sha512::digest(obj);
    sync_pow::trial_value(nonce, &initial_hash) <= *target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn solved_nonce_verifies() {
        let obj = b"header-without-nonce + payload";
        let t = target(obj.len() as u64 + 8, 3600, 1, 64);
        let nonce = solve(t.clone(), obj).await.unwrap();
        assert!(verify_nonce(&t, nonce, obj));
    }
}
