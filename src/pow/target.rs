//! POW target computation, generalizing the teacher's `core/src/pow.rs::get_pow_target`
//! to the spec's explicit `(payloadLength, ttl, nonceTrialsPerByte, payloadLengthExtraBytes)`
//! parameters rather than reading them off an internal `Object`.

use num_bigint::BigUint;
use once_cell::sync::Lazy;

use super::{NETWORK_MIN_EXTRA_BYTES, NETWORK_MIN_NONCE_TRIALS_PER_BYTE};

static TWO_POW_16: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32).pow(16));
static TWO_POW_64: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32).pow(64));

/// Computes the POW target a nonce's trial value must fall under.
///
/// `payload_length` is the length of the object *including* the 8-octet nonce
/// field (the spec calls this `len(obj) + 8` at the `prepend_nonce` call site).
pub fn target(
    payload_length: u64,
    ttl: u64,
    nonce_trials_per_byte: u64,
    payload_length_extra_bytes: u64,
) -> BigUint {
    let nonce_trials_per_byte = if nonce_trials_per_byte == 0 {
        NETWORK_MIN_NONCE_TRIALS_PER_BYTE
    } else {
        nonce_trials_per_byte
    };
    let extra_bytes = if payload_length_extra_bytes == 0 {
        NETWORK_MIN_EXTRA_BYTES
    } else {
        payload_length_extra_bytes
    };

    let ttl = BigUint::from(ttl);
    let payload_bytes = BigUint::from(payload_length + extra_bytes);
    let denominator = BigUint::from(nonce_trials_per_byte)
        * (payload_bytes.clone() + ((ttl * payload_bytes) / TWO_POW_16.clone()));

    TWO_POW_64.clone() / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_difficulty_yields_lower_target() {
        let easy = target(1000, 3600, 1000, 1000);
        let hard = target(1000, 3600, 4000, 1000);
        assert!(hard < easy);
    }

    #[test]
    fn longer_ttl_yields_lower_target() {
        let short = target(1000, 3600, 1000, 1000);
        let long = target(1000, 3600 * 24, 1000, 1000);
        assert!(long < short);
    }

    #[test]
    fn zero_difficulty_params_fall_back_to_network_minimums() {
        let explicit = target(1000, 3600, NETWORK_MIN_NONCE_TRIALS_PER_BYTE, NETWORK_MIN_EXTRA_BYTES);
        let defaulted = target(1000, 3600, 0, 0);
        assert_eq!(explicit, defaulted);
    }
}
