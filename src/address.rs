//! `Address`: the external collaborator the codecs consume for key material,
//! routing identifiers (`ripe`, `tag`), and POW difficulty parameters.
//!
//! This is deliberately a thin stand-in for the real Bitmessage address
//! subsystem (out of scope per the spec): it carries exactly the fields and
//! derivations the object codecs need, generalizing the teacher's
//! `network/address.rs` (which derived `ripe`/`tag` from a double hash of
//! `ripe` alone) to fold the address `version`/`stream` into the tag
//! derivation, and adding the pubkey-from-tag / broadcast-key accessors the
//! `pubkey v4` and `broadcast` codecs require.

use libsecp256k1::{PublicKey, SecretKey};
use ripemd::{Digest, Ripemd160};
use sha2::Sha512;

use crate::bitfield::PubkeyBitfield;
use crate::pow::{NETWORK_MIN_EXTRA_BYTES, NETWORK_MIN_NONCE_TRIALS_PER_BYTE};
use crate::varint;

/// Domain-separation labels for the deterministic key derivations below. Each
/// keypair is derived from a distinct preimage so that compromising one
/// derived secret (e.g. the pubkey-from-tag key, which an observer on the wire
/// can at least attempt to brute-force against the public tag) says nothing
/// about the others.
const PUBKEY_V4_KEY_LABEL: &[u8] = b"pubkey-v4";
const BROADCAST_V4_KEY_LABEL: &[u8] = b"broadcast-v4";
const BROADCAST_V5_KEY_LABEL: &[u8] = b"broadcast-v5";

/// A Bitmessage address as consumed by the object codecs.
#[derive(Debug, Clone)]
pub struct Address {
    pub version: u64,
    pub stream: u64,
    pub ripe: [u8; 20],
    pub tag: [u8; 32],

    pub sign_public_key: Option<PublicKey>,
    pub enc_public_key: Option<PublicKey>,
    pub sign_private_key: Option<SecretKey>,
    pub enc_private_key: Option<SecretKey>,

    pub behavior: PubkeyBitfield,
    pub nonce_trials_per_byte: u64,
    pub payload_length_extra_bytes: u64,
}

impl Address {
    /// Builds an address that only knows its own routing identifiers (no key
    /// material) — the shape a `getpubkey` recipient or an identity-less
    /// broadcast subscription is constructed from.
    pub fn from_ripe(version: u64, stream: u64, ripe: [u8; 20]) -> Self {
        let tag = derive_tag(version, stream, &ripe);
        Address {
            version,
            stream,
            ripe,
            tag,
            sign_public_key: None,
            enc_public_key: None,
            sign_private_key: None,
            enc_private_key: None,
            behavior: PubkeyBitfield::default(),
            nonce_trials_per_byte: NETWORK_MIN_NONCE_TRIALS_PER_BYTE,
            payload_length_extra_bytes: NETWORK_MIN_EXTRA_BYTES,
        }
    }

    /// Builds a full address from its public keys.
    pub fn with_public_keys(
        version: u64,
        stream: u64,
        sign_public_key: PublicKey,
        enc_public_key: PublicKey,
    ) -> Self {
        let ripe = ripe_of(&sign_public_key, &enc_public_key);
        let mut address = Self::from_ripe(version, stream, ripe);
        address.sign_public_key = Some(sign_public_key);
        address.enc_public_key = Some(enc_public_key);
        address
    }

    /// Builds an own identity from its private keys.
    pub fn with_private_keys(
        version: u64,
        stream: u64,
        sign_private_key: SecretKey,
        enc_private_key: SecretKey,
    ) -> Self {
        let sign_public_key = PublicKey::from_secret_key(&sign_private_key);
        let enc_public_key = PublicKey::from_secret_key(&enc_private_key);
        let mut address = Self::with_public_keys(version, stream, sign_public_key, enc_public_key);
        address.sign_private_key = Some(sign_private_key);
        address.enc_private_key = Some(enc_private_key);
        address
    }

    pub fn string_repr(&self) -> String {
        bs58::encode(self.ripe).into_string()
    }

    /// The deterministic keypair anyone who knows this address's `tag` (e.g.
    /// from a `getpubkey v4` request on the wire) can derive, used to encrypt
    /// a `pubkey v4` reply.
    pub fn pubkey_v4_private_key(&self) -> SecretKey {
        derive_key(PUBKEY_V4_KEY_LABEL, &self.tag)
    }

    pub fn pubkey_v4_public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&self.pubkey_v4_private_key())
    }

    /// The deterministic keypair subscribers derive to decrypt a `broadcast`
    /// from this address: from `ripe` when this address is pre-v4 (wire
    /// version 4 broadcasts), from `tag` when it is v4+ (wire version 5
    /// broadcasts).
    pub fn broadcast_private_key(&self) -> SecretKey {
        if self.version >= 4 {
            derive_key(BROADCAST_V5_KEY_LABEL, &self.tag)
        } else {
            derive_key(BROADCAST_V4_KEY_LABEL, &self.ripe)
        }
    }

    pub fn broadcast_public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&self.broadcast_private_key())
    }
}

/// Derives the broadcast decryption key a v4-sender's subscribers use, from
/// `ripe` alone (no `Address` required — subscribers of an old-style address
/// may only have its ripe on file).
pub fn broadcast_v4_key_from_ripe(ripe: &[u8; 20]) -> SecretKey {
    derive_key(BROADCAST_V4_KEY_LABEL, ripe)
}

/// Derives the broadcast decryption key a v5-sender's subscribers use, from
/// `tag` alone.
pub fn broadcast_v5_key_from_tag(tag: &[u8; 32]) -> SecretKey {
    derive_key(BROADCAST_V5_KEY_LABEL, tag)
}

/// Derives the pubkey-v4 decryption key from `tag` alone (mirrors
/// [`Address::pubkey_v4_private_key`] for callers that only have the tag off
/// the wire, e.g. when answering a `getpubkey v4`).
pub fn pubkey_v4_key_from_tag(tag: &[u8; 32]) -> SecretKey {
    derive_key(PUBKEY_V4_KEY_LABEL, tag)
}

/// `tag = SHA512(SHA512(VarInt(version) ++ VarInt(stream) ++ ripe))[32..64]`.
pub fn derive_tag(version: u64, stream: u64, ripe: &[u8; 20]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(18 + 20);
    preimage.extend_from_slice(&varint::encode(version));
    preimage.extend_from_slice(&varint::encode(stream));
    preimage.extend_from_slice(ripe);
    let checksum = double_sha512(&preimage);
    let mut tag = [0u8; 32];
    tag.copy_from_slice(&checksum[32..64]);
    tag
}

/// `ripe = RIPEMD160(SHA512(signPublicKey) ++ SHA512(encPublicKey)... )`,
/// matching the teacher's `with_public_key` construction: `RIPEMD160` of the
/// concatenation of a SHA-512 hasher fed both serialized public keys.
fn ripe_of(sign_public_key: &PublicKey, enc_public_key: &PublicKey) -> [u8; 20] {
    use sha2::Digest as _;
    let mut sha = Sha512::new();
    sha.update(sign_public_key.serialize());
    sha.update(enc_public_key.serialize());
    let sha_digest = sha.finalize();

    let mut ripemd = Ripemd160::new();
    ripemd.update(sha_digest);
    let digest = ripemd.finalize();

    let mut ripe = [0u8; 20];
    ripe.copy_from_slice(&digest);
    ripe
}

fn double_sha512(data: &[u8]) -> [u8; 64] {
    use sha2::Digest as _;
    let first = Sha512::digest(data);
    let second = Sha512::digest(first);
    let mut out = [0u8; 64];
    out.copy_from_slice(&second);
    out
}

/// Hashes `label ++ preimage` with double-SHA-512 and takes the first 32
/// octets as a secp256k1 secret scalar. The probability of landing on an
/// invalid scalar (zero, or >= curve order) is astronomically small; on the
/// rare failure we deterministically retry by re-hashing, so the function
/// never panics and always terminates.
fn derive_key(label: &[u8], preimage: &[u8]) -> SecretKey {
    let mut input = Vec::with_capacity(label.len() + preimage.len());
    input.extend_from_slice(label);
    input.extend_from_slice(preimage);
    loop {
        let digest = double_sha512(&input);
        if let Ok(key) = SecretKey::parse_slice(&digest[..32]) {
            return key;
        }
        input = digest.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_derivation_is_deterministic() {
        let ripe = [7u8; 20];
        let a = derive_tag(4, 1, &ripe);
        let b = derive_tag(4, 1, &ripe);
        assert_eq!(a, b);
        assert_ne!(a, derive_tag(3, 1, &ripe));
        assert_ne!(a, derive_tag(4, 2, &ripe));
    }

    #[test]
    fn derived_keypairs_are_domain_separated() {
        let ripe = [9u8; 20];
        let tag = derive_tag(4, 1, &ripe);
        let pubkey_key = pubkey_v4_key_from_tag(&tag);
        let broadcast_key = broadcast_v5_key_from_tag(&tag);
        assert_ne!(pubkey_key.serialize(), broadcast_key.serialize());
    }

    #[test]
    fn with_private_keys_round_trips_into_public() {
        let sk_sign = SecretKey::parse_slice(&[3u8; 32]).unwrap();
        let sk_enc = SecretKey::parse_slice(&[5u8; 32]).unwrap();
        let addr = Address::with_private_keys(4, 1, sk_sign, sk_enc);
        assert_eq!(
            addr.sign_public_key.unwrap(),
            PublicKey::from_secret_key(&addr.sign_private_key.unwrap())
        );
    }
}
