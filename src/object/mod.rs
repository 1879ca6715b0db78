//! The object envelope: the header every `getpubkey`/`pubkey`/`msg`/`broadcast`
//! payload shares, plus the helpers (pubkey body parsing, candidate trial
//! loops) the four codecs below build on.

pub mod broadcast;
pub mod getpubkey;
pub mod msg;
pub mod pubkey;

use std::time::{SystemTime, UNIX_EPOCH};

use libsecp256k1::PublicKey;

use crate::address::Address;
use crate::bitfield::PubkeyBitfield;
use crate::candidates::Candidates;
use crate::error::{CodecError, Result};
use crate::pow;
use crate::varint;

/// Maximum encoded object length, excluding the 8-octet nonce.
pub const MAX_PAYLOAD_LENGTH: usize = 262_136;

pub const TYPE_GETPUBKEY: u32 = 0;
pub const TYPE_PUBKEY: u32 = 1;
pub const TYPE_MSG: u32 = 2;
pub const TYPE_BROADCAST: u32 = 3;

/// Options shared by every `encode_payload_without_nonce` call.
pub struct EnvelopeEncodeOpts {
    pub object_type: u32,
    pub version: u64,
    pub stream: u64,
    pub ttl: u64,
}

/// The parsed common envelope: everything up to (but not including) the
/// `objectPayload`, plus that payload as a sub-slice.
pub struct ParsedEnvelope<'a> {
    pub expires_time: u64,
    pub ttl: i64,
    pub object_type: u32,
    pub version: u64,
    pub stream: u64,
    /// Octets from `expiresTime` through the end of `stream` — the region
    /// signatures cover when prefixed with the object header's nonce-excluded
    /// start, i.e. `&buf[8..8+header_length]` on the full (nonced) wire form.
    pub header_length: usize,
    pub payload: &'a [u8],
}

/// Options governing acceptance of a decoded envelope.
pub struct EnvelopeDecodeOpts {
    /// Expiry tolerance, seconds: reject objects whose `expiresTime` is more
    /// than `max_age_tolerance` seconds in the past.
    pub max_age_tolerance: u64,
    /// Reject objects whose TTL (from now) would exceed this many seconds.
    pub max_ttl: u64,
    pub expected_type: u32,
}

/// `expiresTime(8) || objectType(4) || VarInt(version) || VarInt(stream) || objectPayload`.
pub fn encode_payload_without_nonce(opts: &EnvelopeEncodeOpts, object_payload: &[u8]) -> Vec<u8> {
    let expires_time = now_unix() + opts.ttl;
    let mut out = Vec::with_capacity(16 + object_payload.len());
    out.extend_from_slice(&expires_time.to_be_bytes());
    out.extend_from_slice(&opts.object_type.to_be_bytes());
    out.extend_from_slice(&varint::encode(opts.version));
    out.extend_from_slice(&varint::encode(opts.stream));
    out.extend_from_slice(object_payload);
    out
}

/// Parses the envelope out of `buf` (which must start at `expiresTime`, i.e.
/// the nonce must already have been stripped by the caller).
pub fn decode_payload<'a>(buf: &'a [u8], opts: &EnvelopeDecodeOpts) -> Result<ParsedEnvelope<'a>> {
    let expires_bytes = buf.get(0..8).ok_or(CodecError::BadLength)?;
    let expires_time = u64::from_be_bytes(expires_bytes.try_into().unwrap());

    let type_bytes = buf.get(8..12).ok_or(CodecError::BadLength)?;
    let object_type = u32::from_be_bytes(type_bytes.try_into().unwrap());
    if object_type != opts.expected_type {
        return Err(CodecError::WrongType);
    }

    let version = varint::decode(&buf[12..])?;
    let stream = varint::decode(&buf[12 + version.length..])?;
    let header_length = 12 + version.length + stream.length;

    let now = now_unix();
    if expires_time + opts.max_age_tolerance < now {
        return Err(CodecError::BadLength);
    }
    let ttl = expires_time as i64 - now as i64;
    if ttl > opts.max_ttl as i64 {
        return Err(CodecError::BadLength);
    }

    Ok(ParsedEnvelope {
        expires_time,
        ttl,
        object_type,
        version: version.value,
        stream: stream.value,
        header_length,
        payload: &buf[header_length..],
    })
}

/// Finds a proof-of-work nonce for `obj` (header-without-nonce concatenated
/// with the object payload) and prepends it, or prepends a zero nonce if
/// `skip_pow` is set. Rejects oversized payloads before spending any POW work.
pub async fn prepend_nonce(
    obj: Vec<u8>,
    ttl: u64,
    nonce_trials_per_byte: u64,
    payload_length_extra_bytes: u64,
    skip_pow: bool,
) -> Result<Vec<u8>> {
    if obj.len() > MAX_PAYLOAD_LENGTH {
        return Err(CodecError::PayloadTooLarge(obj.len()));
    }

    let mut out = Vec::with_capacity(obj.len() + 8);
    if skip_pow {
        out.extend_from_slice(&[0u8; 8]);
    } else {
        let target = pow::target(
            obj.len() as u64 + 8,
            ttl,
            nonce_trials_per_byte,
            payload_length_extra_bytes,
        );
        let nonce = pow::solve(target, &obj).await?;
        out.extend_from_slice(&nonce.to_be_bytes());
    }
    out.extend_from_slice(&obj);
    Ok(out)
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

/// A parsed fixed-shape pubkey body: behavior flags plus both public keys,
/// with the `0x04` prefix restored.
pub struct PubkeyBody {
    pub behavior: PubkeyBitfield,
    pub sign_public_key: PublicKey,
    pub enc_public_key: PublicKey,
    /// Octets consumed from the input buffer.
    pub length: usize,
}

/// Parses the 132-octet `behavior(4) || signPubKey[1..](64) || encPubKey[1..](64)`
/// body shared by pubkey v2/v3/v4 and the msg/broadcast cleartext bodies.
pub fn extract_pubkey(buf: &[u8]) -> Result<PubkeyBody> {
    let behavior_bytes: [u8; 4] = buf.get(0..4).ok_or(CodecError::BadLength)?.try_into().unwrap();
    let behavior = PubkeyBitfield::from_bytes(behavior_bytes);

    let sign_public_key = parse_stripped_public_key(buf.get(4..68).ok_or(CodecError::BadLength)?)?;
    let enc_public_key = parse_stripped_public_key(buf.get(68..132).ok_or(CodecError::BadLength)?)?;

    Ok(PubkeyBody {
        behavior,
        sign_public_key,
        enc_public_key,
        length: 132,
    })
}

/// Parses a pubkey v3-shaped extension: the fixed 132-octet body above,
/// followed by the two difficulty `VarInt`s, returning them alongside the
/// fixed body and total consumed length.
pub struct PubkeyBodyV3 {
    pub fixed: PubkeyBody,
    pub nonce_trials_per_byte: u64,
    pub payload_length_extra_bytes: u64,
    pub length: usize,
}

pub fn extract_pubkey_v3(buf: &[u8]) -> Result<PubkeyBodyV3> {
    let fixed = extract_pubkey(buf)?;
    let rest = &buf[fixed.length..];
    let nonce_trials = varint::decode(rest)?;
    let extra_bytes = varint::decode(&rest[nonce_trials.length..])?;
    let length = fixed.length + nonce_trials.length + extra_bytes.length;
    Ok(PubkeyBodyV3 {
        nonce_trials_per_byte: nonce_trials.value,
        payload_length_extra_bytes: extra_bytes.value,
        length,
        fixed,
    })
}

/// Restores the `0x04` uncompressed-point prefix stripped before embedding,
/// then parses the resulting 65-octet key.
pub fn parse_stripped_public_key(stripped: &[u8]) -> Result<PublicKey> {
    if stripped.len() != 64 {
        return Err(CodecError::BadLength);
    }
    let mut full = [0u8; 65];
    full[0] = 0x04;
    full[1..].copy_from_slice(stripped);
    PublicKey::parse(&full).map_err(|e| CodecError::CryptoError(format!("{e:?}")))
}

/// Serializes `key` and strips its leading `0x04` prefix for wire embedding.
pub fn strip_public_key(key: &PublicKey) -> [u8; 64] {
    let full = key.serialize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&full[1..]);
    out
}

/// Tries each candidate's ECIES-decryption key against `blob` in order,
/// returning the first (address, cleartext) pair that decrypts successfully.
/// All but the last failure are swallowed; the aggregate failure is reported
/// as [`CodecError::DecryptFailed`].
pub(crate) async fn try_decrypt_with<'a, F>(
    candidates: &'a Candidates,
    blob: &[u8],
    key_for: F,
) -> Result<(&'a Address, Vec<u8>)>
where
    F: Fn(&Address) -> libsecp256k1::SecretKey,
{
    for candidate in candidates.iter() {
        let key = key_for(candidate);
        if let Ok(cleartext) = crate::crypto::decrypt(&key, blob).await {
            return Ok((candidate, cleartext));
        }
    }
    Err(CodecError::DecryptFailed)
}
