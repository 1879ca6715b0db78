//! `pubkey`: publishes a sender's keys. v2 is cleartext, v3 adds a signature
//! over the header-and-body, v4 additionally ECIES-encrypts the signed v3
//! body behind a tag the recipient must already know (from a `getpubkey v4`).

use crate::address::{self, Address};
use crate::bitfield::PubkeyBitfield;
use crate::candidates::Candidates;
use crate::crypto;
use crate::error::{CodecError, Result};
use crate::message;
use crate::varint;

use super::{
    decode_payload, encode_payload_without_nonce, extract_pubkey, extract_pubkey_v3,
    prepend_nonce, strip_public_key, EnvelopeDecodeOpts, EnvelopeEncodeOpts, TYPE_PUBKEY,
};

pub struct EncodeOpts<'a> {
    pub ttl: u64,
    pub from: &'a Address,
    pub skip_pow: bool,
}

pub struct Decoded {
    pub version: u64,
    pub stream: u64,
    pub ttl: i64,
    pub behavior: PubkeyBitfield,
    pub sign_public_key: libsecp256k1::PublicKey,
    pub enc_public_key: libsecp256k1::PublicKey,
    pub nonce_trials_per_byte: Option<u64>,
    pub payload_length_extra_bytes: Option<u64>,
    pub length: usize,
}

fn v2_body(from: &Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(132);
    out.extend_from_slice(&from.behavior.to_bytes());
    out.extend_from_slice(&strip_public_key(from.sign_public_key.as_ref().unwrap()));
    out.extend_from_slice(&strip_public_key(from.enc_public_key.as_ref().unwrap()));
    out
}

fn v3_unsigned_body(from: &Address) -> Vec<u8> {
    let mut out = v2_body(from);
    out.extend_from_slice(&varint::encode(from.nonce_trials_per_byte));
    out.extend_from_slice(&varint::encode(from.payload_length_extra_bytes));
    out
}

/// Builds the nonced object payload only.
pub async fn encode_payload_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let from = opts.from;

    let object_payload = match from.version {
        2 => v2_body(from),
        3 => {
            let body = v3_unsigned_body(from);
            let envelope_prefix = envelope_prefix(from.version, from.stream, opts.ttl);
            let mut signed_region = envelope_prefix;
            signed_region.extend_from_slice(&body);
            let signature = crypto::sign(from.sign_private_key.as_ref().unwrap(), &signed_region).await?;

            let mut out = body;
            out.extend_from_slice(&varint::encode(signature.len() as u64));
            out.extend_from_slice(&signature);
            out
        }
        4 => {
            let body = v3_unsigned_body(from);
            let envelope_prefix = envelope_prefix(from.version, from.stream, opts.ttl);
            let mut signed_region = envelope_prefix;
            signed_region.extend_from_slice(&body);
            let signature = crypto::sign(from.sign_private_key.as_ref().unwrap(), &signed_region).await?;

            let mut pubkey_data = body;
            pubkey_data.extend_from_slice(&varint::encode(signature.len() as u64));
            pubkey_data.extend_from_slice(&signature);

            let recipient_key = address::pubkey_v4_key_from_tag(&from.tag);
            let recipient_public = libsecp256k1::PublicKey::from_secret_key(&recipient_key);
            let ciphertext = crypto::encrypt(&recipient_public, &pubkey_data).await?;

            let mut out = from.tag.to_vec();
            out.extend_from_slice(&ciphertext);
            out
        }
        v => return Err(CodecError::UnsupportedVersion(v)),
    };

    let envelope = encode_payload_without_nonce(
        &EnvelopeEncodeOpts {
            object_type: TYPE_PUBKEY,
            version: from.version,
            stream: from.stream,
            ttl: opts.ttl,
        },
        &object_payload,
    );
    prepend_nonce(
        envelope,
        opts.ttl,
        from.nonce_trials_per_byte,
        from.payload_length_extra_bytes,
        opts.skip_pow,
    )
    .await
}

pub async fn encode_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let payload = encode_payload_async(opts).await?;
    Ok(message::encode("object", &payload))
}

/// The `expiresTime || objectType || VarInt(version) || VarInt(stream)` prefix
/// a v3/v4 signature covers, reconstructed independently of the full
/// `encode_payload_without_nonce` call so encode can sign before it has a
/// complete `objectPayload`.
fn envelope_prefix(version: u64, stream: u64, ttl: u64) -> Vec<u8> {
    encode_payload_without_nonce(
        &EnvelopeEncodeOpts { object_type: TYPE_PUBKEY, version, stream, ttl },
        &[],
    )
}

/// Options for `pubkey v4` decode: candidate addresses the tag is matched
/// against.
pub struct DecodeOpts<'a> {
    pub needed: Option<&'a Candidates>,
}

pub async fn decode_payload_async(buf: &[u8], opts: &DecodeOpts<'_>) -> Result<Decoded> {
    let body = buf.get(8..).ok_or(CodecError::BadLength)?;
    let envelope = decode_payload(
        body,
        &EnvelopeDecodeOpts { max_age_tolerance: u64::MAX, max_ttl: u64::MAX, expected_type: TYPE_PUBKEY },
    )?;

    match envelope.version {
        2 => {
            let parsed = extract_pubkey(envelope.payload)?;
            Ok(Decoded {
                version: envelope.version,
                stream: envelope.stream,
                ttl: envelope.ttl,
                behavior: parsed.behavior,
                sign_public_key: parsed.sign_public_key,
                enc_public_key: parsed.enc_public_key,
                nonce_trials_per_byte: None,
                payload_length_extra_bytes: None,
                length: 8 + envelope.header_length + parsed.length,
            })
        }
        3 => {
            let parsed = extract_pubkey_v3(envelope.payload)?;
            let sig_len = varint::decode(&envelope.payload[parsed.length..])?;
            let sig_start = parsed.length + sig_len.length;
            let signature = envelope
                .payload
                .get(sig_start..sig_start + sig_len.value as usize)
                .ok_or(CodecError::BadLength)?;

            let mut signed_region = body[..envelope.header_length].to_vec();
            signed_region.extend_from_slice(&envelope.payload[..parsed.length]);
            crypto::verify(&parsed.fixed.sign_public_key, &signed_region, signature).await?;

            Ok(Decoded {
                version: envelope.version,
                stream: envelope.stream,
                ttl: envelope.ttl,
                behavior: parsed.fixed.behavior,
                sign_public_key: parsed.fixed.sign_public_key,
                enc_public_key: parsed.fixed.enc_public_key,
                nonce_trials_per_byte: Some(parsed.nonce_trials_per_byte),
                payload_length_extra_bytes: Some(parsed.payload_length_extra_bytes),
                length: 8 + envelope.header_length + sig_start + sig_len.value as usize,
            })
        }
        4 => {
            let tag: [u8; 32] = envelope.payload.get(0..32).ok_or(CodecError::BadLength)?.try_into().unwrap();
            let needed = opts.needed.ok_or(CodecError::NotInterested)?;
            needed.find_by_tag(&tag).ok_or(CodecError::NotInterested)?;

            let ciphertext = &envelope.payload[32..];
            let recipient_key = address::pubkey_v4_key_from_tag(&tag);
            let pubkey_data = crypto::decrypt(&recipient_key, ciphertext).await?;

            let parsed = extract_pubkey_v3(&pubkey_data)?;
            let sig_len = varint::decode(&pubkey_data[parsed.length..])?;
            let sig_start = parsed.length + sig_len.length;
            let signature = pubkey_data
                .get(sig_start..sig_start + sig_len.value as usize)
                .ok_or(CodecError::BadLength)?;

            let mut signed_region = body[..envelope.header_length].to_vec();
            signed_region.extend_from_slice(&pubkey_data[..parsed.length]);
            crypto::verify(&parsed.fixed.sign_public_key, &signed_region, signature).await?;

            Ok(Decoded {
                version: envelope.version,
                stream: envelope.stream,
                ttl: envelope.ttl,
                behavior: parsed.fixed.behavior,
                sign_public_key: parsed.fixed.sign_public_key,
                enc_public_key: parsed.fixed.enc_public_key,
                nonce_trials_per_byte: Some(parsed.nonce_trials_per_byte),
                payload_length_extra_bytes: Some(parsed.payload_length_extra_bytes),
                length: 8 + envelope.header_length + envelope.payload.len(),
            })
        }
        v => Err(CodecError::UnsupportedVersion(v)),
    }
}

pub async fn decode_async(buf: &[u8], opts: &DecodeOpts<'_>) -> Result<Decoded> {
    let (command, payload) = message::decode(buf)?;
    if command != "object" {
        return Err(CodecError::BadCommand);
    }
    decode_payload_async(&payload, opts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsecp256k1::SecretKey;

    fn sample_address(version: u64) -> Address {
        Address::with_private_keys(
            version,
            1,
            SecretKey::parse_slice(&[13u8; 32]).unwrap(),
            SecretKey::parse_slice(&[27u8; 32]).unwrap(),
        )
    }

    #[async_std::test]
    async fn v2_round_trips_cleartext() {
        let from = sample_address(2);
        let opts = EncodeOpts { ttl: 3600, from: &from, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();
        let decoded = decode_payload_async(&encoded, &DecodeOpts { needed: None }).await.unwrap();
        assert_eq!(decoded.sign_public_key, from.sign_public_key.unwrap());
        assert_eq!(decoded.enc_public_key, from.enc_public_key.unwrap());
    }

    #[async_std::test]
    async fn v3_round_trips_with_valid_signature() {
        let from = sample_address(3);
        let opts = EncodeOpts { ttl: 3600, from: &from, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();
        let decoded = decode_payload_async(&encoded, &DecodeOpts { needed: None }).await.unwrap();
        assert_eq!(decoded.nonce_trials_per_byte, Some(from.nonce_trials_per_byte));
    }

    #[async_std::test]
    async fn v3_tampered_signature_is_rejected() {
        let from = sample_address(3);
        let opts = EncodeOpts { ttl: 3600, from: &from, skip_pow: true };
        let mut encoded = encode_payload_async(&opts).await.unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        let result = decode_payload_async(&encoded, &DecodeOpts { needed: None }).await;
        assert!(result.is_err());
    }

    #[async_std::test]
    async fn v4_round_trips_when_tag_is_known() {
        let from = sample_address(4);
        let opts = EncodeOpts { ttl: 3600, from: &from, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let needed = Candidates::from(Address::from_ripe(4, from.stream, from.ripe));
        // `find_by_tag` only needs `version`/`tag`; rebuild using the real tag.
        let needed = Candidates::from(crate::address::Address { tag: from.tag, ..match needed {
            Candidates::One(a) => a,
            _ => unreachable!(),
        }});

        let decoded = decode_payload_async(&encoded, &DecodeOpts { needed: Some(&needed) }).await.unwrap();
        assert_eq!(decoded.sign_public_key, from.sign_public_key.unwrap());
    }

    #[async_std::test]
    async fn v4_unknown_tag_is_not_interested() {
        let from = sample_address(4);
        let opts = EncodeOpts { ttl: 3600, from: &from, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let stranger = sample_address(4);
        let needed = Candidates::from(stranger);
        let result = decode_payload_async(&encoded, &DecodeOpts { needed: Some(&needed) }).await;
        assert!(matches!(result, Err(CodecError::NotInterested)));
    }
}
