//! `getpubkey`: a request for an unknown public key. No signature, no
//! encryption — just routing information sized to the recipient's address
//! version.

use crate::address::Address;
use crate::error::{CodecError, Result};
use crate::message;

use super::{decode_payload, encode_payload_without_nonce, prepend_nonce, EnvelopeDecodeOpts, EnvelopeEncodeOpts, TYPE_GETPUBKEY};

pub struct EncodeOpts<'a> {
    pub ttl: u64,
    pub to: &'a Address,
    pub skip_pow: bool,
}

pub struct Decoded {
    pub version: u64,
    pub stream: u64,
    pub ttl: i64,
    /// 20 octets for v2/v3, 32 octets for v4.
    pub identifier: Vec<u8>,
    pub length: usize,
}

fn payload_for(to: &Address) -> Vec<u8> {
    if to.version >= 4 {
        to.tag.to_vec()
    } else {
        to.ripe.to_vec()
    }
}

/// Builds the nonced object payload only (no outer network framing).
pub async fn encode_payload_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let envelope = encode_payload_without_nonce(
        &EnvelopeEncodeOpts {
            object_type: TYPE_GETPUBKEY,
            version: opts.to.version,
            stream: opts.to.stream,
            ttl: opts.ttl,
        },
        &payload_for(opts.to),
    );
    prepend_nonce(
        envelope,
        opts.ttl,
        opts.to.nonce_trials_per_byte,
        opts.to.payload_length_extra_bytes,
        opts.skip_pow,
    )
    .await
}

/// Builds the full, network-framed message (`message::encode("object", payload)`).
pub async fn encode_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let payload = encode_payload_async(opts).await?;
    Ok(message::encode("object", &payload))
}

/// Decodes a nonced object payload (starting at the 8-octet nonce).
pub async fn decode_payload_async(buf: &[u8]) -> Result<Decoded> {
    let body = buf.get(8..).ok_or(CodecError::BadLength)?;
    let envelope = decode_payload(
        body,
        &EnvelopeDecodeOpts {
            max_age_tolerance: u64::MAX,
            max_ttl: u64::MAX,
            expected_type: TYPE_GETPUBKEY,
        },
    )?;

    if !(2..=4).contains(&envelope.version) {
        return Err(CodecError::UnsupportedVersion(envelope.version));
    }

    let expected_len = if envelope.version >= 4 { 32 } else { 20 };
    if envelope.payload.len() != expected_len {
        return Err(CodecError::BadLength);
    }

    Ok(Decoded {
        version: envelope.version,
        stream: envelope.stream,
        ttl: envelope.ttl,
        identifier: envelope.payload.to_vec(),
        length: 8 + envelope.header_length + envelope.payload.len(),
    })
}

/// Decodes a fully-framed network message.
pub async fn decode_async(buf: &[u8]) -> Result<Decoded> {
    let (command, payload) = message::decode(buf)?;
    if command != "object" {
        return Err(CodecError::BadCommand);
    }
    decode_payload_async(&payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsecp256k1::SecretKey;

    fn sample_address(version: u64) -> Address {
        Address::with_private_keys(
            version,
            1,
            SecretKey::parse_slice(&[11u8; 32]).unwrap(),
            SecretKey::parse_slice(&[22u8; 32]).unwrap(),
        )
    }

    #[async_std::test]
    async fn v2_round_trips_on_ripe() {
        let to = sample_address(2);
        let opts = EncodeOpts { ttl: 3600, to: &to, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();
        let decoded = decode_payload_async(&encoded).await.unwrap();
        assert_eq!(decoded.version, 2);
        assert_eq!(decoded.identifier, to.ripe.to_vec());
        assert_eq!(decoded.length, encoded.len());
    }

    #[async_std::test]
    async fn v4_round_trips_on_tag() {
        let to = sample_address(4);
        let opts = EncodeOpts { ttl: 3600, to: &to, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();
        let decoded = decode_payload_async(&encoded).await.unwrap();
        assert_eq!(decoded.version, 4);
        assert_eq!(decoded.identifier, to.tag.to_vec());
    }

    #[async_std::test]
    async fn wrong_type_is_rejected() {
        let to = sample_address(3);
        let opts = EncodeOpts { ttl: 3600, to: &to, skip_pow: true };
        let mut encoded = encode_payload_async(&opts).await.unwrap();
        // Flip the objectType field (offset 8+8=16) to MSG.
        encoded[19] = crate::object::TYPE_MSG as u8;
        let result = decode_payload_async(&encoded).await;
        assert!(matches!(result, Err(CodecError::WrongType)));
    }
}
