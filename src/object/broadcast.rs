//! `broadcast`: a signed message broadcast to subscribers. Two wire versions:
//! v4 (sender address v2/v3, keyed by ripe) and v5 (sender address v4+, keyed
//! by tag).

use crate::address::{self, Address};
use crate::bitfield::PubkeyBitfield;
use crate::candidates::Candidates;
use crate::crypto;
use crate::error::{CodecError, Result};
use crate::message;
use crate::varint;

use super::{
    decode_payload, encode_payload_without_nonce, extract_pubkey, prepend_nonce, strip_public_key,
    EnvelopeDecodeOpts, EnvelopeEncodeOpts, TYPE_BROADCAST,
};

pub struct EncodeOpts<'a> {
    pub ttl: u64,
    pub from: &'a Address,
    pub message: String,
    pub encoding: Option<u64>,
    pub skip_pow: bool,
}

pub struct Decoded {
    pub sender_version: u64,
    pub sender_stream: u64,
    pub ttl: i64,
    pub behavior: PubkeyBitfield,
    pub sign_public_key: libsecp256k1::PublicKey,
    pub enc_public_key: libsecp256k1::PublicKey,
    pub encoding: u64,
    pub message: String,
    pub length: usize,
}

fn wire_version(from: &Address) -> u64 {
    if from.version >= 4 { 5 } else { 4 }
}

/// Builds the nonced object payload only.
pub async fn encode_payload_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let from = opts.from;
    let version = wire_version(from);
    let encoding = opts.encoding.unwrap_or(crate::object::msg::ENCODING_TRIVIAL);

    // Close the asymmetry the design notes flag: a `from` whose own keys
    // don't reconstruct its declared ripe/tag would produce a broadcast no
    // subscriber could ever accept, so reject it here rather than at decode.
    let reconstructed_ripe = address::Address::with_public_keys(
        from.version,
        from.stream,
        from.sign_public_key.clone().expect("from must carry public keys"),
        from.enc_public_key.clone().expect("from must carry public keys"),
    );
    if reconstructed_ripe.ripe != from.ripe {
        return Err(CodecError::KeyMismatch);
    }

    let mut cleartext = Vec::new();
    cleartext.extend_from_slice(&varint::encode(from.version));
    cleartext.extend_from_slice(&varint::encode(from.stream));
    cleartext.extend_from_slice(&from.behavior.to_bytes());
    cleartext.extend_from_slice(&strip_public_key(from.sign_public_key.as_ref().unwrap()));
    cleartext.extend_from_slice(&strip_public_key(from.enc_public_key.as_ref().unwrap()));
    if from.version >= 3 {
        cleartext.extend_from_slice(&varint::encode(from.nonce_trials_per_byte));
        cleartext.extend_from_slice(&varint::encode(from.payload_length_extra_bytes));
    }
    cleartext.extend_from_slice(&varint::encode(encoding));
    let text = match encoding {
        e if e == crate::object::msg::ENCODING_SIMPLE => {
            format!("Subject:\nBody:{}", opts.message).into_bytes()
        }
        _ => opts.message.as_bytes().to_vec(),
    };
    cleartext.extend_from_slice(&varint::encode(text.len() as u64));
    cleartext.extend_from_slice(&text);

    let object_payload_prefix: Vec<u8> = if version == 5 { from.tag.to_vec() } else { Vec::new() };

    let mut envelope_prefix = encode_payload_without_nonce(
        &EnvelopeEncodeOpts { object_type: TYPE_BROADCAST, version, stream: from.stream, ttl: opts.ttl },
        &object_payload_prefix,
    );
    // For v5 this already includes the tag prefix, matching what decode sees
    // as `header-without-nonce` (which, per the spec, includes the tag).
    let mut signed_region = std::mem::take(&mut envelope_prefix);
    signed_region.extend_from_slice(&cleartext);
    let signature = crypto::sign(from.sign_private_key.as_ref().unwrap(), &signed_region).await?;

    cleartext.extend_from_slice(&varint::encode(signature.len() as u64));
    cleartext.extend_from_slice(&signature);

    let broadcast_public_key = libsecp256k1::PublicKey::from_secret_key(&from.broadcast_private_key());
    let ciphertext = crypto::encrypt(&broadcast_public_key, &cleartext).await?;

    let mut object_payload = object_payload_prefix;
    object_payload.extend_from_slice(&ciphertext);

    let envelope = encode_payload_without_nonce(
        &EnvelopeEncodeOpts { object_type: TYPE_BROADCAST, version, stream: from.stream, ttl: opts.ttl },
        &object_payload,
    );
    prepend_nonce(envelope, opts.ttl, from.nonce_trials_per_byte, from.payload_length_extra_bytes, opts.skip_pow).await
}

pub async fn encode_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let payload = encode_payload_async(opts).await?;
    Ok(message::encode("object", &payload))
}

pub struct DecodeOpts<'a> {
    pub subscriptions: &'a Candidates,
}

pub async fn decode_payload_async(buf: &[u8], opts: &DecodeOpts<'_>) -> Result<Decoded> {
    let body = buf.get(8..).ok_or(CodecError::BadLength)?;
    let envelope = decode_payload(
        body,
        &EnvelopeDecodeOpts { max_age_tolerance: u64::MAX, max_ttl: u64::MAX, expected_type: TYPE_BROADCAST },
    )?;

    let (header_with_tag, tag, ciphertext) = match envelope.version {
        4 => (body[..envelope.header_length].to_vec(), None, envelope.payload),
        5 => {
            let tag: [u8; 32] = envelope.payload.get(0..32).ok_or(CodecError::BadLength)?.try_into().unwrap();
            let mut header = body[..envelope.header_length].to_vec();
            header.extend_from_slice(&tag);
            (header, Some(tag), &envelope.payload[32..])
        }
        v => return Err(CodecError::UnsupportedVersion(v)),
    };

    let (subscription, cleartext) = match tag {
        Some(tag) => {
            let subscription = opts.subscriptions.find_by_tag(&tag).ok_or(CodecError::NotInterested)?;
            let key = address::broadcast_v5_key_from_tag(&tag);
            let cleartext = crypto::decrypt(&key, ciphertext).await?;
            (subscription, cleartext)
        }
        None => {
            super::try_decrypt_with(opts.subscriptions, ciphertext, |addr| {
                address::broadcast_v4_key_from_ripe(&addr.ripe)
            })
            .await?
        }
    };

    let sender_version = varint::decode(&cleartext)?;
    let mut offset = sender_version.length;
    if envelope.version == 4 && !(2..=3).contains(&sender_version.value) {
        return Err(CodecError::UnsupportedVersion(sender_version.value));
    }
    if envelope.version == 5 && sender_version.value != 4 {
        return Err(CodecError::UnsupportedVersion(sender_version.value));
    }

    let sender_stream = varint::decode(&cleartext[offset..])?;
    offset += sender_stream.length;
    if sender_stream.value != envelope.stream {
        return Err(CodecError::BadLength);
    }

    let fixed = extract_pubkey(&cleartext[offset..])?;
    offset += fixed.length;

    if sender_version.value >= 3 {
        let nonce_trials = varint::decode(&cleartext[offset..])?;
        offset += nonce_trials.length;
        let extra_bytes = varint::decode(&cleartext[offset..])?;
        offset += extra_bytes.length;
    }

    let reconstructed = Address::with_public_keys(
        sender_version.value,
        sender_stream.value,
        fixed.sign_public_key.clone(),
        fixed.enc_public_key.clone(),
    );
    match tag {
        Some(tag) => {
            if reconstructed.tag != tag {
                return Err(CodecError::KeyMismatch);
            }
        }
        None => {
            if reconstructed.ripe != subscription.ripe {
                return Err(CodecError::KeyMismatch);
            }
        }
    }

    let encoding = varint::decode(&cleartext[offset..])?;
    offset += encoding.length;

    let msg_len = varint::decode(&cleartext[offset..])?;
    offset += msg_len.length;
    let message_bytes = cleartext.get(offset..offset + msg_len.value as usize).ok_or(CodecError::BadLength)?;
    offset += msg_len.value as usize;

    let signed_region_len = offset;
    let sig_len = varint::decode(&cleartext[offset..])?;
    offset += sig_len.length;
    let signature = cleartext.get(offset..offset + sig_len.value as usize).ok_or(CodecError::BadLength)?;

    let mut signed_region = header_with_tag;
    signed_region.extend_from_slice(&cleartext[..signed_region_len]);
    crypto::verify(&fixed.sign_public_key, &signed_region, signature).await?;

    let text = String::from_utf8_lossy(message_bytes).into_owned();
    let message_text = if encoding.value == crate::object::msg::ENCODING_SIMPLE {
        let (_, message) = text
            .strip_prefix("Subject:")
            .and_then(|rest| rest.find("\nBody:").map(|idx| (String::new(), rest[idx + "\nBody:".len()..].to_string())))
            .unwrap_or((String::new(), text.clone()));
        message
    } else {
        text
    };

    Ok(Decoded {
        sender_version: sender_version.value,
        sender_stream: sender_stream.value,
        ttl: envelope.ttl,
        behavior: fixed.behavior,
        sign_public_key: fixed.sign_public_key,
        enc_public_key: fixed.enc_public_key,
        encoding: encoding.value,
        message: message_text,
        length: 8 + envelope.header_length + envelope.payload.len(),
    })
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

    fn sample_address(version: u64, seed: u8) -> Address {
        Address::with_private_keys(
            version,
            1,
            SecretKey::parse_slice(&[seed; 32]).unwrap(),
            SecretKey::parse_slice(&[seed.wrapping_add(1); 32]).unwrap(),
        )
    }

    #[async_std::test]
    async fn v4_round_trips_for_pre_v4_sender() {
        let from = sample_address(3, 10);
        let opts = EncodeOpts { ttl: 3600, from: &from, message: "announcement".to_string(), encoding: None, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let subscriptions = Candidates::from(Address::from_ripe(3, 1, from.ripe));
        let decoded = decode_payload_async(&encoded, &DecodeOpts { subscriptions: &subscriptions }).await.unwrap();
        assert_eq!(decoded.message, "announcement");
    }

    #[async_std::test]
    async fn v5_round_trips_for_v4_sender() {
        let from = sample_address(4, 20);
        let opts = EncodeOpts { ttl: 3600, from: &from, message: "v5 announcement".to_string(), encoding: None, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let subscription = Address { tag: from.tag, ..Address::from_ripe(4, 1, from.ripe) };
        let subscriptions = Candidates::from(subscription);
        let decoded = decode_payload_async(&encoded, &DecodeOpts { subscriptions: &subscriptions }).await.unwrap();
        assert_eq!(decoded.message, "v5 announcement");
    }

    #[async_std::test]
    async fn v5_unknown_tag_is_not_interested() {
        let from = sample_address(4, 30);
        let opts = EncodeOpts { ttl: 3600, from: &from, message: "secret".to_string(), encoding: None, skip_pow: true };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let stranger = sample_address(4, 40);
        let subscriptions = Candidates::from(stranger);
        let result = decode_payload_async(&encoded, &DecodeOpts { subscriptions: &subscriptions }).await;
        assert!(matches!(result, Err(CodecError::NotInterested)));
    }
}
