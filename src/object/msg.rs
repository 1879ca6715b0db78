//! `msg`: a directed, encrypted, signed message. Only wire version 1 exists.

use crate::address::Address;
use crate::bitfield::PubkeyBitfield;
use crate::candidates::Candidates;
use crate::crypto;
use crate::error::{CodecError, Result};
use crate::message;
use crate::pow::{NETWORK_MIN_EXTRA_BYTES, NETWORK_MIN_NONCE_TRIALS_PER_BYTE};
use crate::varint;

use super::{
    decode_payload, encode_payload_without_nonce, extract_pubkey, prepend_nonce, strip_public_key,
    EnvelopeDecodeOpts, EnvelopeEncodeOpts, TYPE_MSG,
};

const WIRE_VERSION: u64 = 1;

pub const ENCODING_IGNORE: u64 = 0;
pub const ENCODING_TRIVIAL: u64 = 1;
pub const ENCODING_SIMPLE: u64 = 2;

pub struct EncodeOpts<'a> {
    pub ttl: u64,
    pub from: &'a Address,
    pub to: &'a Address,
    pub message: String,
    pub subject: Option<String>,
    pub encoding: Option<u64>,
    pub friend: bool,
    pub skip_pow: bool,
}

pub struct Decoded {
    pub sender_version: u64,
    pub sender_stream: u64,
    pub ttl: i64,
    pub behavior: PubkeyBitfield,
    pub sign_public_key: libsecp256k1::PublicKey,
    pub enc_public_key: libsecp256k1::PublicKey,
    /// `(nonceTrialsPerByte, payloadLengthExtraBytes)`, present for sender_version >= 3.
    pub difficulty: Option<(u64, u64)>,
    pub encoding: u64,
    pub message: String,
    pub subject: String,
    pub length: usize,
}

fn body_text(encoding: u64, message: &str, subject: Option<&str>) -> Vec<u8> {
    match encoding {
        ENCODING_SIMPLE => {
            format!("Subject:{}\nBody:{}", subject.unwrap_or(""), message).into_bytes()
        }
        _ => message.as_bytes().to_vec(),
    }
}

fn split_simple(text: &str) -> (String, String) {
    if let Some(after_subject) = text.strip_prefix("Subject:") {
        if let Some(idx) = after_subject.find("\nBody:") {
            let subject = after_subject[..idx].to_string();
            let message = after_subject[idx + "\nBody:".len()..].to_string();
            return (subject, message);
        }
    }
    (String::new(), text.to_string())
}

/// Builds the nonced object payload only.
pub async fn encode_payload_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let from = opts.from;
    let encoding = opts.encoding.unwrap_or(ENCODING_TRIVIAL);

    let (nonce_trials_per_byte, payload_length_extra_bytes) = if opts.friend {
        (NETWORK_MIN_NONCE_TRIALS_PER_BYTE, NETWORK_MIN_EXTRA_BYTES)
    } else {
        (from.nonce_trials_per_byte, from.payload_length_extra_bytes)
    };

    let mut msg_data = Vec::new();
    msg_data.extend_from_slice(&varint::encode(from.version));
    msg_data.extend_from_slice(&varint::encode(from.stream));
    msg_data.extend_from_slice(&from.behavior.to_bytes());
    msg_data.extend_from_slice(&strip_public_key(from.sign_public_key.as_ref().unwrap()));
    msg_data.extend_from_slice(&strip_public_key(from.enc_public_key.as_ref().unwrap()));
    if from.version >= 3 {
        msg_data.extend_from_slice(&varint::encode(nonce_trials_per_byte));
        msg_data.extend_from_slice(&varint::encode(payload_length_extra_bytes));
    }
    msg_data.extend_from_slice(&opts.to.ripe);
    msg_data.extend_from_slice(&varint::encode(encoding));
    let text = body_text(encoding, &opts.message, opts.subject.as_deref());
    msg_data.extend_from_slice(&varint::encode(text.len() as u64));
    msg_data.extend_from_slice(&text);
    // ACK is always encoded empty; the core never constructs or validates one.
    msg_data.extend_from_slice(&varint::encode(0));

    let envelope_prefix = encode_payload_without_nonce(
        &EnvelopeEncodeOpts { object_type: TYPE_MSG, version: WIRE_VERSION, stream: from.stream, ttl: opts.ttl },
        &[],
    );
    let mut signed_region = envelope_prefix;
    signed_region.extend_from_slice(&msg_data);
    let signature = crypto::sign(from.sign_private_key.as_ref().unwrap(), &signed_region).await?;

    msg_data.extend_from_slice(&varint::encode(signature.len() as u64));
    msg_data.extend_from_slice(&signature);

    let ciphertext = crypto::encrypt(opts.to.enc_public_key.as_ref().unwrap(), &msg_data).await?;

    let envelope = encode_payload_without_nonce(
        &EnvelopeEncodeOpts { object_type: TYPE_MSG, version: WIRE_VERSION, stream: from.stream, ttl: opts.ttl },
        &ciphertext,
    );
    prepend_nonce(envelope, opts.ttl, nonce_trials_per_byte, payload_length_extra_bytes, opts.skip_pow).await
}

pub async fn encode_async(opts: &EncodeOpts<'_>) -> Result<Vec<u8>> {
    let payload = encode_payload_async(opts).await?;
    Ok(message::encode("object", &payload))
}

pub struct DecodeOpts<'a> {
    pub identities: &'a Candidates,
}

pub async fn decode_payload_async(buf: &[u8], opts: &DecodeOpts<'_>) -> Result<Decoded> {
    let body = buf.get(8..).ok_or(CodecError::BadLength)?;
    let envelope = decode_payload(
        body,
        &EnvelopeDecodeOpts { max_age_tolerance: u64::MAX, max_ttl: u64::MAX, expected_type: TYPE_MSG },
    )?;
    if envelope.version != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion(envelope.version));
    }

    let (identity, cleartext) = super::try_decrypt_with(opts.identities, envelope.payload, |addr| {
        addr.enc_private_key.clone().expect("identity must carry its own enc private key")
    })
    .await?;

    let sender_version = varint::decode(&cleartext)?;
    let mut offset = sender_version.length;
    let sender_stream = varint::decode(&cleartext[offset..])?;
    offset += sender_stream.length;

    let fixed = extract_pubkey(&cleartext[offset..])?;
    offset += fixed.length;

    let difficulty = if sender_version.value >= 3 {
        let nonce_trials = varint::decode(&cleartext[offset..])?;
        offset += nonce_trials.length;
        let extra_bytes = varint::decode(&cleartext[offset..])?;
        offset += extra_bytes.length;
        Some((nonce_trials.value, extra_bytes.value))
    } else {
        None
    };

    let ripe: [u8; 20] = cleartext.get(offset..offset + 20).ok_or(CodecError::BadLength)?.try_into().unwrap();
    offset += 20;
    if ripe != identity.ripe {
        return Err(CodecError::RipeMismatch);
    }

    let encoding = varint::decode(&cleartext[offset..])?;
    offset += encoding.length;

    let msg_len = varint::decode(&cleartext[offset..])?;
    offset += msg_len.length;
    let message_bytes = cleartext.get(offset..offset + msg_len.value as usize).ok_or(CodecError::BadLength)?;
    offset += msg_len.value as usize;

    let ack_len = varint::decode(&cleartext[offset..])?;
    offset += ack_len.length;
    offset += ack_len.value as usize;

    let signed_region_len = offset;
    let sig_len = varint::decode(&cleartext[offset..])?;
    offset += sig_len.length;
    let signature = cleartext.get(offset..offset + sig_len.value as usize).ok_or(CodecError::BadLength)?;

    let mut signed_region = body[..envelope.header_length].to_vec();
    signed_region.extend_from_slice(&cleartext[..signed_region_len]);
    crypto::verify(&fixed.sign_public_key, &signed_region, signature).await?;

    let text = String::from_utf8_lossy(message_bytes).into_owned();
    let (subject, message_text) = if encoding.value == ENCODING_SIMPLE {
        split_simple(&text)
    } else {
        (String::new(), text)
    };

    Ok(Decoded {
        sender_version: sender_version.value,
        sender_stream: sender_stream.value,
        ttl: envelope.ttl,
        behavior: fixed.behavior,
        sign_public_key: fixed.sign_public_key,
        enc_public_key: fixed.enc_public_key,
        difficulty,
        encoding: encoding.value,
        message: message_text,
        subject,
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
    async fn round_trips_trivial_message() {
        let from = sample_address(3, 30);
        let to = sample_address(3, 40);
        let opts = EncodeOpts {
            ttl: 3600,
            from: &from,
            to: &to,
            message: "hello".to_string(),
            subject: None,
            encoding: None,
            friend: false,
            skip_pow: true,
        };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let identities = Candidates::from(to.clone());
        let decoded = decode_payload_async(&encoded, &DecodeOpts { identities: &identities }).await.unwrap();
        assert_eq!(decoded.message, "hello");
        assert_eq!(decoded.subject, "");
    }

    #[async_std::test]
    async fn round_trips_simple_encoding_with_subject() {
        let from = sample_address(3, 50);
        let to = sample_address(3, 60);
        let opts = EncodeOpts {
            ttl: 3600,
            from: &from,
            to: &to,
            message: "body text".to_string(),
            subject: Some("greetings".to_string()),
            encoding: Some(ENCODING_SIMPLE),
            friend: false,
            skip_pow: true,
        };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let identities = Candidates::from(to.clone());
        let decoded = decode_payload_async(&encoded, &DecodeOpts { identities: &identities }).await.unwrap();
        assert_eq!(decoded.subject, "greetings");
        assert_eq!(decoded.message, "body text");
    }

    #[async_std::test]
    async fn decode_tries_every_identity_in_order() {
        let from = sample_address(3, 70);
        let to = sample_address(3, 80);
        let decoy = sample_address(3, 90);
        let opts = EncodeOpts {
            ttl: 3600,
            from: &from,
            to: &to,
            message: "for the real recipient".to_string(),
            subject: None,
            encoding: None,
            friend: false,
            skip_pow: true,
        };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let identities = Candidates::from(vec![decoy, to.clone()]);
        let decoded = decode_payload_async(&encoded, &DecodeOpts { identities: &identities }).await.unwrap();
        assert_eq!(decoded.message, "for the real recipient");
    }

    #[async_std::test]
    async fn no_matching_identity_fails_decrypt() {
        let from = sample_address(3, 100);
        let to = sample_address(3, 110);
        let stranger = sample_address(3, 120);
        let opts = EncodeOpts {
            ttl: 3600,
            from: &from,
            to: &to,
            message: "secret".to_string(),
            subject: None,
            encoding: None,
            friend: false,
            skip_pow: true,
        };
        let encoded = encode_payload_async(&opts).await.unwrap();

        let identities = Candidates::from(stranger);
        let result = decode_payload_async(&encoded, &DecodeOpts { identities: &identities }).await;
        assert!(matches!(result, Err(CodecError::DecryptFailed)));
    }
}
