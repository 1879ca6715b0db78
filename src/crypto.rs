//! `Crypto`: thin async wrappers over `libsecp256k1` (ECDSA sign/verify, DER
//! signature codec) and `ecies` (hybrid encrypt/decrypt), matching the
//! distilled spec's §6.1 collaborator signatures. Each primitive is a single
//! CPU-bound call; wrapping it in an `async fn` keeps every codec stage
//! awaitable, consistent with the orchestration model in §7 of the expanded
//! spec, even though on this target the work itself does not yield.

use libsecp256k1::{Message, PublicKey, SecretKey, Signature};
use sha2::{Digest, Sha256};

use crate::error::{CodecError, Result};

/// Signs `data` with `private_key`, returning a DER-encoded ECDSA signature.
pub async fn sign(private_key: &SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    let digest = Sha256::digest(data);
    let message = Message::parse_slice(&digest)
        .map_err(|e| CodecError::CryptoError(format!("message digest: {e:?}")))?;
    let (signature, _recovery_id) = libsecp256k1::sign(&message, private_key);
    Ok(encode_der(&signature))
}

/// Verifies a DER-encoded ECDSA `signature` of `data` under `public_key`.
pub async fn verify(public_key: &PublicKey, data: &[u8], signature: &[u8]) -> Result<()> {
    let digest = Sha256::digest(data);
    let message = Message::parse_slice(&digest)
        .map_err(|e| CodecError::CryptoError(format!("message digest: {e:?}")))?;
    let signature = decode_der(signature)?;
    if libsecp256k1::verify(&message, &signature, public_key) {
        Ok(())
    } else {
        Err(CodecError::SignatureInvalid)
    }
}

/// ECIES-encrypts `data` to `public_key`.
pub async fn encrypt(public_key: &PublicKey, data: &[u8]) -> Result<Vec<u8>> {
    ecies::encrypt(&public_key.serialize(), data)
        .map_err(|e| CodecError::CryptoError(format!("ecies encrypt: {e:?}")))
}

/// ECIES-decrypts `blob` with `private_key`.
pub async fn decrypt(private_key: &SecretKey, blob: &[u8]) -> Result<Vec<u8>> {
    ecies::decrypt(&private_key.serialize(), blob)
        .map_err(|e| CodecError::CryptoError(format!("ecies decrypt: {e:?}")))
}

/// Encodes a compact (r, s) ECDSA signature as minimal DER, per SEC1/X9.62:
/// `SEQUENCE { INTEGER r, INTEGER s }`, with each integer padded by one zero
/// octet if its high bit would otherwise make it look negative.
fn encode_der(signature: &Signature) -> Vec<u8> {
    let compact = signature.serialize();
    let r = to_der_integer(&compact[0..32]);
    let s = to_der_integer(&compact[32..64]);

    let mut body = Vec::with_capacity(r.len() + s.len());
    body.extend_from_slice(&r);
    body.extend_from_slice(&s);

    let mut der = Vec::with_capacity(body.len() + 2);
    der.push(0x30);
    der.push(body.len() as u8);
    der.extend_from_slice(&body);
    der
}

fn to_der_integer(bytes: &[u8]) -> Vec<u8> {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    let needs_padding = trimmed[0] & 0x80 != 0;

    let mut out = Vec::with_capacity(trimmed.len() + 3);
    out.push(0x02);
    out.push((trimmed.len() + needs_padding as usize) as u8);
    if needs_padding {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Decodes a minimal DER ECDSA signature back into a compact (r, s) pair.
fn decode_der(der: &[u8]) -> Result<Signature> {
    let bad = || CodecError::CryptoError("malformed DER signature".to_string());

    if der.len() < 8 || der[0] != 0x30 {
        return Err(bad());
    }
    let body_len = der[1] as usize;
    let body = der.get(2..2 + body_len).ok_or_else(bad)?;

    let (r, rest) = parse_der_integer(body).ok_or_else(bad)?;
    let (s, rest) = parse_der_integer(rest).ok_or_else(bad)?;
    if !rest.is_empty() {
        return Err(bad());
    }

    let mut compact = [0u8; 64];
    copy_into_32(&mut compact[0..32], &r).ok_or_else(bad)?;
    copy_into_32(&mut compact[32..64], &s).ok_or_else(bad)?;

    Signature::parse_standard(&compact).map_err(|e| CodecError::CryptoError(format!("{e:?}")))
}

fn parse_der_integer(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    if buf.len() < 3 || buf[0] != 0x02 {
        return None;
    }
    let len = buf[1] as usize;
    let value = buf.get(2..2 + len)?;
    let rest = &buf[2 + len..];
    Some((value, rest))
}

fn copy_into_32(dest: &mut [u8], src: &[u8]) -> Option<()> {
    let mut trimmed = src;
    while trimmed.len() > 32 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    if trimmed.len() > 32 {
        return None;
    }
    let offset = 32 - trimmed.len();
    dest[offset..].copy_from_slice(trimmed);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[async_std::test]
    async fn sign_then_verify_round_trips() {
        let private_key = SecretKey::random(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&private_key);
        let data = b"the quick brown fox";

        let signature = sign(&private_key, data).await.unwrap();
        verify(&public_key, data, &signature).await.unwrap();
    }

    #[async_std::test]
    async fn tampered_data_fails_verification() {
        let private_key = SecretKey::random(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&private_key);

        let signature = sign(&private_key, b"original").await.unwrap();
        let result = verify(&public_key, b"tampered", &signature).await;
        assert!(matches!(result, Err(CodecError::SignatureInvalid)));
    }

    #[async_std::test]
    async fn encrypt_then_decrypt_round_trips() {
        let private_key = SecretKey::random(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&private_key);
        let data = b"hybrid encrypted payload";

        let blob = encrypt(&public_key, data).await.unwrap();
        let decrypted = decrypt(&private_key, &blob).await.unwrap();
        assert_eq!(decrypted, data);
    }

    #[test]
    fn der_encoding_round_trips() {
        let private_key = SecretKey::random(&mut rand::rngs::OsRng);
        let message = Message::parse_slice(&[7u8; 32]).unwrap();
        let (signature, _) = libsecp256k1::sign(&message, &private_key);

        let der = encode_der(&signature);
        assert_eq!(der[0], 0x30);
        let decoded = decode_der(&der).unwrap();
        assert_eq!(decoded.serialize(), signature.serialize());
    }
}
