//! Outer network framing: a minimal stand-in for the real Bitmessage wire
//! protocol (handshake, multi-network magic bytes, inventory — all out of
//! scope here), grounded in the fixed-header/command/checksum shape common to
//! P2P framing (e.g. Bitcoin's `payload.rs` pattern among the reference
//! examples): `command(12, NUL-padded ASCII) || length(4, BE) || checksum(4) || payload`.
//! Sufficient for the codecs' framed `*_async` entry points to round-trip
//! through it, and for a corrupted/foreign command to be rejected.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use sha2::{Digest, Sha256};

use crate::error::{CodecError, Result};

const COMMAND_WIDTH: usize = 12;
const HEADER_LEN: usize = COMMAND_WIDTH + 4 + 4;

/// Frames `payload` under `command`.
pub fn encode(command: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    let mut command_field = [0u8; COMMAND_WIDTH];
    let command_bytes = command.as_bytes();
    let take = command_bytes.len().min(COMMAND_WIDTH);
    command_field[..take].copy_from_slice(&command_bytes[..take]);
    out.extend_from_slice(&command_field);
    out.write_u32::<BigEndian>(payload.len() as u32).expect("writing to a Vec never fails");
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(payload);
    out
}

/// Unframes a message, returning its command and payload. Rejects a length
/// mismatch or a failed checksum as [`CodecError::BadLength`]; the command
/// itself is returned uninterpreted (callers check it against `"object"`).
pub fn decode(buf: &[u8]) -> Result<(String, Vec<u8>)> {
    let header = buf.get(0..HEADER_LEN).ok_or(CodecError::BadLength)?;
    let command_field = &header[0..COMMAND_WIDTH];
    let nul = command_field.iter().position(|&b| b == 0).unwrap_or(COMMAND_WIDTH);
    let command = std::str::from_utf8(&command_field[..nul])
        .map_err(|_| CodecError::BadLength)?
        .to_string();

    let mut length_field = &header[COMMAND_WIDTH..COMMAND_WIDTH + 4];
    let length = length_field.read_u32::<BigEndian>().map_err(|_| CodecError::BadLength)? as usize;
    let expected_checksum = &header[COMMAND_WIDTH + 4..HEADER_LEN];

    let payload = buf.get(HEADER_LEN..HEADER_LEN + length).ok_or(CodecError::BadLength)?;
    if checksum(payload) != expected_checksum {
        return Err(CodecError::BadLength);
    }

    Ok((command, payload.to_vec()))
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[0..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_command_and_payload() {
        let encoded = encode("object", b"hello world");
        let (command, payload) = decode(&encoded).unwrap();
        assert_eq!(command, "object");
        assert_eq!(payload, b"hello world");
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut encoded = encode("object", b"hello world");
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(decode(&encoded), Err(CodecError::BadLength)));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let encoded = encode("object", b"hello world");
        assert!(matches!(decode(&encoded[..10]), Err(CodecError::BadLength)));
    }
}
