//! Bitmessage `var_int`: a big-endian, minimally-encoded unsigned integer taking
//! 1, 3, 5 or 9 octets on the wire, depending on magnitude.

use crate::error::{CodecError, Result};

/// Result of decoding a `var_int` out of a buffer: the value, how many octets it
/// occupied, and a reference to whatever followed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub value: u64,
    pub length: usize,
}

/// Encodes `n` as a minimally-sized big-endian `var_int`.
pub fn encode(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut out = Vec::with_capacity(3);
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_be_bytes());
        out
    } else if n <= 0xffff_ffff {
        let mut out = Vec::with_capacity(5);
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_be_bytes());
        out
    } else {
        let mut out = Vec::with_capacity(9);
        out.push(0xff);
        out.extend_from_slice(&n.to_be_bytes());
        out
    }
}

/// Decodes a `var_int` from the start of `buf`, returning the value and the
/// number of octets consumed. The rest of the buffer is left untouched; callers
/// slice past `length` themselves.
pub fn decode(buf: &[u8]) -> Result<Decoded> {
    let marker = *buf.first().ok_or(CodecError::BadLength)?;
    match marker {
        0..=0xfc => Ok(Decoded {
            value: marker as u64,
            length: 1,
        }),
        0xfd => {
            let bytes = buf.get(1..3).ok_or(CodecError::BadLength)?;
            Ok(Decoded {
                value: u16::from_be_bytes(bytes.try_into().unwrap()) as u64,
                length: 3,
            })
        }
        0xfe => {
            let bytes = buf.get(1..5).ok_or(CodecError::BadLength)?;
            Ok(Decoded {
                value: u32::from_be_bytes(bytes.try_into().unwrap()) as u64,
                length: 5,
            })
        }
        0xff => {
            let bytes = buf.get(1..9).ok_or(CodecError::BadLength)?;
            Ok(Decoded {
                value: u64::from_be_bytes(bytes.try_into().unwrap()),
                length: 9,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_boundary_values() {
        for n in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000, u64::MAX] {
            let encoded = encode(n);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded.value, n);
            assert_eq!(decoded.length, encoded.len());
        }
    }

    #[test]
    fn uses_minimal_width() {
        assert_eq!(encode(0xfc).len(), 1);
        assert_eq!(encode(0xfd).len(), 3);
        assert_eq!(encode(0xffff).len(), 3);
        assert_eq!(encode(0x1_0000).len(), 5);
        assert_eq!(encode(0xffff_ffff).len(), 5);
        assert_eq!(encode(0x1_0000_0000).len(), 9);
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(matches!(decode(&[]), Err(CodecError::BadLength)));
        assert!(matches!(decode(&[0xfd, 0x01]), Err(CodecError::BadLength)));
        assert!(matches!(decode(&[0xff, 0, 0, 0]), Err(CodecError::BadLength)));
    }
}
