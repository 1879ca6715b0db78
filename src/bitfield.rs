//! `PubkeyBitfield`: the 4-octet behavior flags a `pubkey` advertises.

/// Exactly 4 octets of flags. The meaning of individual bits is determined by the
/// pubkey version and is not interpreted here; the core only moves the bitfield
/// between its wire form and an opaque `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PubkeyBitfield(pub u32);

impl PubkeyBitfield {
    pub const DOES_ACK: u32 = 1 << 31;

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        PubkeyBitfield(u32::from_be_bytes(bytes))
    }
}

impl From<u32> for PubkeyBitfield {
    fn from(v: u32) -> Self {
        PubkeyBitfield(v)
    }
}

impl From<PubkeyBitfield> for u32 {
    fn from(v: PubkeyBitfield) -> Self {
        v.0
    }
}
