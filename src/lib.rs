//! Bitmessage object codec core: encoders/decoders for the four P2P object
//! kinds (`getpubkey`, `pubkey`, `msg`, `broadcast`) and the cryptographic
//! envelope (ECDSA signing, ECIES encryption, RIPEMD identity derivation,
//! proof-of-work) they share.
//!
//! This crate is the wire-codec core only: it does not speak to peers, store
//! objects, or manage addresses beyond the thin [`address::Address`] and
//! [`candidates::Candidates`] collaborators the codecs need. See each
//! module's docs for what it does and does not cover.

pub mod address;
pub mod bitfield;
pub mod candidates;
pub mod crypto;
pub mod error;
pub mod message;
pub mod object;
pub mod pow;
pub mod varint;

pub use address::Address;
pub use bitfield::PubkeyBitfield;
pub use candidates::Candidates;
pub use error::{CodecError, Result};

pub use object::{broadcast, getpubkey, msg, pubkey};
