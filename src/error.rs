//! Error kinds surfaced by the object codecs, envelope, crypto pipeline and POW driver.

/// All failure modes the core can report. No recovery is attempted here except the
/// serial key-trial loops in `msg`/`broadcast` decode, which swallow per-candidate
/// failures and only surface the aggregated [`CodecError::DecryptFailed`].
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("outer envelope command is not \"object\"")]
    BadCommand,

    #[error("decoded object type does not match the called codec")]
    WrongType,

    #[error("object version {0} is outside the codec's supported range")]
    UnsupportedVersion(u64),

    #[error("payload shorter than required by the parsed fields")]
    BadLength,

    #[error("object payload of {0} octets exceeds the 262136-octet limit")]
    PayloadTooLarge(usize),

    #[error("no candidate address matches the tag")]
    NotInterested,

    #[error("no candidate key could decrypt the object")]
    DecryptFailed,

    #[error("cleartext ripe does not match the decrypting identity's ripe")]
    RipeMismatch,

    #[error("reconstructed sender ripe/tag does not match the outer object")]
    KeyMismatch,

    #[error("ECDSA signature verification failed")]
    SignatureInvalid,

    #[error("cryptographic primitive failed: {0}")]
    CryptoError(String),

    #[error("proof-of-work search was cancelled")]
    PowCancelled,
}

pub type Result<T> = std::result::Result<T, CodecError>;
