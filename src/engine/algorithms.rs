//! Algorithm, mode and container selectors passed across the engine boundary.

use std::fmt;

/// Where provisioned material lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLoc {
    /// Volatile, gone when the processor is released.
    Ram,
    /// Persisted in the engine's app store.
    File,
}

/// Format of key material handed to `provision_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyContainer {
    RawAes128,
    RawAes256,
    /// HMAC key of any length from 1 to 128 bytes.
    RawHmac,
    /// 32-byte Ed25519 seed.
    RawEd25519Private,
    /// 32-byte Ed25519 public key.
    RawEd25519Public,
    /// Soft-wrapped container produced by `SecEngine::wrap_key`.
    Store,
}

impl KeyContainer {
    /// Stable one-byte tag used when a container is serialized.
    pub fn tag(&self) -> u8 {
        match self {
            Self::RawAes128 => 1,
            Self::RawAes256 => 2,
            Self::RawHmac => 3,
            Self::RawEd25519Private => 4,
            Self::RawEd25519Public => 5,
            Self::Store => 6,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::RawAes128),
            2 => Some(Self::RawAes256),
            3 => Some(Self::RawHmac),
            4 => Some(Self::RawEd25519Private),
            5 => Some(Self::RawEd25519Public),
            6 => Some(Self::Store),
            _ => None,
        }
    }
}

/// Certificate encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertContainer {
    Der,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    HmacSha256,
    HmacSha512,
}

impl MacAlgorithm {
    /// Tag length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::HmacSha256 => 32,
            Self::HmacSha512 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    /// AES in ECB mode; every input chunk must be a multiple of 16 bytes.
    AesEcbNoPadding,
    /// AES-GCM; input is buffered until the final chunk. Needs a 12-byte IV.
    AesGcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Ed25519,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureMode {
    Sign,
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RandomAlgorithm {
    Prng,
    TrueRandom,
}

macro_rules! debug_display {
    ($($ty:ty),* $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        })*
    };
}

debug_display!(
    StorageLoc,
    KeyContainer,
    MacAlgorithm,
    CipherAlgorithm,
    CipherMode,
    SignatureAlgorithm,
    DigestAlgorithm,
    RandomAlgorithm,
);
