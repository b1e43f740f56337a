//! Named key and certificate fixtures.
//!
//! Every fixture resolves to raw bytes plus the container format the engine
//! should receive them in. Unknown names are configuration errors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::engine::{CertContainer, KeyContainer};

/// Fixture lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredsError {
    #[error("Unknown test key: {0}")]
    UnknownKey(String),

    #[error("Unknown test certificate: {0}")]
    UnknownCert(String),

    #[error("Key {key} has no {kc} form")]
    UnsupportedContainer { key: TestKey, kc: TestKc },
}

/// Named key fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKey {
    Aes128,
    Aes256,
    Hmac128,
    /// The 20-byte `0x0b` key from RFC 4231 test case 1.
    Hmac160,
    Hmac256,
    /// RFC 8032 section 7.1 test 1 key pair.
    Ed25519,
}

/// Which half of a fixture to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKc {
    Raw,
    /// Public key only. Asymmetric fixtures only.
    PublicOnly,
}

/// Named certificate fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestCert {
    Ed25519Root,
    Ed25519Leaf,
}

const AES128_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

const AES256_KEY: [u8; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
];

const ED25519_SECRET: [u8; 32] = [
    0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
    0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
];

const ED25519_PUBLIC: [u8; 32] = [
    0xd7, 0x5a, 0x98, 0x01, 0x82, 0xb1, 0x0a, 0xb7, 0xd5, 0x4b, 0xfe, 0xd3, 0xc9, 0x64, 0x07, 0x3a,
    0x0e, 0xe1, 0x72, 0xf3, 0xda, 0xa6, 0x23, 0x25, 0xaf, 0x02, 0x1a, 0x68, 0xf7, 0x07, 0x51, 0x1a,
];

// RFC 8032 section 7.1 test 2 public key.
const ED25519_LEAF_PUBLIC: [u8; 32] = [
    0x3d, 0x40, 0x17, 0xc3, 0xe8, 0x43, 0x89, 0x5a, 0x92, 0xb7, 0x0a, 0xa7, 0x4d, 0x1b, 0x7e, 0xbc,
    0x9c, 0x98, 0x2c, 0xcf, 0x2e, 0xc4, 0x96, 0x8c, 0xc0, 0xcd, 0x55, 0xf1, 0x2a, 0xf4, 0x66, 0x0c,
];

impl TestKey {
    pub const ALL: [TestKey; 6] = [
        Self::Aes128,
        Self::Aes256,
        Self::Hmac128,
        Self::Hmac160,
        Self::Hmac256,
        Self::Ed25519,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes128 => "aes128",
            Self::Aes256 => "aes256",
            Self::Hmac128 => "hmac128",
            Self::Hmac160 => "hmac160",
            Self::Hmac256 => "hmac256",
            Self::Ed25519 => "ed25519",
        }
    }

    pub fn is_symmetric(&self) -> bool {
        !matches!(self, Self::Ed25519)
    }
}

impl TestKc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::PublicOnly => "public-only",
        }
    }
}

impl TestCert {
    pub const ALL: [TestCert; 2] = [Self::Ed25519Root, Self::Ed25519Leaf];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519Root => "ed25519-root",
            Self::Ed25519Leaf => "ed25519-leaf",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Self::Ed25519Root => "secapi-harness root",
            Self::Ed25519Leaf => "secapi-harness leaf",
        }
    }

    fn public_key(&self) -> &'static [u8; 32] {
        match self {
            Self::Ed25519Root => &ED25519_PUBLIC,
            Self::Ed25519Leaf => &ED25519_LEAF_PUBLIC,
        }
    }
}

macro_rules! name_impls {
    ($ty:ty, $err:path) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CredsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| $err(s.to_string()))
            }
        }
    };
}

name_impls!(TestKey, CredsError::UnknownKey);
name_impls!(TestCert, CredsError::UnknownCert);

impl fmt::Display for TestKc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a key fixture to the container the engine expects and its bytes.
pub fn key_material(key: TestKey, kc: TestKc) -> Result<(KeyContainer, Vec<u8>), CredsError> {
    let resolved = match (key, kc) {
        (TestKey::Aes128, TestKc::Raw) => (KeyContainer::RawAes128, AES128_KEY.to_vec()),
        (TestKey::Aes256, TestKc::Raw) => (KeyContainer::RawAes256, AES256_KEY.to_vec()),
        (TestKey::Hmac128, TestKc::Raw) => (KeyContainer::RawHmac, vec![0x0c; 16]),
        (TestKey::Hmac160, TestKc::Raw) => (KeyContainer::RawHmac, vec![0x0b; 20]),
        (TestKey::Hmac256, TestKc::Raw) => (KeyContainer::RawHmac, vec![0x5a; 32]),
        (TestKey::Ed25519, TestKc::Raw) => {
            (KeyContainer::RawEd25519Private, ED25519_SECRET.to_vec())
        }
        (TestKey::Ed25519, TestKc::PublicOnly) => {
            (KeyContainer::RawEd25519Public, ED25519_PUBLIC.to_vec())
        }
        (key, kc @ TestKc::PublicOnly) => return Err(CredsError::UnsupportedContainer { key, kc }),
    };
    Ok(resolved)
}

/// Resolve a certificate fixture to DER bytes.
///
/// The fixtures are not full X.509 structures, just a DER SEQUENCE holding the
/// subject name and the raw Ed25519 public key.
pub fn cert_material(cert: TestCert) -> (CertContainer, Vec<u8>) {
    let subject = cert.subject().as_bytes();
    let public_key = cert.public_key();

    let mut body = Vec::with_capacity(4 + subject.len() + public_key.len());
    push_tlv(&mut body, 0x0c, subject);
    push_tlv(&mut body, 0x04, public_key);

    let mut der = Vec::with_capacity(2 + body.len());
    push_tlv(&mut der, 0x30, &body);
    (CertContainer::Der, der)
}

// Short-form lengths only; fixture fields stay under 128 bytes.
fn push_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    debug_assert!(value.len() < 0x80);
    out.push(tag);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_case_insensitive() {
        assert_eq!("AES128".parse::<TestKey>().unwrap(), TestKey::Aes128);
        assert_eq!("ed25519-leaf".parse::<TestCert>().unwrap(), TestCert::Ed25519Leaf);
        assert_eq!(
            "rsa2048".parse::<TestKey>(),
            Err(CredsError::UnknownKey("rsa2048".into()))
        );
    }

    #[test]
    fn test_public_only_on_symmetric_key_rejected() {
        let err = key_material(TestKey::Hmac256, TestKc::PublicOnly).unwrap_err();
        assert_eq!(err.to_string(), "Key hmac256 has no public-only form");
    }

    #[test]
    fn test_key_lengths_match_containers() {
        for key in TestKey::ALL {
            let (container, bytes) = key_material(key, TestKc::Raw).unwrap();
            let expected = match container {
                KeyContainer::RawAes128 => 16,
                KeyContainer::RawAes256 | KeyContainer::RawEd25519Private => 32,
                KeyContainer::RawHmac => bytes.len(),
                other => panic!("unexpected container {other}"),
            };
            assert_eq!(bytes.len(), expected, "{key}");
        }
    }

    #[test]
    fn test_cert_is_single_der_sequence() {
        for cert in TestCert::ALL {
            let (_, der) = cert_material(cert);
            assert_eq!(der[0], 0x30);
            assert_eq!(der[1] as usize + 2, der.len());
        }
    }
}
