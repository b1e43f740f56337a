//! Key material parsing and soft-wrapping for the reference engine.
//!
//! Soft-wrapped containers have the layout
//! ```text
//! [SWK1][nonce:12][AES-256-GCM(container_tag:1 || key bytes) + tag:16]
//! ```
//! The wrapping key is PBKDF2-HMAC-SHA256 over the processor's root secret.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use ed25519_dalek::{SigningKey, VerifyingKey};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::store::ROOT_SECRET_SIZE;
use crate::engine::{EngineError, EngineResult, KeyContainer};

/// Magic prefix of a soft-wrapped container.
pub const WRAP_MAGIC: &[u8; 4] = b"SWK1";
const WRAP_NONCE_SIZE: usize = 12;
const WRAP_TAG_SIZE: usize = 16;
const WRAP_SALT: &[u8] = b"secapi-harness soft wrap v1";
const WRAP_ROUNDS: u32 = 4096;
const MAX_HMAC_KEY: usize = 128;

/// Parsed, usable key material.
pub(super) enum KeyMaterial {
    Aes(Vec<u8>),
    Hmac(Vec<u8>),
    Ed25519Private(SigningKey),
    Ed25519Public(VerifyingKey),
}

impl KeyMaterial {
    pub fn parse(container: KeyContainer, data: &[u8]) -> EngineResult<Self> {
        match container {
            KeyContainer::RawAes128 => exact(data, 16).map(|_| Self::Aes(data.to_vec())),
            KeyContainer::RawAes256 => exact(data, 32).map(|_| Self::Aes(data.to_vec())),
            KeyContainer::RawHmac => {
                if data.is_empty() || data.len() > MAX_HMAC_KEY {
                    return Err(EngineError::InvalidParameters(format!(
                        "HMAC key must be 1..={MAX_HMAC_KEY} bytes, got {}",
                        data.len()
                    )));
                }
                Ok(Self::Hmac(data.to_vec()))
            }
            KeyContainer::RawEd25519Private => {
                let seed = seed32(data)?;
                Ok(Self::Ed25519Private(SigningKey::from_bytes(&seed)))
            }
            KeyContainer::RawEd25519Public => {
                let bytes = seed32(data)?;
                VerifyingKey::from_bytes(&bytes)
                    .map(Self::Ed25519Public)
                    .map_err(|e| EngineError::InvalidParameters(e.to_string()))
            }
            KeyContainer::Store => Err(EngineError::InvalidParameters(
                "wrapped container must be unwrapped before parsing".into(),
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Aes(_) => "aes",
            Self::Hmac(_) => "hmac",
            Self::Ed25519Private(_) => "ed25519-private",
            Self::Ed25519Public(_) => "ed25519-public",
        }
    }
}

fn exact(data: &[u8], len: usize) -> EngineResult<()> {
    if data.len() == len {
        Ok(())
    } else {
        Err(EngineError::InvalidParameters(format!(
            "expected {len} key bytes, got {}",
            data.len()
        )))
    }
}

fn seed32(data: &[u8]) -> EngineResult<[u8; 32]> {
    data.try_into().map_err(|_| {
        EngineError::InvalidParameters(format!("expected 32 key bytes, got {}", data.len()))
    })
}

/// Seals and opens soft-wrapped key containers for one processor.
pub(super) struct SoftWrapper {
    cipher: Aes256Gcm,
}

impl SoftWrapper {
    pub fn from_root(root: &[u8; ROOT_SECRET_SIZE]) -> Self {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(root, WRAP_SALT, WRAP_ROUNDS, &mut key);
        let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key));
        Self { cipher }
    }

    pub fn wrap(&self, container: KeyContainer, data: &[u8]) -> EngineResult<Vec<u8>> {
        if container == KeyContainer::Store {
            return Err(EngineError::InvalidParameters(
                "container is already wrapped".into(),
            ));
        }
        // Refuse to wrap material that would not load later.
        KeyMaterial::parse(container, data)?;

        let mut nonce = [0u8; WRAP_NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let mut plaintext = Vec::with_capacity(1 + data.len());
        plaintext.push(container.tag());
        plaintext.extend_from_slice(data);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| EngineError::Crypto(format!("soft wrap failed: {e}")))?;

        let mut out = Vec::with_capacity(WRAP_MAGIC.len() + WRAP_NONCE_SIZE + sealed.len());
        out.extend_from_slice(WRAP_MAGIC);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn unwrap(&self, blob: &[u8]) -> EngineResult<(KeyContainer, Vec<u8>)> {
        let header = WRAP_MAGIC.len() + WRAP_NONCE_SIZE;
        if blob.len() < header + WRAP_TAG_SIZE + 1 || &blob[..WRAP_MAGIC.len()] != WRAP_MAGIC {
            return Err(EngineError::InvalidParameters(
                "not a soft-wrapped container".into(),
            ));
        }

        let nonce = Nonce::from_slice(&blob[WRAP_MAGIC.len()..header]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &blob[header..])
            .map_err(|_| EngineError::VerificationFailed)?;

        let (tag, data) = plaintext
            .split_first()
            .ok_or_else(|| EngineError::InvalidParameters("empty wrapped payload".into()))?;
        match KeyContainer::from_tag(*tag) {
            Some(KeyContainer::Store) | None => Err(EngineError::InvalidParameters(format!(
                "bad inner container tag {tag}"
            ))),
            Some(container) => Ok((container, data.to_vec())),
        }
    }
}

/// Minimal DER framing check: one SEQUENCE spanning the whole input.
pub(super) fn check_der(data: &[u8]) -> EngineResult<()> {
    let invalid = |why: &str| EngineError::InvalidParameters(format!("certificate: {why}"));

    match data.first() {
        Some(0x30) => {}
        Some(_) => return Err(invalid("not a DER SEQUENCE")),
        None => return Err(invalid("empty")),
    }
    let first_len = *data.get(1).ok_or_else(|| invalid("truncated length"))?;

    let (header, body_len) = if first_len < 0x80 {
        (2usize, first_len as usize)
    } else {
        let n = (first_len & 0x7f) as usize;
        if n == 0 || n > 4 || data.len() < 2 + n {
            return Err(invalid("bad long-form length"));
        }
        let len = data[2..2 + n]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (2 + n, len)
    };

    if header + body_len != data.len() {
        return Err(invalid("length does not match input"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_wrong_aes_length() {
        let err = KeyMaterial::parse(KeyContainer::RawAes128, &[0u8; 15]).err().unwrap();
        assert!(err.to_string().contains("expected 16"));
        assert!(KeyMaterial::parse(KeyContainer::RawAes256, &[0u8; 32]).is_ok());
    }

    #[test]
    fn test_parse_hmac_bounds() {
        assert!(KeyMaterial::parse(KeyContainer::RawHmac, &[]).is_err());
        assert!(KeyMaterial::parse(KeyContainer::RawHmac, &[1u8; 4]).is_ok());
        assert!(KeyMaterial::parse(KeyContainer::RawHmac, &[1u8; 129]).is_err());
    }

    #[test]
    fn test_wrap_unwrap() {
        let wrapper = SoftWrapper::from_root(&[7u8; ROOT_SECRET_SIZE]);
        let key = [0x42u8; 32];
        let blob = wrapper.wrap(KeyContainer::RawAes256, &key).unwrap();
        assert_eq!(&blob[..4], WRAP_MAGIC);
        assert!(!blob.windows(key.len()).any(|w| w == key));

        let (container, data) = wrapper.unwrap(&blob).unwrap();
        assert_eq!(container, KeyContainer::RawAes256);
        assert_eq!(data, key);
    }

    #[test]
    fn test_unwrap_with_other_root_fails() {
        let blob = SoftWrapper::from_root(&[1u8; ROOT_SECRET_SIZE])
            .wrap(KeyContainer::RawHmac, b"secret")
            .unwrap();
        let other = SoftWrapper::from_root(&[2u8; ROOT_SECRET_SIZE]);
        assert!(matches!(other.unwrap(&blob), Err(EngineError::VerificationFailed)));
    }

    #[test]
    fn test_check_der() {
        assert!(check_der(&[0x30, 0x02, 0x05, 0x00]).is_ok());
        assert!(check_der(&[0x30, 0x03, 0x05, 0x00]).is_err());
        assert!(check_der(&[0x04, 0x00]).is_err());

        let mut long = vec![0x30, 0x81, 0x80];
        long.extend(std::iter::repeat(0u8).take(0x80));
        assert!(check_der(&long).is_ok());
    }
}
