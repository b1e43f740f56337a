//! Operation state for open MAC, cipher, signature and digest handles.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::material::KeyMaterial;
use crate::engine::{
    CipherAlgorithm, CipherMode, DigestAlgorithm, EngineError, EngineResult, MacAlgorithm,
    SignatureMode,
};

const AES_BLOCK: usize = 16;
const GCM_IV_SIZE: usize = 12;

pub(super) enum MacState {
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

impl MacState {
    pub fn new(algorithm: MacAlgorithm, key: &KeyMaterial) -> EngineResult<Self> {
        let secret = match key {
            KeyMaterial::Hmac(secret) | KeyMaterial::Aes(secret) => secret.as_slice(),
            other => return Err(EngineError::UnsupportedKeyType(other.type_name().into())),
        };
        let bad_key = |e: hmac::digest::InvalidLength| EngineError::InvalidParameters(e.to_string());

        Ok(match algorithm {
            MacAlgorithm::HmacSha256 => {
                Self::Sha256(<Hmac<Sha256> as Mac>::new_from_slice(secret).map_err(bad_key)?)
            }
            MacAlgorithm::HmacSha512 => {
                Self::Sha512(<Hmac<Sha512> as Mac>::new_from_slice(secret).map_err(bad_key)?)
            }
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(mac) => Mac::update(mac, data),
            Self::Sha512(mac) => Mac::update(mac, data),
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256(_) => MacAlgorithm::HmacSha256.output_len(),
            Self::Sha512(_) => MacAlgorithm::HmacSha512.output_len(),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(mac) => Mac::finalize(mac).into_bytes().to_vec(),
            Self::Sha512(mac) => Mac::finalize(mac).into_bytes().to_vec(),
        }
    }
}

pub(super) enum DigestState {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestState {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => Digest::update(h, data),
            Self::Sha384(h) => Digest::update(h, data),
            Self::Sha512(h) => Digest::update(h, data),
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256(_) => DigestAlgorithm::Sha256.output_len(),
            Self::Sha384(_) => DigestAlgorithm::Sha384.output_len(),
            Self::Sha512(_) => DigestAlgorithm::Sha512.output_len(),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => Digest::finalize(h).to_vec(),
            Self::Sha384(h) => Digest::finalize(h).to_vec(),
            Self::Sha512(h) => Digest::finalize(h).to_vec(),
        }
    }
}

enum AesBlock {
    A128(Aes128),
    A256(Aes256),
}

enum GcmCipher {
    A128(Aes128Gcm),
    A256(Aes256Gcm),
}

enum CipherKind {
    Ecb(AesBlock),
    Gcm {
        cipher: GcmCipher,
        nonce: [u8; GCM_IV_SIZE],
        pending: Vec<u8>,
    },
}

pub(super) struct CipherState {
    kind: CipherKind,
    mode: CipherMode,
    finished: bool,
}

impl CipherState {
    pub fn new(
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        key: &KeyMaterial,
        iv: Option<&[u8]>,
    ) -> EngineResult<Self> {
        let KeyMaterial::Aes(secret) = key else {
            return Err(EngineError::UnsupportedKeyType(key.type_name().into()));
        };
        let kind = match algorithm {
            CipherAlgorithm::AesEcbNoPadding => {
                if iv.is_some() {
                    return Err(EngineError::InvalidParameters("ECB takes no IV".into()));
                }
                let block = match secret.len() {
                    16 => AesBlock::A128(Aes128::new_from_slice(secret).map_err(bad_aes_key)?),
                    _ => AesBlock::A256(Aes256::new_from_slice(secret).map_err(bad_aes_key)?),
                };
                CipherKind::Ecb(block)
            }
            CipherAlgorithm::AesGcm => {
                let nonce: [u8; GCM_IV_SIZE] = iv
                    .and_then(|iv| iv.try_into().ok())
                    .ok_or_else(|| {
                        EngineError::InvalidParameters(format!("GCM needs a {GCM_IV_SIZE}-byte IV"))
                    })?;
                let cipher = match secret.len() {
                    16 => GcmCipher::A128(
                        <Aes128Gcm as aes_gcm::KeyInit>::new_from_slice(secret).map_err(bad_aes_key)?,
                    ),
                    _ => GcmCipher::A256(
                        <Aes256Gcm as aes_gcm::KeyInit>::new_from_slice(secret).map_err(bad_aes_key)?,
                    ),
                };
                CipherKind::Gcm {
                    cipher,
                    nonce,
                    pending: Vec::new(),
                }
            }
        };

        Ok(Self {
            kind,
            mode,
            finished: false,
        })
    }

    pub fn process(&mut self, input: &[u8], last: bool) -> EngineResult<Vec<u8>> {
        if self.finished {
            return Err(EngineError::InvalidParameters(
                "cipher already processed its final chunk".into(),
            ));
        }

        let out = match &mut self.kind {
            CipherKind::Ecb(block) => {
                if input.len() % AES_BLOCK != 0 {
                    return Err(EngineError::InvalidInputSize(input.len()));
                }
                let mut out = input.to_vec();
                for chunk in out.chunks_mut(AES_BLOCK) {
                    let block_ref = GenericArray::from_mut_slice(chunk);
                    match (&*block, self.mode) {
                        (AesBlock::A128(c), CipherMode::Encrypt) => c.encrypt_block(block_ref),
                        (AesBlock::A128(c), CipherMode::Decrypt) => c.decrypt_block(block_ref),
                        (AesBlock::A256(c), CipherMode::Encrypt) => c.encrypt_block(block_ref),
                        (AesBlock::A256(c), CipherMode::Decrypt) => c.decrypt_block(block_ref),
                    }
                }
                out
            }
            CipherKind::Gcm {
                cipher,
                nonce,
                pending,
            } => {
                pending.extend_from_slice(input);
                if !last {
                    return Ok(Vec::new());
                }
                let nonce = Nonce::from_slice(nonce.as_slice());
                let data = std::mem::take(pending);
                match (cipher, self.mode) {
                    (GcmCipher::A128(c), CipherMode::Encrypt) => c.encrypt(nonce, data.as_slice()),
                    (GcmCipher::A256(c), CipherMode::Encrypt) => c.encrypt(nonce, data.as_slice()),
                    (GcmCipher::A128(c), CipherMode::Decrypt) => c.decrypt(nonce, data.as_slice()),
                    (GcmCipher::A256(c), CipherMode::Decrypt) => c.decrypt(nonce, data.as_slice()),
                }
                .map_err(|_| match self.mode {
                    CipherMode::Encrypt => EngineError::Crypto("GCM encryption failed".into()),
                    CipherMode::Decrypt => EngineError::VerificationFailed,
                })?
            }
        };

        if last {
            self.finished = true;
        }
        Ok(out)
    }
}

fn bad_aes_key<E>(_: E) -> EngineError {
    EngineError::InvalidParameters("bad AES key length".into())
}

pub(super) struct SignatureState {
    mode: SignatureMode,
    signing: Option<SigningKey>,
    verifying: VerifyingKey,
}

impl SignatureState {
    pub fn new(mode: SignatureMode, key: &KeyMaterial) -> EngineResult<Self> {
        let (signing, verifying) = match key {
            KeyMaterial::Ed25519Private(sk) => (Some(sk.clone()), sk.verifying_key()),
            KeyMaterial::Ed25519Public(vk) => (None, *vk),
            other => return Err(EngineError::UnsupportedKeyType(other.type_name().into())),
        };
        if mode == SignatureMode::Sign && signing.is_none() {
            return Err(EngineError::UnsupportedKeyType(
                "signing needs a private key".into(),
            ));
        }
        Ok(Self {
            mode,
            signing,
            verifying,
        })
    }

    pub fn sign(&self, message: &[u8]) -> EngineResult<Vec<u8>> {
        match (&self.signing, self.mode) {
            (Some(sk), SignatureMode::Sign) => Ok(sk.sign(message).to_bytes().to_vec()),
            _ => Err(EngineError::InvalidParameters(
                "signature handle not opened for signing".into(),
            )),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> EngineResult<()> {
        if self.mode != SignatureMode::Verify {
            return Err(EngineError::InvalidParameters(
                "signature handle not opened for verification".into(),
            ));
        }
        let signature =
            Signature::from_slice(signature).map_err(|_| EngineError::VerificationFailed)?;
        self.verifying
            .verify(message, &signature)
            .map_err(|_| EngineError::VerificationFailed)
    }
}
