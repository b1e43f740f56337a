//! AES known answers and AES-GCM round trips.

use super::{expect_hex, from_hex, object_id, SuiteEnv};
use crate::context::TestCtx;
use crate::creds::{TestKc, TestKey};
use crate::engine::{CipherAlgorithm, CipherMode, EngineError, KeyHandle, StorageLoc};
use crate::error::{HarnessError, Result};
use crate::{ensure, util};

// FIPS-197 appendix C.1.
const FIPS197_PLAINTEXT: &str = "00112233445566778899aabbccddeeff";
const FIPS197_CIPHERTEXT: &str = "69c4e0d86a7b0430d8cdb78070b4c55a";

const GCM_IV_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

pub(super) fn aes128_ecb_kat(env: &SuiteEnv) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0201),
        StorageLoc::Ram,
        TestKey::Aes128,
        TestKc::Raw,
        false,
    )?;
    let plaintext = from_hex(FIPS197_PLAINTEXT)?;

    let enc = ctx.acquire_cipher(CipherAlgorithm::AesEcbNoPadding, CipherMode::Encrypt, key, None)?;
    let ciphertext = ctx.engine().cipher_process(enc, &plaintext, true)?;
    ctx.release_cipher(enc)?;
    expect_hex("ciphertext", &ciphertext, FIPS197_CIPHERTEXT)?;

    let dec = ctx.acquire_cipher(CipherAlgorithm::AesEcbNoPadding, CipherMode::Decrypt, key, None)?;
    let recovered = ctx.engine().cipher_process(dec, &ciphertext, true)?;
    ctx.release_cipher(dec)?;
    ensure!(recovered == plaintext, "ECB decrypt did not recover plaintext");

    // No padding: partial blocks are rejected.
    let odd = ctx.acquire_cipher(CipherAlgorithm::AesEcbNoPadding, CipherMode::Encrypt, key, None)?;
    match ctx.engine().cipher_process(odd, &plaintext[..15], true) {
        Err(EngineError::InvalidInputSize(15)) => Ok(()),
        other => Err(HarnessError::assertion(format!(
            "expected InvalidInputSize(15), got {other:?}"
        ))),
    }
}

/// Encrypt `parts` as one message; returns the context, key, IV and
/// ciphertext with tag appended.
fn gcm_encrypt(
    env: &SuiteEnv,
    id: u64,
    parts: &[Vec<u8>],
) -> Result<(TestCtx, KeyHandle, Vec<u8>, Vec<u8>)> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(id),
        StorageLoc::Ram,
        TestKey::Aes256,
        TestKc::Raw,
        false,
    )?;
    let iv = util::random(GCM_IV_LEN);

    let enc = ctx.acquire_cipher(CipherAlgorithm::AesGcm, CipherMode::Encrypt, key, Some(&iv))?;
    let mut sealed = Vec::new();
    for (idx, part) in parts.iter().enumerate() {
        let last = idx + 1 == parts.len();
        sealed.extend(ctx.engine().cipher_process(enc, part, last)?);
    }
    ctx.release_cipher(enc)?;
    Ok((ctx, key, iv, sealed))
}

pub(super) fn aes_gcm_roundtrip(env: &SuiteEnv) -> Result<()> {
    let parts = vec![util::random(7), util::random(33), util::random(16)];
    let plaintext = util::coalesce_inputs(&parts);
    let (ctx, key, iv, sealed) = gcm_encrypt(env, 0x0202, &parts)?;

    ensure!(
        sealed.len() == plaintext.len() + GCM_TAG_LEN,
        "sealed length {} for {} plaintext bytes",
        sealed.len(),
        plaintext.len()
    );

    let dec = ctx.acquire_cipher(CipherAlgorithm::AesGcm, CipherMode::Decrypt, key, Some(&iv))?;
    let recovered = ctx.engine().cipher_process(dec, &sealed, true)?;
    ctx.release_cipher(dec)?;
    ensure!(recovered == plaintext, "GCM decrypt did not recover plaintext");
    Ok(())
}

pub(super) fn aes_gcm_tamper(env: &SuiteEnv) -> Result<()> {
    let (ctx, key, iv, mut sealed) = gcm_encrypt(env, 0x0203, &[util::random(48)])?;
    sealed[0] ^= 0x01;

    let dec = ctx.acquire_cipher(CipherAlgorithm::AesGcm, CipherMode::Decrypt, key, Some(&iv))?;
    match ctx.engine().cipher_process(dec, &sealed, true) {
        Err(EngineError::VerificationFailed) => Ok(()),
        other => Err(HarnessError::assertion(format!(
            "tampered ciphertext was accepted: {other:?}"
        ))),
    }
}
