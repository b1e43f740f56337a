//! Ed25519 known answer (RFC 8032 section 7.1, test 1).

use super::{expect_hex, from_hex, object_id, SuiteEnv};
use crate::creds::{TestKc, TestKey};
use crate::engine::{EngineError, SignatureAlgorithm, SignatureMode, StorageLoc};
use crate::error::{HarnessError, Result};
use crate::util;

const TEST1_SIGNATURE: &str = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
                               5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b";

pub(super) fn ed25519_kat(env: &SuiteEnv) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0301),
        StorageLoc::Ram,
        TestKey::Ed25519,
        TestKc::Raw,
        false,
    )?;

    let signer = ctx.acquire_signature(SignatureAlgorithm::Ed25519, SignatureMode::Sign, key)?;
    let signature = ctx.engine().sign(signer, b"")?;
    ctx.release_signature(signer)?;
    util::print_hex("signature", &signature);
    expect_hex("signature", &signature, TEST1_SIGNATURE)?;

    let verifier = ctx.acquire_signature(SignatureAlgorithm::Ed25519, SignatureMode::Verify, key)?;
    ctx.engine().verify(verifier, b"", &signature)?;
    ctx.release_signature(verifier)?;
    Ok(())
}

/// A public-only key verifies the known signature, rejects a forged one and
/// cannot sign.
pub(super) fn ed25519_public_only(env: &SuiteEnv) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0302),
        StorageLoc::Ram,
        TestKey::Ed25519,
        TestKc::PublicOnly,
        false,
    )?;
    let signature = from_hex(TEST1_SIGNATURE)?;

    let verifier = ctx.scoped(ctx.acquire_signature(
        SignatureAlgorithm::Ed25519,
        SignatureMode::Verify,
        key,
    )?);
    ctx.engine().verify(*verifier, b"", &signature)?;

    let mut forged = signature.clone();
    forged[63] ^= 0x80;
    match ctx.engine().verify(*verifier, b"", &forged) {
        Err(EngineError::VerificationFailed) => {}
        other => {
            return Err(HarnessError::assertion(format!(
                "forged signature accepted: {other:?}"
            )))
        }
    }
    verifier.release()?;

    match ctx.acquire_signature(SignatureAlgorithm::Ed25519, SignatureMode::Sign, key) {
        Err(HarnessError::Engine(EngineError::UnsupportedKeyType(_))) => Ok(()),
        other => Err(HarnessError::assertion(format!(
            "signing with a public key was allowed: {other:?}"
        ))),
    }
}
