//! Provisioning, deletion and cleanup behavior of the resource context.

use super::{expect_hex, object_id, SuiteEnv};
use crate::context::TestCtx;
use crate::creds::{self, TestCert, TestKc, TestKey};
use crate::engine::{
    DigestAlgorithm, EngineError, KeyContainer, MacAlgorithm, ObjectKind, StorageLoc,
};
use crate::error::{HarnessError, Result};
use crate::{ensure, util};

/// Expect `result` to be an engine `NoSuchItem` for `kind`.
fn expect_missing<T: std::fmt::Debug>(result: Result<T>, kind: ObjectKind) -> Result<()> {
    match result {
        Err(HarnessError::Engine(EngineError::NoSuchItem { kind: k, .. })) if k == kind => Ok(()),
        other => Err(HarnessError::assertion(format!(
            "expected missing {kind}, got {other:?}"
        ))),
    }
}

/// Expect exactly `expected` resources tracked by `ctx`.
fn expect_tracked(ctx: &TestCtx, expected: usize) -> Result<()> {
    let tracked = ctx.tracked_count();
    ensure!(
        tracked == expected,
        "{} tracked, expected {} (off by {})",
        tracked,
        expected,
        tracked.abs_diff(expected)
    );
    Ok(())
}

/// A file-backed key is visible to a second context until deleted.
pub(super) fn key_file_lifecycle(env: &SuiteEnv) -> Result<()> {
    let id = object_id(0x0401);
    let ctx = env.ctx()?;
    let key = ctx.provision_key(id, StorageLoc::File, TestKey::Aes128, TestKc::Raw, false)?;
    ctx.release_key(key)?;

    let other = env.ctx()?;
    let reopened = other.get_key(id)?;
    other.release_key(reopened)?;

    ctx.delete_key(id)?;
    expect_missing(other.get_key(id), ObjectKind::Key)?;
    ensure!(
        ctx.tracked_count() == 0 && other.tracked_count() == 0,
        "resources still tracked after delete"
    );
    Ok(())
}

pub(super) fn key_duplicate_rejected(env: &SuiteEnv) -> Result<()> {
    let id = object_id(0x0402);
    let ctx = env.ctx()?;
    ctx.provision_key(id, StorageLoc::Ram, TestKey::Hmac128, TestKc::Raw, false)?;

    match ctx.provision_key(id, StorageLoc::Ram, TestKey::Hmac256, TestKc::Raw, false) {
        Err(HarnessError::Engine(EngineError::ItemAlreadyProvisioned { .. })) => {}
        other => {
            return Err(HarnessError::assertion(format!(
                "duplicate provision not rejected: {other:?}"
            )))
        }
    }
    // One handle plus one id; the failed call recorded nothing.
    ensure!(
        ctx.tracked_count() == 2,
        "{} resources tracked",
        ctx.tracked_count()
    );
    Ok(())
}

/// Soft-wrapped material never appears in the clear and still computes the
/// right MAC.
pub(super) fn key_soft_wrap(env: &SuiteEnv) -> Result<()> {
    const SECRET: &[u8] = b"Jefe";
    const JEFE_SHA256: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

    let ctx = env.ctx()?;
    match ctx
        .engine()
        .wrap_key(ctx.proc()?, KeyContainer::RawHmac, SECRET)
    {
        Ok(blob) => ensure!(
            !blob.windows(SECRET.len()).any(|w| w == SECRET),
            "wrapped container holds the clear key"
        ),
        Err(EngineError::Unsupported) => {
            tracing::info!(engine = ctx.engine().name(), "soft wrap unsupported");
        }
        Err(e) => return Err(e.into()),
    }

    let key = ctx.provision_key_bytes(
        object_id(0x0403),
        StorageLoc::File,
        SECRET,
        KeyContainer::RawHmac,
        true,
    )?;
    let mac = ctx.acquire_mac(MacAlgorithm::HmacSha256, key)?;
    ctx.engine()
        .mac_update(mac, b"what do ya want for nothing?")?;
    let mut tag = [0u8; 32];
    let written = ctx.release_mac_output(mac, &mut tag)?;
    expect_hex("tag", &tag[..written], JEFE_SHA256)
}

pub(super) fn cert_lifecycle(env: &SuiteEnv) -> Result<()> {
    let id = object_id(0x0404);
    let ctx = env.ctx()?;
    let cert = ctx.provision_cert(id, StorageLoc::File, TestCert::Ed25519Root)?;

    let (_, expected) = creds::cert_material(TestCert::Ed25519Root);
    let exported = ctx.engine().export_certificate(cert)?;
    util::print_hex("certificate", &exported);
    ensure!(exported == expected, "exported certificate differs");

    let again = ctx.get_cert(id)?;
    ctx.release_cert(again)?;
    ctx.release_cert(cert)?;
    ctx.delete_cert(id)?;
    expect_missing(ctx.get_cert(id), ObjectKind::Certificate)
}

pub(super) fn bundle_lifecycle(env: &SuiteEnv) -> Result<()> {
    let id = object_id(0x0405);
    let ctx = env.ctx()?;
    let data = util::random(64);
    let bundle = ctx.provision_bundle(id, StorageLoc::File, &data)?;

    ensure!(
        ctx.engine().export_bundle(bundle)? == data,
        "exported bundle differs"
    );
    ctx.release_bundle(bundle)?;
    ctx.delete_bundle(id)?;
    expect_missing(ctx.delete_bundle(id), ObjectKind::Bundle)?;
    ensure!(ctx.tracked_count() == 0, "bundle still tracked");
    Ok(())
}

/// Guards release their handles when a body bails out early.
pub(super) fn scoped_guard_cleanup(env: &SuiteEnv) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0406),
        StorageLoc::Ram,
        TestKey::Hmac256,
        TestKc::Raw,
        false,
    )?;
    let baseline = ctx.tracked_count();

    let early_exit = || -> Result<()> {
        let _mac = ctx.scoped(ctx.acquire_mac(MacAlgorithm::HmacSha256, key)?);
        let _digest = ctx.scoped(ctx.acquire_digest(DigestAlgorithm::Sha256)?);
        Err(HarnessError::assertion("bail out"))
    };
    ensure!(early_exit().is_err(), "body should have failed");
    expect_tracked(&ctx, baseline)?;

    // The key is free again, so releasing it succeeds.
    ctx.release_key(key)?;
    Ok(())
}

/// Unreleased handles are released operations first, newest first, then the
/// processor.
pub(super) fn teardown_order(env: &SuiteEnv) -> Result<()> {
    let mut ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0407),
        StorageLoc::Ram,
        TestKey::Hmac128,
        TestKc::Raw,
        false,
    )?;
    let mac = ctx.acquire_mac(MacAlgorithm::HmacSha256, key)?;
    let digest = ctx.acquire_digest(DigestAlgorithm::Sha256)?;
    let proc = ctx.proc()?;

    let report = ctx.teardown();
    for failure in &report.failures {
        tracing::error!(resource = %failure.target, error = %failure.error, "teardown failure");
    }
    ensure!(report.is_clean(), "{} teardown failures", report.failures.len());

    let expected = [
        digest.to_string(),
        mac.to_string(),
        key.to_string(),
        proc.to_string(),
    ];
    ensure!(
        report.released == expected,
        "release order {:?}, expected {:?}",
        report.released,
        expected
    );
    ensure!(report.deleted == 1, "{} objects deleted", report.deleted);
    Ok(())
}
