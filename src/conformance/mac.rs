//! HMAC known answers (RFC 4231) and output-buffer handling.

use super::{expect_hex, object_id, SuiteEnv};
use crate::creds::{TestKc, TestKey};
use crate::engine::{EngineError, KeyContainer, MacAlgorithm, StorageLoc};
use crate::error::{HarnessError, Result};
use crate::{ensure, util};

const JEFE_DATA: &[u8] = b"what do ya want for nothing?";
const JEFE_SHA256: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";
const JEFE_SHA512: &str = "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
                           9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737";
// RFC 4231 test case 1: 20 bytes of 0x0b over "Hi There".
const HI_THERE_SHA256: &str = "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7";

fn jefe_kat(env: &SuiteEnv, id: u64, algorithm: MacAlgorithm, expected: &str) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key_bytes(
        object_id(id),
        StorageLoc::Ram,
        b"Jefe",
        KeyContainer::RawHmac,
        false,
    )?;

    let mac = ctx.acquire_mac(algorithm, key)?;
    // Split the message to exercise incremental updates.
    let (head, tail) = JEFE_DATA.split_at(10);
    ctx.engine().mac_update(mac, head)?;
    ctx.engine().mac_update(mac, tail)?;

    let mut tag = [0u8; 64];
    let written = ctx.release_mac_output(mac, &mut tag)?;
    ensure!(
        written == algorithm.output_len(),
        "{algorithm} wrote {written} bytes"
    );
    util::print_hex("tag", &tag[..written]);
    expect_hex("tag", &tag[..written], expected)?;

    ctx.release_key(key)?;
    ctx.delete_key(object_id(id))?;
    ensure!(
        ctx.tracked_count() == 0,
        "{} resources still tracked",
        ctx.tracked_count()
    );
    Ok(())
}

pub(super) fn hmac_sha256_kat(env: &SuiteEnv) -> Result<()> {
    jefe_kat(env, 0x0101, MacAlgorithm::HmacSha256, JEFE_SHA256)
}

pub(super) fn hmac_sha512_kat(env: &SuiteEnv) -> Result<()> {
    jefe_kat(env, 0x0102, MacAlgorithm::HmacSha512, JEFE_SHA512)
}

pub(super) fn fixture_key_kat(env: &SuiteEnv) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0103),
        StorageLoc::Ram,
        TestKey::Hmac160,
        TestKc::Raw,
        false,
    )?;
    let mac = ctx.acquire_mac(MacAlgorithm::HmacSha256, key)?;
    ctx.engine().mac_update(mac, b"Hi There")?;

    let mut tag = [0u8; 32];
    let written = ctx.release_mac_output(mac, &mut tag)?;
    expect_hex("tag", &tag[..written], HI_THERE_SHA256)
}

/// A short buffer fails without consuming the handle; a retry succeeds.
pub(super) fn buffer_too_small(env: &SuiteEnv) -> Result<()> {
    let ctx = env.ctx()?;
    let key = ctx.provision_key(
        object_id(0x0104),
        StorageLoc::Ram,
        TestKey::Hmac256,
        TestKc::Raw,
        false,
    )?;
    let mac = ctx.acquire_mac(MacAlgorithm::HmacSha512, key)?;
    ctx.engine().mac_update(mac, &util::random(100))?;

    let mut short = [0u8; 32];
    match ctx.release_mac_output(mac, &mut short) {
        Err(HarnessError::Engine(EngineError::BufferTooSmall { needed: 64, .. })) => {}
        other => {
            return Err(HarnessError::assertion(format!(
                "expected BufferTooSmall, got {other:?}"
            )))
        }
    }
    ensure!(ctx.is_tracked(mac), "MAC handle dropped after short buffer");

    let mut tag = [0u8; 64];
    let written = ctx.release_mac_output(mac, &mut tag)?;
    ensure!(written == 64, "wrote {written} bytes");
    ensure!(!ctx.is_tracked(mac), "MAC handle still tracked after release");
    Ok(())
}
