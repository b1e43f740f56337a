//! Built-in conformance suite.
//!
//! Known-answer and lifecycle checks against any [`SecEngine`]. Every test
//! opens its own [`TestCtx`], so a failure in one cannot leak handles into the
//! next.

mod cipher;
mod digest;
mod lifecycle;
mod mac;
mod random;
mod signature;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::context::TestCtx;
use crate::engine::{ObjectId, SecEngine};
use crate::error::{HarnessError, Result};
use crate::suite::SuiteRunner;
use crate::util;

/// Engine plus store directories shared by every conformance test.
#[derive(Clone)]
pub struct SuiteEnv {
    pub engine: Arc<dyn SecEngine>,
    pub global_dir: PathBuf,
    pub app_dir: PathBuf,
}

impl SuiteEnv {
    pub fn new(
        engine: Arc<dyn SecEngine>,
        global_dir: impl Into<PathBuf>,
        app_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            global_dir: global_dir.into(),
            app_dir: app_dir.into(),
        }
    }

    pub fn from_config(engine: Arc<dyn SecEngine>, config: &HarnessConfig) -> Self {
        Self::new(engine, &config.global_dir, &config.app_dir)
    }

    /// Fresh context for one test.
    pub fn ctx(&self) -> Result<TestCtx> {
        TestCtx::init(Arc::clone(&self.engine), &self.global_dir, &self.app_dir)
    }
}

/// Object ids used by the suite live under this prefix.
const ID_BASE: ObjectId = 0x5ec0_0000_0000_0000;

const fn object_id(n: u64) -> ObjectId {
    ID_BASE | n
}

/// Register the whole suite, in order, on `runner`.
pub fn register_all(runner: &mut SuiteRunner, env: &SuiteEnv) {
    runner.run_test("digest_sha256_kat", || digest::sha256_kat(env));
    runner.run_test("digest_sha384_kat", || digest::sha384_kat(env));
    runner.run_test("digest_sha512_kat", || digest::sha512_kat(env));
    runner.run_test("digest_multipart", || digest::multipart(env));

    runner.run_test("mac_hmac_sha256_kat", || mac::hmac_sha256_kat(env));
    runner.run_test("mac_hmac_sha512_kat", || mac::hmac_sha512_kat(env));
    runner.run_test("mac_fixture_key_kat", || mac::fixture_key_kat(env));
    runner.run_test("mac_buffer_too_small", || mac::buffer_too_small(env));

    runner.run_test("cipher_aes128_ecb_kat", || cipher::aes128_ecb_kat(env));
    runner.run_test("cipher_aes_gcm_roundtrip", || cipher::aes_gcm_roundtrip(env));
    runner.run_test("cipher_aes_gcm_tamper", || cipher::aes_gcm_tamper(env));

    runner.run_test("signature_ed25519_kat", || signature::ed25519_kat(env));
    runner.run_test("signature_ed25519_public_only", || {
        signature::ed25519_public_only(env)
    });

    runner.run_test("random_prng", || random::prng(env));
    runner.run_test("random_true", || random::true_random(env));

    runner.run_test("key_file_lifecycle", || lifecycle::key_file_lifecycle(env));
    runner.run_test("key_duplicate_rejected", || lifecycle::key_duplicate_rejected(env));
    runner.run_test("key_soft_wrap", || lifecycle::key_soft_wrap(env));
    runner.run_test("cert_lifecycle", || lifecycle::cert_lifecycle(env));
    runner.run_test("bundle_lifecycle", || lifecycle::bundle_lifecycle(env));
    runner.run_test("scoped_guard_cleanup", || lifecycle::scoped_guard_cleanup(env));
    runner.run_test("teardown_order", || lifecycle::teardown_order(env));
}

fn from_hex(hex_str: &str) -> Result<Vec<u8>> {
    hex::decode(hex_str).map_err(|e| HarnessError::assertion(format!("bad hex constant: {e}")))
}

/// Compare against a known answer, logging both sides on mismatch.
fn expect_hex(label: &str, actual: &[u8], expected_hex: &str) -> Result<()> {
    let expected = from_hex(expected_hex)?;
    if actual == expected.as_slice() {
        return Ok(());
    }
    util::print_hex("expected", &expected);
    util::print_hex("actual", actual);
    Err(HarnessError::assertion(format!("{label} does not match known answer")))
}
