//! Digest known answers (FIPS 180-4 "abc" vectors).

use super::{expect_hex, SuiteEnv};
use crate::engine::DigestAlgorithm;
use crate::error::Result;
use crate::{ensure, util};

const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
const SHA384_ABC: &str = "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded163\
                          1a8b605a43ff5bed8086072ba1e7cc2358baeca134c825a7";
const SHA512_ABC: &str = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                          2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";

fn digest_parts<T: AsRef<[u8]>>(
    env: &SuiteEnv,
    algorithm: DigestAlgorithm,
    parts: &[T],
) -> Result<Vec<u8>> {
    let ctx = env.ctx()?;
    let digest = ctx.acquire_digest(algorithm)?;
    for part in parts {
        ctx.engine().digest_update(digest, part.as_ref())?;
    }
    let mut out = vec![0u8; algorithm.output_len()];
    let written = ctx.release_digest_output(digest, &mut out)?;
    out.truncate(written);
    Ok(out)
}

fn abc_kat(env: &SuiteEnv, algorithm: DigestAlgorithm, expected: &str) -> Result<()> {
    let out = digest_parts(env, algorithm, &[b"abc"])?;
    util::print_hex("digest", &out);
    expect_hex("digest", &out, expected)
}

pub(super) fn sha256_kat(env: &SuiteEnv) -> Result<()> {
    abc_kat(env, DigestAlgorithm::Sha256, SHA256_ABC)
}

pub(super) fn sha384_kat(env: &SuiteEnv) -> Result<()> {
    abc_kat(env, DigestAlgorithm::Sha384, SHA384_ABC)
}

pub(super) fn sha512_kat(env: &SuiteEnv) -> Result<()> {
    abc_kat(env, DigestAlgorithm::Sha512, SHA512_ABC)
}

/// Incremental updates must match a single update over the coalesced input.
pub(super) fn multipart(env: &SuiteEnv) -> Result<()> {
    let sizes = [0usize, 1, 63, 64, 65, 1000];
    let parts: Vec<Vec<u8>> = sizes.iter().map(|&n| util::random(n)).collect();
    let whole = util::coalesce_inputs(&parts);
    ensure!(
        whole.len() == util::coalesce_input_sizes(&sizes),
        "coalesced input has {} bytes",
        whole.len()
    );

    for algorithm in [
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ] {
        let incremental = digest_parts(env, algorithm, &parts)?;
        let single = digest_parts(env, algorithm, &[&whole])?;
        ensure!(
            incremental == single,
            "{algorithm} multipart digest differs from single-shot"
        );
    }
    Ok(())
}
