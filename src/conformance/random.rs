//! Random generator smoke checks.

use super::SuiteEnv;
use crate::engine::RandomAlgorithm;
use crate::error::Result;
use crate::{ensure, util};

fn draw_twice(env: &SuiteEnv, algorithm: RandomAlgorithm) -> Result<()> {
    let ctx = env.ctx()?;
    let random = ctx.scoped(ctx.acquire_random(algorithm)?);

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    ctx.engine().random_process(*random, &mut first)?;
    ctx.engine().random_process(*random, &mut second)?;
    util::print_hex("first", &first);
    util::print_hex("second", &second);

    ensure!(first != [0u8; 32], "{algorithm} produced all zeros");
    ensure!(first != second, "{algorithm} repeated its output");
    random.release()
}

pub(super) fn prng(env: &SuiteEnv) -> Result<()> {
    draw_twice(env, RandomAlgorithm::Prng)
}

pub(super) fn true_random(env: &SuiteEnv) -> Result<()> {
    draw_twice(env, RandomAlgorithm::TrueRandom)
}
