//! Scope-bound ownership of a tracked handle.

use std::ops::Deref;

use super::{TestCtx, TrackedHandle};
use crate::error::Result;

/// Releases its handle through the owning [`TestCtx`] when dropped.
///
/// Early returns and `?` inside a test body therefore cannot leave the handle
/// open until context teardown. Call [`release`](Scoped::release) to observe
/// the release result, or [`into_inner`](Scoped::into_inner) to hand the
/// handle back to the context's teardown.
pub struct Scoped<'a, H: TrackedHandle> {
    ctx: &'a TestCtx,
    handle: H,
    armed: bool,
}

impl<'a, H: TrackedHandle> Scoped<'a, H> {
    pub(super) fn new(ctx: &'a TestCtx, handle: H) -> Self {
        Self {
            ctx,
            handle,
            armed: true,
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.ctx.release_resource(self.handle.into())
    }

    /// Disarm the guard. The handle stays tracked by the context.
    pub fn into_inner(mut self) -> H {
        self.armed = false;
        self.handle
    }
}

impl<H: TrackedHandle> Deref for Scoped<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H: TrackedHandle> Drop for Scoped<'_, H> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.ctx.release_resource(self.handle.into()) {
            tracing::warn!(handle = %self.handle, error = %e, "scoped release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::TestCtx;
    use crate::engine::{DigestAlgorithm, RandomAlgorithm, SoftEngine};

    #[test]
    fn test_guard_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::init(Arc::new(SoftEngine::new()), dir.path(), dir.path()).unwrap();
        {
            let digest = ctx.scoped(ctx.acquire_digest(DigestAlgorithm::Sha256).unwrap());
            assert!(ctx.is_tracked(*digest));
        }
        assert_eq!(ctx.tracked_count(), 0);
    }

    #[test]
    fn test_into_inner_leaves_handle_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::init(Arc::new(SoftEngine::new()), dir.path(), dir.path()).unwrap();
        let random = ctx
            .scoped(ctx.acquire_random(RandomAlgorithm::TrueRandom).unwrap())
            .into_inner();
        assert!(ctx.is_tracked(random));
    }
}
