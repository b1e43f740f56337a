//! Resource context.
//!
//! A [`TestCtx`] owns one engine processor and every key, certificate, bundle
//! and operation handle a test creates through it. Whatever the test does not
//! release itself is released when the context is torn down or dropped:
//! operation handles first, then key/certificate/bundle handles, each newest
//! first, then any provisioned object ids still recorded, then the processor.

mod scoped;
mod tracked;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::creds::{self, TestCert, TestKc, TestKey};
use crate::engine::{
    BundleHandle, CertificateHandle, CipherAlgorithm, CipherHandle, CipherMode, DigestAlgorithm,
    DigestHandle, EngineError, EngineResult, KeyContainer, KeyHandle, MacAlgorithm, MacHandle,
    ObjectId, ObjectKind, ProcessorHandle, RandomAlgorithm, RandomHandle, SecEngine,
    SignatureAlgorithm, SignatureHandle, SignatureMode, StorageLoc,
};
use crate::error::{HarnessError, Result};

pub use scoped::Scoped;
pub use tracked::{
    Resource, ResourceCategory, TeardownFailure, TeardownReport, TrackedHandle, TrackedResource,
};

#[derive(Default)]
struct TrackedState {
    proc: Option<ProcessorHandle>,
    /// Open handles in creation order.
    handles: Vec<TrackedResource>,
    /// Object ids provisioned through this context and not yet deleted.
    provisioned: Vec<(ObjectKind, ObjectId)>,
}

/// Owner of one processor and every handle opened through it.
pub struct TestCtx {
    engine: Arc<dyn SecEngine>,
    state: Mutex<TrackedState>,
}

impl TestCtx {
    /// Open a processor rooted at the two store directories.
    pub fn init(
        engine: Arc<dyn SecEngine>,
        global_dir: impl AsRef<Path>,
        app_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let proc = engine.open_processor(global_dir.as_ref(), app_dir.as_ref())?;
        tracing::debug!(engine = engine.name(), %proc, "test context opened");
        Ok(Self {
            engine,
            state: Mutex::new(TrackedState {
                proc: Some(proc),
                ..TrackedState::default()
            }),
        })
    }

    /// The open processor, or `NotInitialized` after teardown.
    pub fn proc(&self) -> Result<ProcessorHandle> {
        self.state.lock().proc.ok_or(HarnessError::NotInitialized)
    }

    pub fn engine(&self) -> &dyn SecEngine {
        self.engine.as_ref()
    }

    /// Handles plus provisioned ids still owned by this context.
    pub fn tracked_count(&self) -> usize {
        let state = self.state.lock();
        state.handles.len() + state.provisioned.len()
    }

    /// Snapshot of the open handles in creation order.
    pub fn tracked(&self) -> Vec<TrackedResource> {
        self.state.lock().handles.clone()
    }

    pub fn is_tracked(&self, resource: impl Into<Resource>) -> bool {
        let resource = resource.into();
        self.state
            .lock()
            .handles
            .iter()
            .any(|t| t.resource == resource)
    }

    fn track(&self, resource: impl Into<Resource>, object_id: Option<ObjectId>) {
        self.state.lock().handles.push(TrackedResource {
            resource: resource.into(),
            object_id,
        });
    }

    fn untrack(&self, resource: Resource) {
        let mut state = self.state.lock();
        if let Some(pos) = state.handles.iter().rposition(|t| t.resource == resource) {
            state.handles.remove(pos);
        }
    }

    fn record_provisioned(&self, kind: ObjectKind, id: ObjectId) {
        self.state.lock().provisioned.push((kind, id));
    }

    fn forget_provisioned(&self, kind: ObjectKind, id: ObjectId) {
        self.state
            .lock()
            .provisioned
            .retain(|entry| *entry != (kind, id));
    }

    /// Forward a release and untrack unless the engine kept the handle.
    fn finish_release<T>(&self, resource: Resource, result: EngineResult<T>) -> Result<T> {
        match &result {
            Ok(_) | Err(EngineError::InvalidHandle) => self.untrack(resource),
            Err(e) => tracing::warn!(%resource, error = %e, "release refused, still tracked"),
        }
        result.map_err(HarnessError::from)
    }

    /// Release any tracked handle without retrieving output.
    pub fn release_resource(&self, resource: Resource) -> Result<()> {
        let result = resource.release(self.engine.as_ref());
        self.finish_release(resource, result)
    }

    /// Wrap `handle` in a guard that releases it on scope exit.
    pub fn scoped<H: TrackedHandle>(&self, handle: H) -> Scoped<'_, H> {
        Scoped::new(self, handle)
    }

    // Keys

    /// Provision a named fixture key under `id` and open it.
    pub fn provision_key(
        &self,
        id: ObjectId,
        loc: StorageLoc,
        key: TestKey,
        kc: TestKc,
        soft_wrap: bool,
    ) -> Result<KeyHandle> {
        let (container, data) = creds::key_material(key, kc)?;
        self.provision_key_bytes(id, loc, &data, container, soft_wrap)
    }

    /// Provision raw key bytes under `id` and open them.
    ///
    /// With `soft_wrap` the material is wrapped by the engine first; engines
    /// without wrapping support get it in the clear.
    pub fn provision_key_bytes(
        &self,
        id: ObjectId,
        loc: StorageLoc,
        data: &[u8],
        container: KeyContainer,
        soft_wrap: bool,
    ) -> Result<KeyHandle> {
        let proc = self.proc()?;

        let wrapped = if soft_wrap {
            match self.engine.wrap_key(proc, container, data) {
                Ok(blob) => Some(blob),
                Err(EngineError::Unsupported) => {
                    tracing::warn!(id, "engine cannot soft-wrap, provisioning in the clear");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        match &wrapped {
            Some(blob) => self
                .engine
                .provision_key(proc, id, loc, KeyContainer::Store, blob)?,
            None => self.engine.provision_key(proc, id, loc, container, data)?,
        }
        self.record_provisioned(ObjectKind::Key, id);

        let handle = self.engine.open_key(proc, id)?;
        self.track(handle, Some(id));
        Ok(handle)
    }

    /// Open an already provisioned key.
    pub fn get_key(&self, id: ObjectId) -> Result<KeyHandle> {
        let handle = self.engine.open_key(self.proc()?, id)?;
        self.track(handle, None);
        Ok(handle)
    }

    pub fn release_key(&self, key: KeyHandle) -> Result<()> {
        let result = self.engine.release_key(key);
        self.finish_release(key.into(), result)
    }

    /// Delete persisted key material. Independent of any open handle.
    pub fn delete_key(&self, id: ObjectId) -> Result<()> {
        let proc = self.proc()?;
        self.forget_provisioned(ObjectKind::Key, id);
        Ok(self.engine.delete_key(proc, id)?)
    }

    // Certificates

    pub fn provision_cert(
        &self,
        id: ObjectId,
        loc: StorageLoc,
        cert: TestCert,
    ) -> Result<CertificateHandle> {
        let proc = self.proc()?;
        let (container, data) = creds::cert_material(cert);
        self.engine
            .provision_certificate(proc, id, loc, container, &data)?;
        self.record_provisioned(ObjectKind::Certificate, id);

        let handle = self.engine.open_certificate(proc, id)?;
        self.track(handle, Some(id));
        Ok(handle)
    }

    pub fn get_cert(&self, id: ObjectId) -> Result<CertificateHandle> {
        let handle = self.engine.open_certificate(self.proc()?, id)?;
        self.track(handle, None);
        Ok(handle)
    }

    pub fn release_cert(&self, cert: CertificateHandle) -> Result<()> {
        let result = self.engine.release_certificate(cert);
        self.finish_release(cert.into(), result)
    }

    pub fn delete_cert(&self, id: ObjectId) -> Result<()> {
        let proc = self.proc()?;
        self.forget_provisioned(ObjectKind::Certificate, id);
        Ok(self.engine.delete_certificate(proc, id)?)
    }

    // Bundles

    pub fn provision_bundle(
        &self,
        id: ObjectId,
        loc: StorageLoc,
        bundle: &[u8],
    ) -> Result<BundleHandle> {
        let proc = self.proc()?;
        self.engine.provision_bundle(proc, id, loc, bundle)?;
        self.record_provisioned(ObjectKind::Bundle, id);

        let handle = self.engine.open_bundle(proc, id)?;
        self.track(handle, Some(id));
        Ok(handle)
    }

    pub fn get_bundle(&self, id: ObjectId) -> Result<BundleHandle> {
        let handle = self.engine.open_bundle(self.proc()?, id)?;
        self.track(handle, None);
        Ok(handle)
    }

    pub fn release_bundle(&self, bundle: BundleHandle) -> Result<()> {
        let result = self.engine.release_bundle(bundle);
        self.finish_release(bundle.into(), result)
    }

    pub fn delete_bundle(&self, id: ObjectId) -> Result<()> {
        let proc = self.proc()?;
        self.forget_provisioned(ObjectKind::Bundle, id);
        Ok(self.engine.delete_bundle(proc, id)?)
    }

    // Operations

    pub fn acquire_mac(&self, algorithm: MacAlgorithm, key: KeyHandle) -> Result<MacHandle> {
        let handle = self.engine.open_mac(self.proc()?, algorithm, key)?;
        self.track(handle, None);
        Ok(handle)
    }

    /// Finalize into `out`, returning the tag length, then release.
    ///
    /// A short buffer fails with `BufferTooSmall` and the handle stays tracked.
    pub fn release_mac_output(&self, mac: MacHandle, out: &mut [u8]) -> Result<usize> {
        let result = self.engine.release_mac(mac, Some(out));
        self.finish_release(mac.into(), result)
    }

    pub fn release_mac(&self, mac: MacHandle) -> Result<()> {
        self.release_resource(mac.into())
    }

    pub fn acquire_cipher(
        &self,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        key: KeyHandle,
        iv: Option<&[u8]>,
    ) -> Result<CipherHandle> {
        let handle = self
            .engine
            .open_cipher(self.proc()?, algorithm, mode, key, iv)?;
        self.track(handle, None);
        Ok(handle)
    }

    pub fn release_cipher(&self, cipher: CipherHandle) -> Result<()> {
        self.release_resource(cipher.into())
    }

    pub fn acquire_signature(
        &self,
        algorithm: SignatureAlgorithm,
        mode: SignatureMode,
        key: KeyHandle,
    ) -> Result<SignatureHandle> {
        let handle = self
            .engine
            .open_signature(self.proc()?, algorithm, mode, key)?;
        self.track(handle, None);
        Ok(handle)
    }

    pub fn release_signature(&self, signature: SignatureHandle) -> Result<()> {
        self.release_resource(signature.into())
    }

    pub fn acquire_digest(&self, algorithm: DigestAlgorithm) -> Result<DigestHandle> {
        let handle = self.engine.open_digest(self.proc()?, algorithm)?;
        self.track(handle, None);
        Ok(handle)
    }

    /// Same contract as [`TestCtx::release_mac_output`].
    pub fn release_digest_output(&self, digest: DigestHandle, out: &mut [u8]) -> Result<usize> {
        let result = self.engine.release_digest(digest, Some(out));
        self.finish_release(digest.into(), result)
    }

    pub fn release_digest(&self, digest: DigestHandle) -> Result<()> {
        self.release_resource(digest.into())
    }

    pub fn acquire_random(&self, algorithm: RandomAlgorithm) -> Result<RandomHandle> {
        let handle = self.engine.open_random(self.proc()?, algorithm)?;
        self.track(handle, None);
        Ok(handle)
    }

    pub fn release_random(&self, random: RandomHandle) -> Result<()> {
        self.release_resource(random.into())
    }

    /// Release everything still owned, best effort.
    ///
    /// Failures are logged and collected; teardown always runs to the end.
    /// Afterwards the context holds nothing and provisioning calls fail with
    /// `NotInitialized`. A second call does nothing.
    pub fn teardown(&mut self) -> TeardownReport {
        let (proc, handles, provisioned) = {
            let state = self.state.get_mut();
            (
                state.proc.take(),
                std::mem::take(&mut state.handles),
                std::mem::take(&mut state.provisioned),
            )
        };
        let mut report = TeardownReport::default();

        let (operations, objects): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .rev()
            .partition(|t| t.resource.category().is_operation());

        for tracked in operations.into_iter().chain(objects) {
            let resource = tracked.resource;
            match resource.release(self.engine.as_ref()) {
                Ok(()) => {
                    tracing::debug!(%resource, object_id = ?tracked.object_id, "released");
                    report.released.push(resource.to_string());
                }
                Err(e) => report.fail(resource.to_string(), e),
            }
        }

        let Some(proc) = proc else {
            return report;
        };

        for (kind, id) in provisioned.into_iter().rev() {
            let result = match kind {
                ObjectKind::Key => self.engine.delete_key(proc, id),
                ObjectKind::Certificate => self.engine.delete_certificate(proc, id),
                ObjectKind::Bundle => self.engine.delete_bundle(proc, id),
            };
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => report.fail(format!("{kind} {id:#x}"), e),
            }
        }

        match self.engine.release_processor(proc) {
            Ok(()) => report.released.push(proc.to_string()),
            Err(e) => report.fail(proc.to_string(), e),
        }
        report
    }
}

impl Drop for TestCtx {
    fn drop(&mut self) {
        let report = self.teardown();
        if !report.is_clean() {
            tracing::error!(
                failures = report.failures.len(),
                "test context dropped with unreleasable resources"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SoftEngine;

    fn ctx() -> (tempfile::TempDir, TestCtx) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::init(
            Arc::new(SoftEngine::new()),
            dir.path().join("global"),
            dir.path().join("app"),
        )
        .unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_provision_tracks_handle_and_id() {
        let (_dir, ctx) = ctx();
        let key = ctx
            .provision_key(1, StorageLoc::Ram, TestKey::Hmac256, TestKc::Raw, false)
            .unwrap();
        assert_eq!(ctx.tracked_count(), 2);
        assert!(ctx.is_tracked(key));

        ctx.release_key(key).unwrap();
        assert!(!ctx.is_tracked(key));
        ctx.delete_key(1).unwrap();
        assert_eq!(ctx.tracked_count(), 0);
    }

    #[test]
    fn test_get_key_is_tracked_without_id() {
        let (_dir, ctx) = ctx();
        ctx.provision_key(2, StorageLoc::Ram, TestKey::Aes128, TestKc::Raw, false)
            .unwrap();
        let again = ctx.get_key(2).unwrap();
        let tracked = ctx.tracked();
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[1].resource, Resource::Key(again));
        assert_eq!(tracked[1].object_id, None);
    }

    #[test]
    fn test_short_buffer_keeps_digest_tracked() {
        let (_dir, ctx) = ctx();
        let digest = ctx.acquire_digest(DigestAlgorithm::Sha512).unwrap();
        let mut short = [0u8; 32];
        let err = ctx.release_digest_output(digest, &mut short).unwrap_err();
        assert!(err.engine().is_some_and(EngineError::is_buffer_too_small));
        assert!(ctx.is_tracked(digest));

        let mut out = [0u8; 64];
        assert_eq!(ctx.release_digest_output(digest, &mut out).unwrap(), 64);
        assert!(!ctx.is_tracked(digest));
    }

    #[test]
    fn test_double_release_reports_invalid_handle() {
        let (_dir, ctx) = ctx();
        let random = ctx.acquire_random(RandomAlgorithm::Prng).unwrap();
        ctx.release_random(random).unwrap();
        let err = ctx.release_random(random).unwrap_err();
        assert!(err.engine().is_some_and(EngineError::is_invalid_handle));
    }

    #[test]
    fn test_teardown_releases_operations_before_keys() {
        let (_dir, mut ctx) = ctx();
        let key = ctx
            .provision_key(3, StorageLoc::Ram, TestKey::Hmac128, TestKc::Raw, false)
            .unwrap();
        let mac = ctx.acquire_mac(MacAlgorithm::HmacSha256, key).unwrap();

        let report = ctx.teardown();
        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(report.released[..2], [mac.to_string(), key.to_string()]);
        assert_eq!(report.deleted, 1);
        assert_eq!(ctx.tracked_count(), 0);
    }

    #[test]
    fn test_calls_after_teardown_are_not_initialized() {
        let (_dir, mut ctx) = ctx();
        ctx.teardown();
        assert!(matches!(ctx.proc(), Err(HarnessError::NotInitialized)));
        assert!(matches!(
            ctx.acquire_digest(DigestAlgorithm::Sha256),
            Err(HarnessError::NotInitialized)
        ));
        assert_eq!(ctx.teardown(), TeardownReport::default());
    }
}
