//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use secapi_harness::engine::*;
use secapi_harness::TestCtx;

/// Temp store directories for one test.
pub struct TempStores {
    pub dir: tempfile::TempDir,
}

impl TempStores {
    pub fn global(&self) -> std::path::PathBuf {
        self.dir.path().join("global")
    }

    pub fn app(&self) -> std::path::PathBuf {
        self.dir.path().join("app")
    }
}

pub fn temp_stores() -> TempStores {
    TempStores {
        dir: tempfile::tempdir().unwrap(),
    }
}

pub fn soft_ctx(stores: &TempStores) -> TestCtx {
    TestCtx::init(Arc::new(SoftEngine::new()), stores.global(), stores.app()).unwrap()
}

/// `SoftEngine` wrapper that logs every release/delete call and can be told
/// to refuse releasing particular handles.
#[derive(Default)]
pub struct RecordingEngine {
    inner: SoftEngine,
    calls: Mutex<Vec<String>>,
    refuse: Mutex<HashSet<String>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Release calls in the order they arrived, e.g. `"mac#3"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Refuse releases of `handle` (matched on its display form).
    pub fn refuse_release(&self, handle: impl std::fmt::Display) {
        self.refuse.lock().insert(handle.to_string());
    }

    pub fn allow_release(&self, handle: impl std::fmt::Display) {
        self.refuse.lock().remove(&handle.to_string());
    }

    pub fn open_handle_count(&self) -> usize {
        self.inner.open_handle_count()
    }

    fn record(&self, what: impl std::fmt::Display) -> EngineResult<()> {
        let what = what.to_string();
        self.calls.lock().push(what.clone());
        if self.refuse.lock().contains(&what) {
            return Err(EngineError::Crypto(format!("release of {what} refused")));
        }
        Ok(())
    }
}

impl SecEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn open_processor(&self, global_dir: &Path, app_dir: &Path) -> EngineResult<ProcessorHandle> {
        self.inner.open_processor(global_dir, app_dir)
    }

    fn release_processor(&self, proc: ProcessorHandle) -> EngineResult<()> {
        self.record(proc)?;
        self.inner.release_processor(proc)
    }

    fn provision_key(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        container: KeyContainer,
        data: &[u8],
    ) -> EngineResult<()> {
        self.inner.provision_key(proc, id, loc, container, data)
    }

    fn wrap_key(
        &self,
        proc: ProcessorHandle,
        container: KeyContainer,
        data: &[u8],
    ) -> EngineResult<Vec<u8>> {
        self.inner.wrap_key(proc, container, data)
    }

    fn open_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<KeyHandle> {
        self.inner.open_key(proc, id)
    }

    fn release_key(&self, key: KeyHandle) -> EngineResult<()> {
        self.record(key)?;
        self.inner.release_key(key)
    }

    fn delete_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()> {
        self.record(format!("delete key {id:#x}"))?;
        self.inner.delete_key(proc, id)
    }

    fn provision_certificate(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        container: CertContainer,
        data: &[u8],
    ) -> EngineResult<()> {
        self.inner.provision_certificate(proc, id, loc, container, data)
    }

    fn open_certificate(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
    ) -> EngineResult<CertificateHandle> {
        self.inner.open_certificate(proc, id)
    }

    fn export_certificate(&self, cert: CertificateHandle) -> EngineResult<Vec<u8>> {
        self.inner.export_certificate(cert)
    }

    fn release_certificate(&self, cert: CertificateHandle) -> EngineResult<()> {
        self.record(cert)?;
        self.inner.release_certificate(cert)
    }

    fn delete_certificate(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()> {
        self.record(format!("delete certificate {id:#x}"))?;
        self.inner.delete_certificate(proc, id)
    }

    fn provision_bundle(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        data: &[u8],
    ) -> EngineResult<()> {
        self.inner.provision_bundle(proc, id, loc, data)
    }

    fn open_bundle(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<BundleHandle> {
        self.inner.open_bundle(proc, id)
    }

    fn export_bundle(&self, bundle: BundleHandle) -> EngineResult<Vec<u8>> {
        self.inner.export_bundle(bundle)
    }

    fn release_bundle(&self, bundle: BundleHandle) -> EngineResult<()> {
        self.record(bundle)?;
        self.inner.release_bundle(bundle)
    }

    fn delete_bundle(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()> {
        self.record(format!("delete bundle {id:#x}"))?;
        self.inner.delete_bundle(proc, id)
    }

    fn open_mac(
        &self,
        proc: ProcessorHandle,
        algorithm: MacAlgorithm,
        key: KeyHandle,
    ) -> EngineResult<MacHandle> {
        self.inner.open_mac(proc, algorithm, key)
    }

    fn mac_update(&self, mac: MacHandle, data: &[u8]) -> EngineResult<()> {
        self.inner.mac_update(mac, data)
    }

    fn release_mac(&self, mac: MacHandle, out: Option<&mut [u8]>) -> EngineResult<usize> {
        self.record(mac)?;
        self.inner.release_mac(mac, out)
    }

    fn open_cipher(
        &self,
        proc: ProcessorHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        key: KeyHandle,
        iv: Option<&[u8]>,
    ) -> EngineResult<CipherHandle> {
        self.inner.open_cipher(proc, algorithm, mode, key, iv)
    }

    fn cipher_process(
        &self,
        cipher: CipherHandle,
        input: &[u8],
        last: bool,
    ) -> EngineResult<Vec<u8>> {
        self.inner.cipher_process(cipher, input, last)
    }

    fn release_cipher(&self, cipher: CipherHandle) -> EngineResult<()> {
        self.record(cipher)?;
        self.inner.release_cipher(cipher)
    }

    fn open_signature(
        &self,
        proc: ProcessorHandle,
        algorithm: SignatureAlgorithm,
        mode: SignatureMode,
        key: KeyHandle,
    ) -> EngineResult<SignatureHandle> {
        self.inner.open_signature(proc, algorithm, mode, key)
    }

    fn sign(&self, signature: SignatureHandle, message: &[u8]) -> EngineResult<Vec<u8>> {
        self.inner.sign(signature, message)
    }

    fn verify(&self, signature: SignatureHandle, message: &[u8], sig: &[u8]) -> EngineResult<()> {
        self.inner.verify(signature, message, sig)
    }

    fn release_signature(&self, signature: SignatureHandle) -> EngineResult<()> {
        self.record(signature)?;
        self.inner.release_signature(signature)
    }

    fn open_digest(
        &self,
        proc: ProcessorHandle,
        algorithm: DigestAlgorithm,
    ) -> EngineResult<DigestHandle> {
        self.inner.open_digest(proc, algorithm)
    }

    fn digest_update(&self, digest: DigestHandle, data: &[u8]) -> EngineResult<()> {
        self.inner.digest_update(digest, data)
    }

    fn release_digest(&self, digest: DigestHandle, out: Option<&mut [u8]>) -> EngineResult<usize> {
        self.record(digest)?;
        self.inner.release_digest(digest, out)
    }

    fn open_random(
        &self,
        proc: ProcessorHandle,
        algorithm: RandomAlgorithm,
    ) -> EngineResult<RandomHandle> {
        self.inner.open_random(proc, algorithm)
    }

    fn random_process(&self, random: RandomHandle, out: &mut [u8]) -> EngineResult<()> {
        self.inner.random_process(random, out)
    }

    fn release_random(&self, random: RandomHandle) -> EngineResult<()> {
        self.record(random)?;
        self.inner.release_random(random)
    }
}
