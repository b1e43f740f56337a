//! In-process reference implementation of [`SecEngine`].
//!
//! `SoftEngine` keeps every open handle in one mutex-guarded table. Operation
//! handles remember the key they were opened on, and a key or processor cannot
//! be released while something still refers to it.

mod material;
mod ops;
mod store;

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rand::RngCore;

use material::{check_der, KeyMaterial, SoftWrapper};
use ops::{CipherState, DigestState, MacState, SignatureState};
use store::{load_or_create_root, ObjectStore, StoredObject};

use super::{
    BundleHandle, CertContainer, CertificateHandle, CipherAlgorithm, CipherHandle, CipherMode,
    DigestAlgorithm, DigestHandle, EngineError, EngineResult, KeyContainer, KeyHandle,
    MacAlgorithm, MacHandle, ObjectId, ObjectKind, ProcessorHandle, RandomAlgorithm,
    RandomHandle, SecEngine, SignatureAlgorithm, SignatureHandle, SignatureMode, StorageLoc,
};

/// Container tag used for certificates and bundles in the object store.
const CERT_DER_TAG: u8 = 0x40;
const BUNDLE_TAG: u8 = 0x50;

struct Processor {
    store: ObjectStore,
    wrapper: SoftWrapper,
}

struct OpenKey {
    proc: u64,
    material: KeyMaterial,
}

struct OpenBlob {
    proc: u64,
    data: Vec<u8>,
}

struct OpenOp<S> {
    proc: u64,
    key: Option<u64>,
    state: S,
}

#[derive(Default)]
struct SoftState {
    next_handle: u64,
    processors: HashMap<u64, Processor>,
    keys: HashMap<u64, OpenKey>,
    certs: HashMap<u64, OpenBlob>,
    bundles: HashMap<u64, OpenBlob>,
    macs: HashMap<u64, OpenOp<MacState>>,
    ciphers: HashMap<u64, OpenOp<CipherState>>,
    signatures: HashMap<u64, OpenOp<SignatureState>>,
    digests: HashMap<u64, OpenOp<DigestState>>,
    randoms: HashMap<u64, OpenOp<RandomAlgorithm>>,
}

impl SoftState {
    fn issue(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn processor(&self, proc: ProcessorHandle) -> EngineResult<&Processor> {
        self.processors
            .get(&proc.raw())
            .ok_or(EngineError::InvalidHandle)
    }

    fn processor_mut(&mut self, proc: ProcessorHandle) -> EngineResult<&mut Processor> {
        self.processors
            .get_mut(&proc.raw())
            .ok_or(EngineError::InvalidHandle)
    }

    fn key(&self, proc: ProcessorHandle, key: KeyHandle) -> EngineResult<&OpenKey> {
        self.processor(proc)?;
        self.keys
            .get(&key.raw())
            .filter(|k| k.proc == proc.raw())
            .ok_or(EngineError::InvalidHandle)
    }

    fn key_in_use(&self, key: u64) -> bool {
        self.macs.values().any(|op| op.key == Some(key))
            || self.ciphers.values().any(|op| op.key == Some(key))
            || self.signatures.values().any(|op| op.key == Some(key))
    }

    fn open_under(&self, proc: u64) -> usize {
        self.keys.values().filter(|k| k.proc == proc).count()
            + self.certs.values().filter(|c| c.proc == proc).count()
            + self.bundles.values().filter(|b| b.proc == proc).count()
            + self.macs.values().filter(|o| o.proc == proc).count()
            + self.ciphers.values().filter(|o| o.proc == proc).count()
            + self.signatures.values().filter(|o| o.proc == proc).count()
            + self.digests.values().filter(|o| o.proc == proc).count()
            + self.randoms.values().filter(|o| o.proc == proc).count()
    }

    fn load_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<KeyMaterial> {
        let processor = self.processor(proc)?;
        let stored = processor.store.get(ObjectKind::Key, id)?;
        let container = KeyContainer::from_tag(stored.tag).ok_or_else(|| {
            EngineError::InvalidParameters(format!("unknown key container tag {}", stored.tag))
        })?;

        match container {
            KeyContainer::Store => {
                let (inner, data) = processor.wrapper.unwrap(&stored.data)?;
                KeyMaterial::parse(inner, &data)
            }
            other => KeyMaterial::parse(other, &stored.data),
        }
    }
}

/// Reference engine backed by RustCrypto primitives and the local filesystem.
pub struct SoftEngine {
    state: Mutex<SoftState>,
}

impl SoftEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SoftState::default()),
        }
    }

    /// Number of handles of any kind currently open, processors included.
    pub fn open_handle_count(&self) -> usize {
        let state = self.state.lock();
        state.processors.len()
            + state
                .processors
                .keys()
                .map(|proc| state.open_under(*proc))
                .sum::<usize>()
    }
}

impl Default for SoftEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn finalize_into(
    needed: usize,
    out: Option<&mut [u8]>,
    finalize: impl FnOnce() -> Vec<u8>,
) -> usize {
    let value = finalize();
    match out {
        Some(out) => {
            out[..needed].copy_from_slice(&value);
            needed
        }
        None => 0,
    }
}

fn check_capacity(needed: usize, out: &Option<&mut [u8]>) -> EngineResult<()> {
    match out {
        Some(out) if out.len() < needed => Err(EngineError::BufferTooSmall {
            needed,
            capacity: out.len(),
        }),
        _ => Ok(()),
    }
}

impl SecEngine for SoftEngine {
    fn name(&self) -> &str {
        "soft"
    }

    fn open_processor(&self, global_dir: &Path, app_dir: &Path) -> EngineResult<ProcessorHandle> {
        let root = load_or_create_root(global_dir)?;
        let processor = Processor {
            store: ObjectStore::open(app_dir)?,
            wrapper: SoftWrapper::from_root(&root),
        };

        let mut state = self.state.lock();
        let id = state.issue();
        state.processors.insert(id, processor);
        tracing::debug!(proc = id, app_dir = %app_dir.display(), "processor opened");
        Ok(ProcessorHandle::from_raw(id))
    }

    fn release_processor(&self, proc: ProcessorHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.processor(proc)?;
        let open = state.open_under(proc.raw());
        if open > 0 {
            tracing::warn!(%proc, open, "processor still has open handles");
            return Err(EngineError::HandleInUse);
        }
        state.processors.remove(&proc.raw());
        Ok(())
    }

    fn provision_key(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        container: KeyContainer,
        data: &[u8],
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        let processor = state.processor_mut(proc)?;

        match container {
            KeyContainer::Store => {
                let (inner, clear) = processor.wrapper.unwrap(data)?;
                KeyMaterial::parse(inner, &clear)?;
            }
            other => {
                KeyMaterial::parse(other, data)?;
            }
        }

        let object = StoredObject {
            tag: container.tag(),
            data: data.to_vec(),
        };
        processor.store.put(ObjectKind::Key, id, loc, object)?;
        tracing::debug!(%proc, id, %loc, %container, "key provisioned");
        Ok(())
    }

    fn wrap_key(
        &self,
        proc: ProcessorHandle,
        container: KeyContainer,
        data: &[u8],
    ) -> EngineResult<Vec<u8>> {
        let state = self.state.lock();
        state.processor(proc)?.wrapper.wrap(container, data)
    }

    fn open_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<KeyHandle> {
        let mut state = self.state.lock();
        let material = state.load_key(proc, id)?;
        let handle = state.issue();
        state.keys.insert(
            handle,
            OpenKey {
                proc: proc.raw(),
                material,
            },
        );
        Ok(KeyHandle::from_raw(handle))
    }

    fn release_key(&self, key: KeyHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        if !state.keys.contains_key(&key.raw()) {
            return Err(EngineError::InvalidHandle);
        }
        if state.key_in_use(key.raw()) {
            return Err(EngineError::HandleInUse);
        }
        state.keys.remove(&key.raw());
        Ok(())
    }

    fn delete_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.processor_mut(proc)?.store.remove(ObjectKind::Key, id)
    }

    fn provision_certificate(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        container: CertContainer,
        data: &[u8],
    ) -> EngineResult<()> {
        match container {
            CertContainer::Der => check_der(data)?,
        }
        let mut state = self.state.lock();
        let object = StoredObject {
            tag: CERT_DER_TAG,
            data: data.to_vec(),
        };
        state
            .processor_mut(proc)?
            .store
            .put(ObjectKind::Certificate, id, loc, object)
    }

    fn open_certificate(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
    ) -> EngineResult<CertificateHandle> {
        let mut state = self.state.lock();
        let stored = state.processor(proc)?.store.get(ObjectKind::Certificate, id)?;
        let handle = state.issue();
        state.certs.insert(
            handle,
            OpenBlob {
                proc: proc.raw(),
                data: stored.data,
            },
        );
        Ok(CertificateHandle::from_raw(handle))
    }

    fn export_certificate(&self, cert: CertificateHandle) -> EngineResult<Vec<u8>> {
        let state = self.state.lock();
        state
            .certs
            .get(&cert.raw())
            .map(|c| c.data.clone())
            .ok_or(EngineError::InvalidHandle)
    }

    fn release_certificate(&self, cert: CertificateHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .certs
            .remove(&cert.raw())
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }

    fn delete_certificate(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .processor_mut(proc)?
            .store
            .remove(ObjectKind::Certificate, id)
    }

    fn provision_bundle(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        data: &[u8],
    ) -> EngineResult<()> {
        if data.is_empty() {
            return Err(EngineError::InvalidParameters("bundle is empty".into()));
        }
        let mut state = self.state.lock();
        let object = StoredObject {
            tag: BUNDLE_TAG,
            data: data.to_vec(),
        };
        state
            .processor_mut(proc)?
            .store
            .put(ObjectKind::Bundle, id, loc, object)
    }

    fn open_bundle(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<BundleHandle> {
        let mut state = self.state.lock();
        let stored = state.processor(proc)?.store.get(ObjectKind::Bundle, id)?;
        let handle = state.issue();
        state.bundles.insert(
            handle,
            OpenBlob {
                proc: proc.raw(),
                data: stored.data,
            },
        );
        Ok(BundleHandle::from_raw(handle))
    }

    fn export_bundle(&self, bundle: BundleHandle) -> EngineResult<Vec<u8>> {
        let state = self.state.lock();
        state
            .bundles
            .get(&bundle.raw())
            .map(|b| b.data.clone())
            .ok_or(EngineError::InvalidHandle)
    }

    fn release_bundle(&self, bundle: BundleHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .bundles
            .remove(&bundle.raw())
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }

    fn delete_bundle(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.processor_mut(proc)?.store.remove(ObjectKind::Bundle, id)
    }

    fn open_mac(
        &self,
        proc: ProcessorHandle,
        algorithm: MacAlgorithm,
        key: KeyHandle,
    ) -> EngineResult<MacHandle> {
        let mut state = self.state.lock();
        let mac = MacState::new(algorithm, &state.key(proc, key)?.material)?;
        let handle = state.issue();
        state.macs.insert(
            handle,
            OpenOp {
                proc: proc.raw(),
                key: Some(key.raw()),
                state: mac,
            },
        );
        Ok(MacHandle::from_raw(handle))
    }

    fn mac_update(&self, mac: MacHandle, data: &[u8]) -> EngineResult<()> {
        let mut state = self.state.lock();
        let op = state
            .macs
            .get_mut(&mac.raw())
            .ok_or(EngineError::InvalidHandle)?;
        op.state.update(data);
        Ok(())
    }

    fn release_mac(&self, mac: MacHandle, out: Option<&mut [u8]>) -> EngineResult<usize> {
        let mut state = self.state.lock();
        let needed = state
            .macs
            .get(&mac.raw())
            .ok_or(EngineError::InvalidHandle)?
            .state
            .output_len();
        check_capacity(needed, &out)?;

        let op = state.macs.remove(&mac.raw()).ok_or(EngineError::InvalidHandle)?;
        Ok(finalize_into(needed, out, || op.state.finalize()))
    }

    fn open_cipher(
        &self,
        proc: ProcessorHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        key: KeyHandle,
        iv: Option<&[u8]>,
    ) -> EngineResult<CipherHandle> {
        let mut state = self.state.lock();
        let cipher = CipherState::new(algorithm, mode, &state.key(proc, key)?.material, iv)?;
        let handle = state.issue();
        state.ciphers.insert(
            handle,
            OpenOp {
                proc: proc.raw(),
                key: Some(key.raw()),
                state: cipher,
            },
        );
        Ok(CipherHandle::from_raw(handle))
    }

    fn cipher_process(
        &self,
        cipher: CipherHandle,
        input: &[u8],
        last: bool,
    ) -> EngineResult<Vec<u8>> {
        let mut state = self.state.lock();
        state
            .ciphers
            .get_mut(&cipher.raw())
            .ok_or(EngineError::InvalidHandle)?
            .state
            .process(input, last)
    }

    fn release_cipher(&self, cipher: CipherHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .ciphers
            .remove(&cipher.raw())
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }

    fn open_signature(
        &self,
        proc: ProcessorHandle,
        algorithm: SignatureAlgorithm,
        mode: SignatureMode,
        key: KeyHandle,
    ) -> EngineResult<SignatureHandle> {
        let mut state = self.state.lock();
        let signature = match algorithm {
            SignatureAlgorithm::Ed25519 => {
                SignatureState::new(mode, &state.key(proc, key)?.material)?
            }
        };
        let handle = state.issue();
        state.signatures.insert(
            handle,
            OpenOp {
                proc: proc.raw(),
                key: Some(key.raw()),
                state: signature,
            },
        );
        Ok(SignatureHandle::from_raw(handle))
    }

    fn sign(&self, signature: SignatureHandle, message: &[u8]) -> EngineResult<Vec<u8>> {
        let state = self.state.lock();
        state
            .signatures
            .get(&signature.raw())
            .ok_or(EngineError::InvalidHandle)?
            .state
            .sign(message)
    }

    fn verify(&self, signature: SignatureHandle, message: &[u8], sig: &[u8]) -> EngineResult<()> {
        let state = self.state.lock();
        state
            .signatures
            .get(&signature.raw())
            .ok_or(EngineError::InvalidHandle)?
            .state
            .verify(message, sig)
    }

    fn release_signature(&self, signature: SignatureHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .signatures
            .remove(&signature.raw())
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }

    fn open_digest(
        &self,
        proc: ProcessorHandle,
        algorithm: DigestAlgorithm,
    ) -> EngineResult<DigestHandle> {
        let mut state = self.state.lock();
        state.processor(proc)?;
        let handle = state.issue();
        state.digests.insert(
            handle,
            OpenOp {
                proc: proc.raw(),
                key: None,
                state: DigestState::new(algorithm),
            },
        );
        Ok(DigestHandle::from_raw(handle))
    }

    fn digest_update(&self, digest: DigestHandle, data: &[u8]) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .digests
            .get_mut(&digest.raw())
            .ok_or(EngineError::InvalidHandle)?
            .state
            .update(data);
        Ok(())
    }

    fn release_digest(&self, digest: DigestHandle, out: Option<&mut [u8]>) -> EngineResult<usize> {
        let mut state = self.state.lock();
        let needed = state
            .digests
            .get(&digest.raw())
            .ok_or(EngineError::InvalidHandle)?
            .state
            .output_len();
        check_capacity(needed, &out)?;

        let op = state
            .digests
            .remove(&digest.raw())
            .ok_or(EngineError::InvalidHandle)?;
        Ok(finalize_into(needed, out, || op.state.finalize()))
    }

    fn open_random(
        &self,
        proc: ProcessorHandle,
        algorithm: RandomAlgorithm,
    ) -> EngineResult<RandomHandle> {
        let mut state = self.state.lock();
        state.processor(proc)?;
        let handle = state.issue();
        state.randoms.insert(
            handle,
            OpenOp {
                proc: proc.raw(),
                key: None,
                state: algorithm,
            },
        );
        Ok(RandomHandle::from_raw(handle))
    }

    fn random_process(&self, random: RandomHandle, out: &mut [u8]) -> EngineResult<()> {
        let algorithm = self
            .state
            .lock()
            .randoms
            .get(&random.raw())
            .map(|op| op.state)
            .ok_or(EngineError::InvalidHandle)?;

        match algorithm {
            RandomAlgorithm::TrueRandom => rand::rngs::OsRng.fill_bytes(out),
            RandomAlgorithm::Prng => rand::thread_rng().fill_bytes(out),
        }
        Ok(())
    }

    fn release_random(&self, random: RandomHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .randoms
            .remove(&random.raw())
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(engine: &SoftEngine) -> (tempfile::TempDir, ProcessorHandle) {
        let dir = tempfile::tempdir().unwrap();
        let proc = engine
            .open_processor(&dir.path().join("global"), &dir.path().join("app"))
            .unwrap();
        (dir, proc)
    }

    #[test]
    fn test_key_release_blocked_by_open_mac() {
        let engine = SoftEngine::new();
        let (_dir, proc) = open(&engine);
        engine
            .provision_key(proc, 1, StorageLoc::Ram, KeyContainer::RawHmac, b"k")
            .unwrap();
        let key = engine.open_key(proc, 1).unwrap();
        let mac = engine.open_mac(proc, MacAlgorithm::HmacSha256, key).unwrap();

        assert!(matches!(engine.release_key(key), Err(EngineError::HandleInUse)));
        engine.release_mac(mac, None).unwrap();
        engine.release_key(key).unwrap();
        assert!(matches!(engine.release_key(key), Err(EngineError::InvalidHandle)));
    }

    #[test]
    fn test_processor_release_blocked_by_open_handles() {
        let engine = SoftEngine::new();
        let (_dir, proc) = open(&engine);
        let digest = engine.open_digest(proc, DigestAlgorithm::Sha256).unwrap();

        assert!(matches!(
            engine.release_processor(proc),
            Err(EngineError::HandleInUse)
        ));
        engine.release_digest(digest, None).unwrap();
        engine.release_processor(proc).unwrap();
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn test_release_mac_short_buffer_keeps_handle() {
        let engine = SoftEngine::new();
        let (_dir, proc) = open(&engine);
        engine
            .provision_key(proc, 2, StorageLoc::Ram, KeyContainer::RawHmac, b"key")
            .unwrap();
        let key = engine.open_key(proc, 2).unwrap();
        let mac = engine.open_mac(proc, MacAlgorithm::HmacSha256, key).unwrap();

        let mut small = [0u8; 16];
        let err = engine.release_mac(mac, Some(&mut small)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BufferTooSmall {
                needed: 32,
                capacity: 16
            }
        ));

        let mut tag = [0u8; 64];
        assert_eq!(engine.release_mac(mac, Some(&mut tag)).unwrap(), 32);
        assert!(engine.release_mac(mac, None).is_err());
    }

    #[test]
    fn test_ram_objects_do_not_outlive_processor() {
        let engine = SoftEngine::new();
        let dir = tempfile::tempdir().unwrap();
        let (global, app) = (dir.path().join("g"), dir.path().join("a"));

        let proc = engine.open_processor(&global, &app).unwrap();
        engine
            .provision_key(proc, 3, StorageLoc::Ram, KeyContainer::RawAes128, &[0u8; 16])
            .unwrap();
        engine
            .provision_key(proc, 4, StorageLoc::File, KeyContainer::RawAes128, &[0u8; 16])
            .unwrap();
        engine.release_processor(proc).unwrap();

        let proc = engine.open_processor(&global, &app).unwrap();
        assert!(matches!(
            engine.open_key(proc, 3),
            Err(EngineError::NoSuchItem { .. })
        ));
        let key = engine.open_key(proc, 4).unwrap();
        engine.release_key(key).unwrap();
        engine.delete_key(proc, 4).unwrap();
    }

    #[test]
    fn test_wrapped_key_survives_reopen() {
        let engine = SoftEngine::new();
        let dir = tempfile::tempdir().unwrap();
        let (global, app) = (dir.path().join("g"), dir.path().join("a"));

        let proc = engine.open_processor(&global, &app).unwrap();
        let blob = engine
            .wrap_key(proc, KeyContainer::RawHmac, b"wrapped secret")
            .unwrap();
        engine
            .provision_key(proc, 5, StorageLoc::File, KeyContainer::Store, &blob)
            .unwrap();
        engine.release_processor(proc).unwrap();

        let proc = engine.open_processor(&global, &app).unwrap();
        let key = engine.open_key(proc, 5).unwrap();
        let mac = engine.open_mac(proc, MacAlgorithm::HmacSha256, key).unwrap();
        engine.mac_update(mac, b"data").unwrap();
        let mut tag = [0u8; 32];
        engine.release_mac(mac, Some(&mut tag)).unwrap();
        engine.release_key(key).unwrap();
    }

    #[test]
    fn test_certificate_must_be_der() {
        let engine = SoftEngine::new();
        let (_dir, proc) = open(&engine);
        assert!(engine
            .provision_certificate(proc, 1, StorageLoc::Ram, CertContainer::Der, b"nope")
            .is_err());
        engine
            .provision_certificate(proc, 1, StorageLoc::Ram, CertContainer::Der, &[0x30, 0x00])
            .unwrap();
        let cert = engine.open_certificate(proc, 1).unwrap();
        assert_eq!(engine.export_certificate(cert).unwrap(), vec![0x30, 0x00]);
        engine.release_certificate(cert).unwrap();
    }
}
