//! Security engine boundary.
//!
//! The harness drives an external security engine through the [`SecEngine`]
//! trait and never inspects the handles it gets back. [`soft::SoftEngine`] is
//! an in-process implementation used by the built-in suite and the tests.

mod algorithms;
pub mod error;
mod handles;
pub mod soft;

use std::path::Path;

pub use algorithms::{
    CertContainer, CipherAlgorithm, CipherMode, DigestAlgorithm, KeyContainer, MacAlgorithm,
    RandomAlgorithm, SignatureAlgorithm, SignatureMode, StorageLoc,
};
pub use error::{EngineError, EngineResult};
pub use handles::{
    BundleHandle, CertificateHandle, CipherHandle, DigestHandle, KeyHandle, MacHandle,
    ObjectId, ObjectKind, ProcessorHandle, RandomHandle, SignatureHandle,
};
pub use soft::SoftEngine;

/// The native security API as seen by the harness.
///
/// Implementations must be internally synchronized; every method takes
/// `&self`. Handles returned by one engine are only meaningful to that engine.
pub trait SecEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    // Processor

    fn open_processor(&self, global_dir: &Path, app_dir: &Path) -> EngineResult<ProcessorHandle>;
    /// Fails with `HandleInUse` while any handle opened under `proc` is still open.
    fn release_processor(&self, proc: ProcessorHandle) -> EngineResult<()>;

    // Keys

    fn provision_key(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        container: KeyContainer,
        data: &[u8],
    ) -> EngineResult<()>;

    /// Wrap clear key material into a [`KeyContainer::Store`] container.
    fn wrap_key(
        &self,
        _proc: ProcessorHandle,
        _container: KeyContainer,
        _data: &[u8],
    ) -> EngineResult<Vec<u8>> {
        Err(EngineError::Unsupported)
    }

    fn open_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<KeyHandle>;
    fn release_key(&self, key: KeyHandle) -> EngineResult<()>;
    fn delete_key(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()>;

    // Certificates

    fn provision_certificate(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        container: CertContainer,
        data: &[u8],
    ) -> EngineResult<()>;
    fn open_certificate(&self, proc: ProcessorHandle, id: ObjectId)
        -> EngineResult<CertificateHandle>;
    fn export_certificate(&self, cert: CertificateHandle) -> EngineResult<Vec<u8>>;
    fn release_certificate(&self, cert: CertificateHandle) -> EngineResult<()>;
    fn delete_certificate(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()>;

    // Bundles

    fn provision_bundle(
        &self,
        proc: ProcessorHandle,
        id: ObjectId,
        loc: StorageLoc,
        data: &[u8],
    ) -> EngineResult<()>;
    fn open_bundle(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<BundleHandle>;
    fn export_bundle(&self, bundle: BundleHandle) -> EngineResult<Vec<u8>>;
    fn release_bundle(&self, bundle: BundleHandle) -> EngineResult<()>;
    fn delete_bundle(&self, proc: ProcessorHandle, id: ObjectId) -> EngineResult<()>;

    // MAC

    fn open_mac(
        &self,
        proc: ProcessorHandle,
        algorithm: MacAlgorithm,
        key: KeyHandle,
    ) -> EngineResult<MacHandle>;
    fn mac_update(&self, mac: MacHandle, data: &[u8]) -> EngineResult<()>;
    /// Finalize and release. With `Some(out)` the tag is written into `out`
    /// and its length returned; a short `out` fails with `BufferTooSmall`
    /// and leaves the handle open.
    fn release_mac(&self, mac: MacHandle, out: Option<&mut [u8]>) -> EngineResult<usize>;

    // Cipher

    fn open_cipher(
        &self,
        proc: ProcessorHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        key: KeyHandle,
        iv: Option<&[u8]>,
    ) -> EngineResult<CipherHandle>;
    fn cipher_process(&self, cipher: CipherHandle, input: &[u8], last: bool)
        -> EngineResult<Vec<u8>>;
    fn release_cipher(&self, cipher: CipherHandle) -> EngineResult<()>;

    // Signature

    fn open_signature(
        &self,
        proc: ProcessorHandle,
        algorithm: SignatureAlgorithm,
        mode: SignatureMode,
        key: KeyHandle,
    ) -> EngineResult<SignatureHandle>;
    fn sign(&self, signature: SignatureHandle, message: &[u8]) -> EngineResult<Vec<u8>>;
    fn verify(&self, signature: SignatureHandle, message: &[u8], sig: &[u8]) -> EngineResult<()>;
    fn release_signature(&self, signature: SignatureHandle) -> EngineResult<()>;

    // Digest

    fn open_digest(&self, proc: ProcessorHandle, algorithm: DigestAlgorithm)
        -> EngineResult<DigestHandle>;
    fn digest_update(&self, digest: DigestHandle, data: &[u8]) -> EngineResult<()>;
    /// Same output contract as [`SecEngine::release_mac`].
    fn release_digest(&self, digest: DigestHandle, out: Option<&mut [u8]>) -> EngineResult<usize>;

    // Random

    fn open_random(&self, proc: ProcessorHandle, algorithm: RandomAlgorithm)
        -> EngineResult<RandomHandle>;
    fn random_process(&self, random: RandomHandle, out: &mut [u8]) -> EngineResult<()>;
    fn release_random(&self, random: RandomHandle) -> EngineResult<()>;
}
