//! In-process engine tests through the `SecEngine` trait object.

use std::sync::Arc;

use secapi_harness::creds::{self, TestKc, TestKey};
use secapi_harness::engine::{
    CipherAlgorithm, CipherMode, DigestAlgorithm, EngineError, KeyHandle, ProcessorHandle,
    RandomAlgorithm, SecEngine, SignatureAlgorithm, SignatureMode, SoftEngine, StorageLoc,
};

fn open(dir: &tempfile::TempDir) -> (Arc<dyn SecEngine>, ProcessorHandle) {
    let engine: Arc<dyn SecEngine> = Arc::new(SoftEngine::new());
    let proc = engine
        .open_processor(&dir.path().join("global"), &dir.path().join("app"))
        .unwrap();
    (engine, proc)
}

fn fixture_key(engine: &dyn SecEngine, proc: ProcessorHandle, id: u64, key: TestKey) -> KeyHandle {
    let (container, data) = creds::key_material(key, TestKc::Raw).unwrap();
    engine
        .provision_key(proc, id, StorageLoc::Ram, container, &data)
        .unwrap();
    engine.open_key(proc, id).unwrap()
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn handles_are_scoped_to_their_processor() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    let other = engine
        .open_processor(&dir.path().join("global"), &dir.path().join("app"))
        .unwrap();

    let key = fixture_key(engine.as_ref(), proc, 1, TestKey::Hmac256);
    let err = engine
        .open_mac(other, secapi_harness::engine::MacAlgorithm::HmacSha256, key)
        .unwrap_err();
    assert!(err.is_invalid_handle());

    engine.release_key(key).unwrap();
    engine.release_processor(other).unwrap();
    engine.release_processor(proc).unwrap();
}

#[test]
fn released_handles_are_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    let digest = engine.open_digest(proc, DigestAlgorithm::Sha256).unwrap();
    engine.release_digest(digest, None).unwrap();

    assert!(engine.digest_update(digest, b"x").unwrap_err().is_invalid_handle());
    assert!(engine.release_digest(digest, None).unwrap_err().is_invalid_handle());
    engine.release_processor(proc).unwrap();
    assert!(engine.release_processor(proc).unwrap_err().is_invalid_handle());
}

// ============================================================================
// Operations
// ============================================================================

#[test]
fn gcm_decrypt_recovers_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    let key = fixture_key(engine.as_ref(), proc, 1, TestKey::Aes256);
    let iv = [7u8; 12];
    let plaintext = b"sixteen byte msg plus a tail";

    let enc = engine
        .open_cipher(proc, CipherAlgorithm::AesGcm, CipherMode::Encrypt, key, Some(&iv))
        .unwrap();
    let mut sealed = engine.cipher_process(enc, &plaintext[..10], false).unwrap();
    sealed.extend(engine.cipher_process(enc, &plaintext[10..], true).unwrap());
    engine.release_cipher(enc).unwrap();
    assert_eq!(sealed.len(), plaintext.len() + 16);

    let dec = engine
        .open_cipher(proc, CipherAlgorithm::AesGcm, CipherMode::Decrypt, key, Some(&iv))
        .unwrap();
    let mut opened = engine.cipher_process(dec, &sealed[..5], false).unwrap();
    opened.extend(engine.cipher_process(dec, &sealed[5..], true).unwrap());
    engine.release_cipher(dec).unwrap();
    assert_eq!(opened, plaintext);
}

#[test]
fn gcm_requires_an_iv() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    let key = fixture_key(engine.as_ref(), proc, 1, TestKey::Aes128);
    let err = engine
        .open_cipher(proc, CipherAlgorithm::AesGcm, CipherMode::Encrypt, key, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameters(_)));
}

#[test]
fn signature_verifies_only_matching_message() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    let key = fixture_key(engine.as_ref(), proc, 1, TestKey::Ed25519);

    let signer = engine
        .open_signature(proc, SignatureAlgorithm::Ed25519, SignatureMode::Sign, key)
        .unwrap();
    let sig = engine.sign(signer, b"payload").unwrap();
    engine.release_signature(signer).unwrap();
    assert_eq!(sig.len(), 64);

    let verifier = engine
        .open_signature(proc, SignatureAlgorithm::Ed25519, SignatureMode::Verify, key)
        .unwrap();
    engine.verify(verifier, b"payload", &sig).unwrap();
    assert!(matches!(
        engine.verify(verifier, b"tampered", &sig),
        Err(EngineError::VerificationFailed)
    ));
    engine.release_signature(verifier).unwrap();
}

#[test]
fn random_fills_whole_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    for algorithm in [RandomAlgorithm::Prng, RandomAlgorithm::TrueRandom] {
        let random = engine.open_random(proc, algorithm).unwrap();
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        engine.random_process(random, &mut a).unwrap();
        engine.random_process(random, &mut b).unwrap();
        assert_ne!(a, b);
        engine.release_random(random).unwrap();
    }
}

#[test]
fn digest_without_output_discards_result() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, proc) = open(&dir);
    let digest = engine.open_digest(proc, DigestAlgorithm::Sha384).unwrap();
    engine.digest_update(digest, b"abc").unwrap();
    assert_eq!(engine.release_digest(digest, None).unwrap(), 0);
}
