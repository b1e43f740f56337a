//! Tagged records for everything a [`TestCtx`](super::TestCtx) owns.

use std::fmt;

use crate::engine::{
    BundleHandle, CertificateHandle, CipherHandle, DigestHandle, EngineResult, KeyHandle,
    MacHandle, ObjectId, RandomHandle, SecEngine, SignatureHandle,
};

/// The eight kinds of handle a context tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    Key,
    Certificate,
    Bundle,
    Mac,
    Cipher,
    Signature,
    Digest,
    Random,
}

impl ResourceCategory {
    /// Operation handles may reference keys and go first at teardown.
    pub fn is_operation(&self) -> bool {
        !matches!(self, Self::Key | Self::Certificate | Self::Bundle)
    }
}

/// One engine handle, tagged with its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Key(KeyHandle),
    Certificate(CertificateHandle),
    Bundle(BundleHandle),
    Mac(MacHandle),
    Cipher(CipherHandle),
    Signature(SignatureHandle),
    Digest(DigestHandle),
    Random(RandomHandle),
}

impl Resource {
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Key(_) => ResourceCategory::Key,
            Self::Certificate(_) => ResourceCategory::Certificate,
            Self::Bundle(_) => ResourceCategory::Bundle,
            Self::Mac(_) => ResourceCategory::Mac,
            Self::Cipher(_) => ResourceCategory::Cipher,
            Self::Signature(_) => ResourceCategory::Signature,
            Self::Digest(_) => ResourceCategory::Digest,
            Self::Random(_) => ResourceCategory::Random,
        }
    }

    /// Release without retrieving any output.
    pub(crate) fn release(&self, engine: &dyn SecEngine) -> EngineResult<()> {
        match *self {
            Self::Key(h) => engine.release_key(h),
            Self::Certificate(h) => engine.release_certificate(h),
            Self::Bundle(h) => engine.release_bundle(h),
            Self::Mac(h) => engine.release_mac(h, None).map(drop),
            Self::Cipher(h) => engine.release_cipher(h),
            Self::Signature(h) => engine.release_signature(h),
            Self::Digest(h) => engine.release_digest(h, None).map(drop),
            Self::Random(h) => engine.release_random(h),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(h) => fmt::Display::fmt(h, f),
            Self::Certificate(h) => fmt::Display::fmt(h, f),
            Self::Bundle(h) => fmt::Display::fmt(h, f),
            Self::Mac(h) => fmt::Display::fmt(h, f),
            Self::Cipher(h) => fmt::Display::fmt(h, f),
            Self::Signature(h) => fmt::Display::fmt(h, f),
            Self::Digest(h) => fmt::Display::fmt(h, f),
            Self::Random(h) => fmt::Display::fmt(h, f),
        }
    }
}

/// A handle type a context can track and a [`Scoped`](super::Scoped) guard can own.
pub trait TrackedHandle: Copy + fmt::Display + Into<Resource> {}

macro_rules! tracked_handle {
    ($($variant:ident($handle:ty)),* $(,)?) => {
        $(
            impl From<$handle> for Resource {
                fn from(handle: $handle) -> Self {
                    Self::$variant(handle)
                }
            }

            impl TrackedHandle for $handle {}
        )*
    };
}

tracked_handle!(
    Key(KeyHandle),
    Certificate(CertificateHandle),
    Bundle(BundleHandle),
    Mac(MacHandle),
    Cipher(CipherHandle),
    Signature(SignatureHandle),
    Digest(DigestHandle),
    Random(RandomHandle),
);

/// A tracked handle and, for provisioned objects, the id it was created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedResource {
    pub resource: Resource,
    pub object_id: Option<ObjectId>,
}

/// A release or delete that failed during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub target: String,
    pub error: String,
}

/// What a teardown pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Handles released, processor included, in release order.
    pub released: Vec<String>,
    pub deleted: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, target: impl Into<String>, error: impl fmt::Display) {
        let target = target.into();
        tracing::error!(resource = %target, %error, "teardown release failed");
        self.failures.push(TeardownFailure {
            target,
            error: error.to_string(),
        });
    }
}
