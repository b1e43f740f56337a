//! Opaque handle types issued by a security engine.
//!
//! Handles are plain copyable tokens. The harness never looks inside them; it
//! only hands them back to the engine that issued them.

use std::fmt;

/// External identifier of a persisted key, certificate or bundle.
pub type ObjectId = u64;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw engine token.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw engine token.
            pub const fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

engine_handle!(
    /// Root handle for one engine session; every other handle hangs off it.
    ProcessorHandle,
    "proc"
);
engine_handle!(
    /// Open key.
    KeyHandle,
    "key"
);
engine_handle!(
    /// Open certificate.
    CertificateHandle,
    "cert"
);
engine_handle!(
    /// Open bundle.
    BundleHandle,
    "bundle"
);
engine_handle!(MacHandle, "mac");
engine_handle!(CipherHandle, "cipher");
engine_handle!(SignatureHandle, "sig");
engine_handle!(DigestHandle, "digest");
engine_handle!(RandomHandle, "random");

/// The persisted object families addressed by an [`ObjectId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Key,
    Certificate,
    Bundle,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Certificate => "certificate",
            Self::Bundle => "bundle",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
