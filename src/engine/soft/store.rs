//! Object storage for the reference engine.
//!
//! RAM objects live in the processor; file objects are written to the app
//! store as `<kind>-<id:016x>.bin`, one container tag byte followed by the
//! payload.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::engine::{EngineError, EngineResult, ObjectId, ObjectKind, StorageLoc};

/// Length of the root secret kept in the global store.
pub(super) const ROOT_SECRET_SIZE: usize = 32;

const ROOT_SECRET_FILE: &str = "root.key";

/// A stored object: container tag plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct StoredObject {
    pub tag: u8,
    pub data: Vec<u8>,
}

pub(super) struct ObjectStore {
    app_dir: PathBuf,
    ram: HashMap<(ObjectKind, ObjectId), StoredObject>,
}

impl ObjectStore {
    pub fn open(app_dir: &Path) -> EngineResult<Self> {
        fs::create_dir_all(app_dir)?;
        Ok(Self {
            app_dir: app_dir.to_path_buf(),
            ram: HashMap::new(),
        })
    }

    fn file_path(&self, kind: ObjectKind, id: ObjectId) -> PathBuf {
        self.app_dir.join(format!("{}-{:016x}.bin", kind.as_str(), id))
    }

    pub fn contains(&self, kind: ObjectKind, id: ObjectId) -> bool {
        self.ram.contains_key(&(kind, id)) || self.file_path(kind, id).is_file()
    }

    pub fn put(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
        loc: StorageLoc,
        object: StoredObject,
    ) -> EngineResult<()> {
        if self.contains(kind, id) {
            return Err(EngineError::ItemAlreadyProvisioned { kind, id });
        }

        match loc {
            StorageLoc::Ram => {
                self.ram.insert((kind, id), object);
            }
            StorageLoc::File => {
                let mut bytes = Vec::with_capacity(1 + object.data.len());
                bytes.push(object.tag);
                bytes.extend_from_slice(&object.data);
                fs::write(self.file_path(kind, id), bytes)?;
            }
        }
        Ok(())
    }

    pub fn get(&self, kind: ObjectKind, id: ObjectId) -> EngineResult<StoredObject> {
        if let Some(object) = self.ram.get(&(kind, id)) {
            return Ok(object.clone());
        }

        let bytes = match fs::read(self.file_path(kind, id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EngineError::NoSuchItem { kind, id })
            }
            Err(e) => return Err(e.into()),
        };

        match bytes.split_first() {
            Some((tag, data)) => Ok(StoredObject {
                tag: *tag,
                data: data.to_vec(),
            }),
            None => Err(EngineError::InvalidParameters(format!(
                "stored {kind} {id:#x} is empty"
            ))),
        }
    }

    pub fn remove(&mut self, kind: ObjectKind, id: ObjectId) -> EngineResult<()> {
        let in_ram = self.ram.remove(&(kind, id)).is_some();
        let on_disk = match fs::remove_file(self.file_path(kind, id)) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if in_ram || on_disk {
            Ok(())
        } else {
            Err(EngineError::NoSuchItem { kind, id })
        }
    }
}

/// Read the root secret from the global store, creating it on first use.
pub(super) fn load_or_create_root(global_dir: &Path) -> EngineResult<[u8; ROOT_SECRET_SIZE]> {
    fs::create_dir_all(global_dir)?;
    let path = global_dir.join(ROOT_SECRET_FILE);

    match fs::read(&path) {
        Ok(bytes) => bytes.as_slice().try_into().map_err(|_| {
            EngineError::InvalidParameters(format!(
                "{} must hold exactly {ROOT_SECRET_SIZE} bytes",
                path.display()
            ))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let mut root = [0u8; ROOT_SECRET_SIZE];
            rand::rngs::OsRng.fill_bytes(&mut root);
            fs::write(&path, root)?;
            tracing::debug!(path = %path.display(), "created soft engine root secret");
            Ok(root)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(data: &[u8]) -> StoredObject {
        StoredObject {
            tag: 3,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_ram_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();

        store.put(ObjectKind::Key, 7, StorageLoc::Ram, object(b"abc")).unwrap();
        assert_eq!(store.get(ObjectKind::Key, 7).unwrap(), object(b"abc"));
        assert!(!store.contains(ObjectKind::Bundle, 7));

        store.remove(ObjectKind::Key, 7).unwrap();
        assert!(matches!(
            store.get(ObjectKind::Key, 7),
            Err(EngineError::NoSuchItem { .. })
        ));
    }

    #[test]
    fn test_file_objects_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = ObjectStore::open(dir.path()).unwrap();
            store.put(ObjectKind::Certificate, 0x99, StorageLoc::File, object(b"der")).unwrap();
        }
        let store = ObjectStore::open(dir.path()).unwrap();
        assert_eq!(store.get(ObjectKind::Certificate, 0x99).unwrap(), object(b"der"));
        assert!(dir.path().join("certificate-0000000000000099.bin").is_file());
    }

    #[test]
    fn test_duplicate_provision_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        store.put(ObjectKind::Key, 1, StorageLoc::File, object(b"a")).unwrap();
        let err = store.put(ObjectKind::Key, 1, StorageLoc::Ram, object(b"b")).unwrap_err();
        assert!(matches!(err, EngineError::ItemAlreadyProvisioned { id: 1, .. }));
    }

    #[test]
    fn test_remove_missing_is_no_such_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.remove(ObjectKind::Bundle, 5),
            Err(EngineError::NoSuchItem { .. })
        ));
    }

    #[test]
    fn test_root_secret_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create_root(dir.path()).unwrap();
        let second = load_or_create_root(dir.path()).unwrap();
        assert_eq!(first, second);
    }
}
