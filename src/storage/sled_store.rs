use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::storage::ForwardStore;

/// Forward store backed by `sled`, an embedded LSM-tree engine. Favors
/// write throughput and crash-safety via its own WAL; reads a single key
/// without touching unrelated ones, the same shape as the original's
/// LSM-engine backend.
pub struct SledStore {
    db: sled::Db,
    path: PathBuf,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)?;
        Ok(SledStore { db, path })
    }
}

impl ForwardStore for SledStore {
    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn set(&self, id: &str, bytes: &[u8]) -> Result<()> {
        self.db.insert(id.as_bytes(), bytes)?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(id.as_bytes())?.map(|ivec| ivec.to_vec()))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.db.remove(id.as_bytes())?;
        Ok(())
    }

    fn iter_db(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in self.db.iter() {
            let (key, value) = entry?;
            let id = String::from_utf8_lossy(&key).into_owned();
            out.push((id, value.to_vec()));
        }
        Ok(out)
    }

    fn iter_key(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in self.db.iter() {
            let (key, _) = entry?;
            out.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(out)
    }

    fn db_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("db")).unwrap();
        store.set("doc-1", b"payload").unwrap();
        assert_eq!(store.get("doc-1").unwrap(), Some(b"payload".to_vec()));
        store.delete("doc-1").unwrap();
        assert_eq!(store.get("doc-1").unwrap(), None);
    }

    #[test]
    fn iter_db_reflects_all_stored_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("db")).unwrap();
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        let mut keys: Vec<String> = store.iter_key().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
