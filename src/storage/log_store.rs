use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::ForwardStore;

const TAG_SET: u8 = 1;
const TAG_DELETE: u8 = 2;

/// Forward store shaped like a B-tree-style engine: an in-memory ordered
/// index backed by a single append-only log on disk for durability. Every
/// `set`/`delete` is first appended as a length-prefixed, checksummed
/// record, then applied to the in-memory `BTreeMap`; `open` replays the
/// log from the start to rebuild that map.
///
/// Unlike [`super::sled_store::SledStore`], there is no background
/// compaction: the log only grows. That tradeoff is acceptable here since
/// this store exists to give the indexer a second, structurally distinct
/// backend to run against, not to be production storage in its own right.
pub struct LogStore {
    inner: Mutex<Inner>,
    path: PathBuf,
}

struct Inner {
    file: File,
    index: BTreeMap<String, Vec<u8>>,
}

impl LogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
        let index = replay(&mut file)?;
        Ok(LogStore { inner: Mutex::new(Inner { file, index }), path })
    }
}

fn replay(file: &mut File) -> Result<BTreeMap<String, Vec<u8>>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let mut index = BTreeMap::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        if pos + 1 > buf.len() {
            break;
        }
        let tag = buf[pos];
        pos += 1;

        let key_len = read_u32(&buf, &mut pos)?;
        let key = read_bytes(&buf, &mut pos, key_len)?;
        let key = String::from_utf8_lossy(&key).into_owned();

        match tag {
            TAG_SET => {
                let value_len = read_u32(&buf, &mut pos)?;
                let value = read_bytes(&buf, &mut pos, value_len)?;
                let crc_expected = read_u32(&buf, &mut pos)?;
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&[tag]);
                hasher.update(&key_len.to_le_bytes());
                hasher.update(key.as_bytes());
                hasher.update(&value_len.to_le_bytes());
                hasher.update(&value);
                if hasher.finalize() != crc_expected {
                    return Err(Error::new(ErrorKind::Parse, "log store checksum mismatch"));
                }
                index.insert(key, value);
            }
            TAG_DELETE => {
                let crc_expected = read_u32(&buf, &mut pos)?;
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&[tag]);
                hasher.update(&key_len.to_le_bytes());
                hasher.update(key.as_bytes());
                if hasher.finalize() != crc_expected {
                    return Err(Error::new(ErrorKind::Parse, "log store checksum mismatch"));
                }
                index.remove(&key);
            }
            other => {
                return Err(Error::new(ErrorKind::Parse, format!("unknown log store record tag {other}")));
            }
        }
    }

    Ok(index)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    if *pos + 4 > buf.len() {
        return Err(Error::new(ErrorKind::Parse, "log store record truncated"));
    }
    let v = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(v)
}

fn read_bytes(buf: &[u8], pos: &mut usize, len: u32) -> Result<Vec<u8>> {
    let len = len as usize;
    if *pos + len > buf.len() {
        return Err(Error::new(ErrorKind::Parse, "log store record truncated"));
    }
    let v = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(v)
}

fn append_set(file: &mut File, key: &str, value: &[u8]) -> Result<()> {
    let key_len = key.len() as u32;
    let value_len = value.len() as u32;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[TAG_SET]);
    hasher.update(&key_len.to_le_bytes());
    hasher.update(key.as_bytes());
    hasher.update(&value_len.to_le_bytes());
    hasher.update(value);
    let crc = hasher.finalize();

    file.write_all(&[TAG_SET])?;
    file.write_all(&key_len.to_le_bytes())?;
    file.write_all(key.as_bytes())?;
    file.write_all(&value_len.to_le_bytes())?;
    file.write_all(value)?;
    file.write_all(&crc.to_le_bytes())?;
    file.flush()?;
    Ok(())
}

fn append_delete(file: &mut File, key: &str) -> Result<()> {
    let key_len = key.len() as u32;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[TAG_DELETE]);
    hasher.update(&key_len.to_le_bytes());
    hasher.update(key.as_bytes());
    let crc = hasher.finalize();

    file.write_all(&[TAG_DELETE])?;
    file.write_all(&key_len.to_le_bytes())?;
    file.write_all(key.as_bytes())?;
    file.write_all(&crc.to_le_bytes())?;
    file.flush()?;
    Ok(())
}

impl ForwardStore for LogStore {
    fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        guard.file.flush()?;
        Ok(())
    }

    fn set(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock();
        append_set(&mut guard.file, id, bytes)?;
        guard.index.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.inner.lock();
        Ok(guard.index.get(id).cloned())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut guard = self.inner.lock();
        if guard.index.contains_key(id) {
            append_delete(&mut guard.file, id)?;
            guard.index.remove(id);
        }
        Ok(())
    }

    fn iter_db(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let guard = self.inner.lock();
        Ok(guard.index.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn iter_key(&self) -> Result<Vec<String>> {
        let guard = self.inner.lock();
        Ok(guard.index.keys().cloned().collect())
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
        let store = LogStore::open(dir.path().join("store.log")).unwrap();
        store.set("doc-1", b"payload").unwrap();
        assert_eq!(store.get("doc-1").unwrap(), Some(b"payload".to_vec()));
        store.delete("doc-1").unwrap();
        assert_eq!(store.get("doc-1").unwrap(), None);
    }

    #[test]
    fn reopening_replays_the_log_into_the_same_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.log");
        {
            let store = LogStore::open(&path).unwrap();
            store.set("a", b"1").unwrap();
            store.set("b", b"2").unwrap();
            store.delete("a").unwrap();
        }
        let reopened = LogStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap(), None);
        assert_eq!(reopened.get("b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn set_overwrites_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path().join("store.log")).unwrap();
        store.set("a", b"first").unwrap();
        store.set("a", b"second").unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"second".to_vec()));
    }
}
