pub mod log_store;
pub mod sled_store;

use std::path::Path;

use crate::core::error::Result;

/// Key-value contract a forward store must satisfy: durable storage of a
/// document's opaque payload, addressed by its external id. The indexer
/// facade is the only caller; everything else (ranking, transactions,
/// schema) is out of scope here by design — this is a storage interface,
/// not a database engine.
///
/// Two independent implementations exist so the indexer can be pointed at
/// either without changing a line of query or index code: [`sled_store::SledStore`]
/// (an LSM-tree engine, via the `sled` crate) and [`log_store::LogStore`] (a
/// minimal append-log-backed engine in the shape of a B-tree-style store).
pub trait ForwardStore: Send + Sync {
    fn close(&self) -> Result<()>;

    fn set(&self, id: &str, bytes: &[u8]) -> Result<()>;

    fn batch_set(&self, items: &[(String, Vec<u8>)]) -> Result<()> {
        for (id, bytes) in items {
            self.set(id, bytes)?;
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    fn batch_get(&self, ids: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    fn delete(&self, id: &str) -> Result<()>;

    fn batch_delete(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.delete(id)?;
        }
        Ok(())
    }

    fn has(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Snapshot of every (id, bytes) pair currently stored. Used by the
    /// indexer's load-from-forward-store path to rebuild the inverted
    /// index after a restart.
    fn iter_db(&self) -> Result<Vec<(String, Vec<u8>)>>;

    /// Snapshot of every id currently stored, without paying for the
    /// payload bytes.
    fn iter_key(&self) -> Result<Vec<String>>;

    fn db_path(&self) -> &Path;
}
