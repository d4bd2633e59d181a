use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::config::{DbKind, IndexerConfig};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, Keyword, Posting};
use crate::index::InvertedIndex;
use crate::query::TermQuery;
use crate::storage::log_store::LogStore;
use crate::storage::sled_store::SledStore;
use crate::storage::ForwardStore;

/// A single node's whole indexing surface: a forward store for documents'
/// opaque payloads plus an inverted index over their keywords. Everything
/// a worker exposes over RPC is a thin wrapper around these four
/// operations.
pub struct Indexer {
    forward_store: Arc<dyn ForwardStore>,
    inverted_index: InvertedIndex,
    max_int_id: AtomicU64,
}

/// A document as persisted in the forward store: the externally visible
/// fields plus the assigned `IntId`, so a reload can repopulate the
/// inverted index without re-deriving ids.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredDocument {
    int_id: u64,
    keywords: Vec<Keyword>,
    bytes: Vec<u8>,
    bits_feature: u64,
}

impl Indexer {
    /// Opens (or creates) the configured forward store and starts with an
    /// empty inverted index — callers that need to resume from an existing
    /// store should follow with [`Indexer::load_from_forward_store`].
    pub fn init(config: &IndexerConfig) -> Result<Self> {
        let forward_store: Arc<dyn ForwardStore> = match config.db_kind {
            DbKind::LsmEngine => Arc::new(SledStore::open(&config.db_path)?),
            DbKind::BTreeEngine => Arc::new(LogStore::open(&config.db_path)?),
        };
        Ok(Indexer {
            forward_store,
            inverted_index: InvertedIndex::with_capacity_hint(config.doc_num_estimate),
            max_int_id: AtomicU64::new(0),
        })
    }

    /// Rebuilds the inverted index from everything currently in the
    /// forward store, without touching the forward store itself or
    /// reissuing `IntId`s. Used on worker startup to resume from whatever
    /// was persisted before a restart.
    pub fn load_from_forward_store(&mut self) -> Result<usize> {
        let mut loaded = 0;
        let mut max_seen = 0u64;
        for (id, bytes) in self.forward_store.iter_db()? {
            let stored: StoredDocument = bincode::deserialize(&bytes)?;
            let posting = Posting { id, bits_feature: stored.bits_feature };
            self.inverted_index.add(stored.int_id, &stored.keywords, posting);
            max_seen = max_seen.max(stored.int_id);
            loaded += 1;
        }
        self.max_int_id.fetch_max(max_seen, Ordering::SeqCst);
        Ok(loaded)
    }

    /// Adds (or replaces, if `doc.id` already exists) a document. On
    /// replace, the old postings are removed before the new ones are
    /// added, so a keyword dropped between versions does not linger.
    ///
    /// A forward-store failure aborts the whole operation and is returned
    /// to the caller. An inverted-index failure cannot occur — its
    /// operations do not fail — so once the forward store has accepted
    /// the write, the in-memory index update always completes; there is
    /// no partial-write state to roll back from the index side.
    pub fn add_doc(&self, doc: Document) -> Result<u64> {
        let id = doc.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "document id must not be empty"));
        }

        if let Some(existing) = self.forward_store.get(&id)? {
            let stored: StoredDocument = bincode::deserialize(&existing)?;
            self.inverted_index.delete(stored.int_id, &stored.keywords);
        }

        let int_id = self.max_int_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = StoredDocument {
            int_id,
            keywords: doc.keywords.clone(),
            bytes: doc.bytes,
            bits_feature: doc.bits_feature,
        };
        let encoded = bincode::serialize(&stored)?;
        self.forward_store.set(&id, &encoded)?;

        let posting = Posting { id: id.clone(), bits_feature: stored.bits_feature };
        self.inverted_index.add(int_id, &stored.keywords, posting);
        Ok(int_id)
    }

    /// Removes a document by its external id. A missing id is not an
    /// error: it returns `0` rather than failing, so deleting the same
    /// document twice is a no-op both times. Returns `1` when a document
    /// was actually removed.
    pub fn delete_doc(&self, id: &str) -> Result<usize> {
        let id = id.trim();
        let existing = match self.forward_store.get(id)? {
            Some(bytes) => bytes,
            None => return Ok(0),
        };
        let stored: StoredDocument = bincode::deserialize(&existing)?;
        self.inverted_index.delete(stored.int_id, &stored.keywords);
        self.forward_store.delete(id)?;
        Ok(1)
    }

    /// Evaluates `query` against the inverted index, then reloads the
    /// matching documents' payload bytes from the forward store. A
    /// posting whose forward-store entry has since vanished (deleted
    /// concurrently, say) is silently dropped rather than surfaced as an
    /// error — the query result reflects what could actually be read.
    /// Likewise, a stored value that fails to decode is logged and
    /// dropped rather than failing the whole search: one corrupted
    /// record should not hide every other match.
    pub fn search(&self, query: &TermQuery, on: u64, off: u64, or_flags: &[u64]) -> Result<Vec<Document>> {
        let postings = self.inverted_index.search(query, on, off, or_flags);
        let ids: Vec<String> = postings.iter().map(|(_, posting)| posting.id.clone()).collect();
        let payloads = self.forward_store.batch_get(&ids)?;

        let mut docs = Vec::with_capacity(postings.len());
        for ((int_id, posting), bytes) in postings.into_iter().zip(payloads) {
            let Some(bytes) = bytes else { continue };
            let stored: StoredDocument = match bincode::deserialize(&bytes) {
                Ok(stored) => stored,
                Err(err) => {
                    tracing::warn!(id = %posting.id, error = %err, "dropping document with undecodable stored bytes");
                    continue;
                }
            };
            docs.push(Document {
                id: posting.id,
                int_id,
                keywords: stored.keywords,
                bytes: stored.bytes,
                bits_feature: stored.bits_feature,
            });
        }
        Ok(docs)
    }

    /// Number of documents currently in the forward store.
    pub fn count(&self) -> Result<usize> {
        Ok(self.forward_store.iter_key()?.len())
    }

    pub fn close(&self) -> Result<()> {
        self.forward_store.close()
    }
}
