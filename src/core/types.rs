use serde::{Deserialize, Serialize};

/// A (field, word) pair. Equality is over both components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyword {
    pub field: String,
    pub word: String,
}

impl Keyword {
    pub fn new(field: impl Into<String>, word: impl Into<String>) -> Self {
        Keyword { field: field.into(), word: word.into() }
    }

    /// Canonical string form used as the inverted index's map key. `\u{1}`
    /// is not expected to occur in field names or words, so the pair round
    /// trips unambiguously into a single string.
    pub fn canonical(&self) -> String {
        format!("{}\u{1}{}", self.field, self.word)
    }
}

/// A document as stored by the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Externally supplied, non-empty, trimmed business identifier.
    pub id: String,
    /// Monotonically increasing id assigned by the indexer on add; zero
    /// until assigned.
    pub int_id: u64,
    pub keywords: Vec<Keyword>,
    /// Opaque payload returned verbatim to callers.
    pub bytes: Vec<u8>,
    pub bits_feature: u64,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            int_id: 0,
            keywords: Vec::new(),
            bytes: Vec::new(),
            bits_feature: 0,
        }
    }

    pub fn with_keyword(mut self, field: impl Into<String>, word: impl Into<String>) -> Self {
        self.keywords.push(Keyword::new(field, word));
        self
    }

    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.bytes = bytes;
        self
    }

    pub fn with_bits(mut self, bits: u64) -> Self {
        self.bits_feature = bits;
        self
    }
}

/// A posting's value: which document and its precomputed feature bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    pub bits_feature: u64,
}
