use parking_lot::RwLock;

use crate::concurrent::SegmentedMap;
use crate::core::types::{Keyword, Posting};
use crate::index::posting::{intersect, union, PostingList};
use crate::query::{filter_by_bits, TermQuery};

/// Number of independent term locks guarding read-modify-write sequences
/// (delete-then-insert during a document replace) against the posting
/// map. Terms hash into this fixed array the same way keys hash into
/// `SegmentedMap`'s shards — a small, constant number of stripes rather
/// than one lock per term, so memory stays bounded regardless of
/// vocabulary size.
const TERM_LOCK_COUNT: usize = 1000;

/// Fallback stripe count when the host doesn't report its parallelism
/// (`available_parallelism()` can fail on some sandboxes/containers).
const FALLBACK_STRIPE_COUNT: usize = 8;

/// Number of `SegmentedMap` stripes: one per hardware thread, per spec
/// §4.1's stated default, rather than a fixed guess.
fn default_stripe_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(FALLBACK_STRIPE_COUNT)
}

/// The inverted index: one posting list per (field, word) keyword, plus
/// boolean query evaluation over them.
///
/// Reads never block other reads, and writes to different terms never
/// block each other (`SegmentedMap`'s stripe locks). The extra
/// `term_locks` array exists only to make a term's delete-then-insert
/// sequence atomic with respect to concurrent writers of the *same*
/// term — the map's own per-entry lock covers a single mutation, not a
/// pair of them.
pub struct InvertedIndex {
    postings: SegmentedMap<PostingList>,
    term_locks: Vec<RwLock<()>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex {
            postings: SegmentedMap::new(default_stripe_count()),
            term_locks: (0..TERM_LOCK_COUNT).map(|_| RwLock::new(())).collect(),
        }
    }

    pub fn with_capacity_hint(total_estimate: usize) -> Self {
        InvertedIndex {
            postings: SegmentedMap::with_capacity_hint(default_stripe_count(), total_estimate),
            term_locks: (0..TERM_LOCK_COUNT).map(|_| RwLock::new(())).collect(),
        }
    }

    fn term_lock_index(&self, keyword: &Keyword) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(&keyword.canonical(), &mut hasher);
        (std::hash::Hasher::finish(&hasher) as usize) % TERM_LOCK_COUNT
    }

    /// Inserts a posting for `int_id` under every keyword attached to the
    /// document. `int_id` must be non-zero (the sentinel "unassigned" id
    /// is never stored).
    pub fn add(&self, int_id: u64, keywords: &[Keyword], posting: Posting) {
        if int_id == 0 {
            return;
        }
        for keyword in keywords {
            let _guard = self.term_locks[self.term_lock_index(keyword)].write();
            let key = keyword.canonical();
            self.postings.with_entry_or_insert(&key, PostingList::new, |list| {
                list.insert(int_id, posting.clone());
            });
        }
    }

    /// Removes the posting for `int_id` from every keyword's list. Missing
    /// keywords or an already-absent `int_id` are silently ignored, so
    /// repeated deletes of the same document are idempotent.
    pub fn delete(&self, int_id: u64, keywords: &[Keyword]) {
        for keyword in keywords {
            let _guard = self.term_locks[self.term_lock_index(keyword)].write();
            let key = keyword.canonical();
            self.postings.with_entry(&key, |list| {
                list.remove(int_id);
            });
        }
    }

    fn leaf(&self, keyword: &Keyword, on: u64, off: u64, or_flags: &[u64]) -> Vec<(u64, Posting)> {
        let key = keyword.canonical();
        match self.postings.get(&key) {
            None => Vec::new(),
            Some(list) => list
                .iter()
                .filter(|(_, posting)| filter_by_bits(posting.bits_feature, on, off, or_flags))
                .map(|(id, posting)| (id, posting.clone()))
                .collect(),
        }
    }

    /// Evaluates a term query tree, applying the bitmask predicate at every
    /// leaf before merging. `And`/`Or` over zero children both evaluate to
    /// the empty set.
    pub fn search(&self, query: &TermQuery, on: u64, off: u64, or_flags: &[u64]) -> Vec<(u64, Posting)> {
        match query {
            TermQuery::Empty => Vec::new(),
            TermQuery::Leaf(keyword) => self.leaf(keyword, on, off, or_flags),
            TermQuery::And(children) => {
                if children.is_empty() {
                    return Vec::new();
                }
                let operands: Vec<_> = children.iter().map(|c| self.search(c, on, off, or_flags)).collect();
                intersect(&operands)
            }
            TermQuery::Or(children) => {
                if children.is_empty() {
                    return Vec::new();
                }
                let operands: Vec<_> = children.iter().map(|c| self.search(c, on, off, or_flags)).collect();
                union(&operands)
            }
        }
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: &str, bits: u64) -> Posting {
        Posting { id: id.to_string(), bits_feature: bits }
    }

    fn kw(field: &str, word: &str) -> Keyword {
        Keyword::new(field, word)
    }

    #[test]
    fn stripe_count_follows_available_parallelism() {
        let idx = InvertedIndex::new();
        assert_eq!(idx.postings.stripes(), default_stripe_count());
    }

    #[test]
    fn leaf_lookup_returns_postings_in_ascending_int_id_order() {
        let idx = InvertedIndex::new();
        idx.add(3, &[kw("title", "rust")], posting("d3", 0));
        idx.add(1, &[kw("title", "rust")], posting("d1", 0));
        idx.add(2, &[kw("title", "rust")], posting("d2", 0));

        let result = idx.search(&TermQuery::leaf("title", "rust"), 0, 0, &[]);
        let ids: Vec<u64> = result.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn and_query_intersects_term_postings() {
        let idx = InvertedIndex::new();
        idx.add(1, &[kw("title", "rust"), kw("title", "search")], posting("d1", 0));
        idx.add(2, &[kw("title", "rust")], posting("d2", 0));

        let query = TermQuery::and([TermQuery::leaf("title", "rust"), TermQuery::leaf("title", "search")]);
        let result = idx.search(&query, 0, 0, &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, 1);
    }

    #[test]
    fn or_query_unions_term_postings() {
        let idx = InvertedIndex::new();
        idx.add(1, &[kw("title", "rust")], posting("d1", 0));
        idx.add(2, &[kw("title", "search")], posting("d2", 0));

        let query = TermQuery::or([TermQuery::leaf("title", "rust"), TermQuery::leaf("title", "search")]);
        let result = idx.search(&query, 0, 0, &[]);
        let ids: Vec<u64> = result.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn bitmask_filters_leaf_before_merge() {
        let idx = InvertedIndex::new();
        idx.add(1, &[kw("title", "rust")], posting("d1", 0b01));
        idx.add(2, &[kw("title", "rust")], posting("d2", 0b10));

        let result = idx.search(&TermQuery::leaf("title", "rust"), 0b10, 0, &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].1.id, "d2");
    }

    #[test]
    fn delete_removes_posting_and_is_idempotent() {
        let idx = InvertedIndex::new();
        idx.add(1, &[kw("title", "rust")], posting("d1", 0));
        idx.delete(1, &[kw("title", "rust")]);
        assert!(idx.search(&TermQuery::leaf("title", "rust"), 0, 0, &[]).is_empty());
        // second delete of the same id is a no-op, not an error.
        idx.delete(1, &[kw("title", "rust")]);
    }

    #[test]
    fn zero_int_id_is_never_stored() {
        let idx = InvertedIndex::new();
        idx.add(0, &[kw("title", "rust")], posting("d0", 0));
        assert!(idx.search(&TermQuery::leaf("title", "rust"), 0, 0, &[]).is_empty());
    }

    #[test]
    fn unknown_keyword_searches_to_empty_result() {
        let idx = InvertedIndex::new();
        assert!(idx.search(&TermQuery::leaf("title", "nothing"), 0, 0, &[]).is_empty());
    }

    #[test]
    fn nested_and_or_query_evaluates_recursively() {
        let idx = InvertedIndex::new();
        idx.add(1, &[kw("title", "rust"), kw("tag", "systems")], posting("d1", 0));
        idx.add(2, &[kw("title", "rust"), kw("tag", "web")], posting("d2", 0));
        idx.add(3, &[kw("title", "go")], posting("d3", 0));

        // title:rust AND (tag:systems OR tag:web)
        let query = TermQuery::and([
            TermQuery::leaf("title", "rust"),
            TermQuery::or([TermQuery::leaf("tag", "systems"), TermQuery::leaf("tag", "web")]),
        ]);
        let result = idx.search(&query, 0, 0, &[]);
        let ids: Vec<u64> = result.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
