use std::collections::{BTreeMap, HashSet};

pub use crate::core::types::Posting;

/// An ordered postings list for a single term: a sorted map keyed by
/// `IntId`, giving O(log n) insert/remove and O(1) in-order stepping.
/// `BTreeMap` satisfies this contract directly — the original's skip list
/// was one way to get there, not a requirement in itself (§9).
#[derive(Debug, Default, Clone)]
pub struct PostingList(BTreeMap<u64, Posting>);

impl PostingList {
    pub fn new() -> Self {
        PostingList(BTreeMap::new())
    }

    /// Insert or replace the posting for `int_id`.
    pub fn insert(&mut self, int_id: u64, posting: Posting) {
        self.0.insert(int_id, posting);
    }

    pub fn remove(&mut self, int_id: u64) -> Option<Posting> {
        self.0.remove(&int_id)
    }

    pub fn get(&self, int_id: u64) -> Option<&Posting> {
        self.0.get(&int_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ascending iteration by `IntId`.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Posting)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

/// Intersection of k (`IntId`, Posting) sequences already filtered by the
/// caller (e.g. by bitmask), each assumed to be in ascending `IntId` order.
///
/// Maintains one cursor per list at its front; at each step finds the
/// maximum current key. If every cursor sits on that key, it is emitted and
/// all cursors advance; otherwise only the cursors strictly below the max
/// advance. Halts the moment any cursor is exhausted — an empty operand
/// therefore immediately empties the whole intersection, which is how an
/// absent leaf short-circuits an enclosing `And`.
pub fn intersect(lists: &[Vec<(u64, Posting)>]) -> Vec<(u64, Posting)> {
    if lists.is_empty() {
        return Vec::new();
    }
    if lists.len() == 1 {
        return lists[0].clone();
    }
    if lists.iter().any(|l| l.is_empty()) {
        return Vec::new();
    }

    let mut cursors = vec![0usize; lists.len()];
    let mut result = Vec::new();

    loop {
        if cursors.iter().zip(lists.iter()).any(|(&c, l)| c >= l.len()) {
            break;
        }

        let max_key = cursors.iter().zip(lists.iter()).map(|(&c, l)| l[c].0).max().unwrap();

        if cursors.iter().zip(lists.iter()).all(|(&c, l)| l[c].0 == max_key) {
            result.push(lists[0][cursors[0]].clone());
            for c in cursors.iter_mut() {
                *c += 1;
            }
        } else {
            for (c, l) in cursors.iter_mut().zip(lists.iter()) {
                if l[*c].0 < max_key {
                    *c += 1;
                }
            }
        }

        if cursors.iter().zip(lists.iter()).any(|(&c, l)| c >= l.len()) {
            break;
        }
    }

    result
}

/// Union of k (`IntId`, Posting) sequences, each in ascending order.
/// Iterates every list once, keeping only the first occurrence of each key.
pub fn union(lists: &[Vec<(u64, Posting)>]) -> Vec<(u64, Posting)> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for list in lists {
        for (key, posting) in list {
            if seen.insert(*key) {
                result.push((*key, posting.clone()));
            }
        }
    }
    result.sort_by_key(|(k, _)| *k);
    result
}
