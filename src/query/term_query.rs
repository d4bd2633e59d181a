use serde::{Deserialize, Serialize};

use crate::core::types::Keyword;

/// A boolean tree of AND/OR over leaf term literals. An empty tree (neither
/// a keyword nor children) matches nothing. `And` over an empty child list
/// and `Or` over an empty child list both match nothing by convention here
/// — they simply never occur in a well-formed tree built through the
/// constructors below, but evaluation still handles them safely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TermQuery {
    Leaf(Keyword),
    And(Vec<TermQuery>),
    Or(Vec<TermQuery>),
    /// Neither a leaf nor children — the empty query. Evaluates to the
    /// empty result set rather than an error.
    Empty,
}

impl TermQuery {
    pub fn leaf(field: impl Into<String>, word: impl Into<String>) -> Self {
        TermQuery::Leaf(Keyword::new(field, word))
    }

    pub fn and(children: impl IntoIterator<Item = TermQuery>) -> Self {
        TermQuery::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = TermQuery>) -> Self {
        TermQuery::Or(children.into_iter().collect())
    }
}

impl Default for TermQuery {
    fn default() -> Self {
        TermQuery::Empty
    }
}
