pub mod bitmask;
pub mod term_query;

pub use bitmask::filter_by_bits;
pub use term_query::TermQuery;
