//! recall-text
//!
//! In-process BM25 scoring over a small document set. The index is cheap to
//! build and is rebuilt from the current snapshot for every query batch.
pub mod bm25;
pub mod terms;

pub use bm25::{Bm25Index, Bm25Params};
pub use terms::{stem, stem_terms};
