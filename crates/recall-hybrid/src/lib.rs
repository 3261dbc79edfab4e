//! Query-time ranking: hybrid BM25 + vector fusion, the lexical fallback,
//! and the engine that picks between them.
#![deny(warnings)]
#![deny(unused_imports)]

pub mod backend;
pub mod context;
pub mod engine;
pub mod fusion;
pub mod indexer;
pub mod lexical;

pub use backend::{Collection, RankingBackend};
pub use context::{session_context, SessionContext};
pub use engine::{Capabilities, RetrievalEngine, RetrievalSettings};
pub use fusion::{fuse_collection, normalized_bm25, FusionConfig, HybridBackend};
pub use indexer::{index_corpus, IndexReport};
pub use lexical::{KeywordBoost, LexicalOnlyBackend};
