//! Vector store adapters: LanceDB on disk and an in-memory cosine store.
#![deny(warnings)]
#![deny(unused_imports)]

pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance::LanceVectorStore;
pub use memory::{cosine_distance, MemoryVectorStore};
