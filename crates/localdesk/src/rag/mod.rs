//! Retrieval-augmented generation: chunking, indexing, retrieval, prompting
pub mod chunker;
pub mod indexer;
pub mod prompt;
pub mod retriever;

pub use chunker::chunk_text;
pub use indexer::{DocumentIndexer, IndexReport};
pub use prompt::system_prompt;
pub use retriever::Retriever;
