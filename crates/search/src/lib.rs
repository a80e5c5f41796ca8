//! Protocol Navigator lexical search
//!
//! TF-IDF ranking of corpus chunks for RAG mode and relevance-ordered
//! long-context assembly.

pub mod retrieval;

pub use retrieval::{
    prefer_matches, LexicalIndex, LexicalRetriever, RankedChunk, RetrievedChunk,
};
