//! Protocol Navigator context engine
//!
//! Long-context assembly, the per-mode runner, citation selection and the
//! RAG vs long-context benchmark comparator.

pub mod assembler;
pub mod benchmark;
pub mod citations;
pub mod errors;
pub mod runner;

#[cfg(test)]
mod testing;

pub use assembler::ContextAssembler;
pub use benchmark::BenchmarkComparator;
pub use errors::ModeError;
pub use runner::{ModeRunner, RunnerSettings, NO_DOCUMENTS_ANSWER};
