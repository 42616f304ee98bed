//! Convenience re-exports of the crate's most commonly used items

pub use crate::{CorpusDescriptor, Index, Indexer, IndexerBuilder, Result};

pub use crate::{KeyRegistry, NumericCorpus, SequenceKey, SequenceLocation};
