//! Corpus collaborators supplying the key space of an input file

use std::collections::HashMap;

use auto_impl::auto_impl;
use parking_lot::Mutex;

use crate::error::Result;

/// Describes the key space of the corpus being indexed
///
/// The corpus decides whether sequence ids in the input are plain decimal
/// numbers or symbolic tokens, and resolves symbolic tokens to numeric ids.
/// The [`Indexer`](crate::Indexer) only consults `key_to_id` in symbolic-id
/// mode.
#[auto_impl(&, Box, Arc)]
pub trait CorpusDescriptor {
    /// True when sequence keys in the input are plain decimal numbers
    fn numeric_sequence_keys(&self) -> bool;

    /// Resolves a symbolic sequence key to its numeric id
    fn key_to_id(&self, key: &str) -> Result<u64>;
}

/// A corpus whose sequence keys are already numeric
///
/// # Examples
///
/// ```rust
/// use seqindex::{CorpusDescriptor, NumericCorpus};
///
/// let corpus = NumericCorpus;
/// assert!(corpus.numeric_sequence_keys());
/// assert_eq!(corpus.key_to_id("42").unwrap(), 42);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericCorpus;
impl CorpusDescriptor for NumericCorpus {
    fn numeric_sequence_keys(&self) -> bool {
        true
    }

    fn key_to_id(&self, key: &str) -> Result<u64> {
        Ok(key.parse()?)
    }
}

/// Registry mapping symbolic sequence keys to dense numeric ids
///
/// Assigns a fresh id the first time a key is seen and returns the same id
/// on every later lookup. Interior mutability lets the indexer register keys
/// through a shared reference during a scan.
///
/// # Examples
///
/// ```rust
/// use seqindex::KeyRegistry;
///
/// let registry = KeyRegistry::new();
/// assert_eq!(registry.resolve("utt-0001"), 0);
/// assert_eq!(registry.resolve("utt-0002"), 1);
/// assert_eq!(registry.resolve("utt-0001"), 0);
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct KeyRegistry {
    ids: Mutex<HashMap<String, u64>>,
}
impl KeyRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// True when no keys have been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Returns the id of `key`, registering it if unseen
    pub fn resolve(&self, key: &str) -> u64 {
        let mut ids = self.ids.lock();
        let next = ids.len() as u64;
        *ids.entry(key.to_string()).or_insert(next)
    }
}
impl CorpusDescriptor for KeyRegistry {
    fn numeric_sequence_keys(&self) -> bool {
        false
    }

    fn key_to_id(&self, key: &str) -> Result<u64> {
        Ok(self.resolve(key))
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_numeric_corpus_rejects_garbage() {
        let corpus = NumericCorpus;
        assert!(corpus.key_to_id("12a").is_err());
        assert!(corpus.key_to_id("").is_err());
    }

    #[test]
    fn test_registry_assigns_dense_ids() {
        let registry = KeyRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve("a"), 0);
        assert_eq!(registry.resolve("b"), 1);
        assert_eq!(registry.resolve("a"), 0);
        assert_eq!(registry.len(), 2);
        assert!(!registry.numeric_sequence_keys());
    }
}
