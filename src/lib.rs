//! # seqindex
//!
//! `seqindex` builds a compact in-memory index over large line-oriented
//! corpus files in a single forward pass. The index records how the file is
//! partitioned into *chunks* (contiguous byte ranges bounded by a
//! configurable maximum size) and how each chunk is partitioned into
//! *sequences* (individually addressable records with a unique key, a
//! sample count, and a byte offset/size within their chunk), so that a
//! downstream reader can fetch any sequence or chunk without re-parsing the
//! file.
//!
//! The indexer only looks for line boundaries and optional id tokens, never
//! at record content, which makes it several magnitudes faster than a full
//! parse and lets it run over files far too large to load into memory.
//!
//! ## Index Structure
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ Chunk 0 (offset 0)            │
//! │  ├ Sequence key=5  [0, 128)   │
//! │  └ Sequence key=7  [128, 240) │
//! ├───────────────────────────────┤
//! │ Chunk 1 (offset 240)          │
//! │  ├ Sequence key=9  [0, 96)    │
//! │  └ ...                        │
//! └───────────────────────────────┘
//! ```
//!
//! Sequence offsets are relative to their owning chunk; chunk offsets are
//! absolute file positions and tile the file without gaps.
//!
//! ## Input Format
//!
//! Each record occupies one line and optionally begins with an identifier
//! token (numeric, or symbolic resolved through a [`CorpusDescriptor`])
//! followed by a single delimiter character (`|` by default). Consecutive
//! lines sharing an id are folded into one multi-sample sequence. When the
//! id column is absent or ignored, the line position becomes the key.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::io::Cursor;
//! use seqindex::{IndexerBuilder, NumericCorpus};
//!
//! let input = Cursor::new(b"5|the quick\n7|brown fox\n".to_vec());
//! let mut indexer = IndexerBuilder::default()
//!     .chunk_size(1024)
//!     .build(input);
//! indexer.build(&NumericCorpus).unwrap();
//!
//! let index = indexer.index();
//! assert_eq!(index.chunks().len(), 1);
//! assert_eq!(index.num_sequences(), 2);
//!
//! // random lookup by key (non-primary index)
//! let location = index.locate(7).unwrap();
//! let sequence = index.sequence(location).unwrap();
//! assert_eq!(sequence.size_in_bytes(), 12);
//! ```

mod corpus;
mod error;
mod index;
mod indexer;
pub mod prelude;

pub use corpus::{CorpusDescriptor, KeyRegistry, NumericCorpus};
pub use error::{Error, IndexError, Result, ScanError};
pub use index::{
    ChunkDescriptor, ChunkId, Index, SequenceDescriptor, SequenceKey, SequenceLocation,
    CHUNK_ID_MAX,
};
pub use indexer::{
    Indexer, IndexerBuilder, DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_STREAM_PREFIX,
};
