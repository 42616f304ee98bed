//! Chunk and sequence metadata for an indexed corpus
//!
//! The types in this module form the in-memory index that a single pass of
//! the [`Indexer`](crate::Indexer) produces: an ordered collection of
//! [`ChunkDescriptor`]s, each holding an ordered collection of
//! [`SequenceDescriptor`]s, plus an optional mapping from sequence key to
//! its location within the index.
//!
//! All offsets stored here are derived from absolute file positions, so a
//! downstream reader can fetch any chunk or sequence with a single ranged
//! read and without re-parsing the file.

use std::collections::HashMap;

use crate::error::{IndexError, Result};

/// Identifier of a chunk's position within an [`Index`]
///
/// Chunk ids are contiguous and zero-based: the id of a chunk equals its
/// position in the index's chunk collection.
pub type ChunkId = u32;

/// Reserved chunk id denoting "no chunk"
///
/// The number of chunks in an index must stay strictly below this value;
/// exceeding it is a fatal [`IndexError::ChunkLimitExceeded`].
pub const CHUNK_ID_MAX: ChunkId = ChunkId::MAX;

/// Key uniquely identifying a sequence across the whole indexed file
///
/// A key has two components: the id of the sample group (`sequence`) and an
/// optional sub-sequence id (`sample`) for records that decompose into
/// sub-units. Keys are either read from the input (numeric or symbolic id
/// column) or synthesized from the line position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    /// Sample-group identifier, unique across the file
    pub sequence: u64,
    /// Sub-sequence identifier within the sample group
    pub sample: u32,
}
impl SequenceKey {
    /// Creates a key for a whole sample group (sub-sequence id zero)
    #[must_use]
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            sample: 0,
        }
    }
}

/// Sequence metadata that allows locating a sequence in the indexed file
///
/// A descriptor is constructed with its key and sample count only. The byte
/// size and the chunk-relative offset are filled in exactly once by
/// [`Index::add_sequence`] when the sequence is placed into a chunk; after
/// that point the descriptor is immutable.
///
/// # Examples
///
/// ```rust
/// use seqindex::{SequenceDescriptor, SequenceKey};
///
/// let descriptor = SequenceDescriptor::new(SequenceKey::new(42), 1);
/// assert_eq!(descriptor.key().sequence, 42);
/// assert_eq!(descriptor.number_of_samples(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceDescriptor {
    /// Sequence key, uniquely identifies the sequence
    key: SequenceKey,
    /// Number of samples in the sequence
    number_of_samples: u32,
    /// Sequence offset relative to the start of its owning chunk (in bytes)
    chunk_offset_bytes: u32,
    /// Size of the sequence in the input file (in bytes)
    byte_size: u32,
}
impl SequenceDescriptor {
    /// Creates a descriptor for a sequence with the given key and sample count
    ///
    /// The byte size and chunk offset start at zero and are assigned by the
    /// index when the sequence is added.
    #[must_use]
    pub fn new(key: SequenceKey, number_of_samples: u32) -> Self {
        Self {
            key,
            number_of_samples,
            chunk_offset_bytes: 0,
            byte_size: 0,
        }
    }

    /// Returns the sequence key
    #[must_use]
    pub fn key(&self) -> SequenceKey {
        self.key
    }

    /// Returns the number of samples in the sequence
    #[must_use]
    pub fn number_of_samples(&self) -> u32 {
        self.number_of_samples
    }

    /// Returns the byte offset of the sequence relative to the start of its
    /// owning chunk
    #[must_use]
    pub fn offset_in_chunk(&self) -> u32 {
        self.chunk_offset_bytes
    }

    /// Returns the byte size of the sequence in the input file
    #[must_use]
    pub fn size_in_bytes(&self) -> u32 {
        self.byte_size
    }
}

/// Chunk metadata describing one contiguous byte range of the input file
///
/// A chunk groups consecutive sequences up to the index's configured size
/// cap and is the unit of bulk retrieval for downstream readers. Chunks are
/// created empty and appended to monotonically by the owning [`Index`];
/// once a later chunk has been opened, an earlier chunk is never touched
/// again.
#[derive(Debug)]
pub struct ChunkDescriptor {
    /// Position of the chunk in the index's chunk collection
    id: ChunkId,
    /// File byte offset where the chunk begins
    offset: u64,
    /// Running total of constituent sequence byte sizes
    byte_size: u64,
    /// Running total of sequences in the chunk
    number_of_sequences: u64,
    /// Running total of samples in the chunk
    number_of_samples: u64,
    /// Sequence descriptors in file order
    sequences: Vec<SequenceDescriptor>,
    /// Cumulative sample count before each sequence began
    ///
    /// Only filled in when the index tracks first samples. Parallel to
    /// `sequences`, this locates the sequence owning a given global sample
    /// index without rescanning.
    first_samples: Vec<u64>,
}
impl ChunkDescriptor {
    fn new(id: ChunkId, offset: u64) -> Self {
        Self {
            id,
            offset,
            byte_size: 0,
            number_of_sequences: 0,
            number_of_samples: 0,
            sequences: Vec::new(),
            first_samples: Vec::new(),
        }
    }

    /// Returns the chunk id
    #[must_use]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Returns the file byte offset where the chunk begins
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the total byte size of the chunk
    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        self.byte_size
    }

    /// Returns the number of sequences in the chunk
    #[must_use]
    pub fn number_of_sequences(&self) -> u64 {
        self.number_of_sequences
    }

    /// Returns the number of samples in the chunk
    #[must_use]
    pub fn number_of_samples(&self) -> u64 {
        self.number_of_samples
    }

    /// Returns the sequence descriptors of the chunk, in file order
    #[must_use]
    pub fn sequences(&self) -> &[SequenceDescriptor] {
        &self.sequences
    }

    /// Returns the cumulative sample count before each sequence began
    ///
    /// Empty unless the index was configured to track first samples.
    #[must_use]
    pub fn first_samples(&self) -> &[u64] {
        &self.first_samples
    }
}

/// Location of a sequence inside an [`Index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLocation {
    /// Id of the chunk holding the sequence
    pub chunk_id: ChunkId,
    /// Position of the sequence within that chunk
    pub position: u32,
}

/// A collection of chunk descriptors, each containing a collection of
/// sequence descriptors for the corresponding chunk of the input data
///
/// The index owns the chunk-size-bounding policy: sequences are appended to
/// the last chunk until its byte size would exceed the configured cap, at
/// which point the chunk is sealed and a new one opened. For a non-primary
/// index it also stores a mapping from sequence key to sequence location,
/// enabling random lookup by key; a primary index is scanned sequentially
/// by position and skips that bookkeeping.
///
/// An `Index` is deliberately not `Clone`: it has a single authoritative
/// owner while it is being written and is treated as an immutable snapshot
/// once the build completes.
///
/// # Examples
///
/// ```rust
/// use seqindex::{Index, SequenceDescriptor, SequenceKey};
///
/// let mut index = Index::new(1024, false, false);
/// index.reserve(2048);
///
/// let descriptor = SequenceDescriptor::new(SequenceKey::new(7), 1);
/// index.add_sequence(descriptor, 0, 128).unwrap();
///
/// assert_eq!(index.chunks().len(), 1);
/// assert_eq!(index.locate(7).unwrap().chunk_id, 0);
/// ```
#[derive(Debug)]
pub struct Index {
    /// Chunk descriptors, append-only, id equals position
    chunks: Vec<ChunkDescriptor>,
    /// Sequence key -> sequence location, maintained only for a non-primary index
    key_to_sequence_in_chunk: HashMap<u64, SequenceLocation>,
    /// Maximum chunk size in bytes
    max_chunk_size: u64,
    /// Index for a primary deserializer
    primary: bool,
    /// Whether to record the first-sample offset of each sequence
    track_first_samples: bool,
}
impl Index {
    /// Creates an empty index
    ///
    /// # Parameters
    ///
    /// * `chunk_size` - Maximum chunk size in bytes
    /// * `primary` - Whether the index serves a primary deserializer (and
    ///   therefore needs no key-based lookup)
    /// * `track_first_samples` - Whether to record, per sequence, the
    ///   cumulative sample count at which it begins
    #[must_use]
    pub fn new(chunk_size: u64, primary: bool, track_first_samples: bool) -> Self {
        Self {
            chunks: Vec::new(),
            key_to_sequence_in_chunk: HashMap::new(),
            max_chunk_size: chunk_size,
            primary,
            track_first_samples,
        }
    }

    /// Pre-sizes the chunk collection for the specified number of input
    /// bytes and seeds the initial empty chunk
    ///
    /// Must be called exactly once before any [`add_sequence`](Self::add_sequence)
    /// call.
    pub fn reserve(&mut self, size_in_bytes: u64) {
        debug_assert!(self.chunks.is_empty(), "reserve must only be called once");
        if self.max_chunk_size > 0 {
            let hint = size_in_bytes.div_ceil(self.max_chunk_size);
            self.chunks.reserve(hint as usize);
        }
        self.chunks.push(ChunkDescriptor::new(0, 0));
    }

    /// Adds sequence metadata to the index
    ///
    /// Assigns the sequence to the current (last) chunk, opening a new chunk
    /// first when the current one is non-empty and would exceed the maximum
    /// chunk size. A sequence larger than the cap is still admitted alone
    /// into an empty chunk rather than rejected.
    ///
    /// # Parameters
    ///
    /// * `descriptor` - The sequence's key and sample count
    /// * `start_offset` - Absolute file offset where the sequence begins
    /// * `end_offset` - Absolute file offset one past the sequence's last byte
    ///
    /// # Errors
    ///
    /// * [`IndexError::SequenceSizeOverflow`] - The byte span does not fit in 32 bits
    /// * [`IndexError::ChunkLimitExceeded`] - No more chunk ids are representable
    /// * [`IndexError::PositionOverflow`] - The chunk's sequence count does not fit in 32 bits
    /// * [`IndexError::ChunkOffsetOverflow`] - The chunk-relative offset does not fit in 32 bits
    ///
    /// # Panics
    ///
    /// Panics if [`reserve`](Self::reserve) has not been called.
    pub fn add_sequence(
        &mut self,
        mut descriptor: SequenceDescriptor,
        start_offset: u64,
        end_offset: u64,
    ) -> Result<()> {
        debug_assert!(end_offset >= start_offset);
        let byte_size = u32::try_from(end_offset - start_offset)
            .map_err(|_| IndexError::SequenceSizeOverflow(end_offset - start_offset))?;

        assert!(
            !self.chunks.is_empty(),
            "Index::reserve must be called before add_sequence"
        );
        let mut current = self.chunks.len() - 1;
        if self.chunks[current].byte_size > 0
            && self.chunks[current].byte_size + u64::from(byte_size) > self.max_chunk_size
        {
            // Seal the current chunk and open a new one right after it.
            let id = ChunkId::try_from(self.chunks.len())
                .ok()
                .filter(|&id| id < CHUNK_ID_MAX)
                .ok_or(IndexError::ChunkLimitExceeded(self.chunks.len()))?;
            let offset = self.chunks[current].offset + self.chunks[current].byte_size;
            self.chunks[current].sequences.shrink_to_fit();
            self.chunks.push(ChunkDescriptor::new(id, offset));
            current += 1;
        }
        let chunk = &mut self.chunks[current];

        if self.track_first_samples {
            chunk.first_samples.push(chunk.number_of_samples);
        }
        chunk.byte_size += u64::from(byte_size);
        chunk.number_of_sequences += 1;
        chunk.number_of_samples += u64::from(descriptor.number_of_samples);
        if !self.primary {
            let position = u32::try_from(chunk.sequences.len())
                .map_err(|_| IndexError::PositionOverflow(chunk.id))?;
            self.key_to_sequence_in_chunk.insert(
                descriptor.key.sequence,
                SequenceLocation {
                    chunk_id: chunk.id,
                    position,
                },
            );
        }

        debug_assert!(start_offset >= chunk.offset);
        descriptor.chunk_offset_bytes = u32::try_from(start_offset - chunk.offset)
            .map_err(|_| IndexError::ChunkOffsetOverflow(start_offset - chunk.offset))?;
        descriptor.byte_size = byte_size;
        chunk.sequences.push(descriptor);
        Ok(())
    }

    /// Checks if the index is empty (no chunks, [`reserve`](Self::reserve)
    /// never called)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns the chunk descriptors in file order
    #[must_use]
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    /// Returns the last chunk of the index, if any
    #[must_use]
    pub fn last_chunk(&self) -> Option<&ChunkDescriptor> {
        self.chunks.last()
    }

    /// Looks up the location of a sequence by its sample-group id
    ///
    /// Always `None` for a primary index, which does not maintain the key
    /// map.
    #[must_use]
    pub fn locate(&self, sequence_id: u64) -> Option<SequenceLocation> {
        self.key_to_sequence_in_chunk.get(&sequence_id).copied()
    }

    /// Dereferences a [`SequenceLocation`] into its sequence descriptor
    #[must_use]
    pub fn sequence(&self, location: SequenceLocation) -> Option<&SequenceDescriptor> {
        self.chunks
            .get(location.chunk_id as usize)?
            .sequences
            .get(location.position as usize)
    }

    /// Returns the total number of sequences across all chunks
    #[must_use]
    pub fn num_sequences(&self) -> u64 {
        self.chunks.iter().map(|c| c.number_of_sequences).sum()
    }

    /// Returns the total number of samples across all chunks
    #[must_use]
    pub fn num_samples(&self) -> u64 {
        self.chunks.iter().map(|c| c.number_of_samples).sum()
    }

    /// Returns the configured maximum chunk size in bytes
    #[must_use]
    pub fn max_chunk_size(&self) -> u64 {
        self.max_chunk_size
    }

    /// True when the index serves a primary deserializer
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Prints a tab-separated table of the chunks to stdout
    pub fn pprint(&self) {
        self.chunks.iter().for_each(|chunk| {
            println!(
                "{}\t{}\t{}\t{}\t{}",
                chunk.id,
                chunk.offset,
                chunk.byte_size,
                chunk.number_of_sequences,
                chunk.number_of_samples
            );
        });
    }
}
