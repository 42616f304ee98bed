use crate::index::ChunkId;

/// Custom Result type for seqindex operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the seqindex library, encompassing all possible error
/// cases that can occur while building or querying an index.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors raised while assembling chunk and sequence metadata
    IndexError(#[from] IndexError),
    /// Errors raised while scanning the input stream
    ScanError(#[from] ScanError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 decoding errors on symbolic sequence keys
    Utf8Error(#[from] std::str::Utf8Error),
    /// Integer parsing errors on numeric sequence keys
    ParseIntError(#[from] std::num::ParseIntError),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to the offset and size bookkeeping of an index.
///
/// Every variant is fatal for the whole indexing pass: a partial index is
/// never usable and the caller must discard it.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// A sequence spans more bytes than the 32-bit size field can represent
    ///
    /// # Arguments
    /// * `u64` - The sequence byte size that was computed
    #[error("Sequence byte size ({0}) overflows the 32-bit size field")]
    SequenceSizeOverflow(u64),

    /// A sequence starts further into its chunk than the 32-bit offset field
    /// can represent
    ///
    /// # Arguments
    /// * `u64` - The chunk-relative offset that was computed
    #[error("Sequence offset within its chunk ({0}) overflows the 32-bit offset field")]
    ChunkOffsetOverflow(u64),

    /// Opening one more chunk would exceed the maximum representable chunk id
    ///
    /// # Arguments
    /// * `usize` - The number of chunks already present in the index
    #[error("Maximum number of chunks exceeded ({0} chunks already indexed)")]
    ChunkLimitExceeded(usize),

    /// A single chunk holds more sequences than the position field can represent
    ///
    /// # Arguments
    /// * `ChunkId` - The chunk whose sequence count overflowed
    #[error("Number of sequences in chunk {0} overflows the position field")]
    PositionOverflow(ChunkId),
}

/// Errors that can occur while scanning the input stream for record
/// boundaries and sequence id tokens.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The input stream contained no bytes at all
    #[error("Input stream is empty")]
    EmptyInput,

    /// A non-digit character was found inside a numeric sequence id, or a
    /// line ended before the id delimiter was reached
    ///
    /// # Fields
    /// * `found` - The offending character
    /// * `offset` - The byte offset in the input where it was found
    #[error("Unexpected character ({found:?}) while reading a sequence id at byte offset {offset}")]
    MalformedIdentifier { found: char, offset: u64 },

    /// A numeric sequence id token does not fit in a 64-bit integer
    ///
    /// # Arguments
    /// * `u64` - The byte offset in the input where the token overflowed
    #[error("Sequence id at byte offset {0} overflows a 64-bit integer")]
    IdentifierOverflow(u64),

    /// The input ended in the middle of a sequence id token
    ///
    /// # Arguments
    /// * `u64` - The byte offset at which the input ended
    #[error("Reached the end of the input while reading a sequence id at byte offset {0}")]
    UnexpectedEndOfInput(u64),
}
