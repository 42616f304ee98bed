//! Single-pass scanning engine that builds an [`Index`] over a byte stream
//!
//! The indexer performs one sequential forward pass over the input,
//! looking only for record boundaries (newlines) and optional sequence id
//! tokens. It does almost no parsing and is therefore several magnitudes
//! faster than a full deserialization pass; the resulting [`Index`] lets a
//! downstream reader fetch any chunk or sequence with a single ranged read.
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use seqindex::{Indexer, NumericCorpus};
//!
//! let input = Cursor::new(b"5|a b c\n7|d e f\n".to_vec());
//! let mut indexer = Indexer::new(input);
//! indexer.build(&NumericCorpus).unwrap();
//!
//! assert!(indexer.has_sequence_ids());
//! assert_eq!(indexer.index().num_sequences(), 2);
//! ```

use std::io::{Read, Seek, SeekFrom};

use memchr::memchr;

use crate::corpus::CorpusDescriptor;
use crate::error::{Result, ScanError};
use crate::index::{Index, SequenceDescriptor, SequenceKey};

/// Default maximum chunk size (32 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024 * 1024;
/// Default read buffer size (2 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;
/// Default delimiter separating a sequence id token from the record content
pub const DEFAULT_STREAM_PREFIX: u8 = b'|';

/// Record terminator
const ROW_DELIMITER: u8 = b'\n';
/// UTF-8 byte-order mark, skipped during id detection
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// A builder for creating configured [`Indexer`] instances
///
/// All settings are optional; an unset option falls back to its default.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use seqindex::IndexerBuilder;
///
/// let input = Cursor::new(b"|a b c\n".to_vec());
/// let indexer = IndexerBuilder::default()
///     .primary(true)
///     .chunk_size(1024)
///     .buffer_size(4096)
///     .build(input);
/// ```
#[derive(Default)]
pub struct IndexerBuilder {
    /// Whether the index serves a primary deserializer
    primary: Option<bool>,
    /// Whether to ignore sequence id columns in the input
    skip_sequence_ids: Option<bool>,
    /// Delimiter between the sequence id token and the record content
    stream_prefix: Option<u8>,
    /// Maximum chunk size in bytes
    chunk_size: Option<u64>,
    /// Read buffer size in bytes
    buffer_size: Option<usize>,
    /// Whether to record per-sequence first-sample offsets
    track_first_samples: Option<bool>,
}
impl IndexerBuilder {
    /// Marks the index as serving a primary deserializer
    ///
    /// A primary index is scanned sequentially by position and skips the
    /// key-to-location map. Defaults to `false`.
    #[must_use]
    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Forces synthetic line-position keys even when the input carries an
    /// id column. Defaults to `false`.
    #[must_use]
    pub fn skip_sequence_ids(mut self, skip: bool) -> Self {
        self.skip_sequence_ids = Some(skip);
        self
    }

    /// Sets the delimiter separating a sequence id token from the record
    /// content. Defaults to `b'|'`.
    #[must_use]
    pub fn stream_prefix(mut self, prefix: u8) -> Self {
        self.stream_prefix = Some(prefix);
        self
    }

    /// Sets the maximum chunk size in bytes. Defaults to 32 MiB.
    #[must_use]
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    /// Sets the read buffer size in bytes. Defaults to 2 MiB.
    #[must_use]
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = Some(bytes);
        self
    }

    /// Records, per sequence, the cumulative sample count at which it
    /// begins. Defaults to `false`.
    #[must_use]
    pub fn track_first_samples(mut self, track: bool) -> Self {
        self.track_first_samples = Some(track);
        self
    }

    /// Builds the configured [`Indexer`] over the given stream
    pub fn build<R>(self, inner: R) -> Indexer<R> {
        let skip_sequence_ids = self.skip_sequence_ids.unwrap_or(false);
        Indexer {
            inner,
            buffer: vec![0; self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)],
            filled: 0,
            pos: 0,
            offset_start: 0,
            offset_end: 0,
            done: false,
            has_sequence_ids: !skip_sequence_ids,
            skip_sequence_ids,
            stream_prefix: self.stream_prefix.unwrap_or(DEFAULT_STREAM_PREFIX),
            index: Index::new(
                self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
                self.primary.unwrap_or(false),
                self.track_first_samples.unwrap_or(false),
            ),
        }
    }
}

/// A helper that does one pass over the input stream building an index of
/// sequence and chunk descriptors
///
/// One instance indexes one stream: after [`build`](Self::build) completes
/// the index is retained and exposed read-only; the indexer is not reusable
/// for a second scan.
///
/// All offsets handed to the index are absolute file positions, never
/// buffer positions, so nothing downstream ever observes the lifetime of
/// the internal read buffer.
pub struct Indexer<R> {
    inner: R,

    /// Read buffer, overwritten wholesale on every refill
    buffer: Vec<u8>,
    /// Number of valid bytes in the buffer
    filled: usize,
    /// Scan position within the valid region
    pos: usize,
    /// File offset of the first buffered byte
    offset_start: u64,
    /// File offset one past the last buffered byte
    offset_end: u64,

    /// True when all input has been consumed
    done: bool,
    /// True when the input carries explicit sequence ids that were not ignored
    has_sequence_ids: bool,
    skip_sequence_ids: bool,
    stream_prefix: u8,

    /// The index under construction
    index: Index,
}

impl<R> Indexer<R> {
    /// Creates an indexer over `inner` with all options at their defaults
    pub fn new(inner: R) -> Self {
        IndexerBuilder::default().build(inner)
    }

    /// Returns the built index (chunk and sequence metadata)
    ///
    /// Only meaningful after [`build`](Self::build) has completed
    /// successfully.
    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Consumes the indexer and returns the built index
    #[must_use]
    pub fn into_index(self) -> Index {
        self.index
    }

    /// True when the input carries a sequence id column and it was not
    /// ignored during indexing
    #[must_use]
    pub fn has_sequence_ids(&self) -> bool {
        self.has_sequence_ids
    }

    /// Current absolute offset in the input (in bytes)
    fn file_offset(&self) -> u64 {
        self.offset_start + self.pos as u64
    }
}

impl<R: Read + Seek> Indexer<R> {
    /// Reads the input stream, building an index of chunks and the
    /// sequences they contain
    ///
    /// The scan mode is decided up front: when id columns are ignored or
    /// the first significant byte is the stream prefix, every line becomes
    /// its own sequence keyed by line position. Otherwise each line is
    /// expected to start with an id token (numeric or symbolic, resolved
    /// through `corpus`), and consecutive lines sharing an id are folded
    /// into a single multi-sample sequence.
    ///
    /// Calling `build` again after a successful pass is a no-op.
    ///
    /// # Errors
    ///
    /// Any [`ScanError`] or [`IndexError`](crate::IndexError) aborts the
    /// whole pass; no partial index is usable afterwards.
    pub fn build<C: CorpusDescriptor>(&mut self, corpus: &C) -> Result<()> {
        if !self.index.is_empty() {
            return Ok(());
        }
        let size = self.stream_len()?;
        self.index.reserve(size);

        self.refill()?;
        if self.done {
            return Err(ScanError::EmptyInput.into());
        }

        // A byte-order mark is invisible to id detection but stays inside
        // the first sequence's byte range, so chunk accounting covers every
        // byte of the input.
        let origin = self.file_offset();
        if self.buffer[..self.filled].starts_with(&UTF8_BOM) {
            self.pos += UTF8_BOM.len();
            if self.pos == self.filled {
                self.refill()?;
            }
        }
        if self.done {
            // nothing but a byte-order mark
            return Ok(());
        }

        if self.skip_sequence_ids || self.buffer[self.pos] == self.stream_prefix {
            // no id column; treat lines as individual sequences
            return self.build_from_lines(origin);
        }

        let mut sequence_start = origin;
        let Some(mut current_id) = self.try_get_sequence_id(corpus)? else {
            return self.build_from_lines(origin);
        };
        let mut number_of_samples: u32 = 0;
        while !self.done {
            self.skip_line()?;
            let offset = self.file_offset();
            number_of_samples += 1;
            if self.done {
                break;
            }
            if let Some(id) = self.try_get_sequence_id(corpus)? {
                if id != current_id {
                    // a new sequence starts [offset] bytes into the file
                    let descriptor =
                        SequenceDescriptor::new(SequenceKey::new(current_id), number_of_samples);
                    self.index.add_sequence(descriptor, sequence_start, offset)?;
                    current_id = id;
                    sequence_start = offset;
                    number_of_samples = 0;
                }
            }
        }
        let descriptor = SequenceDescriptor::new(SequenceKey::new(current_id), number_of_samples);
        self.index
            .add_sequence(descriptor, sequence_start, self.offset_end)?;
        Ok(())
    }

    /// Builds the index treating each line as an individual sequence, using
    /// the line number as the sequence id
    fn build_from_lines(&mut self, mut offset: u64) -> Result<()> {
        self.has_sequence_ids = false;
        let mut line: u64 = 0;
        while !self.done {
            match memchr(ROW_DELIMITER, &self.buffer[self.pos..self.filled]) {
                Some(found) => {
                    self.pos += found;
                    let end = self.file_offset() + 1;
                    let descriptor = SequenceDescriptor::new(SequenceKey::new(line), 1);
                    self.index.add_sequence(descriptor, offset, end)?;
                    offset = end;
                    line += 1;
                    self.pos += 1;
                }
                None => {
                    self.pos = self.filled;
                    self.refill()?;
                }
            }
        }
        if offset < self.offset_end {
            // last line has no trailing newline
            let descriptor = SequenceDescriptor::new(SequenceKey::new(line), 1);
            self.index.add_sequence(descriptor, offset, self.offset_end)?;
        }
        Ok(())
    }

    fn try_get_sequence_id<C: CorpusDescriptor>(&mut self, corpus: &C) -> Result<Option<u64>> {
        if corpus.numeric_sequence_keys() {
            self.try_get_numeric_sequence_id()
        } else {
            self.try_get_symbolic_sequence_id(corpus)
        }
    }

    /// Tries to read a numeric sequence id terminated by the stream prefix
    ///
    /// Returns `None` when no digits precede the prefix (no id on this
    /// line). A non-digit before the prefix, including the end of the line,
    /// is a [`ScanError::MalformedIdentifier`]; hitting the end of the
    /// input first is a [`ScanError::UnexpectedEndOfInput`].
    fn try_get_numeric_sequence_id(&mut self) -> Result<Option<u64>> {
        let mut found = false;
        let mut id: u64 = 0;
        while !self.done {
            while self.pos < self.filled {
                let c = self.buffer[self.pos];
                if c == self.stream_prefix {
                    return Ok(found.then_some(id));
                }
                if !c.is_ascii_digit() {
                    return Err(ScanError::MalformedIdentifier {
                        found: c as char,
                        offset: self.file_offset(),
                    }
                    .into());
                }
                id = id
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u64::from(c - b'0')))
                    .ok_or(ScanError::IdentifierOverflow(self.file_offset()))?;
                found = true;
                self.pos += 1;
            }
            self.refill()?;
        }
        Err(ScanError::UnexpectedEndOfInput(self.file_offset()).into())
    }

    /// Same as [`try_get_numeric_sequence_id`](Self::try_get_numeric_sequence_id)
    /// but for symbolic ids, resolved to numeric ids through the corpus
    fn try_get_symbolic_sequence_id<C: CorpusDescriptor>(
        &mut self,
        corpus: &C,
    ) -> Result<Option<u64>> {
        let mut token: Vec<u8> = Vec::new();
        while !self.done {
            while self.pos < self.filled {
                let c = self.buffer[self.pos];
                if c == self.stream_prefix {
                    if token.is_empty() {
                        return Ok(None);
                    }
                    let key = std::str::from_utf8(&token)?;
                    return Ok(Some(corpus.key_to_id(key)?));
                }
                if c == ROW_DELIMITER {
                    return Err(ScanError::MalformedIdentifier {
                        found: c as char,
                        offset: self.file_offset(),
                    }
                    .into());
                }
                token.push(c);
                self.pos += 1;
            }
            self.refill()?;
        }
        Err(ScanError::UnexpectedEndOfInput(self.file_offset()).into())
    }

    /// Moves the scan position to the beginning of the next line
    fn skip_line(&mut self) -> Result<()> {
        while !self.done {
            match memchr(ROW_DELIMITER, &self.buffer[self.pos..self.filled]) {
                Some(found) => {
                    self.pos += found + 1;
                    if self.pos == self.filled {
                        self.refill()?;
                    }
                    return Ok(());
                }
                None => {
                    self.pos = self.filled;
                    self.refill()?;
                }
            }
        }
        Ok(())
    }

    /// Fills the buffer with the next block of input, overwriting all
    /// previously buffered data
    fn refill(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        debug_assert_eq!(self.pos, self.filled, "refill discards unread bytes");
        let mut read = 0;
        while read < self.buffer.len() {
            let n = self.inner.read(&mut self.buffer[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        if read == 0 {
            self.done = true;
        } else {
            self.offset_start = self.offset_end;
            self.offset_end += read as u64;
            self.filled = read;
            self.pos = 0;
        }
        Ok(())
    }

    /// Total stream length, used as the reservation hint for the index
    fn stream_len(&mut self) -> Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.rewind()?;
        Ok(len)
    }
}

#[cfg(test)]
mod testing {
    use std::io::Cursor;

    use super::*;
    use crate::corpus::{KeyRegistry, NumericCorpus};
    use crate::error::Error;

    fn indexer_for(input: &[u8]) -> Indexer<Cursor<Vec<u8>>> {
        Indexer::new(Cursor::new(input.to_vec()))
    }

    #[test]
    fn test_numeric_ids() -> Result<()> {
        let mut indexer = indexer_for(b"5|a b c\n7|d e f\n");
        indexer.build(&NumericCorpus)?;

        assert!(indexer.has_sequence_ids());
        let index = indexer.index();
        assert_eq!(index.chunks().len(), 1);
        assert_eq!(index.num_sequences(), 2);

        let chunk = &index.chunks()[0];
        assert_eq!(chunk.sequences()[0].key().sequence, 5);
        assert_eq!(chunk.sequences()[0].offset_in_chunk(), 0);
        assert_eq!(chunk.sequences()[0].size_in_bytes(), 8);
        assert_eq!(chunk.sequences()[1].key().sequence, 7);
        assert_eq!(chunk.sequences()[1].offset_in_chunk(), 8);
        assert_eq!(chunk.sequences()[1].size_in_bytes(), 8);
        Ok(())
    }

    #[test]
    fn test_lines_mode_on_leading_prefix() -> Result<()> {
        let mut indexer = indexer_for(b"|a b\n|c d\n|e f\n");
        indexer.build(&NumericCorpus)?;

        assert!(!indexer.has_sequence_ids());
        let index = indexer.index();
        assert_eq!(index.num_sequences(), 3);
        let keys: Vec<u64> = index.chunks()[0]
            .sequences()
            .iter()
            .map(|s| s.key().sequence)
            .collect();
        assert_eq!(keys, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_skip_sequence_ids_overrides_id_column() -> Result<()> {
        let input = b"5|a\n7|b\n";
        let mut indexer = IndexerBuilder::default()
            .skip_sequence_ids(true)
            .build(Cursor::new(input.to_vec()));
        indexer.build(&NumericCorpus)?;

        assert!(!indexer.has_sequence_ids());
        let index = indexer.index();
        assert_eq!(index.num_sequences(), 2);
        assert_eq!(index.chunks()[0].sequences()[0].key().sequence, 0);
        assert_eq!(index.chunks()[0].sequences()[1].key().sequence, 1);
        Ok(())
    }

    #[test]
    fn test_same_id_lines_fold_into_one_sequence() -> Result<()> {
        let mut indexer = indexer_for(b"5|a\n5|b\n7|c\n");
        indexer.build(&NumericCorpus)?;

        let index = indexer.index();
        assert_eq!(index.num_sequences(), 2);
        let chunk = &index.chunks()[0];
        assert_eq!(chunk.sequences()[0].key().sequence, 5);
        assert_eq!(chunk.sequences()[0].number_of_samples(), 2);
        assert_eq!(chunk.sequences()[0].size_in_bytes(), 8);
        assert_eq!(chunk.sequences()[1].key().sequence, 7);
        assert_eq!(chunk.sequences()[1].number_of_samples(), 1);
        Ok(())
    }

    #[test]
    fn test_line_without_id_continues_current_sequence() -> Result<()> {
        let mut indexer = indexer_for(b"5|a\n|b\n7|c\n");
        indexer.build(&NumericCorpus)?;

        let index = indexer.index();
        assert_eq!(index.num_sequences(), 2);
        let chunk = &index.chunks()[0];
        assert_eq!(chunk.sequences()[0].number_of_samples(), 2);
        assert_eq!(chunk.sequences()[0].size_in_bytes(), 7);
        assert_eq!(chunk.sequences()[1].key().sequence, 7);
        Ok(())
    }

    #[test]
    fn test_no_trailing_newline() -> Result<()> {
        let mut indexer = indexer_for(b"5|a\n7|b");
        indexer.build(&NumericCorpus)?;

        let chunk = &indexer.index().chunks()[0];
        assert_eq!(chunk.sequences()[0].size_in_bytes(), 4);
        assert_eq!(chunk.sequences()[1].size_in_bytes(), 3);
        assert_eq!(chunk.size_in_bytes(), 7);
        Ok(())
    }

    #[test]
    fn test_symbolic_ids() -> Result<()> {
        let registry = KeyRegistry::new();
        let mut indexer = indexer_for(b"foo|a b\nbar|c d\nfoo-2|e\n");
        indexer.build(&registry)?;

        assert!(indexer.has_sequence_ids());
        assert_eq!(registry.len(), 3);
        let index = indexer.index();
        let keys: Vec<u64> = index.chunks()[0]
            .sequences()
            .iter()
            .map(|s| s.key().sequence)
            .collect();
        assert_eq!(keys, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_malformed_numeric_id() {
        let mut indexer = indexer_for(b"5x|a b\n");
        let err = indexer.build(&NumericCorpus).unwrap_err();
        assert!(matches!(
            err,
            Error::ScanError(ScanError::MalformedIdentifier { found: 'x', .. })
        ));
    }

    #[test]
    fn test_id_hitting_end_of_line_is_malformed() {
        let mut indexer = indexer_for(b"5|a\n123\n7|b\n");
        let err = indexer.build(&NumericCorpus).unwrap_err();
        assert!(matches!(
            err,
            Error::ScanError(ScanError::MalformedIdentifier { found: '\n', .. })
        ));
    }

    #[test]
    fn test_eof_inside_id_token() {
        let mut indexer = indexer_for(b"5|a\n123");
        let err = indexer.build(&NumericCorpus).unwrap_err();
        assert!(matches!(
            err,
            Error::ScanError(ScanError::UnexpectedEndOfInput(7))
        ));
    }

    #[test]
    fn test_numeric_id_overflow() {
        let mut indexer = indexer_for(b"99999999999999999999999|a\n");
        let err = indexer.build(&NumericCorpus).unwrap_err();
        assert!(matches!(
            err,
            Error::ScanError(ScanError::IdentifierOverflow(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let mut indexer = indexer_for(b"");
        let err = indexer.build(&NumericCorpus).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::EmptyInput)));
    }

    #[test]
    fn test_bom_is_skipped_but_accounted() -> Result<()> {
        let mut input = Vec::new();
        input.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
        input.extend_from_slice(b"5|a\n7|b\n");
        let mut indexer = Indexer::new(Cursor::new(input));
        indexer.build(&NumericCorpus)?;

        let chunk = &indexer.index().chunks()[0];
        assert_eq!(chunk.sequences()[0].key().sequence, 5);
        // the mark belongs to the first sequence's byte range
        assert_eq!(chunk.sequences()[0].size_in_bytes(), 7);
        assert_eq!(chunk.sequences()[1].offset_in_chunk(), 7);
        assert_eq!(chunk.size_in_bytes(), 11);
        Ok(())
    }

    #[test]
    fn test_refill_across_id_and_line_boundaries() -> Result<()> {
        let input = b"12345|x y z\n67890|u v w\n12345|again\n";
        for buffer_size in [1, 2, 3, 5, 7, 64] {
            let mut indexer = IndexerBuilder::default()
                .buffer_size(buffer_size)
                .build(Cursor::new(input.to_vec()));
            indexer.build(&NumericCorpus)?;

            let index = indexer.index();
            assert_eq!(index.num_sequences(), 3, "buffer_size={buffer_size}");
            let chunk = &index.chunks()[0];
            assert_eq!(chunk.sequences()[0].key().sequence, 12345);
            assert_eq!(chunk.sequences()[1].key().sequence, 67890);
            // non-consecutive repeat of an id starts a fresh sequence
            assert_eq!(chunk.sequences()[2].key().sequence, 12345);
            assert_eq!(chunk.size_in_bytes(), input.len() as u64);
        }
        Ok(())
    }

    #[test]
    fn test_custom_stream_prefix() -> Result<()> {
        let mut indexer = IndexerBuilder::default()
            .stream_prefix(b';')
            .build(Cursor::new(b"5;a b\n7;c d\n".to_vec()));
        indexer.build(&NumericCorpus)?;

        let keys: Vec<u64> = indexer.index().chunks()[0]
            .sequences()
            .iter()
            .map(|s| s.key().sequence)
            .collect();
        assert_eq!(keys, vec![5, 7]);
        Ok(())
    }

    #[test]
    fn test_track_first_samples_through_builder() -> Result<()> {
        let mut indexer = IndexerBuilder::default()
            .track_first_samples(true)
            .build(Cursor::new(b"5|a\n5|b\n5|c\n7|d\n".to_vec()));
        indexer.build(&NumericCorpus)?;

        let chunk = indexer.index().last_chunk().unwrap();
        assert_eq!(chunk.first_samples(), &[0, 3]);
        Ok(())
    }

    #[test]
    fn test_build_twice_is_a_noop() -> Result<()> {
        let mut indexer = indexer_for(b"5|a\n7|b\n");
        indexer.build(&NumericCorpus)?;
        let sequences = indexer.index().num_sequences();
        indexer.build(&NumericCorpus)?;
        assert_eq!(indexer.index().num_sequences(), sequences);
        Ok(())
    }

    #[test]
    fn test_into_index() -> Result<()> {
        let mut indexer = indexer_for(b"5|a\n7|b\n");
        indexer.build(&NumericCorpus)?;
        let index = indexer.into_index();
        assert_eq!(index.num_sequences(), 2);
        Ok(())
    }

    #[test]
    fn test_primary_index_skips_key_map() -> Result<()> {
        let mut indexer = IndexerBuilder::default()
            .primary(true)
            .build(Cursor::new(b"5|a\n7|b\n".to_vec()));
        indexer.build(&NumericCorpus)?;

        let index = indexer.index();
        assert!(index.is_primary());
        assert_eq!(index.locate(5), None);
        assert_eq!(index.num_sequences(), 2);
        Ok(())
    }
}
