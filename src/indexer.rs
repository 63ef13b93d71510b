//! # Index construction
//!
//! [`Indexer`] drives a single pass over a block-compressed alignment file:
//! blocks are decompressed in order, the header is parsed, and the position of
//! every record is fed to the index builder. Nothing is retained from a record
//! after its position has been recorded, so memory use grows with the size of
//! the index rather than the size of the file.
//!
//! ```rust,no_run
//! use bamdex::IndexerBuilder;
//!
//! let indexer = IndexerBuilder::default()
//!     .verify_checksums(false)
//!     .allow_unplaced(true)
//!     .build();
//! let index = indexer.index_path("alignments.bam").unwrap();
//! println!("{} references, {} unplaced records", index.len(), index.unplaced_records());
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;

use crate::bam::{read_header, PositionScanner};
use crate::bgzf::{BgzfReader, BlockCursor, BlockSource};
use crate::error::{ReadError, Result};
use crate::index::{Index, IndexBuilder};

/// Builds an index from a block source with the default configuration
///
/// # Errors
///
/// Any failure while decompressing blocks, parsing the header, decoding a
/// record, or assembling the index aborts the build. No partial index is
/// returned.
pub fn build_index<S: BlockSource>(source: S) -> Result<Index> {
    Indexer::default().index(source)
}

/// Configured index construction
///
/// Use [`IndexerBuilder`] to change the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indexer {
    verify_checksums: bool,
    allow_unplaced: bool,
    compact: bool,
}
impl Default for Indexer {
    fn default() -> Self {
        IndexerBuilder::default().build()
    }
}
impl Indexer {
    /// Builds an index from an already configured block source
    ///
    /// The checksum setting does not apply here: the source decides whether
    /// it verifies its blocks.
    ///
    /// # Errors
    ///
    /// * `HeaderError` - If the header is malformed or truncated
    /// * `ReadError` - If a record is truncated or malformed
    /// * `BlockError` - If a block cannot be decompressed
    /// * `IndexError` - If records are not grouped by reference
    pub fn index<S: BlockSource>(&self, source: S) -> Result<Index> {
        let mut cursor = BlockCursor::new(source);
        let (header, first_record) = read_header(&mut cursor)?;
        log::debug!(
            "Read header with {} references, first record at {first_record}",
            header.n_references()
        );

        let n_references = header.n_references();
        let mut builder = IndexBuilder::new(header)
            .allow_unplaced(self.allow_unplaced)
            .compact(self.compact);
        for record in PositionScanner::new(&mut cursor, n_references) {
            builder.push(&record?)?;
        }
        Ok(builder.finish(cursor.end_offset()))
    }

    /// Builds an index from a compressed byte stream
    ///
    /// # Errors
    ///
    /// See [`Indexer::index`]. I/O errors of the reader are also propagated.
    pub fn index_reader<R: Read>(&self, reader: R) -> Result<Index> {
        self.index(BgzfReader::with_checksums(reader, self.verify_checksums))
    }

    /// Builds an index from a file on disk
    ///
    /// The file is memory-mapped and indexed in place.
    ///
    /// # Errors
    ///
    /// * `ReadError::InvalidFileType` - If the path does not name a regular file
    /// * I/O errors if the file cannot be opened or mapped
    /// * Any error of [`Indexer::index`]
    pub fn index_path<P: AsRef<Path>>(&self, path: P) -> Result<Index> {
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::InvalidFileType.into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        self.index_reader(&mmap[..])
    }
}

/// A builder for [`Indexer`]
///
/// All settings are optional:
///
/// * `verify_checksums` - Validate the CRC32 of every block (default: true)
/// * `allow_unplaced` - Accept a trailing run of records without a reference
///   (default: false)
/// * `compact` - Merge adjacent chunks within each bin (default: true)
///
/// # Examples
///
/// ```rust
/// use bamdex::IndexerBuilder;
///
/// let indexer = IndexerBuilder::default()
///     .compact(false)
///     .build();
/// ```
#[derive(Default)]
pub struct IndexerBuilder {
    verify_checksums: Option<bool>,
    allow_unplaced: Option<bool>,
    compact: Option<bool>,
}
impl IndexerBuilder {
    /// Sets whether the CRC32 of every decompressed block is validated
    ///
    /// Applies to [`Indexer::index_reader`] and [`Indexer::index_path`].
    #[must_use]
    pub fn verify_checksums(mut self, verify_checksums: bool) -> Self {
        self.verify_checksums = Some(verify_checksums);
        self
    }

    /// Sets whether records with reference id -1 are accepted
    ///
    /// When accepted, unplaced records must form the tail of the file. They
    /// are counted but not indexed.
    #[must_use]
    pub fn allow_unplaced(mut self, allow_unplaced: bool) -> Self {
        self.allow_unplaced = Some(allow_unplaced);
        self
    }

    /// Sets whether adjacent chunks of a bin are merged
    #[must_use]
    pub fn compact(mut self, compact: bool) -> Self {
        self.compact = Some(compact);
        self
    }

    #[must_use]
    pub fn build(self) -> Indexer {
        Indexer {
            verify_checksums: self.verify_checksums.unwrap_or(true),
            allow_unplaced: self.allow_unplaced.unwrap_or(false),
            compact: self.compact.unwrap_or(true),
        }
    }
}
