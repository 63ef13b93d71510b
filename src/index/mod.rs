//! # Region index
//!
//! An [`Index`] holds one [`ReferenceIndex`] per reference sequence of the
//! indexed file. Each reference index combines two structures:
//!
//! * **Bins**: every record is assigned to the smallest bin of the hierarchical
//!   scheme in [`binning`](crate::binning) that contains it, and each bin keeps
//!   the [`Chunk`]s of the file that hold its records.
//! * **Linear index**: one slot per 16 Kbp window, holding the offset of the
//!   first record that starts in that window.
//!
//! A region query collects the chunks of every bin that may overlap the region.
//! Callers scan those chunks and drop records outside the region themselves;
//! the linear index can be used to skip the leading part of the first chunk.
//!
//! ```rust,no_run
//! use bamdex::Indexer;
//!
//! let index = Indexer::default().index_path("alignments.bam").unwrap();
//! let ref_id = index.reference_id("chr1").unwrap();
//!
//! let chunks = index.chunks_overlapping(ref_id, 1_000_000, 1_001_000);
//! let floor = index.linear_offset(ref_id, 1_000_000);
//! for chunk in chunks {
//!     let start = floor.map_or(chunk.start, |f| f.max(chunk.start));
//!     println!("scan {start} .. {}", chunk.end);
//! }
//! ```

mod builder;

pub use builder::compact_chunks;
pub(crate) use builder::IndexBuilder;

use crate::bam::AlignmentHeader;
use crate::binning::{bins_overlapping, window_for};
use crate::VirtualOffset;

/// A half-open range `[start, end)` of virtual offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Virtual offset of the first byte of the chunk
    pub start: VirtualOffset,
    /// Virtual offset one past the last byte of the chunk
    pub end: VirtualOffset,
}
impl Chunk {
    #[must_use]
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Self { start, end }
    }

    /// Whether the chunk covers `offset`
    #[must_use]
    pub fn contains(&self, offset: VirtualOffset) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A bin of the hierarchical scheme and the chunks holding its records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    id: u32,
    chunks: Vec<Chunk>,
}
impl Bin {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            chunks: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Chunks in ascending start order
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub(crate) fn add_chunk(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    pub(crate) fn chunks_mut(&mut self) -> &mut Vec<Chunk> {
        &mut self.chunks
    }
}

/// Summary of the records indexed on one reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMetadata {
    /// Virtual offset of the first record on the reference
    pub start: VirtualOffset,
    /// Virtual offset one past the last record on the reference
    pub end: VirtualOffset,
    /// Number of records indexed on the reference
    pub n_records: u64,
}

/// Bins and linear index of a single reference sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    /// Bins sorted by id
    bins: Vec<Bin>,

    /// One slot per 16 Kbp window
    linear_index: Vec<Option<VirtualOffset>>,

    /// `None` when no record was indexed on the reference
    metadata: Option<ReferenceMetadata>,
}
impl ReferenceIndex {
    pub(crate) fn new(
        bins: Vec<Bin>,
        linear_index: Vec<Option<VirtualOffset>>,
        metadata: Option<ReferenceMetadata>,
    ) -> Self {
        Self {
            bins,
            linear_index,
            metadata,
        }
    }

    /// Bins sorted by id
    #[must_use]
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Looks up a bin by id
    #[must_use]
    pub fn bin(&self, id: u32) -> Option<&Bin> {
        self.bins
            .binary_search_by_key(&id, Bin::id)
            .ok()
            .map(|i| &self.bins[i])
    }

    #[must_use]
    pub fn linear_index(&self) -> &[Option<VirtualOffset>] {
        &self.linear_index
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&ReferenceMetadata> {
        self.metadata.as_ref()
    }

    /// Whether no record was indexed on this reference
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Total number of chunks over all bins
    #[must_use]
    pub fn n_chunks(&self) -> usize {
        self.bins.iter().map(|b| b.chunks.len()).sum()
    }

    /// Chunks of every bin that may overlap `[start, end)`, sorted by start
    #[must_use]
    pub fn chunks_overlapping(&self, start: u32, end: u32) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = bins_overlapping(start, end)
            .into_iter()
            .filter_map(|id| self.bin(id))
            .flat_map(|bin| bin.chunks.iter().copied())
            .collect();
        chunks.sort_by_key(|chunk| chunk.start);
        chunks
    }

    /// Linear index entry for the window holding `position`
    #[must_use]
    pub fn linear_offset(&self, position: u32) -> Option<VirtualOffset> {
        self.linear_index
            .get(window_for(position))
            .copied()
            .flatten()
    }
}

/// A region index over every reference sequence of one file
///
/// The index is immutable once built and can be shared between threads and
/// queried concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    /// Header of the indexed file, reference dictionary included
    header: AlignmentHeader,

    /// One entry per declared reference, in declaration order
    references: Vec<ReferenceIndex>,

    /// Number of records without a reference
    unplaced_records: u64,
}
impl Index {
    pub(crate) fn new(
        header: AlignmentHeader,
        references: Vec<ReferenceIndex>,
        unplaced_records: u64,
    ) -> Self {
        Self {
            header,
            references,
            unplaced_records,
        }
    }

    #[must_use]
    pub fn header(&self) -> &AlignmentHeader {
        &self.header
    }

    /// Per-reference indexes in declaration order
    #[must_use]
    pub fn references(&self) -> &[ReferenceIndex] {
        &self.references
    }

    #[must_use]
    pub fn reference(&self, ref_id: usize) -> Option<&ReferenceIndex> {
        self.references.get(ref_id)
    }

    /// Number of reference sequences covered by the index
    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Translates a reference name into its id
    #[must_use]
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.header.reference_id(name)
    }

    /// Number of unplaced records seen during construction
    #[must_use]
    pub fn unplaced_records(&self) -> u64 {
        self.unplaced_records
    }

    /// Total number of records indexed on any reference
    #[must_use]
    pub fn n_records(&self) -> u64 {
        self.references
            .iter()
            .filter_map(ReferenceIndex::metadata)
            .map(|m| m.n_records)
            .sum()
    }

    /// Chunks that may hold records overlapping `[start, end)` on `ref_id`
    ///
    /// The chunks are sorted by start offset and may overlap each other. An
    /// unknown reference or an empty interval yields no chunks.
    #[must_use]
    pub fn chunks_overlapping(&self, ref_id: usize, start: u32, end: u32) -> Vec<Chunk> {
        self.reference(ref_id)
            .map(|reference| reference.chunks_overlapping(start, end))
            .unwrap_or_default()
    }

    /// Offset of the first record starting in the window that holds `position`
    ///
    /// Returns `None` for an unknown reference, a window past the end of the
    /// linear index, or a window in which no record starts.
    #[must_use]
    pub fn linear_offset(&self, ref_id: usize, position: u32) -> Option<VirtualOffset> {
        self.reference(ref_id)?.linear_offset(position)
    }
}
