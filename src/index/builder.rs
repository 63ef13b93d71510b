use std::collections::BTreeMap;

use super::{Bin, Chunk, Index, ReferenceIndex, ReferenceMetadata};
use crate::bam::{AlignmentHeader, RecordPosition};
use crate::binning::{bin_for, window_for};
use crate::error::{IndexError, ReadError, Result};
use crate::VirtualOffset;

/// Merges chunks whose compressed ranges touch or overlap
///
/// Chunks are sorted by start, then each chunk is folded into the previously
/// kept one while its start block does not lie past the kept chunk's end
/// block. The kept chunk's end becomes the larger of the two ends. Applying
/// the function twice yields the same result as applying it once.
///
/// # Examples
///
/// ```rust
/// use bamdex::{compact_chunks, Chunk, VirtualOffset};
///
/// let vo = VirtualOffset::new;
/// let mut chunks = vec![
///     Chunk::new(vo(0, 10), vo(0, 90)),
///     Chunk::new(vo(0, 200), vo(300, 4)),
///     Chunk::new(vo(800, 0), vo(900, 0)),
/// ];
/// compact_chunks(&mut chunks);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0], Chunk::new(vo(0, 10), vo(300, 4)));
/// ```
pub fn compact_chunks(chunks: &mut Vec<Chunk>) {
    if chunks.len() < 2 {
        return;
    }
    chunks.sort_by_key(|chunk| chunk.start);

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks.drain(..) {
        match merged.last_mut() {
            Some(last) if chunk.start.block_offset() <= last.end.block_offset() => {
                last.end = last.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }
    *chunks = merged;
}

/// Construction state of the reference currently being indexed
struct ReferenceState {
    reference_id: usize,

    /// Bins keyed by id so they come out sorted
    bins: BTreeMap<u32, Bin>,

    linear_index: Vec<Option<VirtualOffset>>,

    /// Bin of the open chunk
    current_bin: u32,

    /// Start of the open chunk
    chunk_start: VirtualOffset,

    first_offset: VirtualOffset,
    n_records: u64,
}
impl ReferenceState {
    fn new(record: &RecordPosition, reference_id: usize) -> Self {
        let mut state = Self {
            reference_id,
            bins: BTreeMap::new(),
            linear_index: Vec::new(),
            current_bin: bin_for(record.position, record.end()),
            chunk_start: record.offset,
            first_offset: record.offset,
            n_records: 0,
        };
        state.push(record);
        state
    }

    fn push(&mut self, record: &RecordPosition) {
        let window = window_for(record.position);
        if window >= self.linear_index.len() {
            self.linear_index.resize(window, None);
            self.linear_index.push(Some(record.offset));
        }

        let bin = bin_for(record.position, record.end());
        if bin != self.current_bin {
            self.close_chunk(record.offset);
            self.current_bin = bin;
            self.chunk_start = record.offset;
        }
        self.n_records += 1;
    }

    fn close_chunk(&mut self, end: VirtualOffset) {
        let id = self.current_bin;
        self.bins
            .entry(id)
            .or_insert_with(|| Bin::new(id))
            .add_chunk(Chunk::new(self.chunk_start, end));
    }

    fn finish(mut self, end: VirtualOffset, compact: bool) -> (usize, ReferenceIndex) {
        self.close_chunk(end);

        let mut bins: Vec<Bin> = self.bins.into_values().collect();
        if compact {
            for bin in &mut bins {
                compact_chunks(bin.chunks_mut());
            }
        }
        let n_chunks: usize = bins.iter().map(|b| b.chunks().len()).sum();
        log::debug!(
            "Closed reference {}: {} records, {} bins, {} chunks, {} windows",
            self.reference_id,
            self.n_records,
            bins.len(),
            n_chunks,
            self.linear_index.len()
        );

        let metadata = ReferenceMetadata {
            start: self.first_offset,
            end,
            n_records: self.n_records,
        };
        (
            self.reference_id,
            ReferenceIndex::new(bins, self.linear_index, Some(metadata)),
        )
    }
}

enum State {
    /// No record seen yet
    Empty,
    /// Records of one reference are being indexed
    Reference(ReferenceState),
    /// The trailing run of unplaced records has started
    Unplaced,
}

/// Assembles an [`Index`] from record positions in file order
///
/// Records must be grouped by reference. Per-reference state is dropped
/// entirely when the reference changes, so nothing leaks from one reference
/// into the next.
pub(crate) struct IndexBuilder {
    header: AlignmentHeader,

    /// Closed references, `None` until their records have been seen
    references: Vec<Option<ReferenceIndex>>,

    state: State,
    unplaced_records: u64,

    allow_unplaced: bool,
    compact: bool,
}
impl IndexBuilder {
    pub fn new(header: AlignmentHeader) -> Self {
        let references = vec![None; header.n_references()];
        Self {
            header,
            references,
            state: State::Empty,
            unplaced_records: 0,
            allow_unplaced: false,
            compact: true,
        }
    }

    /// Accept a trailing run of unplaced records
    pub fn allow_unplaced(mut self, allow_unplaced: bool) -> Self {
        self.allow_unplaced = allow_unplaced;
        self
    }

    /// Merge adjacent chunks of each bin when a reference is closed
    pub fn compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Adds the next record in file order
    ///
    /// # Errors
    ///
    /// * `IndexError::UnsortedReference` - If the record's reference was already closed
    /// * `ReadError::InvalidReference` - If the record is unplaced and unplaced records are not allowed
    pub fn push(&mut self, record: &RecordPosition) -> Result<()> {
        let Some(id) = record.reference_id else {
            return self.push_unplaced(record);
        };

        let previous = match &mut self.state {
            State::Reference(state) if state.reference_id == id => {
                state.push(record);
                return Ok(());
            }
            State::Reference(state) => Some(state.reference_id),
            State::Unplaced => {
                return Err(IndexError::UnsortedReference {
                    previous: None,
                    found: id,
                }
                .into())
            }
            State::Empty => None,
        };
        match self.references.get(id) {
            None => {
                let ref_id = i32::try_from(id).unwrap_or(i32::MAX);
                return Err(ReadError::InvalidReference(ref_id, self.references.len()).into());
            }
            Some(Some(_)) => {
                return Err(IndexError::UnsortedReference { previous, found: id }.into());
            }
            Some(None) => {}
        }

        self.close_current(record.offset);
        self.state = State::Reference(ReferenceState::new(record, id));
        Ok(())
    }

    fn push_unplaced(&mut self, record: &RecordPosition) -> Result<()> {
        if !self.allow_unplaced {
            return Err(ReadError::InvalidReference(-1, self.references.len()).into());
        }
        if !matches!(self.state, State::Unplaced) {
            self.close_current(record.offset);
            self.state = State::Unplaced;
        }
        self.unplaced_records += 1;
        Ok(())
    }

    /// Snapshots the open reference, if any, ending its last chunk at `end`
    fn close_current(&mut self, end: VirtualOffset) {
        if let State::Reference(state) = std::mem::replace(&mut self.state, State::Empty) {
            let (id, index) = state.finish(end, self.compact);
            self.references[id] = Some(index);
        }
    }

    /// Closes the last chunk at `end` and returns the finished index
    ///
    /// References without records are present as empty entries.
    pub fn finish(mut self, end: VirtualOffset) -> Index {
        self.close_current(end);

        let references: Vec<ReferenceIndex> = self
            .references
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let n_indexed = references.iter().filter(|r| !r.is_empty()).count();
        log::debug!(
            "Built index: {} of {} references populated, {} unplaced records",
            n_indexed,
            references.len(),
            self.unplaced_records
        );
        Index::new(self.header, references, self.unplaced_records)
    }
}
