//! # Record position scanning
//!
//! Every alignment record is stored as a little-endian `block_size` followed by
//! `block_size` bytes of body. The body opens with a fixed 32-byte prefix; only
//! the fields needed for indexing are decoded from it.
//!
//! ```text
//! offset  field        type
//!  0      refID        i32
//!  4      pos          i32
//!  8      l_read_name  u8
//!  9      mapq         u8
//! 10      bin          u16
//! 12      n_cigar_op   u16
//! 14      flag         u16
//! 16      l_seq        i32
//! 20      next_refID   i32
//! 24      next_pos     i32
//! 28      tlen         i32
//! 32      read_name, cigar, seq, qual, tags ...
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::bgzf::{BlockCursor, BlockSource};
use crate::error::{ReadError, Result};
use crate::VirtualOffset;

/// Size of the fixed-layout prefix of a record body
pub const SIZE_FIXED_PREFIX: usize = 32;

/// Reference id marking a record without a reference
const UNPLACED: i32 = -1;

/// The location of one record and the genomic interval it was assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    /// Virtual offset of the record's `block_size` field
    pub offset: VirtualOffset,

    /// Reference id, `None` for unplaced records
    pub reference_id: Option<usize>,

    /// 0-based leftmost coordinate (0 for unplaced records)
    pub position: u32,

    /// Number of bases assigned to the record, at least 1
    ///
    /// This is the stored sequence length. Alignments with deletions or
    /// skipped regions cover more reference than that, so their bin can be
    /// too small and queries near their true end may miss them.
    pub span: u32,
}
impl RecordPosition {
    /// Exclusive end coordinate of the record's interval
    #[must_use]
    pub fn end(&self) -> u32 {
        self.position.saturating_add(self.span)
    }
}

/// Decodes `(reference_id, position, span)` from the fixed prefix of a record body
///
/// The span is the stored sequence length, raised to 1 for records without a
/// stored sequence. The CIGAR is not decoded, so the span undercounts the
/// reference covered by alignments with deletions or skipped regions (see
/// [`RecordPosition::span`]). The variable-length sections are not decoded,
/// but their declared sizes are checked against the body length.
///
/// # Errors
///
/// * `ReadError::InvalidRecordLength` - If the body is shorter than its fields require
/// * `ReadError::NegativeLength` - If `l_seq` is negative
pub fn decode_position(body: &[u8]) -> Result<(i32, i32, u32)> {
    if body.len() < SIZE_FIXED_PREFIX {
        return Err(ReadError::InvalidRecordLength(body.len(), SIZE_FIXED_PREFIX).into());
    }
    let ref_id = LittleEndian::read_i32(&body[0..4]);
    let pos = LittleEndian::read_i32(&body[4..8]);
    let l_read_name = body[8] as usize;
    let n_cigar_op = LittleEndian::read_u16(&body[12..14]) as usize;
    let l_seq = LittleEndian::read_i32(&body[16..20]);
    let Ok(seq_len) = usize::try_from(l_seq) else {
        return Err(ReadError::NegativeLength("l_seq", l_seq).into());
    };

    let required =
        SIZE_FIXED_PREFIX + l_read_name + 4 * n_cigar_op + seq_len.div_ceil(2) + seq_len;
    if body.len() < required {
        return Err(ReadError::InvalidRecordLength(body.len(), required).into());
    }

    Ok((ref_id, pos, (seq_len as u32).max(1)))
}

/// A lazy stream of record positions read from a [`BlockCursor`]
///
/// The scanner yields one [`RecordPosition`] per record until the cursor runs
/// out of data exactly on a record boundary. Running out of data anywhere else
/// is reported as `ReadError::TruncatedStream`. After the first error the
/// scanner yields nothing further.
pub struct PositionScanner<'a, S: BlockSource> {
    cursor: &'a mut BlockCursor<S>,

    /// Number of references declared in the header
    n_references: usize,

    /// Reusable record body buffer
    buf: Vec<u8>,

    /// Number of records yielded so far
    n_records: usize,

    done: bool,
}
impl<'a, S: BlockSource> PositionScanner<'a, S> {
    /// Creates a scanner reading from the cursor's current position
    ///
    /// The cursor must be positioned at the first record, e.g. by
    /// [`read_header`](super::read_header).
    pub fn new(cursor: &'a mut BlockCursor<S>, n_references: usize) -> Self {
        Self {
            cursor,
            n_references,
            buf: Vec::new(),
            n_records: 0,
            done: false,
        }
    }

    /// Number of records yielded so far
    #[must_use]
    pub fn n_records(&self) -> usize {
        self.n_records
    }

    fn next_record(&mut self) -> Result<Option<RecordPosition>> {
        let offset = self.cursor.position()?;

        // A clean end of stream is only allowed before the length field
        let mut len_buf = [0u8; 4];
        match self.cursor.fill(&mut len_buf)? {
            0 => return Ok(None),
            4 => {}
            available => {
                return Err(ReadError::TruncatedStream {
                    offset: offset.pack(),
                    needed: 4,
                    available,
                }
                .into())
            }
        }
        let block_size = LittleEndian::read_i32(&len_buf);
        let Ok(block_size) = usize::try_from(block_size) else {
            return Err(ReadError::NegativeLength("block_size", block_size).into());
        };
        if block_size < SIZE_FIXED_PREFIX {
            return Err(ReadError::InvalidRecordLength(block_size, SIZE_FIXED_PREFIX).into());
        }
        self.cursor.read_exact_into(block_size, &mut self.buf)?;

        let (ref_id, pos, span) = decode_position(&self.buf)?;
        let record = if ref_id == UNPLACED {
            RecordPosition {
                offset,
                reference_id: None,
                position: pos.max(0) as u32,
                span,
            }
        } else {
            let reference_id = usize::try_from(ref_id)
                .ok()
                .filter(|&id| id < self.n_references)
                .ok_or(ReadError::InvalidReference(ref_id, self.n_references))?;
            let Ok(position) = u32::try_from(pos) else {
                return Err(ReadError::InvalidPosition(pos, reference_id).into());
            };
            RecordPosition {
                offset,
                reference_id: Some(reference_id),
                position,
                span,
            }
        };
        Ok(Some(record))
    }
}

impl<S: BlockSource> Iterator for PositionScanner<'_, S> {
    type Item = Result<RecordPosition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => {
                self.n_records += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam::read_header;
    use crate::bgzf::BgzfReader;
    use crate::error::Error;
    use crate::testing::{bam_record, BlockLayout, SyntheticBam};

    fn scan(layout: &BlockLayout, n_references: usize) -> Vec<Result<RecordPosition>> {
        let mut cursor = BlockCursor::new(BgzfReader::new(layout.bytes.as_slice()));
        read_header(&mut cursor).unwrap();
        PositionScanner::new(&mut cursor, n_references).collect()
    }

    #[test]
    fn test_decode_position() -> anyhow::Result<()> {
        let record = bam_record(2, 1234, 101);
        let (ref_id, pos, span) = decode_position(&record[4..])?;
        assert_eq!((ref_id, pos, span), (2, 1234, 101));
        Ok(())
    }

    #[test]
    fn test_decode_position_without_sequence() -> anyhow::Result<()> {
        let record = bam_record(0, 10, 0);
        let (_, _, span) = decode_position(&record[4..])?;
        assert_eq!(span, 1);
        Ok(())
    }

    #[test]
    fn test_decode_short_body() {
        let record = bam_record(0, 10, 20);
        let err = decode_position(&record[4..20]).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadError(ReadError::InvalidRecordLength(16, SIZE_FIXED_PREFIX))
        ));
    }

    #[test]
    fn test_decode_inconsistent_lengths() {
        let mut record = bam_record(0, 10, 20);
        // declare a longer sequence than the body holds
        record[4 + 16..4 + 20].copy_from_slice(&200i32.to_le_bytes());
        let err = decode_position(&record[4..]).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadError(ReadError::InvalidRecordLength(_, _))
        ));
    }

    #[test]
    fn test_scan_offsets_across_blocks() -> anyhow::Result<()> {
        let mut bam = SyntheticBam::new(&[("chr1", 1_000_000), ("chr2", 1_000_000)]);
        for i in 0..40 {
            bam.push(i / 20, (i % 20) * 500, 50 + i as u32);
        }
        // small blocks force most records to straddle a boundary
        let layout = bam.layout(97);

        let positions = scan(&layout, 2)
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(positions.len(), 40);
        for (i, record) in positions.iter().enumerate() {
            let (ref_id, pos, l_seq) = bam.records[i];
            assert_eq!(record.reference_id, Some(ref_id as usize));
            assert_eq!(record.position, pos as u32);
            assert_eq!(record.span, l_seq);
            assert_eq!(Some(record.offset), layout.virtual_offset(bam.record_starts[i]));
        }
        assert!(positions.windows(2).all(|w| w[0].offset < w[1].offset));
        Ok(())
    }

    #[test]
    fn test_scan_offset_skips_empty_block() -> anyhow::Result<()> {
        let mut bam = SyntheticBam::new(&[("chr1", 100_000)]);
        bam.push(0, 0, 50).push(0, 20_000, 50);
        let boundary = bam.record_starts[1];
        let layout = BlockLayout::with_empty_blocks(&bam.data, &[boundary, boundary]);

        let positions = scan(&layout, 1)
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        // the second record is read from the block after the empty one
        assert_eq!(positions[1].offset, VirtualOffset::new(layout.block_offsets[2], 0));
        assert_eq!(layout.locate(positions[1].offset), Some(boundary));
        Ok(())
    }

    #[test]
    fn test_scan_empty_stream() {
        let bam = SyntheticBam::new(&[("chr1", 100)]);
        assert!(scan(&bam.layout(1 << 16), 1).is_empty());
    }

    #[test]
    fn test_scan_truncated_body() {
        let mut bam = SyntheticBam::new(&[("chr1", 100)]);
        bam.push(0, 0, 20).push(0, 10, 20);
        bam.data.truncate(bam.data.len() - 5);
        let results = scan(&bam.layout(64), 1);

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_scan_truncated_length_field() {
        let mut bam = SyntheticBam::new(&[("chr1", 100)]);
        bam.push(0, 0, 20);
        bam.data.extend_from_slice(&[1, 0]);
        let results = scan(&bam.layout(1 << 16), 1);

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(Error::ReadError(ReadError::TruncatedStream {
                needed: 4,
                available: 2,
                ..
            }))
        ));
    }

    #[test]
    fn test_scan_invalid_reference() {
        let mut bam = SyntheticBam::new(&[("chr1", 100)]);
        bam.push(0, 0, 20).push(1, 0, 20).push(0, 50, 20);
        let results = scan(&bam.layout(1 << 16), 1);

        // the scanner stops at the first error
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(Error::ReadError(ReadError::InvalidReference(1, 1)))
        ));
    }

    #[test]
    fn test_scan_unplaced() -> anyhow::Result<()> {
        let mut bam = SyntheticBam::new(&[("chr1", 100)]);
        bam.push(0, 0, 20).push(-1, -1, 20);
        let results = scan(&bam.layout(1 << 16), 1);

        assert_eq!(results.len(), 2);
        let unplaced = results[1].as_ref().map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(unplaced.reference_id, None);
        assert_eq!(unplaced.position, 0);
        Ok(())
    }

    #[test]
    fn test_scan_negative_position() {
        let mut bam = SyntheticBam::new(&[("chr1", 100)]);
        bam.push(0, -5, 20);
        let results = scan(&bam.layout(1 << 16), 1);
        assert!(matches!(
            results[0],
            Err(Error::ReadError(ReadError::InvalidPosition(-5, 0)))
        ));
    }

    #[test]
    fn test_scan_negative_block_size() {
        let mut bam = SyntheticBam::new(&[("chr1", 100)]);
        bam.data.extend_from_slice(&(-8i32).to_le_bytes());
        let results = scan(&bam.layout(1 << 16), 1);
        assert!(matches!(
            results[0],
            Err(Error::ReadError(ReadError::NegativeLength("block_size", -8)))
        ));
    }
}
