//! # Alignment container layout
//!
//! Readers for the two parts of the decompressed stream that index
//! construction needs: the header with its reference dictionary, and the
//! fixed-layout prefix of each alignment record.

mod header;
mod scanner;

pub use header::{read_header, AlignmentHeader, ReferenceSequence, MAGIC};
pub use scanner::{decode_position, PositionScanner, RecordPosition, SIZE_FIXED_PREFIX};
