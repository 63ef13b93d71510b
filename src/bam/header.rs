//! # Alignment container header
//!
//! The decompressed stream of a BAM file opens with a variable-length header:
//!
//! ```text
//! magic     "BAM\1"
//! l_text    i32      length of the text header
//! text      [u8]     SAM-style text header
//! n_ref     i32      number of reference sequences
//! for each reference:
//!   l_name  i32      length of the name including its NUL
//!   name    [u8]     NUL-terminated reference name
//!   l_ref   i32      length of the reference sequence
//! ```
//!
//! Alignment records follow immediately after the last reference entry.

use crate::bgzf::{BlockCursor, BlockSource};
use crate::error::{Error, HeaderError, ReadError, Result};
use crate::VirtualOffset;

/// Magic bytes opening the decompressed stream
pub const MAGIC: [u8; 4] = *b"BAM\x01";

/// A named reference sequence declared in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    /// Reference name (e.g. `chr1`)
    pub name: String,

    /// Length of the reference in bases
    pub length: u32,
}

/// The parsed container header
///
/// Only the reference dictionary is interpreted; the text header is kept
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentHeader {
    /// Raw SAM text header
    pub text: String,

    /// Reference dictionary in declaration order
    pub references: Vec<ReferenceSequence>,
}
impl AlignmentHeader {
    /// Number of declared reference sequences
    #[must_use]
    pub fn n_references(&self) -> usize {
        self.references.len()
    }

    /// Looks up the id of a reference by name
    #[must_use]
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.references.iter().position(|r| r.name == name)
    }

    /// Looks up the name of a reference by id
    #[must_use]
    pub fn reference_name(&self, id: usize) -> Option<&str> {
        self.references.get(id).map(|r| r.name.as_str())
    }
}

/// Reads the header from the start of the stream
///
/// On success the cursor is positioned at the first alignment record, whose
/// virtual offset is returned alongside the header. Without any record this
/// is the cursor's end offset.
///
/// # Errors
///
/// * `HeaderError::InvalidMagicNumber` - If the stream does not open with `BAM\1`
/// * `HeaderError::Incomplete` - If the stream ends before the dictionary is complete
/// * Other `HeaderError` variants for negative lengths and malformed names
pub fn read_header<S: BlockSource>(
    cursor: &mut BlockCursor<S>,
) -> Result<(AlignmentHeader, VirtualOffset)> {
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(incomplete)?;
    if magic != MAGIC {
        return Err(HeaderError::InvalidMagicNumber(magic).into());
    }

    let mut buf = Vec::new();
    let l_text = cursor.read_i32().map_err(incomplete)?;
    let Ok(l_text) = usize::try_from(l_text) else {
        return Err(HeaderError::InvalidTextLength(l_text).into());
    };
    cursor.read_exact_into(l_text, &mut buf).map_err(incomplete)?;
    // text headers are commonly NUL-padded
    let text = std::str::from_utf8(&buf)
        .map_err(HeaderError::InvalidText)?
        .trim_end_matches('\0')
        .to_string();

    let n_ref = cursor.read_i32().map_err(incomplete)?;
    let Ok(n_ref) = usize::try_from(n_ref) else {
        return Err(HeaderError::InvalidReferenceCount(n_ref).into());
    };

    let mut references = Vec::new();
    for id in 0..n_ref {
        let l_name = cursor.read_i32().map_err(incomplete)?;
        let l_name = match usize::try_from(l_name) {
            Ok(n) if n > 0 => n,
            _ => return Err(HeaderError::InvalidNameLength(id, l_name).into()),
        };
        cursor.read_exact_into(l_name, &mut buf).map_err(incomplete)?;
        let Some((&0, name)) = buf.split_last() else {
            return Err(HeaderError::UnterminatedName(id).into());
        };
        let name = std::str::from_utf8(name)
            .map_err(|e| HeaderError::InvalidName(id, e))?
            .to_string();

        let l_ref = cursor.read_i32().map_err(incomplete)?;
        let Ok(length) = u32::try_from(l_ref) else {
            return Err(HeaderError::InvalidReferenceLength(id, l_ref).into());
        };
        references.push(ReferenceSequence { name, length });
    }

    let header = AlignmentHeader { text, references };
    Ok((header, cursor.position()?))
}

/// Reports a truncated header as an incomplete header rather than a truncated record
fn incomplete(err: Error) -> Error {
    match err {
        Error::ReadError(ReadError::TruncatedStream { .. }) => HeaderError::Incomplete.into(),
        other => other,
    }
}
