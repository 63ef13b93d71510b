//! Virtual offsets into a block-compressed stream
//!
//! A virtual offset identifies a single byte of the decompressed stream by the
//! file offset of the compressed block that holds it and the position of the
//! byte inside that block's decompressed content.
//!
//! ```text
//!  63                                            16 15              0
//! ┌────────────────────────────────────────────────┬────────────────┐
//! │            compressed block offset             │  intra offset  │
//! └────────────────────────────────────────────────┴────────────────┘
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Number of bits reserved for the intra-block offset
const INTRA_BITS: u32 = 16;

/// Largest representable compressed block offset (48 bits)
pub const MAX_BLOCK_OFFSET: u64 = (1 << 48) - 1;

/// A position in the decompressed stream of a block-compressed file
///
/// Offsets are totally ordered: first by the compressed block offset, then by
/// the intra-block offset. Two offsets produced by a single forward scan never
/// compare in the opposite order to the one in which they were produced.
///
/// # Examples
///
/// ```rust
/// use bamdex::VirtualOffset;
///
/// let offset = VirtualOffset::new(1024, 512);
/// assert_eq!(offset.block_offset(), 1024);
/// assert_eq!(offset.intra_offset(), 512);
/// assert_eq!(VirtualOffset::unpack(offset.pack()), offset);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VirtualOffset {
    /// File offset of the first byte of the compressed block (48 significant bits)
    block_offset: u64,

    /// Offset inside the block's decompressed content
    intra_offset: u16,
}
impl VirtualOffset {
    /// Creates a new virtual offset
    ///
    /// Only the low 48 bits of `block_offset` are kept.
    #[must_use]
    pub fn new(block_offset: u64, intra_offset: u16) -> Self {
        Self {
            block_offset: block_offset & MAX_BLOCK_OFFSET,
            intra_offset,
        }
    }

    /// Packs the offset into its 64-bit representation (`block << 16 | intra`)
    #[must_use]
    pub fn pack(self) -> u64 {
        (self.block_offset << INTRA_BITS) | u64::from(self.intra_offset)
    }

    /// Unpacks a 64-bit representation produced by [`VirtualOffset::pack`]
    #[must_use]
    pub fn unpack(value: u64) -> Self {
        Self {
            block_offset: value >> INTRA_BITS,
            intra_offset: (value & 0xFFFF) as u16,
        }
    }

    /// File offset of the compressed block
    #[must_use]
    pub fn block_offset(self) -> u64 {
        self.block_offset
    }

    /// Offset within the decompressed block
    #[must_use]
    pub fn intra_offset(self) -> u16 {
        self.intra_offset
    }
}

impl Ord for VirtualOffset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.block_offset
            .cmp(&other.block_offset)
            .then_with(|| self.intra_offset.cmp(&other.intra_offset))
    }
}
impl PartialOrd for VirtualOffset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for VirtualOffset {
    fn from(value: u64) -> Self {
        Self::unpack(value)
    }
}
impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.pack()
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_offset, self.intra_offset)
    }
}
