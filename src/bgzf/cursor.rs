use byteorder::{ByteOrder, LittleEndian};

use super::{Block, BlockSource};
use crate::error::{ReadError, Result};
use crate::VirtualOffset;

/// A byte cursor over the decompressed content of consecutive blocks
///
/// The cursor presents the blocks of a [`BlockSource`] as one continuous byte
/// stream while keeping track of the [`VirtualOffset`] of the next unread byte.
/// Reads that straddle a block boundary transparently pull the next block.
///
/// Blocks are consumed strictly in file order and each block is fully
/// consumed before the next is requested.
pub struct BlockCursor<S: BlockSource> {
    /// Underlying block source
    source: S,

    /// Block currently being read from
    block: Block,

    /// Number of bytes already consumed from `block`
    pos: usize,

    /// File offset immediately after `block`
    next_offset: u64,

    /// Set once the source reported a clean end of stream
    exhausted: bool,
}
impl<S: BlockSource> BlockCursor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            block: Block::new(),
            pos: 0,
            next_offset: 0,
            exhausted: false,
        }
    }

    /// Virtual offset of the next byte to be read, without touching the source
    ///
    /// When the current block has been fully consumed the offset refers to the
    /// start of the following block in the file, so the intra-block offset
    /// always fits its 16 bits and successive offsets never decrease. That
    /// following block may be an empty block; use [`position`](Self::position)
    /// for an offset naming the block the next byte is actually read from.
    #[must_use]
    pub fn current_offset(&self) -> VirtualOffset {
        if self.pos < self.block.data().len() {
            VirtualOffset::new(self.block.offset(), self.pos as u16)
        } else {
            VirtualOffset::new(self.next_offset, 0)
        }
    }

    /// Virtual offset of the next byte to be read, skipping empty blocks
    ///
    /// An exhausted block is replaced by the next non-empty block first, so the
    /// offset names the block holding the next byte. At the end of the stream
    /// this is the [`end_offset`](Self::end_offset).
    pub fn position(&mut self) -> Result<VirtualOffset> {
        self.remaining()?;
        Ok(self.current_offset())
    }

    /// Exclusive end-of-file sentinel: `(compressed bytes consumed, 0)`
    ///
    /// Once the stream has been drained this is the total compressed size.
    #[must_use]
    pub fn end_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.next_offset, 0)
    }

    /// Whether the underlying source has reported the end of the stream
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Loads the next non-empty block
    ///
    /// Returns `false` at the end of the stream.
    fn next_block(&mut self) -> Result<bool> {
        while !self.exhausted {
            self.pos = 0;
            if !self.source.read_block_into(&mut self.block)? {
                self.exhausted = true;
                break;
            }
            self.next_offset = self.block.end_offset();
            if !self.block.data().is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Unread bytes of the current block, loading the next block when empty
    fn remaining(&mut self) -> Result<&[u8]> {
        if self.pos == self.block.data().len() && !self.next_block()? {
            return Ok(&[]);
        }
        Ok(&self.block.data()[self.pos..])
    }

    /// Fills `buf` as far as the stream allows
    ///
    /// # Returns
    ///
    /// The number of bytes written into `buf`, which is less than its length
    /// only when the stream ended.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let available = self.remaining()?;
            if available.is_empty() {
                break;
            }
            let n = available.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&available[..n]);
            self.pos += n;
            filled += n;
        }
        Ok(filled)
    }

    /// Reads exactly `buf.len()` bytes
    ///
    /// # Errors
    ///
    /// * `ReadError::TruncatedStream` - If the stream ends before `buf` is full
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.current_offset();
        let available = self.fill(buf)?;
        if available < buf.len() {
            return Err(ReadError::TruncatedStream {
                offset: offset.pack(),
                needed: buf.len(),
                available,
            }
            .into());
        }
        Ok(())
    }

    /// Reads exactly `n` bytes into `out`, replacing its contents
    ///
    /// The buffer grows block by block, so a corrupt length never triggers one
    /// large allocation up front.
    pub fn read_exact_into(&mut self, n: usize, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        let offset = self.current_offset();
        while out.len() < n {
            let available = self.remaining()?;
            if available.is_empty() {
                return Err(ReadError::TruncatedStream {
                    offset: offset.pack(),
                    needed: n,
                    available: out.len(),
                }
                .into());
            }
            let take = available.len().min(n - out.len());
            out.extend_from_slice(&available[..take]);
            self.pos += take;
        }
        Ok(())
    }

    /// Reads a little-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i32(&buf))
    }
}
