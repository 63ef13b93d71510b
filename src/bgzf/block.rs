//! # Compressed block parsing
//!
//! A BGZF file is a series of independent gzip members. Each member carries a
//! `BC` extra subfield declaring its total compressed size, so blocks can be
//! located without inflating anything.
//!
//! ```text
//! ┌────┬────┬────┬─────┬───────┬─────┬────┬──────┬──────────────┬───────┬───────┐
//! │ 31 │139 │ CM │ FLG │ MTIME │ XFL │ OS │ XLEN │ extra fields │ CDATA │ trailer│
//! └────┴────┴────┴─────┴───────┴─────┴────┴──────┴──────────────┴───────┴───────┘
//!   1    1    1    1      4      1     1     2       XLEN          ...    CRC32 + ISIZE
//! ```

use std::io::{self, Read};

use auto_impl::auto_impl;
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::DeflateDecoder;

use crate::error::{BlockError, Result};

/// Size of the fixed gzip member header up to and including XLEN
pub const SIZE_GZIP_HEADER: usize = 12;

/// Size of the member trailer (CRC32 + ISIZE)
pub const SIZE_TRAILER: usize = 8;

/// Largest decompressed size a block may declare
pub const MAX_BLOCK_SIZE: u32 = 1 << 16;

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [31, 139];

/// Compression method identifier for DEFLATE
const CM_DEFLATE: u8 = 8;

/// FLG bit signalling the presence of an extra field
const FLG_FEXTRA: u8 = 0x04;

/// Subfield identifier of the block size field ("BC")
const BC_SUBFIELD: [u8; 2] = [b'B', b'C'];

/// A single decompressed block together with its placement in the file
///
/// A `Block` is reused across reads: [`BlockSource::read_block_into`] clears and
/// refills it, so the decompression buffers are allocated once per stream.
#[derive(Debug, Default, Clone)]
pub struct Block {
    /// File offset of the first byte of the block
    offset: u64,

    /// Total compressed size of the block including header and trailer
    compressed_len: usize,

    /// Decompressed size declared in the block trailer (ISIZE)
    declared_len: u32,

    /// Decompressed content
    data: Vec<u8>,

    /// Reusable buffer for the compressed payload
    cbuf: Vec<u8>,
}
impl Block {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a block from already decompressed content
    ///
    /// Useful for block sources that do their own decompression.
    #[must_use]
    pub fn from_parts(offset: u64, compressed_len: usize, data: Vec<u8>) -> Self {
        Self {
            offset,
            compressed_len,
            declared_len: data.len() as u32,
            data,
            cbuf: Vec::new(),
        }
    }

    /// File offset of the first byte of the block
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total compressed size of the block in bytes
    #[must_use]
    pub fn compressed_len(&self) -> usize {
        self.compressed_len
    }

    /// Decompressed size declared by the block
    #[must_use]
    pub fn declared_len(&self) -> u32 {
        self.declared_len
    }

    /// Decompressed content of the block
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// File offset immediately after the block
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.offset + self.compressed_len as u64
    }

    pub fn clear(&mut self) {
        self.offset = 0;
        self.compressed_len = 0;
        self.declared_len = 0;
        self.data.clear();
        self.cbuf.clear();
    }
}

/// A source of compressed blocks, yielded strictly in file order
#[auto_impl(&mut, Box)]
pub trait BlockSource {
    /// Reads and decompresses the next block into `block`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A block was read
    /// * `Ok(false)` - The stream ended cleanly on a block boundary
    /// * `Err(_)` - The block was malformed, truncated or failed to decompress
    fn read_block_into(&mut self, block: &mut Block) -> Result<bool>;
}

/// Reads BGZF blocks from any byte stream
///
/// # Examples
///
/// ```rust,no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use bamdex::bgzf::{BgzfReader, Block, BlockSource};
///
/// let file = File::open("alignments.bam").map(BufReader::new).unwrap();
/// let mut reader = BgzfReader::new(file);
/// let mut block = Block::new();
/// while reader.read_block_into(&mut block).unwrap() {
///     println!("{}\t{}", block.offset(), block.data().len());
/// }
/// ```
pub struct BgzfReader<R: Read> {
    inner: R,

    /// File offset of the next block to be read
    pos: u64,

    /// Whether to validate the CRC32 of each inflated block
    verify_checksums: bool,

    /// Number of blocks read so far
    n_blocks: usize,

    /// Whether the most recently read block was empty
    last_empty: bool,

    /// Set once the end of the stream has been observed
    finished: bool,
}
impl<R: Read> BgzfReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_checksums(inner, true)
    }

    pub fn with_checksums(inner: R, verify_checksums: bool) -> Self {
        Self {
            inner,
            pos: 0,
            verify_checksums,
            n_blocks: 0,
            last_empty: false,
            finished: false,
        }
    }

    /// File offset of the next block to be read
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Number of blocks read so far
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    /// Whether the stream ended with the empty end-of-file marker block
    ///
    /// Only meaningful once the stream has been drained.
    #[must_use]
    pub fn has_eof_marker(&self) -> bool {
        self.finished && self.last_empty
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads exactly `buf.len()` bytes, reporting a short read as block truncation
    fn read_block_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = read_fully(&mut self.inner, buf)?;
        if n < buf.len() {
            return Err(BlockError::Truncated(self.pos).into());
        }
        Ok(())
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            if self.n_blocks > 0 && !self.last_empty {
                log::warn!(
                    "BGZF stream ended at offset {} without an end-of-file marker block",
                    self.pos
                );
            }
        }
    }
}

impl<R: Read> BlockSource for BgzfReader<R> {
    fn read_block_into(&mut self, block: &mut Block) -> Result<bool> {
        block.clear();
        if self.finished {
            return Ok(false);
        }

        // Fixed header, a clean end of stream is only allowed here
        let mut header = [0u8; SIZE_GZIP_HEADER];
        match read_fully(&mut self.inner, &mut header)? {
            0 => {
                self.finish();
                return Ok(false);
            }
            n if n < SIZE_GZIP_HEADER => return Err(BlockError::Truncated(self.pos).into()),
            _ => {}
        }
        if header[0..2] != GZIP_MAGIC {
            return Err(BlockError::InvalidMagicNumber(self.pos).into());
        }
        if header[2] != CM_DEFLATE {
            return Err(BlockError::UnsupportedCompression(self.pos, header[2]).into());
        }
        if header[3] & FLG_FEXTRA == 0 {
            return Err(BlockError::MissingExtraField(self.pos).into());
        }

        // Extra subfields, searched for the block size
        let xlen = LittleEndian::read_u16(&header[10..12]) as usize;
        let mut extra = vec![0u8; xlen];
        self.read_block_bytes(&mut extra)?;
        let Some(bsize) = find_block_size(&extra) else {
            return Err(BlockError::MissingBlockSize(self.pos).into());
        };
        let total = bsize as usize + 1;
        let overhead = SIZE_GZIP_HEADER + xlen + SIZE_TRAILER;
        if total < overhead {
            return Err(BlockError::InvalidBlockSize(self.pos, total).into());
        }

        // Compressed payload and trailer
        let mut cbuf = std::mem::take(&mut block.cbuf);
        cbuf.resize(total - overhead, 0);
        self.read_block_bytes(&mut cbuf)?;
        let mut trailer = [0u8; SIZE_TRAILER];
        self.read_block_bytes(&mut trailer)?;
        let crc = LittleEndian::read_u32(&trailer[0..4]);
        let declared_len = LittleEndian::read_u32(&trailer[4..8]);
        if declared_len > MAX_BLOCK_SIZE {
            return Err(BlockError::OversizedBlock(self.pos, declared_len).into());
        }

        inflate(&cbuf, declared_len, &mut block.data)
            .map_err(|e| BlockError::Inflate(self.pos, e))?;
        if block.data.len() != declared_len as usize {
            return Err(BlockError::SizeMismatch {
                offset: self.pos,
                expected: declared_len,
                got: block.data.len(),
            }
            .into());
        }
        if self.verify_checksums {
            let found = crc32fast::hash(&block.data);
            if found != crc {
                return Err(BlockError::ChecksumMismatch(self.pos, crc, found).into());
            }
        }

        block.cbuf = cbuf;
        block.offset = self.pos;
        block.compressed_len = total;
        block.declared_len = declared_len;
        log::trace!(
            "read block at offset {}: {} compressed, {} decompressed bytes",
            self.pos,
            total,
            declared_len
        );

        self.pos += total as u64;
        self.n_blocks += 1;
        self.last_empty = declared_len == 0;
        Ok(true)
    }
}

/// Locates the `BC` subfield in a gzip extra field and returns BSIZE
fn find_block_size(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = LittleEndian::read_u16(&extra[pos + 2..pos + 4]) as usize;
        if extra[pos..pos + 2] == BC_SUBFIELD && slen == 2 {
            return extra
                .get(pos + 4..pos + 6)
                .map(LittleEndian::read_u16);
        }
        pos += 4 + slen;
    }
    None
}

/// Inflates a raw DEFLATE payload, reading at most one byte past the declared size
fn inflate(cdata: &[u8], declared_len: u32, data: &mut Vec<u8>) -> io::Result<()> {
    data.clear();
    data.reserve(declared_len as usize);
    DeflateDecoder::new(cdata)
        .take(u64::from(declared_len) + 1)
        .read_to_end(data)?;
    Ok(())
}

/// Fills `buf` as far as the reader allows, returning the number of bytes read
pub(crate) fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
