//! Builders for synthetic BGZF and BAM streams used across the test modules

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::VirtualOffset;

/// The standard empty block terminating a BGZF file
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Compresses `data` into a single BGZF block
pub fn bgzf_block(data: &[u8]) -> Vec<u8> {
    let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
    deflate.write_all(data).unwrap();
    let cdata = deflate.finish().unwrap();

    let mut block = vec![31, 139, 8, 4, 0, 0, 0, 0, 0, 255];
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(&[b'B', b'C']);
    block.extend_from_slice(&2u16.to_le_bytes());
    let bsize = (12 + 6 + cdata.len() + 8 - 1) as u16;
    block.extend_from_slice(&bsize.to_le_bytes());
    block.extend_from_slice(&cdata);
    block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());
    block
}

/// Compresses `data` into BGZF blocks split at the uncompressed positions in
/// `cuts`, followed by the end-of-file marker
pub fn bgzf_encode(data: &[u8], cuts: &[usize]) -> Vec<u8> {
    BlockLayout::new(data, cuts).bytes
}

/// A BGZF stream together with the placement of each of its blocks
pub struct BlockLayout {
    /// The compressed stream
    pub bytes: Vec<u8>,
    /// Compressed offset of every block, the end-of-file marker included
    pub block_offsets: Vec<u64>,
    /// Uncompressed position of the first byte of every data block
    pub block_starts: Vec<usize>,
    /// Uncompressed length of every data block
    pub block_lens: Vec<usize>,
}
impl BlockLayout {
    pub fn new(data: &[u8], cuts: &[usize]) -> Self {
        let mut bounds = vec![0];
        bounds.extend(cuts.iter().copied().filter(|&c| c > 0 && c < data.len()));
        bounds.push(data.len());
        bounds.dedup();
        Self::from_bounds(data, &bounds)
    }

    /// Like [`BlockLayout::new`], but a repeated cut inserts an empty data block
    pub fn with_empty_blocks(data: &[u8], cuts: &[usize]) -> Self {
        let mut bounds = vec![0];
        bounds.extend_from_slice(cuts);
        bounds.push(data.len());
        Self::from_bounds(data, &bounds)
    }

    fn from_bounds(data: &[u8], bounds: &[usize]) -> Self {
        let mut layout = Self {
            bytes: Vec::new(),
            block_offsets: Vec::new(),
            block_starts: Vec::new(),
            block_lens: Vec::new(),
        };
        for w in bounds.windows(2) {
            layout.block_offsets.push(layout.bytes.len() as u64);
            layout.block_starts.push(w[0]);
            layout.block_lens.push(w[1] - w[0]);
            layout.bytes.extend_from_slice(&bgzf_block(&data[w[0]..w[1]]));
        }
        layout.block_offsets.push(layout.bytes.len() as u64);
        layout.bytes.extend_from_slice(&EOF_MARKER);
        layout
    }

    /// Cuts `data` into blocks of at most `block_size` uncompressed bytes
    pub fn fixed(data: &[u8], block_size: usize) -> Self {
        let cuts: Vec<usize> = (block_size..data.len()).step_by(block_size).collect();
        Self::new(data, &cuts)
    }

    /// Virtual offset of the uncompressed position `pos`
    pub fn virtual_offset(&self, pos: usize) -> Option<VirtualOffset> {
        self.block_starts
            .iter()
            .zip(&self.block_lens)
            .zip(&self.block_offsets)
            .find(|&((&start, &len), _)| start <= pos && pos < start + len)
            .map(|((&start, _), &offset)| VirtualOffset::new(offset, (pos - start) as u16))
    }

    /// Uncompressed position named by a virtual offset
    pub fn locate(&self, offset: VirtualOffset) -> Option<usize> {
        let i = self
            .block_offsets
            .iter()
            .position(|&o| o == offset.block_offset())?;
        let start = *self.block_starts.get(i)?;
        let len = self.block_lens[i];
        let intra = offset.intra_offset() as usize;
        (intra < len).then_some(start + intra)
    }

    /// Offset of the exclusive end-of-file sentinel
    pub fn end_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.bytes.len() as u64, 0)
    }
}

/// Encodes a BAM header with the given reference dictionary
pub fn bam_header(references: &[(&str, u32)]) -> Vec<u8> {
    let text = b"@HD\tVN:1.6\tSO:coordinate\n";
    let mut buf = b"BAM\x01".to_vec();
    buf.extend_from_slice(&(text.len() as i32).to_le_bytes());
    buf.extend_from_slice(text);
    buf.extend_from_slice(&(references.len() as i32).to_le_bytes());
    for (name, length) in references {
        buf.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&(*length as i32).to_le_bytes());
    }
    buf
}

/// Encodes one BAM record, `block_size` prefix included
///
/// The record carries a one-operation CIGAR matching `l_seq` and a
/// placeholder sequence and quality string.
pub fn bam_record(ref_id: i32, pos: i32, l_seq: u32) -> Vec<u8> {
    let name = b"read\0";
    let n_cigar: u16 = u16::from(l_seq > 0);
    let mut body = Vec::new();
    body.extend_from_slice(&ref_id.to_le_bytes());
    body.extend_from_slice(&pos.to_le_bytes());
    body.push(name.len() as u8);
    body.push(60); // mapq
    body.extend_from_slice(&0u16.to_le_bytes()); // bin, not used by the scanner
    body.extend_from_slice(&n_cigar.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes()); // flag
    body.extend_from_slice(&(l_seq as i32).to_le_bytes());
    body.extend_from_slice(&(-1i32).to_le_bytes()); // next ref
    body.extend_from_slice(&(-1i32).to_le_bytes()); // next pos
    body.extend_from_slice(&0i32.to_le_bytes()); // tlen
    body.extend_from_slice(name);
    if n_cigar > 0 {
        body.extend_from_slice(&(l_seq << 4).to_le_bytes());
    }
    body.extend(std::iter::repeat_n(0x11, l_seq.div_ceil(2) as usize));
    body.extend(std::iter::repeat_n(30, l_seq as usize));

    let mut record = (body.len() as i32).to_le_bytes().to_vec();
    record.extend_from_slice(&body);
    record
}

/// An uncompressed BAM stream built record by record
pub struct SyntheticBam {
    /// Uncompressed stream contents
    pub data: Vec<u8>,
    /// Uncompressed position of the first record
    pub first_record: usize,
    /// Uncompressed start position of every record
    pub record_starts: Vec<usize>,
    /// `(ref_id, pos, l_seq)` of every record
    pub records: Vec<(i32, i32, u32)>,
}
impl SyntheticBam {
    pub fn new(references: &[(&str, u32)]) -> Self {
        let data = bam_header(references);
        Self {
            first_record: data.len(),
            data,
            record_starts: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, ref_id: i32, pos: i32, l_seq: u32) -> &mut Self {
        self.record_starts.push(self.data.len());
        self.records.push((ref_id, pos, l_seq));
        self.data.extend_from_slice(&bam_record(ref_id, pos, l_seq));
        self
    }

    /// Compresses the stream into blocks of at most `block_size` bytes
    pub fn layout(&self, block_size: usize) -> BlockLayout {
        BlockLayout::fixed(&self.data, block_size)
    }
}
