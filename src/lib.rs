//! # bamdex
//!
//! Streaming construction of bin and linear indexes for BGZF-compressed
//! alignment files, and region queries against them.
//!
//! An alignment file is read once, front to back. Each compressed block is
//! inflated in turn, the header and reference dictionary are parsed, and the
//! virtual offset and genomic interval of every record are handed to an index
//! builder. The resulting [`Index`] answers one question: which compressed
//! ranges of the file may hold records overlapping a genomic region.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bamdex::Indexer;
//!
//! let index = Indexer::default().index_path("alignments.bam").unwrap();
//! for (id, reference) in index.references().iter().enumerate() {
//!     let name = index.header().reference_name(id).unwrap_or("?");
//!     println!("{name}: {} bins", reference.bins().len());
//! }
//!
//! let chunks = index.chunks_overlapping(0, 10_000, 20_000);
//! println!("{} candidate chunks", chunks.len());
//! ```
//!
//! ## Modules
//!
//! * [`bgzf`] - Block decompression and a byte cursor with virtual offset tracking
//! * [`bam`] - Header parsing and record position scanning
//! * [`binning`] - The hierarchical binning scheme
//! * [`index`] - Index structures and region queries

pub mod bam;
pub mod bgzf;
pub mod binning;
pub mod error;
pub mod index;
mod indexer;
mod offset;

#[cfg(test)]
mod testing;

pub use error::{BlockError, Error, HeaderError, IndexError, ReadError, Result};
pub use index::{compact_chunks, Bin, Chunk, Index, ReferenceIndex, ReferenceMetadata};
pub use indexer::{build_index, Indexer, IndexerBuilder};
pub use offset::VirtualOffset;
