//! # Block-compressed stream access
//!
//! This module turns a BGZF file into a byte stream with exact virtual offset
//! bookkeeping.
//!
//! * [`BlockSource`] yields decompressed [`Block`]s in file order; [`BgzfReader`]
//!   implements it for any [`std::io::Read`].
//! * [`BlockCursor`] stitches consecutive blocks together and reports the
//!   [`VirtualOffset`](crate::VirtualOffset) of the next unread byte.

mod block;
mod cursor;

pub use block::{BgzfReader, Block, BlockSource, MAX_BLOCK_SIZE};
pub use cursor::BlockCursor;
