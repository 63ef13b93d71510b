/// Custom Result type for bamdex operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the bamdex library, encompassing every way an index
/// build can fail.
///
/// Construction is all-or-nothing: any of these errors aborts the build and no
/// partial index is returned.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to the alignment container header
    HeaderError(#[from] HeaderError),
    /// Errors that occur while reading alignment records
    ReadError(#[from] ReadError),
    /// Errors raised by the compressed block layer
    BlockError(#[from] BlockError),
    /// Errors raised while assembling the index itself
    IndexError(#[from] IndexError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
}
impl Error {
    /// Checks if the error is caused by the stream ending before a record or
    /// block could be completed
    ///
    /// # Returns
    ///
    /// * `true` if the error is a truncation at either the record or block level
    /// * `false` for all other error types
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::ReadError(ReadError::TruncatedStream { .. })
                | Self::BlockError(BlockError::Truncated(_))
                | Self::HeaderError(HeaderError::Incomplete)
        )
    }

    /// Checks if the error was produced by the block decompression layer
    #[must_use]
    pub fn is_decompression_failure(&self) -> bool {
        matches!(self, Self::BlockError(_))
    }
}

/// Errors specific to processing and validating the alignment container header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number at the start of the decompressed stream does not match `BAM\1`
    ///
    /// # Arguments
    /// * `[u8; 4]` - The bytes that were found instead
    #[error("Invalid magic number: {0:?}")]
    InvalidMagicNumber([u8; 4]),

    /// The declared text header length is negative
    #[error("Invalid text header length: {0}")]
    InvalidTextLength(i32),

    /// The declared number of reference sequences is negative
    #[error("Invalid reference count: {0}")]
    InvalidReferenceCount(i32),

    /// A reference name length is zero or negative
    ///
    /// # Arguments
    /// * First `usize` - The index of the reference in the dictionary
    /// * Second `i32` - The declared name length
    #[error("Invalid name length for reference {0}: {1}")]
    InvalidNameLength(usize, i32),

    /// A reference name is missing its trailing NUL byte
    #[error("Reference name {0} is not NUL-terminated")]
    UnterminatedName(usize),

    /// The text header is not valid UTF-8
    #[error("Text header is not valid UTF-8: {0}")]
    InvalidText(#[source] std::str::Utf8Error),

    /// A reference name is not valid UTF-8
    #[error("Name of reference {0} is not valid UTF-8: {1}")]
    InvalidName(usize, #[source] std::str::Utf8Error),

    /// A reference sequence length is negative
    #[error("Invalid length for reference {0}: {1}")]
    InvalidReferenceLength(usize, i32),

    /// The stream ended before the header and reference dictionary were complete
    #[error("Stream ended before the header was complete")]
    Incomplete,
}

/// Errors that can occur while reading alignment records out of the block stream
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The stream ended inside a record length field or record body
    ///
    /// # Fields
    /// * `offset` - The packed virtual offset at which the read began
    /// * `needed` - The number of bytes that were requested
    /// * `available` - The number of bytes that could be supplied
    #[error("Stream truncated at virtual offset {offset}: needed {needed} bytes, found {available}")]
    TruncatedStream {
        offset: u64,
        needed: usize,
        available: usize,
    },

    /// The record body is too short for its fixed prefix or disagrees with the
    /// variable-length sections it declares
    ///
    /// # Arguments
    /// * First `usize` - The length of the record body
    /// * Second `usize` - The minimum length implied by its fields
    #[error("Invalid record length: body has {0} bytes but fields require {1}")]
    InvalidRecordLength(usize, usize),

    /// A length field of the record is negative
    ///
    /// # Arguments
    /// * `&'static str` - The name of the field
    /// * `i32` - The decoded value
    #[error("Negative {0} in record: {1}")]
    NegativeLength(&'static str, i32),

    /// The record refers to a reference sequence outside the dictionary
    ///
    /// # Arguments
    /// * First `i32` - The decoded reference id
    /// * Second `usize` - The number of references declared in the header
    #[error("Reference id {0} is outside the declared reference count ({1})")]
    InvalidReference(i32, usize),

    /// A placed record has a negative leftmost position
    #[error("Invalid record position {0} on reference {1}")]
    InvalidPosition(i32, usize),

    /// The path given for indexing does not name a regular file
    #[error("Input is not a regular file")]
    InvalidFileType,
}

/// Errors raised while locating and decompressing compressed blocks
#[derive(thiserror::Error, Debug)]
pub enum BlockError {
    /// The gzip magic bytes are missing at the start of a block
    ///
    /// # Arguments
    /// * `u64` - The file offset of the block
    #[error("Invalid gzip magic number at block offset {0}")]
    InvalidMagicNumber(u64),

    /// The block uses a compression method other than DEFLATE
    #[error("Unsupported compression method {1} at block offset {0}")]
    UnsupportedCompression(u64, u8),

    /// The gzip member does not carry an extra field
    #[error("Missing extra field at block offset {0}")]
    MissingExtraField(u64),

    /// The extra field carries no `BC` block size subfield
    #[error("Missing BC block size subfield at block offset {0}")]
    MissingBlockSize(u64),

    /// The declared block size is smaller than its own header and trailer
    #[error("Invalid block size {1} at block offset {0}")]
    InvalidBlockSize(u64, usize),

    /// The declared decompressed size exceeds the 64 KiB block limit
    #[error("Declared decompressed size {1} at block offset {0} exceeds 65536 bytes")]
    OversizedBlock(u64, u32),

    /// The stream ended in the middle of a block
    #[error("Stream truncated inside the block at offset {0}")]
    Truncated(u64),

    /// The inflated payload does not match the declared decompressed size
    ///
    /// # Fields
    /// * `offset` - The file offset of the block
    /// * `expected` - The declared decompressed size (ISIZE)
    /// * `got` - The number of bytes produced by inflation
    #[error("Block at offset {offset} inflated to {got} bytes, expected {expected}")]
    SizeMismatch { offset: u64, expected: u32, got: usize },

    /// The CRC32 of the inflated payload does not match the trailer
    #[error("Checksum mismatch at block offset {0}: expected {1:#010x}, found {2:#010x}")]
    ChecksumMismatch(u64, u32, u32),

    /// The DEFLATE payload could not be inflated
    #[error("Failed to inflate block at offset {0}: {1}")]
    Inflate(u64, #[source] std::io::Error),
}

/// Errors that arise while assembling per-reference index state
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Records for a reference appeared after that reference had been closed
    ///
    /// # Fields
    /// * `previous` - The reference that was being indexed (`None` for the unplaced tail)
    /// * `found` - The reference id that reappeared
    #[error("Records are not grouped by reference: found reference {found} after {previous:?}")]
    UnsortedReference {
        previous: Option<usize>,
        found: usize,
    },
}
