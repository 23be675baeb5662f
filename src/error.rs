/// Error types for the mmdb-reader library
use std::fmt;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, MmdbError>;

/// Main error type for database loading, decoding and lookups
///
/// Every variant is terminal for the operation that raised it; nothing is
/// retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmdbError {
    /// An operation was attempted before any buffer was loaded
    DatabaseNotLoaded,

    /// The metadata marker is absent from the tail of the buffer
    MetadataSectionNotFound,

    /// The metadata block decoded, but not into a usable map
    CorruptMetadata(String),

    /// `record_size` is not one of 24, 28 or 32
    UnsupportedRecordSize(u16),

    /// A tree record or data pointer resolves outside the buffer
    CorruptSearchTree(String),

    /// Traversal stopped on a node that is neither a sentinel nor data
    InvalidNodeInTree {
        /// Node index where traversal stopped
        node: u32,
        /// Number of address bits consumed
        depth: u32,
    },

    /// A double whose encoded size is not 8 bytes
    UnsupportedDoubleSize(usize),

    /// A scalar whose encoded size is outside the range its type allows
    UnexpectedSize {
        /// Data type number from the control byte
        type_id: u16,
        /// Decoded payload size
        size: usize,
    },

    /// Control byte names a type this decoder does not support
    UnknownType(u16),

    /// A textual address that is neither valid IPv4 nor valid IPv6
    InvalidIp(String),

    /// String payload is not valid UTF-8
    InvalidUtf8 {
        /// Offset of the string payload
        offset: usize,
    },

    /// A map key decoded to something other than a string
    InvalidMapKey {
        /// Offset of the offending key
        offset: usize,
    },

    /// Encoded value runs past the end of the buffer
    UnexpectedEof {
        /// Offset where the truncated read started
        offset: usize,
    },

    /// Nested maps/arrays/pointers exceeded the configured depth limit
    MaxDepthExceeded(usize),

    /// One decode produced more values than the configured budget
    DecodeBudgetExceeded(usize),

    /// I/O errors while opening a database file
    Io(String),
}

impl fmt::Display for MmdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmdbError::DatabaseNotLoaded => write!(f, "Database not loaded"),
            MmdbError::MetadataSectionNotFound => write!(f, "Metadata section not found"),
            MmdbError::CorruptMetadata(msg) => write!(f, "Corrupt metadata: {}", msg),
            MmdbError::UnsupportedRecordSize(bits) => {
                write!(f, "Unsupported record size: {}", bits)
            }
            MmdbError::CorruptSearchTree(msg) => write!(f, "The search tree is corrupt: {}", msg),
            MmdbError::InvalidNodeInTree { node, depth } => write!(
                f,
                "Invalid node in search tree: node {} at depth {}",
                node, depth
            ),
            MmdbError::UnsupportedDoubleSize(size) => {
                write!(f, "Unsupported size of double: {}", size)
            }
            MmdbError::UnexpectedSize { type_id, size } => {
                write!(f, "Unexpected size {} for type {}", size, type_id)
            }
            MmdbError::UnknownType(type_id) => write!(f, "Unknown type: {}", type_id),
            MmdbError::InvalidIp(input) => write!(f, "Invalid IP: {:?}", input),
            MmdbError::InvalidUtf8 { offset } => {
                write!(f, "Invalid UTF-8 in string at offset {}", offset)
            }
            MmdbError::InvalidMapKey { offset } => {
                write!(f, "Map key at offset {} is not a string", offset)
            }
            MmdbError::UnexpectedEof { offset } => {
                write!(f, "Unexpected end of data at offset {}", offset)
            }
            MmdbError::MaxDepthExceeded(limit) => {
                write!(f, "Maximum decode depth of {} exceeded", limit)
            }
            MmdbError::DecodeBudgetExceeded(limit) => {
                write!(f, "Decode exceeded the budget of {} values", limit)
            }
            MmdbError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for MmdbError {}

impl From<std::io::Error> for MmdbError {
    fn from(err: std::io::Error) -> Self {
        MmdbError::Io(err.to_string())
    }
}
