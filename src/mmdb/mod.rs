//! MaxMind DB (MMDB) Reader
//!
//! This module provides the format-level pieces of reading MaxMind DB files,
//! which are used for GeoIP lookups and other IP-based data lookups.
//!
//! The MMDB format uses a binary search tree for efficient IP address
//! lookups. Data is stored in the MMDB data section format, decoded by
//! [`crate::data_section::DataDecoder`].
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **format**: Metadata location and tree geometry
//! - **tree**: Search tree traversal for IP lookups

pub mod format;
pub mod tree;
pub mod types;

// Re-export key types
pub use format::{find_metadata_marker, Metadata, TreeGeometry};
pub use tree::{SearchTree, TreeLookup};
pub use types::{IpVersion, RecordSize, METADATA_MARKER};
