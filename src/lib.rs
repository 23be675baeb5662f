//! mmdb-reader - Read-only MaxMind DB Lookups
//!
//! mmdb-reader answers IP address queries against databases in the MaxMind DB
//! format (GeoIP2, GeoLite2, and anything else written in that format). A
//! lookup returns the structured record stored for the longest matching
//! network plus the prefix length that matched.
//!
//! # Quick Start
//!
//! ```no_run
//! use mmdb_reader::Database;
//!
//! let db = Database::open("GeoLite2-Country.mmdb")?;
//!
//! if let Some(result) = db.lookup("1.1.1.1")? {
//!     let iso = result.data.get_path(&["country", "iso_code"]);
//!     println!("{:?} via /{}", iso, result.matched_bits);
//! }
//!
//! let metadata = db.metadata()?;
//! println!("{} built {}", metadata.database_type, metadata.build_date());
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```
//!
//! # Key Features
//!
//! - **Zero-Copy Loading**: Memory-mapped files load instantly
//! - **All Record Sizes**: 24, 28 and 32-bit search trees, IPv4 and IPv6
//! - **Bounded Decoding**: Pointer chains and nesting are depth-limited
//! - **Hot Reload**: [`SharedDatabase`] swaps buffers under live readers
//! - **Serde Output**: Decoded records serialize straight to JSON
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Database File Format                │
//! ├──────────────────────────────────────┤
//! │  1. IP Search Tree (binary trie)     │
//! │  2. 16-byte separator                │
//! │  3. Data Section                     │
//! │  4. Metadata marker + map            │
//! └──────────────────────────────────────┘
//! ```
//!
//! A query is packed into its 4 or 16 network-order bytes
//! ([`ip_address`]), walked bit by bit through the tree ([`mmdb::tree`]),
//! and the record the walk ends on is decoded from the data section
//! ([`data_section`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section decoding
pub mod data_section;
/// Database API
pub mod database;
/// Error types for database operations
pub mod error;
pub mod ip_address;
/// MMDB format implementation
pub mod mmdb;
pub mod names;
pub mod shared;

// Re-exports for Rust consumers

/// Database for IP lookups
pub use crate::database::{Database, DatabaseOpener, DatabaseOptions, LookupResult};

/// Data value type for database records
pub use crate::data_section::{DataDecoder, DataValue};

/// Error type and result alias
pub use crate::error::{MmdbError, Result};

/// Packed address and text conversion
pub use crate::ip_address::{expand, pack, unpack, PackedAddress};

/// Database metadata
pub use crate::mmdb::{IpVersion, Metadata, RecordSize};

/// Reloadable database handle
pub use crate::shared::SharedDatabase;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
