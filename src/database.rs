//! Database API
//!
//! [`Database`] owns the raw bytes of one MaxMind DB file and answers IP
//! lookups against it. Metadata and the IPv4 start node are computed on
//! first use and cached for the lifetime of the buffer.
//!
//! # Examples
//!
//! ```no_run
//! use mmdb_reader::Database;
//!
//! let db = Database::open("GeoLite2-Country.mmdb")?;
//! if let Some(result) = db.lookup("1.1.1.1")? {
//!     println!("/{}: {:?}", result.matched_bits, result.data);
//! }
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```

use crate::data_section::{DataDecoder, DataValue, DEFAULT_MAX_DEPTH};
use crate::error::{MmdbError, Result};
use crate::ip_address::{pack, unpack, PackedAddress};
use crate::mmdb::{Metadata, SearchTree};
use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Result of a successful IP lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// The record stored for the matched network
    pub data: DataValue,
    /// Number of address bits consumed before reaching the record
    pub matched_bits: u32,
}

impl LookupResult {
    /// The matched network of `addr` in CIDR notation, e.g. `1.1.1.0/24`
    pub fn network(&self, addr: &PackedAddress) -> String {
        format!(
            "{}/{}",
            unpack(&addr.masked(self.matched_bits)),
            self.matched_bits
        )
    }
}

/// Storage for database bytes - either owned or memory-mapped
#[derive(Debug)]
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// Configuration for opening a database
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Path to the database file (ignored when `bytes` is set)
    pub path: PathBuf,

    /// Optional in-memory bytes (for from_bytes builder)
    pub bytes: Option<Vec<u8>>,

    /// Limit on nested maps, arrays and pointer hops per decoded value
    pub max_decode_depth: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            bytes: None,
            max_decode_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Builder for opening databases with custom configuration
///
/// # Examples
///
/// ```no_run
/// use mmdb_reader::Database;
///
/// let db = Database::from("GeoLite2-City.mmdb")
///     .max_decode_depth(64)
///     .open()?;
/// # Ok::<(), mmdb_reader::MmdbError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseOpener {
    options: DatabaseOptions,
}

impl DatabaseOpener {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            options: DatabaseOptions {
                path: path.into(),
                ..Default::default()
            },
        }
    }

    /// Create an opener over in-memory bytes
    pub fn from_bytes_builder(bytes: Vec<u8>) -> Self {
        Self {
            options: DatabaseOptions {
                bytes: Some(bytes),
                ..Default::default()
            },
        }
    }

    /// Set the decode depth limit
    ///
    /// Default: [`DEFAULT_MAX_DEPTH`]
    pub fn max_decode_depth(mut self, depth: usize) -> Self {
        self.options.max_decode_depth = depth;
        self
    }

    /// Open the database
    pub fn open(self) -> Result<Database> {
        Database::open_with_options(self.options)
    }
}

/// A read-only MaxMind DB
///
/// `Database` is `Send + Sync`. Lookups never mutate the buffer, and the lazily
/// computed metadata is guarded by [`OnceLock`], so one instance can serve
/// concurrent lookups. To swap in a new file while lookups are in flight,
/// see [`SharedDatabase`](crate::shared::SharedDatabase).
#[derive(Debug)]
pub struct Database {
    storage: Option<DatabaseStorage>,
    max_decode_depth: usize,
    // Failures are cached too: the buffer cannot change without `load`,
    // which resets both cells.
    metadata: OnceLock<Result<Metadata>>,
    ipv4_start: OnceLock<Result<u32>>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Create a database with no buffer loaded
    ///
    /// Every query fails with [`MmdbError::DatabaseNotLoaded`] until
    /// [`load`](Self::load) is called.
    pub fn new() -> Self {
        Self {
            storage: None,
            max_decode_depth: DEFAULT_MAX_DEPTH,
            metadata: OnceLock::new(),
            ipv4_start: OnceLock::new(),
        }
    }

    /// Create a database opener for the given path
    pub fn from(path: impl Into<PathBuf>) -> DatabaseOpener {
        DatabaseOpener::new(path)
    }

    /// Create a database opener over in-memory bytes
    pub fn from_bytes_builder(bytes: Vec<u8>) -> DatabaseOpener {
        DatabaseOpener::from_bytes_builder(bytes)
    }

    /// Memory-map a database file and validate its metadata
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from(path.as_ref()).open()
    }

    /// Wrap raw bytes and validate their metadata
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_builder(data).open()
    }

    /// Open a database with explicit options
    pub fn open_with_options(options: DatabaseOptions) -> Result<Self> {
        let storage = match options.bytes {
            Some(bytes) => DatabaseStorage::Owned(bytes),
            None => {
                let file = File::open(&options.path).map_err(|e| {
                    MmdbError::Io(format!("Failed to open {}: {}", options.path.display(), e))
                })?;
                // SAFETY: the map is read-only; the file is expected not to be
                // truncated while mapped, same as any mmap-backed reader.
                let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                    MmdbError::Io(format!("Failed to mmap {}: {}", options.path.display(), e))
                })?;
                DatabaseStorage::Mmap(mmap)
            }
        };

        let db = Self {
            storage: Some(storage),
            max_decode_depth: options.max_decode_depth,
            metadata: OnceLock::new(),
            ipv4_start: OnceLock::new(),
        };
        db.metadata()?;
        Ok(db)
    }

    /// Replace the buffer and drop every cached value
    ///
    /// Metadata is not parsed here; a bad buffer surfaces on the next query.
    pub fn load(&mut self, data: Vec<u8>) {
        self.storage = Some(DatabaseStorage::Owned(data));
        self.metadata = OnceLock::new();
        self.ipv4_start = OnceLock::new();
    }

    /// Whether a buffer has been loaded
    pub fn is_loaded(&self) -> bool {
        self.storage.is_some()
    }

    /// The raw database bytes
    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.storage
            .as_ref()
            .map(DatabaseStorage::as_slice)
            .ok_or(MmdbError::DatabaseNotLoaded)
    }

    /// Decoded metadata, computed on first call
    pub fn metadata(&self) -> Result<&Metadata> {
        let data = self.as_bytes()?;
        self.metadata
            .get_or_init(|| {
                let metadata = Metadata::locate(data)?;
                tracing::debug!(
                    node_count = metadata.node_count,
                    record_size = metadata.record_size.bits(),
                    ip_version = metadata.ip_version.number(),
                    build_epoch = metadata.build_epoch,
                    "located database metadata"
                );
                Ok(metadata)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The metadata map exactly as decoded
    pub fn metadata_value(&self) -> Result<&DataValue> {
        self.metadata().map(|metadata| &metadata.raw)
    }

    /// Look up a textual IPv4 or IPv6 address
    ///
    /// Returns `Ok(None)` when the tree has no record for the address.
    pub fn lookup(&self, addr: &str) -> Result<Option<LookupResult>> {
        self.lookup_packed(&pack(addr)?)
    }

    /// Look up a parsed address
    pub fn lookup_ip(&self, addr: IpAddr) -> Result<Option<LookupResult>> {
        self.lookup_packed(&PackedAddress::from(addr))
    }

    /// Look up a packed address
    pub fn lookup_packed(&self, addr: &PackedAddress) -> Result<Option<LookupResult>> {
        let data = self.as_bytes()?;
        let metadata = self.metadata()?;
        let tree = self.search_tree(data, metadata)?;

        let found = tree.find(addr)?;
        if !found.is_found() {
            return Ok(None);
        }

        let offset = tree.data_offset(found.pointer)?;
        let value = self.decoder(data, metadata).decode_value(offset)?;
        Ok(Some(LookupResult {
            data: value,
            matched_bits: found.depth,
        }))
    }

    /// Decoder for the data section of this database
    pub fn data_decoder(&self) -> Result<DataDecoder<'_>> {
        Ok(self.decoder(self.as_bytes()?, self.metadata()?))
    }

    fn decoder<'a>(&self, data: &'a [u8], metadata: &Metadata) -> DataDecoder<'a> {
        DataDecoder::new(data, metadata.geometry().data_section_start)
            .with_max_depth(self.max_decode_depth)
    }

    fn search_tree<'a>(&self, data: &'a [u8], metadata: &Metadata) -> Result<SearchTree<'a>> {
        let tree = SearchTree::new(data, metadata);
        let start = self
            .ipv4_start
            .get_or_init(|| tree.ipv4_start_node())
            .clone()?;
        Ok(tree.with_ipv4_start(start))
    }
}
