//! Hot-swappable database handle
//!
//! Provides [`SharedDatabase`], a wrapper around [`Database`] whose buffer can
//! be replaced while other threads are querying it. Uses lock-free Arc
//! swapping: a reload builds a complete new [`Database`] and publishes it
//! atomically, and lookups that already took a snapshot finish against the
//! old buffer.
//!
//! # Example
//!
//! ```no_run
//! use mmdb_reader::SharedDatabase;
//!
//! let db = SharedDatabase::open("GeoLite2-Country.mmdb")?;
//! let before = db.lookup("1.1.1.1")?;
//!
//! db.reload_from_path("GeoLite2-Country.mmdb")?;
//! assert_eq!(db.generation(), 2);
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```

use crate::database::{Database, DatabaseOptions, LookupResult};
use crate::error::Result;
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Database handle that supports atomic reloads
///
/// `SharedDatabase` is `Send + Sync`; share it behind an `Arc` or by
/// reference across threads.
#[derive(Debug)]
pub struct SharedDatabase {
    /// Current database using lock-free atomic Arc pointer
    current: ArcSwap<Database>,

    /// Incremented after every successful reload, starting at 1
    generation: AtomicU64,

    /// Applied to every database built by a reload
    max_decode_depth: usize,
}

impl SharedDatabase {
    /// Wrap an already opened database
    pub fn new(db: Database) -> Self {
        Self {
            current: ArcSwap::from_pointee(db),
            generation: AtomicU64::new(1),
            max_decode_depth: DatabaseOptions::default().max_decode_depth,
        }
    }

    /// Open a database file and wrap it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Database::open(path).map(Self::new)
    }

    /// Open with explicit options; reloads reuse the same decode depth limit
    pub fn open_with_options(options: DatabaseOptions) -> Result<Self> {
        let max_decode_depth = options.max_decode_depth;
        let db = Database::open_with_options(options)?;
        Ok(Self {
            max_decode_depth,
            ..Self::new(db)
        })
    }

    /// The database currently published
    ///
    /// The snapshot stays valid after a reload; it simply no longer sees
    /// the newest buffer.
    pub fn snapshot(&self) -> Arc<Database> {
        self.current.load_full()
    }

    /// Look up an address against the current database
    pub fn lookup(&self, addr: &str) -> Result<Option<LookupResult>> {
        self.current.load().lookup(addr)
    }

    /// Replace the database with one built from `bytes`
    ///
    /// The new buffer is validated before it is published; on error the
    /// current database stays in place.
    pub fn reload_from_bytes(&self, bytes: Vec<u8>) -> Result<u64> {
        let db = Database::from_bytes_builder(bytes)
            .max_decode_depth(self.max_decode_depth)
            .open()?;
        Ok(self.publish(db))
    }

    /// Replace the database with a freshly mapped file
    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<u64> {
        let db = Database::from(path.as_ref())
            .max_decode_depth(self.max_decode_depth)
            .open()?;
        Ok(self.publish(db))
    }

    /// Number of databases published so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn publish(&self, db: Database) -> u64 {
        self.current.store(Arc::new(db));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, "reloaded shared database");
        generation
    }
}
