//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left and right) that point to either:
//! - Another node (record < node_count, continue traversal)
//! - A "not found" marker (record == node_count)
//! - A data section offset (record > node_count)

use super::format::Metadata;
use super::types::{IpVersion, RecordSize};
use crate::error::{MmdbError, Result};
use crate::ip_address::PackedAddress;

/// Number of leading zero bits in front of IPv4 space in an IPv6 tree
const IPV4_SUBTREE_DEPTH: usize = 96;

/// Outcome of a tree walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLookup {
    /// Record value that ended the walk, or 0 when the address has no data
    pub pointer: u32,
    /// Number of address bits consumed (the matched prefix length)
    pub depth: u32,
}

impl TreeLookup {
    /// Whether the walk ended on data
    pub fn is_found(&self) -> bool {
        self.pointer != 0
    }
}

/// Search tree for IP address lookups
#[derive(Debug, Clone, Copy)]
pub struct SearchTree<'a> {
    /// The raw file data containing the tree
    data: &'a [u8],
    node_count: u32,
    record_size: RecordSize,
    ip_version: IpVersion,
    search_tree_size: usize,
    /// Precomputed IPv4 start node, if the caller has one cached
    ipv4_start: Option<u32>,
}

impl<'a> SearchTree<'a> {
    /// Create a search tree over `data` described by `metadata`
    pub fn new(data: &'a [u8], metadata: &Metadata) -> Self {
        Self::from_parts(data, metadata.node_count, metadata.record_size, metadata.ip_version)
    }

    /// Create a search tree from raw header values
    pub fn from_parts(
        data: &'a [u8],
        node_count: u32,
        record_size: RecordSize,
        ip_version: IpVersion,
    ) -> Self {
        Self {
            data,
            node_count,
            record_size,
            ip_version,
            search_tree_size: node_count as usize * record_size.node_bytes(),
            ipv4_start: None,
        }
    }

    /// Use a previously computed IPv4 start node instead of walking for it
    pub fn with_ipv4_start(mut self, node: u32) -> Self {
        self.ipv4_start = Some(node);
        self
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Walk the tree for `addr`
    ///
    /// The returned depth never exceeds the address bit count. A walk that
    /// runs out of address bits while still on an internal node means the
    /// tree is malformed and yields [`MmdbError::InvalidNodeInTree`].
    pub fn find(&self, addr: &PackedAddress) -> Result<TreeLookup> {
        let bit_count = addr.bit_count();
        let mut node = self.start_node(addr)?;
        let mut depth = 0u32;

        while depth < bit_count && node < self.node_count {
            node = self.read_node(node, addr.bit(depth))?;
            depth += 1;
        }

        if node == self.node_count {
            Ok(TreeLookup { pointer: 0, depth })
        } else if node > self.node_count {
            Ok(TreeLookup {
                pointer: node,
                depth,
            })
        } else {
            Err(MmdbError::InvalidNodeInTree { node, depth })
        }
    }

    fn start_node(&self, addr: &PackedAddress) -> Result<u32> {
        if !addr.is_ipv4() || self.ip_version == IpVersion::V4 {
            return Ok(0);
        }
        match self.ipv4_start {
            Some(node) => Ok(node),
            None => self.ipv4_start_node(),
        }
    }

    /// Find the IPv4 start node in an IPv6 tree
    ///
    /// IPv4 addresses live under `::/96` in a dual-stack tree, so this follows
    /// the left record 96 times from the root, stopping early if it leaves
    /// the tree. On an IPv4 tree this is node 0.
    pub fn ipv4_start_node(&self) -> Result<u32> {
        let mut node = 0u32;
        if self.ip_version == IpVersion::V6 {
            for _ in 0..IPV4_SUBTREE_DEPTH {
                if node >= self.node_count {
                    break;
                }
                node = self.read_node(node, 0)?;
            }
        }
        tracing::debug!(node, "computed IPv4 start node");
        Ok(node)
    }

    /// Read one record of a node
    ///
    /// `child` 0 is the left record (address bit 0), 1 the right record.
    pub fn read_node(&self, node: u32, child: u8) -> Result<u32> {
        if node >= self.node_count {
            return Err(MmdbError::CorruptSearchTree(format!(
                "Node index {} exceeds node count {}",
                node, self.node_count
            )));
        }

        let node_bytes = self.record_size.node_bytes();
        let base = node as usize * node_bytes;
        let bytes = self.data.get(base..base + node_bytes).ok_or_else(|| {
            MmdbError::CorruptSearchTree(format!(
                "Node {} at offset {} extends past the end of the file",
                node, base
            ))
        })?;

        let right = child != 0;
        let record = match self.record_size {
            RecordSize::Bits24 => {
                let r = if right { &bytes[3..6] } else { &bytes[0..3] };
                u32::from_be_bytes([0, r[0], r[1], r[2]])
            }
            RecordSize::Bits28 => {
                if right {
                    be_u32(&bytes[3..7]) & 0x0FFF_FFFF
                } else {
                    // Middle byte's high nibble is the left record's top 4 bits
                    let w = be_u32(&bytes[0..4]);
                    ((w & 0xF0) << 20) | (w >> 8)
                }
            }
            RecordSize::Bits32 => {
                if right {
                    be_u32(&bytes[4..8])
                } else {
                    be_u32(&bytes[0..4])
                }
            }
        };
        Ok(record)
    }

    /// Absolute buffer offset of the data a record points at
    pub fn data_offset(&self, pointer: u32) -> Result<usize> {
        let relative = pointer.checked_sub(self.node_count).ok_or_else(|| {
            MmdbError::CorruptSearchTree(format!(
                "Record {} is not a data pointer (node_count = {})",
                pointer, self.node_count
            ))
        })?;

        let offset = relative as usize + self.search_tree_size;
        if offset >= self.data.len() {
            return Err(MmdbError::CorruptSearchTree(format!(
                "Data offset {} is beyond the end of the file ({} bytes)",
                offset,
                self.data.len()
            )));
        }
        Ok(offset)
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
