//! Textual ⇄ packed IP address conversion
//!
//! Lookups walk the search tree one address bit at a time, so queries are
//! first packed into their 4-byte (IPv4) or 16-byte (IPv6) network-order
//! form. IPv4 segments must be canonical decimal. IPv6 text follows the
//! slot-filling rules of [`pack`]; anything else is
//! [`MmdbError::InvalidIp`].
//!
//! # Example
//!
//! ```
//! use mmdb_reader::ip_address::{expand, pack, PackedAddress};
//!
//! let packed = pack("1.1.1.1")?;
//! assert_eq!(packed, PackedAddress::V4([1, 1, 1, 1]));
//!
//! assert_eq!(expand("2001:db8::1")?, "2001:0db8:0000:0000:0000:0000:0000:0001");
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```

use crate::error::{MmdbError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP address in network byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackedAddress {
    /// 4-byte IPv4 address
    V4([u8; 4]),
    /// 16-byte IPv6 address
    V6([u8; 16]),
}

impl PackedAddress {
    /// Raw bytes, most significant first
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PackedAddress::V4(bytes) => bytes,
            PackedAddress::V6(bytes) => bytes,
        }
    }

    /// Number of address bits (32 or 128)
    pub fn bit_count(&self) -> u32 {
        8 * self.as_bytes().len() as u32
    }

    /// Whether this is a 4-byte address
    pub fn is_ipv4(&self) -> bool {
        matches!(self, PackedAddress::V4(_))
    }

    /// Bit at `index`, counting from the most significant bit of the first byte
    ///
    /// `index` must be below [`bit_count`](Self::bit_count).
    pub fn bit(&self, index: u32) -> u8 {
        let byte = self.as_bytes()[(index >> 3) as usize];
        (byte >> (7 - (index & 7))) & 1
    }

    /// Copy of this address with every bit past `prefix_len` cleared
    pub fn masked(&self, prefix_len: u32) -> PackedAddress {
        let mut out = *self;
        let bytes: &mut [u8] = match &mut out {
            PackedAddress::V4(b) => b,
            PackedAddress::V6(b) => b,
        };
        for (i, byte) in bytes.iter_mut().enumerate() {
            let first_bit = 8 * i as u32;
            if prefix_len <= first_bit {
                *byte = 0;
            } else if prefix_len < first_bit + 8 {
                *byte &= 0xFFu8 << (8 - (prefix_len - first_bit));
            }
        }
        out
    }
}

impl From<IpAddr> for PackedAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => PackedAddress::V4(v4.octets()),
            IpAddr::V6(v6) => PackedAddress::V6(v6.octets()),
        }
    }
}

impl From<PackedAddress> for IpAddr {
    fn from(packed: PackedAddress) -> Self {
        match packed {
            PackedAddress::V4(b) => IpAddr::V4(Ipv4Addr::from(b)),
            PackedAddress::V6(b) => IpAddr::V6(Ipv6Addr::from(b)),
        }
    }
}

impl FromStr for PackedAddress {
    type Err = MmdbError;

    fn from_str(s: &str) -> Result<Self> {
        pack(s)
    }
}

impl fmt::Display for PackedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&unpack(self))
    }
}

/// Parse a textual IPv4 or IPv6 address into its packed form
///
/// Text containing a `.` is parsed as dotted-decimal IPv4: exactly four
/// segments, each the canonical decimal form of a value in `0..=255`
/// (no leading zeros, signs or whitespace). Everything else is parsed as
/// colon-separated IPv6 of at most eight pieces, with optional `::` zero
/// compression. Groups that are never given stay zero, so `1:2:3` packs the
/// same as `1:2:3::`.
pub fn pack(text: &str) -> Result<PackedAddress> {
    if text.contains('.') {
        pack_v4(text).map(PackedAddress::V4)
    } else {
        pack_v6(text).map(PackedAddress::V6)
    }
}

/// Render a packed address as text
///
/// IPv4 is dotted decimal. IPv6 is always the full eight groups of four
/// lowercase hex digits, with no `::` compression.
pub fn unpack(packed: &PackedAddress) -> String {
    match packed {
        PackedAddress::V4(b) => format!("{}.{}.{}.{}", b[0], b[1], b[2], b[3]),
        PackedAddress::V6(b) => b
            .chunks_exact(2)
            .map(|pair| format!("{:04x}", u16::from_be_bytes([pair[0], pair[1]])))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

/// Normalize an address into its fully expanded textual form
pub fn expand(text: &str) -> Result<String> {
    pack(text).map(|packed| unpack(&packed))
}

fn invalid(text: &str) -> MmdbError {
    MmdbError::InvalidIp(text.to_string())
}

fn pack_v4(text: &str) -> Result<[u8; 4]> {
    let segments: Vec<&str> = text.split('.').collect();
    if segments.len() != 4 {
        return Err(invalid(text));
    }

    let mut bytes = [0u8; 4];
    for (byte, segment) in bytes.iter_mut().zip(&segments) {
        let value: u8 = segment.parse().map_err(|_| invalid(text))?;
        // u8::from_str tolerates a leading '+' and zero padding
        if value.to_string() != *segment {
            return Err(invalid(text));
        }
        *byte = value;
    }
    Ok(bytes)
}

/// Fills hextet slots left to right
///
/// An empty piece at either end is skipped (it still occupies its slot). Any
/// other empty piece stands for `8 - pieces + 1` zero slots. Slots never
/// filled stay zero, so short forms like `1:2:3` are accepted.
fn pack_v6(text: &str) -> Result<[u8; 16]> {
    let pieces: Vec<&str> = text.split(':').collect();
    if pieces.len() > 8 {
        return Err(invalid(text));
    }
    let last = pieces.len() - 1;

    let mut bytes = [0u8; 16];
    let mut slot = 0usize;
    for (i, piece) in pieces.iter().enumerate() {
        if piece.is_empty() {
            slot += if i == 0 || i == last { 1 } else { 8 - pieces.len() + 1 };
            if slot > 8 {
                return Err(invalid(text));
            }
            continue;
        }
        if slot >= 8 {
            return Err(invalid(text));
        }
        let hextet = parse_hextet(piece).ok_or_else(|| invalid(text))?;
        bytes[2 * slot..2 * slot + 2].copy_from_slice(&hextet.to_be_bytes());
        slot += 1;
    }
    Ok(bytes)
}

/// 1-4 hex digits
fn parse_hextet(piece: &str) -> Option<u16> {
    // from_str_radix alone would also take a leading '+'
    if piece.len() > 4 || !piece.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(piece, 16).ok()
}
