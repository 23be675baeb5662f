//! MMDB Binary Format Parsing
//!
//! Locates the metadata block at the tail of the file and derives the
//! geometry the rest of the reader needs.
//!
//! Layout of a database file:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Search tree (node_count nodes)      │
//! ├──────────────────────────────────────┤
//! │  16 zero bytes                       │
//! ├──────────────────────────────────────┤
//! │  Data section                        │
//! ├──────────────────────────────────────┤
//! │  "\xAB\xCD\xEFMaxMind.com"           │
//! │  Metadata map                        │
//! └──────────────────────────────────────┘
//! ```

use super::types::{
    IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER, METADATA_SEARCH_WINDOW,
};
use crate::data_section::{DataDecoder, DataValue};
use crate::error::{MmdbError, Result};
use indexmap::IndexMap;
use memchr::memmem;

/// Byte geometry of the search tree and data section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeGeometry {
    /// Size of the search tree in bytes
    pub search_tree_size: usize,
    /// Absolute offset of the first data section byte
    pub data_section_start: usize,
}

impl TreeGeometry {
    /// Derive the geometry for a tree of `node_count` nodes
    pub fn new(record_size: RecordSize, node_count: u32) -> Self {
        let search_tree_size = record_size.node_bytes() * node_count as usize;
        Self {
            search_tree_size,
            data_section_start: search_tree_size + DATA_SECTION_SEPARATOR_SIZE,
        }
    }
}

/// Decoded database metadata
///
/// The well-known fields are pulled out and typed; `raw` keeps the full map
/// exactly as decoded, including any keys this reader does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Database type, e.g. "GeoLite2-Country"
    pub database_type: String,
    /// Locale codes the records may carry names for
    pub languages: Vec<String>,
    /// Binary format major version
    pub binary_format_major_version: u16,
    /// Binary format minor version
    pub binary_format_minor_version: u16,
    /// Build time, seconds since the Unix epoch
    pub build_epoch: u64,
    /// Description by language code
    pub description: IndexMap<String, String>,
    /// Offset of the metadata map (just past the marker)
    pub offset: usize,
    /// The metadata map as decoded
    pub raw: DataValue,
}

impl Metadata {
    /// Find, decode and validate the metadata of a database buffer
    pub fn locate(data: &[u8]) -> Result<Self> {
        let marker_offset = find_metadata_marker(data)?;
        let offset = marker_offset + METADATA_MARKER.len();

        // The metadata block is its own data section: pointers in it are
        // relative to where it starts.
        let raw = DataDecoder::new(data, offset).decode_value(offset)?;
        Self::from_value(raw, offset)
    }

    /// Interpret an already decoded metadata map
    pub fn from_value(raw: DataValue, offset: usize) -> Result<Self> {
        let map = match raw {
            DataValue::Map(ref map) => map,
            _ => {
                return Err(MmdbError::CorruptMetadata(
                    "Metadata is not a map".to_string(),
                ))
            }
        };

        let node_count = u32::try_from(required_uint(map, "node_count")?).map_err(|_| {
            MmdbError::CorruptMetadata("node_count does not fit in 32 bits".to_string())
        })?;
        let record_bits = u16::try_from(required_uint(map, "record_size")?).unwrap_or(u16::MAX);
        let record_size = RecordSize::from_bits(record_bits)?;
        let ip_version = IpVersion::from_number(required_uint(map, "ip_version")?)?;

        let database_type = map
            .get("database_type")
            .and_then(DataValue::as_str)
            .unwrap_or_default()
            .to_string();
        let languages = map
            .get("languages")
            .and_then(DataValue::as_array)
            .map(|langs| {
                langs
                    .iter()
                    .filter_map(DataValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let description = map
            .get("description")
            .and_then(DataValue::as_map)
            .map(|desc| {
                desc.iter()
                    .filter_map(|(lang, text)| Some((lang.clone(), text.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Metadata {
            node_count,
            record_size,
            ip_version,
            database_type,
            languages,
            binary_format_major_version: optional_u16(map, "binary_format_major_version"),
            binary_format_minor_version: optional_u16(map, "binary_format_minor_version"),
            build_epoch: map
                .get("build_epoch")
                .and_then(DataValue::as_u64)
                .unwrap_or(0),
            description,
            offset,
            raw,
        })
    }

    /// Search tree size and data section start
    pub fn geometry(&self) -> TreeGeometry {
        TreeGeometry::new(self.record_size, self.node_count)
    }

    /// Build date as `YYYY-MM-DD` (UTC)
    pub fn build_date(&self) -> String {
        let (year, month, day) = days_to_ymd(self.build_epoch / 86_400);
        format!("{:04}-{:02}-{:02}", year, month, day)
    }
}

/// Find the metadata marker (zero allocation)
///
/// The marker must start within the final [`METADATA_SEARCH_WINDOW`] bytes
/// of the file. If it occurs more than once, the last occurrence wins.
/// Returns the offset of the marker itself; metadata follows it.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize> {
    // The last byte of the file is never part of the marker
    let end = data.len().checked_sub(1).ok_or(MmdbError::MetadataSectionNotFound)?;
    let start = (data.len() + 1).saturating_sub(METADATA_SEARCH_WINDOW);
    if end < start + METADATA_MARKER.len() {
        return Err(MmdbError::MetadataSectionNotFound);
    }

    memmem::rfind(&data[start..end], METADATA_MARKER)
        .map(|pos| start + pos)
        .ok_or(MmdbError::MetadataSectionNotFound)
}

// Helper functions to extract values from the metadata map

fn required_uint(map: &IndexMap<String, DataValue>, key: &str) -> Result<u64> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            MmdbError::CorruptMetadata(format!("Field '{}' is not an unsigned integer", key))
        }),
        None => Err(MmdbError::CorruptMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}

fn optional_u16(map: &IndexMap<String, DataValue>, key: &str) -> u16 {
    map.get(key)
        .and_then(DataValue::as_u64)
        .and_then(|n| u16::try_from(n).ok())
        .unwrap_or(0)
}

// Convert days since Unix epoch to year/month/day
//
// Closed form over 400-year eras (146097 days each), counting years from
// March so the leap day falls at the end. Constant time for any epoch.
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let day_of_era = z - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;

    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = year_of_era + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Metadata map with node_count=1, record_size=24, ip_version=4
    fn minimal_metadata() -> Vec<u8> {
        let mut bytes = vec![0xE3];
        bytes.extend_from_slice(b"\x4Anode_count\xC1\x01");
        bytes.extend_from_slice(b"\x4Brecord_size\xA1\x18");
        bytes.extend_from_slice(b"\x4Aip_version\xA1\x04");
        bytes
    }

    fn file_with_tail(prefix_len: usize, tail: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; prefix_len];
        data.extend_from_slice(METADATA_MARKER);
        data.extend_from_slice(tail);
        data
    }

    #[test]
    fn test_find_metadata_marker() {
        let data = file_with_tail(64, &minimal_metadata());
        assert_eq!(find_metadata_marker(&data).unwrap(), 64);
    }

    #[test]
    fn test_find_metadata_marker_prefers_last() {
        let mut data = file_with_tail(8, b"junk");
        data.extend_from_slice(METADATA_MARKER);
        data.extend_from_slice(&minimal_metadata());
        let second = 8 + METADATA_MARKER.len() + 4;
        assert_eq!(find_metadata_marker(&data).unwrap(), second);
    }

    #[test]
    fn test_metadata_not_found() {
        assert_eq!(
            find_metadata_marker(b"not a valid mmdb file"),
            Err(MmdbError::MetadataSectionNotFound)
        );
        assert_eq!(find_metadata_marker(b""), Err(MmdbError::MetadataSectionNotFound));
    }

    #[test]
    fn test_marker_outside_search_window() {
        // Marker starts more than 300 bytes before the end
        let data = file_with_tail(0, &[0u8; 300]);
        assert_eq!(find_metadata_marker(&data), Err(MmdbError::MetadataSectionNotFound));

        // Exactly at the edge of the window it is still found
        let data = file_with_tail(10, &[0u8; 300 - METADATA_MARKER.len() - 1]);
        assert_eq!(find_metadata_marker(&data).unwrap(), 10);
    }

    #[test]
    fn test_marker_at_very_end_is_ignored() {
        let mut data = vec![0u8; 32];
        data.extend_from_slice(METADATA_MARKER);
        assert_eq!(find_metadata_marker(&data), Err(MmdbError::MetadataSectionNotFound));
    }

    #[test]
    fn test_locate_minimal_metadata() {
        let data = file_with_tail(6, &minimal_metadata());
        let metadata = Metadata::locate(&data).unwrap();
        assert_eq!(metadata.node_count, 1);
        assert_eq!(metadata.record_size, RecordSize::Bits24);
        assert_eq!(metadata.ip_version, IpVersion::V4);
        assert_eq!(metadata.database_type, "");
        assert!(metadata.languages.is_empty());
        assert_eq!(metadata.offset, 6 + METADATA_MARKER.len());

        let geometry = metadata.geometry();
        assert_eq!(geometry.search_tree_size, 6);
        assert_eq!(geometry.data_section_start, 22);
    }

    #[test]
    fn test_metadata_must_be_map() {
        let data = file_with_tail(0, b"\x43abc\x00");
        assert!(matches!(
            Metadata::locate(&data),
            Err(MmdbError::CorruptMetadata(_))
        ));
    }

    #[test]
    fn test_metadata_unsupported_record_size() {
        let mut tail = vec![0xE3];
        tail.extend_from_slice(b"\x4Anode_count\xC1\x01");
        tail.extend_from_slice(b"\x4Brecord_size\xA1\x14");
        tail.extend_from_slice(b"\x4Aip_version\xA1\x04");
        tail.push(0);
        let data = file_with_tail(0, &tail);
        assert_eq!(
            Metadata::locate(&data),
            Err(MmdbError::UnsupportedRecordSize(20))
        );
    }

    #[test]
    fn test_metadata_missing_field() {
        let mut tail = vec![0xE1];
        tail.extend_from_slice(b"\x4Anode_count\xC1\x01");
        tail.push(0);
        let data = file_with_tail(0, &tail);
        assert!(matches!(
            Metadata::locate(&data),
            Err(MmdbError::CorruptMetadata(ref msg)) if msg.contains("record_size")
        ));
    }

    #[test]
    fn test_geometry_per_record_size() {
        assert_eq!(
            TreeGeometry::new(RecordSize::Bits28, 10),
            TreeGeometry {
                search_tree_size: 70,
                data_section_start: 86
            }
        );
        assert_eq!(TreeGeometry::new(RecordSize::Bits32, 3).search_tree_size, 24);
    }

    #[test]
    fn test_days_to_ymd() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
        // 2000-02-29
        assert_eq!(days_to_ymd(11_016), (2000, 2, 29));
        // 2024-12-31
        assert_eq!(days_to_ymd(20_088), (2024, 12, 31));
        // 2100 is not a leap year
        assert_eq!(days_to_ymd(47_540), (2100, 2, 28));
        assert_eq!(days_to_ymd(47_541), (2100, 3, 1));
    }

    #[test]
    fn test_build_date_far_future_epoch() {
        let mut map = IndexMap::new();
        map.insert("node_count".to_string(), DataValue::Uint32(1));
        map.insert("record_size".to_string(), DataValue::Uint16(24));
        map.insert("ip_version".to_string(), DataValue::Uint16(4));
        map.insert("build_epoch".to_string(), DataValue::Uint128(u64::MAX as u128));
        let metadata = Metadata::from_value(DataValue::Map(map), 0).unwrap();

        assert_eq!(metadata.build_epoch, u64::MAX);
        assert_eq!(metadata.build_date(), "584554051223-11-09");
    }
}
