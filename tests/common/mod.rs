//! Test fixtures: assembles small MaxMind DB files in memory.
#![allow(dead_code)]

use indexmap::IndexMap;
use mmdb_reader::{pack, DataValue, PackedAddress};
use std::path::PathBuf;
use tempfile::TempDir;

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

pub fn string(s: &str) -> DataValue {
    DataValue::String(s.to_string())
}

pub fn map(entries: Vec<(&str, DataValue)>) -> DataValue {
    DataValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<IndexMap<_, _>>(),
    )
}

/// A GeoIP-style country record
pub fn country(iso: &str, en: &str, de: &str) -> DataValue {
    map(vec![(
        "country",
        map(vec![
            ("iso_code", string(iso)),
            ("names", map(vec![("en", string(en)), ("de", string(de))])),
        ]),
    )])
}

/// Append the control byte(s) for `type_id` with payload `size`
fn encode_ctrl(type_id: u8, size: usize, out: &mut Vec<u8>) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_id <= 7 {
        out.push((type_id << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_id - 7);
    }
    out.extend_from_slice(&extra);
}

fn minimal_be(n: u128) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Encode a pointer to `relative` bytes past the pointer base
pub fn encode_pointer(relative: usize, out: &mut Vec<u8>) {
    if relative < 2048 {
        out.push(0x20 | (relative >> 8) as u8);
        out.push(relative as u8);
    } else if relative < 2048 + (1 << 19) {
        let v = relative - 2048;
        out.push(0x28 | ((v >> 16) & 0x7) as u8);
        out.extend_from_slice(&(v as u32).to_be_bytes()[2..]);
    } else if relative < 526_336 + (1 << 27) {
        let v = relative - 526_336;
        out.push(0x30 | ((v >> 24) & 0x7) as u8);
        out.extend_from_slice(&(v as u32).to_be_bytes()[1..]);
    } else {
        out.push(0x38);
        out.extend_from_slice(&(relative as u32).to_be_bytes());
    }
}

/// Encode a value in the data section format
///
/// `DataValue::Pointer(n)` is written as a pointer to relative offset `n`.
pub fn encode(value: &DataValue, out: &mut Vec<u8>) {
    match value {
        DataValue::Pointer(relative) => encode_pointer(*relative, out),
        DataValue::String(s) => {
            encode_ctrl(2, s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            encode_ctrl(3, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Uint16(n) => {
            let bytes = minimal_be(*n as u128);
            encode_ctrl(5, bytes.len(), out);
            out.extend_from_slice(&bytes);
        }
        DataValue::Uint32(n) => {
            let bytes = minimal_be(*n as u128);
            encode_ctrl(6, bytes.len(), out);
            out.extend_from_slice(&bytes);
        }
        DataValue::Map(entries) => {
            encode_ctrl(7, entries.len(), out);
            for (key, value) in entries {
                encode(&DataValue::String(key.clone()), out);
                encode(value, out);
            }
        }
        DataValue::Uint128(n) => {
            let bytes = minimal_be(*n);
            encode_ctrl(9, bytes.len(), out);
            out.extend_from_slice(&bytes);
        }
        DataValue::Array(items) => {
            encode_ctrl(11, items.len(), out);
            for item in items {
                encode(item, out);
            }
        }
        DataValue::Bool(b) => encode_ctrl(14, *b as usize, out),
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Empty,
    Node(usize),
    Data(usize),
}

/// Builds a complete database file from CIDR → value entries
pub struct DatabaseWriter {
    ip_version: u16,
    record_size: u16,
    database_type: String,
    languages: Vec<String>,
    description: Vec<(String, String)>,
    build_epoch: u64,
    extra_metadata: Vec<(String, DataValue)>,
    data: Vec<u8>,
    entries: Vec<(Vec<u8>, u32, usize)>,
}

impl DatabaseWriter {
    pub fn new(ip_version: u16, record_size: u16) -> Self {
        Self {
            ip_version,
            record_size,
            database_type: "Test-DB".to_string(),
            languages: vec!["en".to_string(), "de".to_string()],
            description: vec![("en".to_string(), "Test database".to_string())],
            build_epoch: 1_700_000_000,
            extra_metadata: Vec::new(),
            data: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn database_type(mut self, name: &str) -> Self {
        self.database_type = name.to_string();
        self
    }

    pub fn build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = epoch;
        self
    }

    pub fn metadata_entry(mut self, key: &str, value: DataValue) -> Self {
        self.extra_metadata.push((key.to_string(), value));
        self
    }

    /// Write a value into the data section and return its relative offset
    pub fn add_shared(&mut self, value: &DataValue) -> usize {
        let offset = self.data.len();
        encode(value, &mut self.data);
        offset
    }

    /// Map a network such as `1.1.1.0/24` to `value`
    pub fn insert(&mut self, cidr: &str, value: &DataValue) -> &mut Self {
        let (addr, prefix) = cidr.split_once('/').expect("CIDR needs a prefix length");
        let mut prefix: u32 = prefix.parse().expect("bad prefix length");
        let bytes = match pack(addr).expect("bad network address") {
            PackedAddress::V4(b) if self.ip_version == 6 => {
                prefix += 96;
                let mut v6 = vec![0u8; 12];
                v6.extend_from_slice(&b);
                v6
            }
            PackedAddress::V4(b) => b.to_vec(),
            PackedAddress::V6(b) => {
                assert_eq!(self.ip_version, 6, "IPv6 network in an IPv4 tree");
                b.to_vec()
            }
        };
        assert!(prefix > 0, "zero-length prefixes are not supported");

        let offset = self.add_shared(value);
        self.entries.push((bytes, prefix, offset));
        self
    }

    fn build_tree(&self) -> Vec<[Slot; 2]> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|entry| entry.1);

        let mut nodes = vec![[Slot::Empty; 2]];
        for (bytes, prefix, offset) in &entries {
            let mut node = 0;
            for depth in 0..*prefix {
                let bit = ((bytes[(depth / 8) as usize] >> (7 - depth % 8)) & 1) as usize;
                if depth + 1 == *prefix {
                    nodes[node][bit] = Slot::Data(*offset);
                    break;
                }
                node = match nodes[node][bit] {
                    Slot::Node(next) => next,
                    other => {
                        // A shorter prefix already covers this branch: push it down
                        let fill = match other {
                            Slot::Data(d) => Slot::Data(d),
                            _ => Slot::Empty,
                        };
                        let next = nodes.len();
                        nodes.push([fill; 2]);
                        nodes[node][bit] = Slot::Node(next);
                        next
                    }
                };
            }
        }
        nodes
    }

    fn metadata(&self, node_count: u32) -> DataValue {
        let mut meta = IndexMap::new();
        meta.insert("node_count".to_string(), DataValue::Uint32(node_count));
        meta.insert("record_size".to_string(), DataValue::Uint16(self.record_size));
        meta.insert("ip_version".to_string(), DataValue::Uint16(self.ip_version));
        meta.insert("database_type".to_string(), string(&self.database_type));
        meta.insert(
            "languages".to_string(),
            DataValue::Array(self.languages.iter().map(|l| string(l)).collect()),
        );
        meta.insert("binary_format_major_version".to_string(), DataValue::Uint16(2));
        meta.insert("binary_format_minor_version".to_string(), DataValue::Uint16(0));
        meta.insert(
            "build_epoch".to_string(),
            DataValue::Uint128(self.build_epoch as u128),
        );
        meta.insert(
            "description".to_string(),
            DataValue::Map(
                self.description
                    .iter()
                    .map(|(lang, text)| (lang.clone(), string(text)))
                    .collect(),
            ),
        );
        for (key, value) in &self.extra_metadata {
            meta.insert(key.clone(), value.clone());
        }
        DataValue::Map(meta)
    }

    pub fn build(&self) -> Vec<u8> {
        let nodes = self.build_tree();
        let node_count = nodes.len() as u32;
        let record = |slot: Slot| -> u32 {
            match slot {
                Slot::Empty => node_count,
                Slot::Node(i) => i as u32,
                Slot::Data(offset) => node_count + 16 + offset as u32,
            }
        };

        let mut out = Vec::new();
        for node in &nodes {
            let (left, right) = (record(node[0]), record(node[1]));
            match self.record_size {
                24 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                28 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                32 => {
                    out.extend_from_slice(&left.to_be_bytes());
                    out.extend_from_slice(&right.to_be_bytes());
                }
                other => panic!("unsupported record size {}", other),
            }
        }

        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(METADATA_MARKER);
        encode(&self.metadata(node_count), &mut out);
        out
    }
}

/// Write `bytes` to a file in a fresh temp dir
pub fn write_temp(bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.mmdb");
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

/// The reference database: `1.1.1.0/24` → Australia, `8.8.8.0/24` → US,
/// `10.0.0.0/8` and the more specific `10.1.0.0/16`
pub fn reference_database(ip_version: u16, record_size: u16) -> Vec<u8> {
    let mut writer = DatabaseWriter::new(ip_version, record_size);
    writer
        .insert("1.1.1.0/24", &country("AU", "Australia", "Australien"))
        .insert("8.8.8.0/24", &country("US", "United States", "USA"))
        .insert("10.0.0.0/8", &map(vec![("network", string("private"))]))
        .insert("10.1.0.0/16", &map(vec![("network", string("lab"))]));
    if ip_version == 6 {
        writer.insert("2001:db8::/32", &map(vec![("network", string("documentation"))]));
    }
    writer.build()
}
