//! Data section decoding
//!
//! Values in an MMDB file use a tagged, length-prefixed encoding: a control
//! byte carries the type (top 3 bits) and a size (low 5 bits), optionally
//! followed by an extended type byte and size extension bytes, then the
//! payload.
//!
//! # Supported Types
//!
//! | Type | Name    | Payload                                          |
//! |------|---------|--------------------------------------------------|
//! | 1    | Pointer | 11/19/27/32-bit offset relative to the data section |
//! | 2    | String  | `size` bytes of UTF-8                            |
//! | 3    | Double  | 8 bytes, big-endian IEEE 754                     |
//! | 5    | Uint16  | 0–2 bytes, big-endian                            |
//! | 6    | Uint32  | 0–4 bytes, big-endian                            |
//! | 7    | Map     | `size` key/value pairs, string keys              |
//! | 9    | Uint128 | 0–16 bytes, big-endian                           |
//! | 11   | Array   | `size` values                                    |
//! | 14   | Bool    | no payload, value is `size == 1`                 |
//!
//! Anything else is rejected with [`MmdbError::UnknownType`].
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::error::{MmdbError, Result};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Default limit on nested maps, arrays and pointer hops for one decode
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default limit on values produced by one decode
///
/// Shared pointers can make a small buffer expand exponentially, which the
/// depth limit alone does not catch.
pub const DEFAULT_MAX_VALUES: usize = 1 << 20;

const TYPE_EXTENDED: u16 = 0;
const TYPE_POINTER: u16 = 1;
const TYPE_STRING: u16 = 2;
const TYPE_DOUBLE: u16 = 3;
const TYPE_UINT16: u16 = 5;
const TYPE_UINT32: u16 = 6;
const TYPE_MAP: u16 = 7;
const TYPE_UINT128: u16 = 9;
const TYPE_ARRAY: u16 = 11;
const TYPE_BOOL: u16 = 14;

/// Decoded value from the data section
///
/// Every decode allocates a fresh tree; nothing borrows from the database
/// buffer, so results outlive the [`Database`](crate::Database) they came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Absolute buffer offset of a pointer target
    ///
    /// Only produced by [`DataDecoder::decode_unresolved`]; regular decoding
    /// follows pointers and returns the value they reference.
    Pointer(usize),
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map in decode order (last duplicate key wins)
    Map(IndexMap<String, DataValue>),
    /// Unsigned 64-bit or wider integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
}

impl DataValue {
    /// Borrow the string, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any unsigned integer variant that fits in a `u64`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(*n as u64),
            DataValue::Uint32(n) => Some(*n as u64),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Any unsigned integer variant, widened
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            DataValue::Uint16(n) => Some(*n as u128),
            DataValue::Uint32(n) => Some(*n as u128),
            DataValue::Uint128(n) => Some(*n),
            _ => None,
        }
    }

    /// The double, if this is a double
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the map, if this is a map
    pub fn as_map(&self) -> Option<&IndexMap<String, DataValue>> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the elements, if this is an array
    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Follow a path of map keys, e.g. `["country", "iso_code"]`
    pub fn get_path(&self, path: &[&str]) -> Option<&DataValue> {
        path.iter().try_fold(self, |value, key| value.get(key))
    }
}

// Wide integers above u64::MAX become decimal strings so JSON consumers
// never see a silently rounded number.
impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DataValue::Pointer(offset) => serializer.serialize_u64(*offset as u64),
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Double(d) => serializer.serialize_f64(*d),
            DataValue::Uint16(n) => serializer.serialize_u16(*n),
            DataValue::Uint32(n) => serializer.serialize_u32(*n),
            DataValue::Uint128(n) => match u64::try_from(*n) {
                Ok(small) => serializer.serialize_u64(small),
                Err(_) => serializer.collect_str(n),
            },
            DataValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            DataValue::Array(items) => serializer.collect_seq(items),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

/// One decoded value and where the next one starts
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Type number of the decoded value (after following pointers)
    pub type_id: u16,
    /// Offset just past this value's encoding in the original stream
    ///
    /// For a pointer this is the byte after the pointer itself, not after
    /// the data it references.
    pub next_offset: usize,
    /// The decoded value
    pub value: DataValue,
}

/// Data section decoder
///
/// Decodes values at absolute offsets into `buffer`. Pointers are resolved
/// relative to `pointer_base`: the data section start for record data, or
/// the metadata start when decoding metadata.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
    pointer_base: usize,
    max_depth: usize,
    max_values: usize,
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over `buffer`
    ///
    /// # Arguments
    /// * `buffer` - The whole database buffer
    /// * `pointer_base` - Offset that pointer payloads are relative to
    pub fn new(buffer: &'a [u8], pointer_base: usize) -> Self {
        Self {
            buffer,
            pointer_base,
            max_depth: DEFAULT_MAX_DEPTH,
            max_values: DEFAULT_MAX_VALUES,
        }
    }

    /// Limit nested maps, arrays and pointer hops per decode
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Limit the number of values (pointer hops included) one decode may visit
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    /// Offset that pointers resolve against
    pub fn pointer_base(&self) -> usize {
        self.pointer_base
    }

    /// Decode the value at `offset`, following pointers
    pub fn decode(&self, offset: usize) -> Result<Decoded> {
        let mut budget = self.max_values;
        self.decode_at(offset, 0, true, &mut budget)
    }

    /// Decode the value at `offset` and drop the position information
    pub fn decode_value(&self, offset: usize) -> Result<DataValue> {
        self.decode(offset).map(|decoded| decoded.value)
    }

    /// Decode the value at `offset` without following a top-level pointer
    ///
    /// A pointer comes back as [`DataValue::Pointer`] holding the absolute
    /// offset it references. Pointers nested in maps or arrays are still
    /// followed.
    pub fn decode_unresolved(&self, offset: usize) -> Result<Decoded> {
        let mut budget = self.max_values;
        self.decode_at(offset, 0, false, &mut budget)
    }

    fn decode_at(
        &self,
        offset: usize,
        depth: usize,
        follow: bool,
        budget: &mut usize,
    ) -> Result<Decoded> {
        if depth > self.max_depth {
            return Err(MmdbError::MaxDepthExceeded(self.max_depth));
        }
        *budget = budget
            .checked_sub(1)
            .ok_or(MmdbError::DecodeBudgetExceeded(self.max_values))?;

        let ctrl = self.byte(offset)?;
        let mut cursor = offset + 1;
        let mut type_id = (ctrl >> 5) as u16;

        if type_id == TYPE_EXTENDED {
            type_id = self.byte(cursor)? as u16 + 7;
            cursor += 1;
        }

        if type_id == TYPE_POINTER {
            return self.decode_pointer(ctrl, cursor, depth, follow, budget);
        }

        let size = self.decode_size(ctrl, &mut cursor)?;

        match type_id {
            TYPE_STRING => {
                let bytes = self.slice(cursor, size)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| MmdbError::InvalidUtf8 { offset: cursor })?;
                Ok(Decoded {
                    type_id,
                    next_offset: cursor + size,
                    value: DataValue::String(s.to_string()),
                })
            }
            TYPE_DOUBLE => {
                if size != 8 {
                    return Err(MmdbError::UnsupportedDoubleSize(size));
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(self.slice(cursor, 8)?);
                Ok(Decoded {
                    type_id,
                    next_offset: cursor + 8,
                    value: DataValue::Double(f64::from_be_bytes(bytes)),
                })
            }
            TYPE_UINT16 => {
                let n = self.read_uint(type_id, cursor, size, 2)?;
                Ok(Decoded {
                    type_id,
                    next_offset: cursor + size,
                    value: DataValue::Uint16(n as u16),
                })
            }
            TYPE_UINT32 => {
                let n = self.read_uint(type_id, cursor, size, 4)?;
                Ok(Decoded {
                    type_id,
                    next_offset: cursor + size,
                    value: DataValue::Uint32(n as u32),
                })
            }
            TYPE_MAP => self.decode_map(cursor, size, depth, budget),
            TYPE_UINT128 => {
                let n = self.read_uint(type_id, cursor, size, 16)?;
                Ok(Decoded {
                    type_id,
                    next_offset: cursor + size,
                    value: DataValue::Uint128(n),
                })
            }
            TYPE_ARRAY => self.decode_array(cursor, size, depth, budget),
            TYPE_BOOL => {
                if size > 1 {
                    return Err(MmdbError::UnexpectedSize { type_id, size });
                }
                Ok(Decoded {
                    type_id,
                    next_offset: cursor,
                    value: DataValue::Bool(size == 1),
                })
            }
            _ => Err(MmdbError::UnknownType(type_id)),
        }
    }

    /// Pointer layout lives in the original control byte: bits 3-4 select
    /// the payload width, bits 0-2 are the payload's high bits (unused for
    /// the 32-bit form).
    fn decode_pointer(
        &self,
        ctrl: u8,
        cursor: usize,
        depth: usize,
        follow: bool,
        budget: &mut usize,
    ) -> Result<Decoded> {
        let class = ((ctrl >> 3) & 0x3) as usize;
        let fragment = (ctrl & 0x7) as usize;
        let extra = self.slice(cursor, class + 1)?;
        let tail = be_uint(extra) as usize;

        let relative = match class {
            0 => (fragment << 8) | tail,
            1 => ((fragment << 16) | tail) + 2048,
            2 => ((fragment << 24) | tail) + 526_336,
            _ => tail,
        };
        let target = self.pointer_base + relative;
        let next_offset = cursor + class + 1;

        if !follow {
            return Ok(Decoded {
                type_id: TYPE_POINTER,
                next_offset,
                value: DataValue::Pointer(target),
            });
        }

        let resolved = self.decode_at(target, depth + 1, true, budget)?;
        Ok(Decoded {
            type_id: resolved.type_id,
            next_offset,
            value: resolved.value,
        })
    }

    fn decode_map(
        &self,
        mut cursor: usize,
        count: usize,
        depth: usize,
        budget: &mut usize,
    ) -> Result<Decoded> {
        // Every pair needs at least two bytes, so don't trust `count` for capacity
        let mut map = IndexMap::with_capacity(count.min(self.remaining(cursor) / 2));

        for _ in 0..count {
            let key_offset = cursor;
            let key = self.decode_at(key_offset, depth + 1, true, budget)?;
            let key_str = match key.value {
                DataValue::String(s) => s,
                _ => return Err(MmdbError::InvalidMapKey { offset: key_offset }),
            };

            let value = self.decode_at(key.next_offset, depth + 1, true, budget)?;
            cursor = value.next_offset;
            map.insert(key_str, value.value);
        }

        Ok(Decoded {
            type_id: TYPE_MAP,
            next_offset: cursor,
            value: DataValue::Map(map),
        })
    }

    fn decode_array(
        &self,
        mut cursor: usize,
        count: usize,
        depth: usize,
        budget: &mut usize,
    ) -> Result<Decoded> {
        let mut array = Vec::with_capacity(count.min(self.remaining(cursor)));

        for _ in 0..count {
            let item = self.decode_at(cursor, depth + 1, true, budget)?;
            cursor = item.next_offset;
            array.push(item.value);
        }

        Ok(Decoded {
            type_id: TYPE_ARRAY,
            next_offset: cursor,
            value: DataValue::Array(array),
        })
    }

    fn decode_size(&self, ctrl: u8, cursor: &mut usize) -> Result<usize> {
        let size_bits = (ctrl & 0x1F) as usize;
        let (base, extra) = match size_bits {
            0..=28 => return Ok(size_bits),
            29 => (29, 1),
            30 => (285, 2),
            _ => (65_821, 3),
        };
        let bytes = self.slice(*cursor, extra)?;
        *cursor += extra;
        Ok(base + be_uint(bytes) as usize)
    }

    /// Zero-extended big-endian unsigned integer of at most `max_size` bytes
    fn read_uint(&self, type_id: u16, cursor: usize, size: usize, max_size: usize) -> Result<u128> {
        if size > max_size {
            return Err(MmdbError::UnexpectedSize { type_id, size });
        }
        Ok(be_uint(self.slice(cursor, size)?))
    }

    fn byte(&self, offset: usize) -> Result<u8> {
        self.buffer
            .get(offset)
            .copied()
            .ok_or(MmdbError::UnexpectedEof { offset })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.buffer.get(offset..end))
            .ok_or(MmdbError::UnexpectedEof { offset })
    }

    fn remaining(&self, offset: usize) -> usize {
        self.buffer.len().saturating_sub(offset)
    }
}

fn be_uint(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
}
