//! Self-describing property list codec
//!
//! The header carries its metadata as an ordered list of (name, typed value)
//! pairs terminated by the sentinel name `"None"`. Values are recursive:
//! arrays hold one nested property list per element, each element prefixed
//! with its encoded byte length so a tolerant decoder can step over elements
//! it cannot interpret.

use std::io::Cursor;

use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::bytes::{read_bytes, read_f32, read_i32, read_string, read_u8, read_u32, read_u64};
use crate::error::{DecodeError, DecodeWarning, Stage};

/// Sentinel name terminating a property list
pub const PROPERTY_LIST_END: &str = "None";

// Wire type tags
const TAG_INT: u8 = 0;
const TAG_QWORD: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STR: u8 = 3;
const TAG_BOOL: u8 = 4;
const TAG_BYTES: u8 = 5;
const TAG_LIST: u8 = 6;
const TAG_ARRAY: u8 = 7;

/// A typed header property value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyValue {
    Int(i32),
    QWord(u64),
    Float(f32),
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
    List(PropertyList),
    Array(Vec<PropertyList>),
}

impl PropertyValue {
    fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => TAG_INT,
            Self::QWord(_) => TAG_QWORD,
            Self::Float(_) => TAG_FLOAT,
            Self::Str(_) => TAG_STR,
            Self::Bool(_) => TAG_BOOL,
            Self::Bytes(_) => TAG_BYTES,
            Self::List(_) => TAG_LIST,
            Self::Array(_) => TAG_ARRAY,
        }
    }

    /// The value as an i32, if it is one
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered sequence of (name, typed value) pairs
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PropertyList {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyList {
    /// Create an empty property list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property
    pub fn push(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.entries.push((name.into(), value));
    }

    /// Look up a property by name (first match wins)
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate entries in wire order
    pub fn iter(&self) -> impl Iterator<Item = &(String, PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a property list from the header byte stream
    ///
    /// `tolerate_unknown_metadata` relaxes unknown type tags inside array
    /// elements (decorative metadata): the offending element is skipped via
    /// its length prefix and a warning recorded. Unknown tags at the top
    /// level are always fatal.
    pub fn decode(
        cursor: &mut Cursor<&[u8]>,
        tolerate_unknown_metadata: bool,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Result<Self, DecodeError> {
        Self::decode_inner(cursor, Stage::Properties, tolerate_unknown_metadata, warnings)
    }

    fn decode_inner(
        cursor: &mut Cursor<&[u8]>,
        stage: Stage,
        tolerate: bool,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Result<Self, DecodeError> {
        let mut list = Self::new();
        loop {
            let name = read_string(cursor, stage)?;
            if name == PROPERTY_LIST_END {
                return Ok(list);
            }
            let offset = cursor.position();
            let tag = read_u8(cursor, stage)?;
            let value = match tag {
                TAG_INT => PropertyValue::Int(read_i32(cursor, stage)?),
                TAG_QWORD => PropertyValue::QWord(read_u64(cursor, stage)?),
                TAG_FLOAT => PropertyValue::Float(read_f32(cursor, stage)?),
                TAG_STR => PropertyValue::Str(read_string(cursor, stage)?),
                TAG_BOOL => PropertyValue::Bool(read_u8(cursor, stage)? != 0),
                TAG_BYTES => {
                    let len = read_u32(cursor, stage)? as usize;
                    PropertyValue::Bytes(read_bytes(cursor, len, stage)?)
                }
                TAG_LIST => {
                    PropertyValue::List(Self::decode_inner(cursor, stage, tolerate, warnings)?)
                }
                TAG_ARRAY => {
                    let count = read_u32(cursor, stage)?;
                    let mut elements = Vec::with_capacity(count.min(1024) as usize);
                    for _ in 0..count {
                        let byte_len = read_u32(cursor, stage)? as u64;
                        let element_end = cursor.position() + byte_len;
                        if element_end > cursor.get_ref().len() as u64 {
                            return Err(DecodeError::TruncatedData {
                                stage,
                                bit_offset: cursor.position() * 8,
                                wanted_bits: (element_end - cursor.get_ref().len() as u64) * 8,
                            });
                        }
                        // Array elements are non-critical: unknown tags inside
                        // them degrade to a warning when tolerated
                        match Self::decode_inner(cursor, stage, tolerate, warnings) {
                            Ok(element) => {
                                elements.push(element);
                                cursor.set_position(element_end);
                            }
                            Err(DecodeError::UnknownPropertyType { tag, .. }) if tolerate => {
                                warnings.push(DecodeWarning::UnknownMetadataType {
                                    name: name.clone(),
                                    tag,
                                });
                                cursor.set_position(element_end);
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    PropertyValue::Array(elements)
                }
                _ => {
                    return Err(DecodeError::UnknownPropertyType { stage, tag, offset });
                }
            };
            list.push(name, value);
        }
    }

    /// Encode the list in wire form, appending to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            write_string(out, name);
            out.push(value.tag());
            match value {
                PropertyValue::Int(v) => out.write_i32::<LittleEndian>(*v).unwrap(),
                PropertyValue::QWord(v) => out.write_u64::<LittleEndian>(*v).unwrap(),
                PropertyValue::Float(v) => out.write_f32::<LittleEndian>(*v).unwrap(),
                PropertyValue::Str(v) => write_string(out, v),
                PropertyValue::Bool(v) => out.push(u8::from(*v)),
                PropertyValue::Bytes(v) => {
                    out.write_u32::<LittleEndian>(v.len() as u32).unwrap();
                    out.extend_from_slice(v);
                }
                PropertyValue::List(list) => list.encode(out),
                PropertyValue::Array(elements) => {
                    out.write_u32::<LittleEndian>(elements.len() as u32).unwrap();
                    for element in elements {
                        let mut encoded = Vec::new();
                        element.encode(&mut encoded);
                        out.write_u32::<LittleEndian>(encoded.len() as u32).unwrap();
                        out.extend_from_slice(&encoded);
                    }
                }
            }
        }
        write_string(out, PROPERTY_LIST_END);
    }
}

pub(crate) fn write_string(out: &mut Vec<u8>, s: &str) {
    out.write_u32::<LittleEndian>(s.len() as u32).unwrap();
    out.extend_from_slice(s.as_bytes());
}
