//! Synthetic replay construction
//!
//! Builds well-formed replay byte buffers for fixtures and tests: the
//! decoder's counterpart the same way the writer pairs with the parser in a
//! round-trip. Re-encoding real captured replays is out of scope; this
//! builder only speaks the subset the synthetic test corpus needs.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::header::{EngineVersion, ReplayFlags};
use crate::netcache::RawClassEntry;
use crate::property::{PropertyList, PropertyValue, write_string};
use crate::stream::{
    NetValue, KIND_BOOL, KIND_BYTES, KIND_FLOAT, KIND_INT, KIND_QWORD, KIND_ROTATION, KIND_STR,
    KIND_VECTOR, REC_DELETE, REC_END, REC_SPAWN, REC_UPDATE,
};
use crate::{ACTOR_ID_BITS, PROP_ID_BITS, REPLAY_MAGIC};

/// Per-component width used for encoded quantized vectors
const VECTOR_BITS: u32 = 16;

/// Degrees per unit of a 16-bit rotation component (matches the cursor)
const ROTATION_UNIT_DEGREES: f32 = 180.0 / 32768.0;

/// Bit-level writer, least-significant-bit-first within each byte
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_len: 0,
        }
    }

    /// Append a single bit
    pub fn write_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let idx = (self.bit_len / 8) as usize;
            self.bytes[idx] |= 1 << (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Append the low `n` bits of `value`, LSB first
    pub fn write_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64);
        for i in 0..n {
            self.write_bit((value >> i) & 1 != 0);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value as u64, 32);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write_bits(*byte as u64, 8);
        }
    }

    /// Append a length-prefixed UTF-8 string
    pub fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    /// Append one self-describing net value
    pub fn write_net_value(&mut self, value: &NetValue) {
        match value {
            NetValue::Bool(v) => {
                self.write_bits(KIND_BOOL, 3);
                self.write_bit(*v);
            }
            NetValue::Int(v) => {
                self.write_bits(KIND_INT, 3);
                self.write_u32(*v as u32);
            }
            NetValue::Float(v) => {
                self.write_bits(KIND_FLOAT, 3);
                self.write_f32(*v);
            }
            NetValue::Str(v) => {
                self.write_bits(KIND_STR, 3);
                self.write_string(v);
            }
            NetValue::Vector(v) => {
                self.write_bits(KIND_VECTOR, 3);
                self.write_bits(VECTOR_BITS as u64, 5);
                let bias = 1i64 << (VECTOR_BITS + 1);
                let max = (1i64 << (VECTOR_BITS + 2)) - 1;
                for component in v {
                    let raw = (component.round() as i64 + bias).clamp(0, max);
                    self.write_bits(raw as u64, VECTOR_BITS + 2);
                }
            }
            NetValue::Rotation(v) => {
                self.write_bits(KIND_ROTATION, 3);
                for component in v {
                    if *component == 0.0 {
                        self.write_bit(false);
                    } else {
                        self.write_bit(true);
                        let raw = (component / ROTATION_UNIT_DEGREES).round() as i32;
                        let raw = raw.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                        self.write_bits(raw as u16 as u64, 16);
                    }
                }
            }
            NetValue::QWord(v) => {
                self.write_bits(KIND_QWORD, 3);
                self.write_bits(*v, 64);
            }
            NetValue::Bytes(v) => {
                self.write_bits(KIND_BYTES, 3);
                self.write_u32(v.len() as u32);
                self.write_bytes(v);
            }
        }
    }

    /// Finish, padding the final byte with zero bits
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

enum RecordSpec {
    Spawn {
        actor_id: u32,
        class_id: u32,
        initial: Vec<(u16, NetValue)>,
    },
    Update {
        actor_id: u32,
        updates: Vec<(u16, NetValue)>,
    },
    Delete {
        actor_id: u32,
    },
}

struct FrameSpec {
    time_delta: f32,
    records: Vec<RecordSpec>,
}

/// Builder for synthetic replay files
///
/// ```ignore
/// let mut builder = ReplayBuilder::new(EngineVersion::new(1, 4, 5));
/// builder.class(10, "Game.Ball", None, &[(0, PROP_POSITION)]);
/// builder.begin_frame(0.033);
/// builder.spawn(1, 10, &[(0, NetValue::Vector([0.0, 0.0, 93.0]))]);
/// let bytes = builder.build();
/// ```
pub struct ReplayBuilder {
    version: EngineVersion,
    properties: PropertyList,
    classes: Vec<RawClassEntry>,
    frames: Vec<FrameSpec>,
    corrupt_crc: bool,
}

impl ReplayBuilder {
    pub fn new(version: EngineVersion) -> Self {
        Self {
            version,
            properties: PropertyList::new(),
            classes: Vec::new(),
            frames: Vec::new(),
            corrupt_crc: false,
        }
    }

    /// Add a header property
    pub fn property(&mut self, name: &str, value: PropertyValue) -> &mut Self {
        self.properties.push(name, value);
        self
    }

    /// Add a net cache class entry
    pub fn class(
        &mut self,
        class_id: u32,
        class_name: &str,
        parent: Option<u32>,
        properties: &[(u16, &str)],
    ) -> &mut Self {
        self.classes.push(RawClassEntry {
            class_id,
            class_name: class_name.into(),
            parent,
            properties: properties
                .iter()
                .map(|(id, name)| (*id, (*name).to_string()))
                .collect(),
        });
        self
    }

    /// Start a new frame; subsequent records land in it
    pub fn begin_frame(&mut self, time_delta: f32) -> &mut Self {
        self.frames.push(FrameSpec {
            time_delta,
            records: Vec::new(),
        });
        self
    }

    fn current_frame(&mut self) -> &mut FrameSpec {
        if self.frames.is_empty() {
            self.frames.push(FrameSpec {
                time_delta: 0.0,
                records: Vec::new(),
            });
        }
        self.frames.last_mut().expect("frame just ensured")
    }

    /// Record an actor spawn in the current frame
    pub fn spawn(&mut self, actor_id: u32, class_id: u32, initial: &[(u16, NetValue)]) -> &mut Self {
        let record = RecordSpec::Spawn {
            actor_id,
            class_id,
            initial: initial.to_vec(),
        };
        self.current_frame().records.push(record);
        self
    }

    /// Record property deltas in the current frame
    pub fn update(&mut self, actor_id: u32, updates: &[(u16, NetValue)]) -> &mut Self {
        let record = RecordSpec::Update {
            actor_id,
            updates: updates.to_vec(),
        };
        self.current_frame().records.push(record);
        self
    }

    /// Record an actor deletion in the current frame
    pub fn delete(&mut self, actor_id: u32) -> &mut Self {
        self.current_frame()
            .records
            .push(RecordSpec::Delete { actor_id });
        self
    }

    /// Corrupt the stored body CRC (for checksum-policy tests)
    pub fn corrupt_crc(&mut self) -> &mut Self {
        self.corrupt_crc = true;
        self
    }

    /// Assemble the file bytes
    pub fn build(&self) -> Vec<u8> {
        let mut flags = ReplayFlags::empty();
        if !self.properties.is_empty() {
            flags |= ReplayFlags::HAS_PROPERTIES;
        }
        if !self.frames.is_empty() {
            flags |= ReplayFlags::HAS_BODY;
        }

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(REPLAY_MAGIC).unwrap();
        out.write_u32::<LittleEndian>(self.version.major).unwrap();
        out.write_u32::<LittleEndian>(self.version.minor).unwrap();
        out.write_u32::<LittleEndian>(self.version.net).unwrap();
        out.push(flags.bits());

        if flags.contains(ReplayFlags::HAS_PROPERTIES) {
            self.properties.encode(&mut out);
        }

        out.write_u32::<LittleEndian>(self.classes.len() as u32)
            .unwrap();
        for class in &self.classes {
            out.write_u32::<LittleEndian>(class.class_id).unwrap();
            write_string(&mut out, &class.class_name);
            let parent = class.parent.map_or(-1i32, |p| p as i32);
            out.write_i32::<LittleEndian>(parent).unwrap();
            out.write_u32::<LittleEndian>(class.properties.len() as u32)
                .unwrap();
            for (prop_id, name) in &class.properties {
                out.write_u32::<LittleEndian>(*prop_id as u32).unwrap();
                write_string(&mut out, name);
            }
        }

        if flags.contains(ReplayFlags::HAS_BODY) {
            let body = self.build_body();
            out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
            out.extend_from_slice(&body);
            let mut crc = crc32fast::hash(&body);
            if self.corrupt_crc {
                crc ^= 0xDEAD_BEEF;
            }
            out.write_u32::<LittleEndian>(crc).unwrap();
        }

        out
    }

    fn build_body(&self) -> Vec<u8> {
        let mut writer = BitWriter::new();
        for frame in &self.frames {
            writer.write_bit(true);
            writer.write_f32(frame.time_delta);
            for record in &frame.records {
                match record {
                    RecordSpec::Spawn {
                        actor_id,
                        class_id,
                        initial,
                    } => {
                        writer.write_bits(REC_SPAWN, 2);
                        writer.write_bits(*actor_id as u64, ACTOR_ID_BITS);
                        writer.write_u32(*class_id);
                        writer.write_bits(initial.len() as u64, 8);
                        for (prop_id, value) in initial {
                            writer.write_bits(*prop_id as u64, PROP_ID_BITS);
                            writer.write_net_value(value);
                        }
                    }
                    RecordSpec::Update { actor_id, updates } => {
                        writer.write_bits(REC_UPDATE, 2);
                        writer.write_bits(*actor_id as u64, ACTOR_ID_BITS);
                        for (prop_id, value) in updates {
                            writer.write_bit(true);
                            writer.write_bits(*prop_id as u64, PROP_ID_BITS);
                            writer.write_net_value(value);
                        }
                        writer.write_bit(false);
                    }
                    RecordSpec::Delete { actor_id } => {
                        writer.write_bits(REC_DELETE, 2);
                        writer.write_bits(*actor_id as u64, ACTOR_ID_BITS);
                    }
                }
            }
            writer.write_bits(REC_END, 2);
        }
        writer.write_bit(false);
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitCursor;

    #[test]
    fn test_writer_reader_bit_symmetry() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bits(0b101, 3);
        writer.write_u32(0xDEAD_BEEF);
        writer.write_string("ok");
        let bytes = writer.into_bytes();

        let mut cursor = BitCursor::new(&bytes);
        assert!(cursor.read_bit().unwrap());
        assert_eq!(cursor.read_bits(3).unwrap(), 0b101);
        assert_eq!(cursor.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(cursor.read_string().unwrap(), "ok");
    }

    #[test]
    fn test_net_value_roundtrip() {
        let values = [
            NetValue::Bool(true),
            NetValue::Int(-42),
            NetValue::Float(2.5),
            NetValue::Str("Stadium_P".into()),
            NetValue::Vector([100.0, -250.0, 17.0]),
            NetValue::Rotation([90.0, 0.0, -45.0]),
            NetValue::QWord(u64::MAX),
            NetValue::Bytes(vec![0xAA, 0xBB]),
        ];
        let mut writer = BitWriter::new();
        for value in &values {
            writer.write_net_value(value);
        }
        let bytes = writer.into_bytes();
        let mut cursor = BitCursor::new(&bytes);
        for expected in &values {
            let decoded = NetValue::decode(&mut cursor).unwrap();
            match (expected, &decoded) {
                (NetValue::Rotation(a), NetValue::Rotation(b)) => {
                    for (x, y) in a.iter().zip(b) {
                        assert!((x - y).abs() < 0.01, "{x} vs {y}");
                    }
                }
                _ => assert_eq!(*expected, decoded),
            }
        }
    }
}
