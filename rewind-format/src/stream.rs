//! Network stream decoding
//!
//! The body is a delta-compressed replication stream: per frame, a time
//! delta followed by actor records until an explicit end-of-frame marker.
//! Correctness depends on replaying the exact spawn/update/delete ordering
//! the encoder used, so decoding is strictly sequential and stateful.
//!
//! Actor lifecycle per id: ABSENT -> SPAWNED -> ACTIVE -> DELETED. An id is
//! only reusable after deletion. Records referencing ids in the wrong state
//! are recoverable: the record is skipped (its bits still consumed — values
//! are self-describing), a warning is recorded, and the frame is flagged
//! partially decoded.

use hashbrown::HashMap;
use serde::Serialize;
use smallvec::SmallVec;

use crate::bits::{BitCursor, MAX_VECTOR_COMPONENT_BITS};
use crate::error::{DecodeError, DecodeWarning};
use crate::netcache::{ClassSchema, NetCache, ValueKind};
use crate::{ACTOR_ID_BITS, PROP_ID_BITS};

// Record tags (2 bits)
pub(crate) const REC_END: u64 = 0;
pub(crate) const REC_SPAWN: u64 = 1;
pub(crate) const REC_UPDATE: u64 = 2;
pub(crate) const REC_DELETE: u64 = 3;

// Net value kind tags (3 bits)
pub(crate) const KIND_BOOL: u64 = 0;
pub(crate) const KIND_INT: u64 = 1;
pub(crate) const KIND_FLOAT: u64 = 2;
pub(crate) const KIND_STR: u64 = 3;
pub(crate) const KIND_VECTOR: u64 = 4;
pub(crate) const KIND_ROTATION: u64 = 5;
pub(crate) const KIND_QWORD: u64 = 6;
pub(crate) const KIND_BYTES: u64 = 7;

/// A replicated property value as carried by the stream
///
/// Values are self-describing (a 3-bit kind tag precedes the payload), which
/// is what allows skipping a value whose property id the schema no longer
/// knows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NetValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Vector([f32; 3]),
    Rotation([f32; 3]),
    QWord(u64),
    Bytes(Vec<u8>),
}

impl NetValue {
    /// Decode one self-describing value
    pub fn decode(cursor: &mut BitCursor<'_>) -> Result<Self, DecodeError> {
        let kind = cursor.read_bits(3)?;
        Ok(match kind {
            KIND_BOOL => Self::Bool(cursor.read_bit()?),
            KIND_INT => Self::Int(cursor.read_u32()? as i32),
            KIND_FLOAT => Self::Float(cursor.read_f32()?),
            KIND_STR => Self::Str(cursor.read_string()?),
            KIND_VECTOR => {
                Self::Vector(cursor.read_quantized_vector(MAX_VECTOR_COMPONENT_BITS)?)
            }
            KIND_ROTATION => Self::Rotation(cursor.read_quantized_rotation()?),
            KIND_QWORD => Self::QWord(cursor.read_u64()?),
            _ => {
                let len = cursor.read_u32()?;
                Self::Bytes(cursor.read_bytes(len as usize)?)
            }
        })
    }

    /// Type-appropriate zero for a replicated property not present at spawn
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Self::Bool(false),
            ValueKind::Int => Self::Int(0),
            ValueKind::Float => Self::Float(0.0),
            ValueKind::Str => Self::Str(String::new()),
            ValueKind::Vector => Self::Vector([0.0; 3]),
            ValueKind::Rotation => Self::Rotation([0.0; 3]),
            ValueKind::QWord => Self::QWord(0),
            ValueKind::Bytes => Self::Bytes(Vec::new()),
        }
    }

    /// The kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Vector(_) => ValueKind::Vector,
            Self::Rotation(_) => ValueKind::Rotation,
            Self::QWord(_) => ValueKind::QWord,
            Self::Bytes(_) => ValueKind::Bytes,
        }
    }
}

/// One named property carried by a spawn or update record
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub prop_id: u16,
    pub name: String,
    pub value: NetValue,
}

/// One actor lifecycle record inside a frame
#[derive(Debug, Clone, PartialEq)]
pub enum ActorRecord {
    /// Actor came into existence with an initial (possibly reduced) state
    Spawn {
        actor_id: u32,
        class_id: u32,
        class_name: String,
        initial: SmallVec<[PropertyUpdate; 8]>,
    },
    /// Property deltas for an active actor
    Update {
        actor_id: u32,
        updates: SmallVec<[PropertyUpdate; 8]>,
    },
    /// Actor left; its id may be reused by a later spawn
    Delete { actor_id: u32 },
}

/// One decoded network tick
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based frame index
    pub index: u32,
    /// Seconds since the previous frame
    pub time_delta: f32,
    /// Cumulative wall-clock time at this frame
    pub time: f32,
    /// Records in wire order
    pub records: Vec<ActorRecord>,
    /// True when at least one record in this frame was skipped
    pub partial: bool,
}

/// Decode the body bitstream into frames
///
/// Reaching end-of-buffer before the stream terminator — or inside a frame —
/// is fatal; everything else degrades to warnings.
pub(crate) fn decode_frames(
    cursor: &mut BitCursor<'_>,
    net_cache: &NetCache,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<Frame>, DecodeError> {
    let mut frames = Vec::new();
    // actor id -> class id, for every currently ACTIVE actor
    let mut active: HashMap<u32, u32> = HashMap::new();
    let mut time = 0.0f32;

    loop {
        let index = frames.len() as u32;
        if cursor.remaining_bits() == 0 {
            // Stream must end with an explicit terminator bit
            return Err(DecodeError::TruncatedStream {
                frame: index,
                bit_offset: cursor.bit_position(),
            });
        }
        if !cursor.read_bit()? {
            return Ok(frames);
        }
        let frame = decode_frame(cursor, index, time, &mut active, net_cache, warnings)
            .map_err(|err| match err {
                DecodeError::TruncatedData { bit_offset, .. } => DecodeError::TruncatedStream {
                    frame: index,
                    bit_offset,
                },
                other => other,
            })?;
        time = frame.time;
        frames.push(frame);
    }
}

fn decode_frame(
    cursor: &mut BitCursor<'_>,
    index: u32,
    time: f32,
    active: &mut HashMap<u32, u32>,
    net_cache: &NetCache,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Frame, DecodeError> {
    let time_delta = cursor.read_f32()?;
    let time = time + time_delta;
    let mut records = Vec::new();
    let mut partial = false;

    loop {
        match cursor.read_bits(2)? {
            REC_END => break,
            REC_SPAWN => {
                let actor_id = cursor.read_bits(ACTOR_ID_BITS)? as u32;
                let class_id = cursor.read_u32()?;
                let count = cursor.read_bits(8)?;
                let mut raw: SmallVec<[(u16, NetValue); 8]> = SmallVec::new();
                for _ in 0..count {
                    let prop_id = cursor.read_bits(PROP_ID_BITS)? as u16;
                    raw.push((prop_id, NetValue::decode(cursor)?));
                }

                let Some(schema) = net_cache.class(class_id) else {
                    warnings.push(DecodeWarning::UnknownClass {
                        frame: index,
                        class_id,
                    });
                    log::debug!("frame {index}: skipping spawn with unknown class {class_id}");
                    partial = true;
                    continue;
                };
                if active.insert(actor_id, class_id).is_some() {
                    warnings.push(DecodeWarning::DuplicateSpawn {
                        frame: index,
                        actor_id,
                    });
                }
                let initial = resolve_names(raw, schema, index, actor_id, warnings);
                records.push(ActorRecord::Spawn {
                    actor_id,
                    class_id,
                    class_name: schema.class_name.clone(),
                    initial,
                });
            }
            REC_UPDATE => {
                let actor_id = cursor.read_bits(ACTOR_ID_BITS)? as u32;
                let mut raw: SmallVec<[(u16, NetValue); 8]> = SmallVec::new();
                while cursor.read_bit()? {
                    let prop_id = cursor.read_bits(PROP_ID_BITS)? as u16;
                    raw.push((prop_id, NetValue::decode(cursor)?));
                }

                let schema = active
                    .get(&actor_id)
                    .and_then(|class_id| net_cache.class(*class_id));
                let Some(schema) = schema else {
                    warnings.push(DecodeWarning::UnknownActorReference {
                        frame: index,
                        actor_id,
                    });
                    log::debug!("frame {index}: skipping update for unknown actor {actor_id}");
                    partial = true;
                    continue;
                };
                let updates = resolve_names(raw, schema, index, actor_id, warnings);
                records.push(ActorRecord::Update { actor_id, updates });
            }
            _ => {
                // REC_DELETE
                let actor_id = cursor.read_bits(ACTOR_ID_BITS)? as u32;
                if active.remove(&actor_id).is_none() {
                    warnings.push(DecodeWarning::UnknownActorReference {
                        frame: index,
                        actor_id,
                    });
                    partial = true;
                    continue;
                }
                records.push(ActorRecord::Delete { actor_id });
            }
        }
    }

    Ok(Frame {
        index,
        time_delta,
        time,
        records,
        partial,
    })
}

/// Map raw (id, value) pairs through the actor's schema, dropping ids the
/// schema does not know (version drift)
fn resolve_names(
    raw: SmallVec<[(u16, NetValue); 8]>,
    schema: &ClassSchema,
    frame: u32,
    actor_id: u32,
    warnings: &mut Vec<DecodeWarning>,
) -> SmallVec<[PropertyUpdate; 8]> {
    let mut out = SmallVec::new();
    for (prop_id, value) in raw {
        match schema.properties.get(&prop_id) {
            Some(name) => out.push(PropertyUpdate {
                prop_id,
                name: name.clone(),
                value,
            }),
            None => {
                warnings.push(DecodeWarning::UnknownPropertyId {
                    frame,
                    actor_id,
                    prop_id,
                });
                log::debug!(
                    "frame {frame}: actor {actor_id} carries unknown property id {prop_id}"
                );
            }
        }
    }
    out
}
