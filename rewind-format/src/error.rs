//! Error types for replay decoding
//!
//! Fatal conditions abort the whole-file decode and surface as [`DecodeError`]
//! with the stage and offset where decoding stopped. Recoverable conditions
//! never abort: they accumulate as [`DecodeWarning`] values attached to the
//! decode output.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::header::EngineVersion;

/// Decode stage, carried by errors for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    /// Fixed-layout file header (magic, versions, flags)
    Header,
    /// Header property list
    Properties,
    /// Class net cache section
    NetCache,
    /// Main body bitstream
    Body,
    /// Trailing body checksum
    Checksum,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Properties => "properties",
            Self::NetCache => "net cache",
            Self::Body => "body",
            Self::Checksum => "checksum",
        };
        f.write_str(name)
    }
}

/// Fatal decode errors
///
/// Every variant identifies the stage and the bit or byte offset at which
/// decoding stopped. A single bad file must never take down a batch job:
/// callers catch this per file and continue.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File is too small to hold the fixed header
    #[error("file too small to be a replay ({len} bytes)")]
    TooSmall { len: usize },

    /// Magic bytes do not identify a replay file
    #[error("invalid magic 0x{found:08X} (expected 0x{expected:08X})")]
    InvalidMagic { found: u32, expected: u32 },

    /// Ran out of data mid-read
    #[error("truncated data in {stage} at bit offset {bit_offset} ({wanted_bits} more bits wanted)")]
    TruncatedData {
        stage: Stage,
        bit_offset: u64,
        wanted_bits: u64,
    },

    /// Ran out of body data while inside a frame
    #[error("truncated stream inside frame {frame} at bit offset {bit_offset}")]
    TruncatedStream { frame: u32, bit_offset: u64 },

    /// Unrecognized property type tag in a critical property list
    #[error("unknown property type tag {tag} in {stage} at byte offset {offset}")]
    UnknownPropertyType { stage: Stage, tag: u8, offset: u64 },

    /// String length prefix exceeds the sanity cap
    #[error("oversized string ({len} bytes) in {stage} at bit offset {bit_offset}")]
    OversizedString {
        stage: Stage,
        bit_offset: u64,
        len: u32,
    },

    /// Quantized value declared an impossible per-component bit width
    #[error("malformed quantized value ({bits} bits/component) at bit offset {bit_offset}")]
    MalformedQuantized { bit_offset: u64, bits: u32 },

    /// Net cache parent chain loops back on itself
    #[error("net cache parent cycle involving class {class_id}")]
    NetCacheCycle { class_id: u32 },

    /// Net cache declares more classes than the sanity cap allows
    #[error("net cache declares {count} classes (max {max})")]
    TooManyClasses { count: u32, max: u32 },

    /// A net cache entry declares more properties than the sanity cap allows
    #[error("class {class_id} declares {count} properties (max {max})")]
    TooManyProperties { class_id: u32, count: u32, max: u32 },

    /// A net cache property id does not fit the stream's 16-bit encoding
    #[error("class {class_id} property id {prop_id} exceeds the 16-bit stream range")]
    PropertyIdOutOfRange { class_id: u32, prop_id: u32 },

    /// Body checksum does not match (strict mode only)
    #[error("body CRC mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    CrcMismatch { stored: u32, computed: u32 },

    /// Declared body length runs past the end of the file
    #[error("declared body length {declared} exceeds remaining {available} bytes")]
    BodyOverrun { declared: u64, available: u64 },
}

/// Recoverable decode conditions
///
/// Collected in order of occurrence and returned alongside the decoded
/// output; affected frames are flagged partially decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DecodeWarning {
    /// Update or delete record referenced an actor that is not active
    UnknownActorReference { frame: u32, actor_id: u32 },
    /// Spawn record for an id that is already active; old actor dropped
    DuplicateSpawn { frame: u32, actor_id: u32 },
    /// Spawn referenced a class id absent from the net cache
    UnknownClass { frame: u32, class_id: u32 },
    /// Property id not present in the actor's schema (version drift)
    UnknownPropertyId {
        frame: u32,
        actor_id: u32,
        prop_id: u16,
    },
    /// Tolerated unknown property type tag inside decorative metadata
    UnknownMetadataType { name: String, tag: u8 },
    /// Net cache entry named a parent class that does not exist
    UnknownParentClass { class_id: u32, parent_id: u32 },
    /// Exact engine version not known; nearest lower dictionary used
    SchemaFallback {
        requested: EngineVersion,
        resolved: EngineVersion,
    },
    /// File predates every known dictionary; spawn defaults unavailable
    NoDictionary { requested: EngineVersion },
    /// Body CRC mismatch tolerated in lenient mode
    CrcMismatch { stored: u32, computed: u32 },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownActorReference { frame, actor_id } => {
                write!(f, "frame {frame}: record references unknown actor {actor_id}")
            }
            Self::DuplicateSpawn { frame, actor_id } => {
                write!(f, "frame {frame}: actor {actor_id} respawned while active")
            }
            Self::UnknownClass { frame, class_id } => {
                write!(f, "frame {frame}: spawn references unknown class {class_id}")
            }
            Self::UnknownPropertyId {
                frame,
                actor_id,
                prop_id,
            } => write!(
                f,
                "frame {frame}: actor {actor_id} update carries unknown property id {prop_id}"
            ),
            Self::UnknownMetadataType { name, tag } => {
                write!(f, "metadata property '{name}' has unknown type tag {tag}")
            }
            Self::UnknownParentClass {
                class_id,
                parent_id,
            } => write!(
                f,
                "net cache class {class_id} names missing parent {parent_id}"
            ),
            Self::SchemaFallback {
                requested,
                resolved,
            } => write!(
                f,
                "no dictionary for engine {requested}, fell back to {resolved}"
            ),
            Self::NoDictionary { requested } => {
                write!(f, "engine {requested} predates every known dictionary")
            }
            Self::CrcMismatch { stored, computed } => write!(
                f,
                "body CRC mismatch tolerated: stored 0x{stored:08X}, computed 0x{computed:08X}"
            ),
        }
    }
}
