//! Fixed file header: magic, engine version triple, feature flags, metadata
//!
//! The version triple decides which property dictionary applies to the rest
//! of the file (see `netcache`). Feature flags gate the optional sections:
//! header-only replays (no body) are valid files.

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::bytes::{read_u8, read_u32};
use crate::error::{DecodeError, DecodeWarning, Stage};
use crate::property::PropertyList;
use crate::REPLAY_MAGIC;

/// Engine version triple identifying the encoding grammar variant
///
/// Ordering is lexicographic (major, minor, net), which is what the
/// nearest-lower dictionary fallback relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub net: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, net: u32) -> Self {
        Self { major, minor, net }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/net{}", self.major, self.minor, self.net)
    }
}

bitflags::bitflags! {
    /// Header feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReplayFlags: u8 {
        /// Header property list present
        const HAS_PROPERTIES = 0b0000_0001;
        /// Body bitstream and trailing CRC present
        const HAS_BODY = 0b0000_0010;
    }
}

// Manual serde implementation for ReplayFlags
impl Serialize for ReplayFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReplayFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(ReplayFlags::from_bits_truncate(bits))
    }
}

/// Parsed file header
#[derive(Debug, Clone, Serialize)]
pub struct ReplayHeader {
    /// Engine version the file declares
    pub version: EngineVersion,
    /// Feature flags
    pub flags: ReplayFlags,
    /// Header metadata (empty when HAS_PROPERTIES is clear)
    pub properties: PropertyList,
}

/// Parse the fixed header and the optional property list
///
/// The cursor must sit at byte 0; on success it sits at the start of the
/// class net cache section.
pub(crate) fn parse_header(
    cursor: &mut Cursor<&[u8]>,
    tolerate_unknown_metadata: bool,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<ReplayHeader, DecodeError> {
    let magic = read_u32(cursor, Stage::Header)?;
    if magic != REPLAY_MAGIC {
        return Err(DecodeError::InvalidMagic {
            found: magic,
            expected: REPLAY_MAGIC,
        });
    }

    let major = read_u32(cursor, Stage::Header)?;
    let minor = read_u32(cursor, Stage::Header)?;
    let net = read_u32(cursor, Stage::Header)?;
    let flags = ReplayFlags::from_bits_truncate(read_u8(cursor, Stage::Header)?);

    let properties = if flags.contains(ReplayFlags::HAS_PROPERTIES) {
        PropertyList::decode(cursor, tolerate_unknown_metadata, warnings)?
    } else {
        PropertyList::new()
    };

    Ok(ReplayHeader {
        version: EngineVersion::new(major, minor, net),
        flags,
        properties,
    })
}
