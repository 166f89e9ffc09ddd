//! Rewind-Format: replay binary format decoder
//!
//! This crate decodes the versioned, delta-compressed network-replication
//! stream inside a match replay file and hands the result to the state
//! reconstruction engine. It is the bit-exact half of the pipeline: header
//! metadata, the file-embedded class net cache, and the frame-by-frame actor
//! stream.
//!
//! # File layout
//!
//! A replay is: fixed magic header with an engine version triple, a
//! self-describing header property list, a class net cache section, and a
//! length-prefixed body bitstream of frames followed by a CRC-32 over the
//! body bytes. Class and property identifiers are file-scoped and resolved
//! through the net cache; which property *names* exist (and what value kind
//! each carries) depends on the engine version and goes through a per-version
//! dictionary with an explicit nearest-lower fallback.
//!
//! # Usage
//!
//! ```ignore
//! use rewind_format::{parse_replay, DecodeOptions};
//!
//! let data = std::fs::read("match.replay").unwrap();
//! let replay = parse_replay(&data, &DecodeOptions::default()).unwrap();
//!
//! println!("engine: {}", replay.header.version);
//! println!("frames: {}", replay.frames.len());
//! println!("warnings: {}", replay.warnings.len());
//! ```
//!
//! Decoding one file is a single sequential pass over a fully buffered
//! input; decode independent files on independent threads. The only shared
//! state is the process-wide version dictionary catalog, which is immutable
//! once built.

mod bits;
mod build;
mod bytes;
mod error;
mod header;
mod netcache;
mod property;
mod reader;
mod stream;

pub use bits::{BitCursor, MAX_VECTOR_COMPONENT_BITS};
pub use build::{BitWriter, ReplayBuilder};
pub use error::{DecodeError, DecodeWarning, Stage};
pub use header::{EngineVersion, ReplayFlags, ReplayHeader};
pub use netcache::{
    resolve_dictionary, ClassSchema, Dictionary, DictionaryResolution, NetCache, RawClassEntry,
    ValueKind, PROP_BALL_LAST_TOUCH_TEAM, PROP_BOOST_PAD_ACTIVE, PROP_CAR_BOOST,
    PROP_CAR_DEMOLISHED, PROP_CAR_THROTTLE, PROP_PLAYER_NAME, PROP_PLAYER_PING,
    PROP_PLAYER_UNIQUE_ID, PROP_POSITION, PROP_ROTATION, PROP_TEAM_INDEX, PROP_TEAM_SCORE,
    PROP_VELOCITY,
};
pub use property::{PropertyList, PropertyValue, PROPERTY_LIST_END};
pub use reader::{parse_replay, DecodeOptions, ReplayFile};
pub use stream::{ActorRecord, Frame, NetValue, PropertyUpdate};

// =============================================================================
// Constants
// =============================================================================

/// File magic, "RWND" in on-disk byte order
pub const REPLAY_MAGIC: u32 = u32::from_le_bytes(*b"RWND");

/// Smallest possible file: magic + version triple + flags + net cache count
pub const MIN_FILE_BYTES: usize = 4 + 12 + 1 + 4;

/// Width of actor ids in the body bitstream
pub const ACTOR_ID_BITS: u32 = 10;

/// Width of property ids in the body bitstream
pub const PROP_ID_BITS: u32 = 16;

/// Sanity cap on declared string lengths
pub const MAX_STRING_BYTES: usize = 64 * 1024;

/// Sanity cap on net cache entries per file
pub const MAX_NET_CACHE_ENTRIES: u32 = 4096;

/// Sanity cap on declared properties per net cache entry
pub const MAX_SCHEMA_PROPERTIES: u32 = 2048;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_is_ascii_rwnd() {
        assert_eq!(&REPLAY_MAGIC.to_le_bytes(), b"RWND");
    }

    #[test]
    fn test_actor_id_range() {
        // 10 bits: ids 0..1024, matching the encoder's live-actor budget
        assert_eq!(1u32 << ACTOR_ID_BITS, 1024);
    }
}
