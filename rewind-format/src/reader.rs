//! Whole-file decode
//!
//! Stages run strictly forward: fixed header, header properties, class net
//! cache, CRC verification, then the frame stream. The CRC is checked before
//! any body content is trusted; under the default strict policy a mismatch
//! aborts, under the lenient policy it degrades to a warning and a
//! best-effort decode.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::bits::BitCursor;
use crate::bytes::read_u32;
use crate::error::{DecodeError, DecodeWarning, Stage};
use crate::header::{parse_header, ReplayFlags, ReplayHeader};
use crate::netcache::{
    parse_net_cache, resolve_dictionary, Dictionary, DictionaryResolution, NetCache,
};
use crate::stream::{decode_frames, Frame};
use crate::MIN_FILE_BYTES;

/// Decode policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Treat a body CRC mismatch as fatal (default: true)
    #[serde(default = "default_true")]
    pub strict_crc: bool,
    /// Tolerate unknown property type tags inside decorative metadata
    /// arrays (default: false)
    #[serde(default)]
    pub tolerate_unknown_metadata: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_crc: default_true(),
            tolerate_unknown_metadata: false,
        }
    }
}

/// A fully decoded replay file
///
/// Owned output of one decode pass; nothing in here aliases the input
/// buffer. Warnings are in order of occurrence.
#[derive(Debug)]
pub struct ReplayFile {
    pub header: ReplayHeader,
    pub net_cache: NetCache,
    /// How the declared engine version mapped onto a known dictionary
    pub resolution: DictionaryResolution,
    /// The dictionary in effect, if any (process-static, read-only)
    pub dictionary: Option<&'static Dictionary>,
    pub frames: Vec<Frame>,
    pub warnings: Vec<DecodeWarning>,
    /// False when the body CRC did not match (lenient mode only)
    pub crc_ok: bool,
}

impl ReplayFile {
    /// True when anything about this decode is less than fully trusted
    pub fn is_degraded(&self) -> bool {
        !self.crc_ok || !self.resolution.exact || !self.warnings.is_empty()
    }
}

/// Decode a complete replay from a fully buffered byte slice
///
/// One sequential pass; no shared mutable state, so independent files may
/// decode on independent threads. Fatal conditions return immediately with
/// stage and offset context; recoverable conditions accumulate on the
/// returned [`ReplayFile`].
pub fn parse_replay(data: &[u8], options: &DecodeOptions) -> Result<ReplayFile, DecodeError> {
    if data.len() < MIN_FILE_BYTES {
        return Err(DecodeError::TooSmall { len: data.len() });
    }

    let mut warnings = Vec::new();
    let mut cursor = Cursor::new(data);

    let header = parse_header(&mut cursor, options.tolerate_unknown_metadata, &mut warnings)?;
    let entries = parse_net_cache(&mut cursor)?;
    let net_cache = NetCache::build(entries, &mut warnings)?;
    let (resolution, dictionary) = resolve_dictionary(header.version, &mut warnings);

    let mut frames = Vec::new();
    let mut crc_ok = true;
    if header.flags.contains(ReplayFlags::HAS_BODY) {
        let body_len = read_u32(&mut cursor, Stage::Body)? as u64;
        let pos = cursor.position();
        let available = data.len() as u64 - pos;
        if body_len + 4 > available {
            return Err(DecodeError::BodyOverrun {
                declared: body_len,
                available: available.saturating_sub(4),
            });
        }
        let body = &data[pos as usize..(pos + body_len) as usize];
        cursor.set_position(pos + body_len);
        let stored = read_u32(&mut cursor, Stage::Checksum)?;
        let computed = crc32fast::hash(body);
        if stored != computed {
            if options.strict_crc {
                return Err(DecodeError::CrcMismatch { stored, computed });
            }
            log::warn!(
                "body CRC mismatch (stored 0x{stored:08X}, computed 0x{computed:08X}); \
                 continuing best-effort"
            );
            warnings.push(DecodeWarning::CrcMismatch { stored, computed });
            crc_ok = false;
        }

        let mut bits = BitCursor::new(body);
        frames = decode_frames(&mut bits, &net_cache, &mut warnings)?;
    }

    Ok(ReplayFile {
        header,
        net_cache,
        resolution,
        dictionary,
        frames,
        warnings,
        crc_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ReplayBuilder;
    use crate::header::EngineVersion;
    use crate::netcache::{PROP_POSITION, PROP_TEAM_SCORE};
    use crate::property::PropertyValue;
    use crate::stream::{ActorRecord, NetValue};

    const V1_4: EngineVersion = EngineVersion::new(1, 4, 5);

    fn sample_builder() -> ReplayBuilder {
        let mut builder = ReplayBuilder::new(V1_4);
        builder
            .property("MapName", PropertyValue::Str("Stadium_P".into()))
            .class(10, "Game.Ball", None, &[(0, PROP_POSITION)])
            .class(20, "Game.Team", None, &[(1, PROP_TEAM_SCORE)]);
        builder.begin_frame(0.033);
        builder.spawn(1, 10, &[(0, NetValue::Vector([0.0, 0.0, 93.0]))]);
        builder.spawn(2, 20, &[(1, NetValue::Int(0))]);
        builder.begin_frame(0.033);
        builder.update(2, &[(1, NetValue::Int(1))]);
        builder
    }

    #[test]
    fn test_full_file_roundtrip() {
        let data = sample_builder().build();
        let replay = parse_replay(&data, &DecodeOptions::default()).unwrap();

        assert_eq!(replay.header.version, V1_4);
        assert_eq!(
            replay
                .header
                .properties
                .get("MapName")
                .and_then(PropertyValue::as_str),
            Some("Stadium_P")
        );
        assert_eq!(replay.net_cache.len(), 2);
        assert!(replay.resolution.exact);
        assert!(replay.dictionary.is_some());
        assert_eq!(replay.frames.len(), 2);
        assert!(replay.warnings.is_empty());
        assert!(!replay.is_degraded());
        assert!(matches!(
            &replay.frames[1].records[0],
            ActorRecord::Update { actor_id: 2, .. }
        ));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let data = sample_builder().build();
        let first = parse_replay(&data, &DecodeOptions::default()).unwrap();
        let second = parse_replay(&data, &DecodeOptions::default()).unwrap();
        assert_eq!(first.frames, second.frames);
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(first.resolution, second.resolution);
    }

    #[test]
    fn test_header_only_file() {
        let mut builder = ReplayBuilder::new(V1_4);
        builder.property("TeamSize", PropertyValue::Int(3));
        let data = builder.build();
        let replay = parse_replay(&data, &DecodeOptions::default()).unwrap();
        assert!(replay.frames.is_empty());
        assert!(replay.crc_ok);
    }

    #[test]
    fn test_too_small() {
        assert!(matches!(
            parse_replay(b"RWND", &DecodeOptions::default()),
            Err(DecodeError::TooSmall { len: 4 })
        ));
    }

    #[test]
    fn test_crc_mismatch_strict_is_fatal() {
        let mut builder = sample_builder();
        builder.corrupt_crc();
        let data = builder.build();
        assert!(matches!(
            parse_replay(&data, &DecodeOptions::default()),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_crc_mismatch_lenient_degrades() {
        let mut builder = sample_builder();
        builder.corrupt_crc();
        let data = builder.build();
        let options = DecodeOptions {
            strict_crc: false,
            ..DecodeOptions::default()
        };
        let replay = parse_replay(&data, &options).unwrap();
        assert!(!replay.crc_ok);
        assert!(replay.is_degraded());
        // Body still decoded best-effort
        assert_eq!(replay.frames.len(), 2);
        assert!(matches!(
            replay.warnings.as_slice(),
            [DecodeWarning::CrcMismatch { .. }]
        ));
    }

    #[test]
    fn test_version_fallback_surfaces_on_file() {
        let mut builder = ReplayBuilder::new(EngineVersion::new(1, 7, 7));
        builder.class(10, "Game.Ball", None, &[(0, PROP_POSITION)]);
        let data = builder.build();
        let replay = parse_replay(&data, &DecodeOptions::default()).unwrap();
        assert!(!replay.resolution.exact);
        assert_eq!(replay.resolution.resolved, Some(V1_4));
        assert!(replay.is_degraded());
    }

    #[test]
    fn test_body_overrun_is_fatal() {
        let data = sample_builder().build();
        // Truncate inside the body
        let truncated = &data[..data.len() - 6];
        assert!(matches!(
            parse_replay(truncated, &DecodeOptions::default()),
            Err(DecodeError::BodyOverrun { .. })
        ));
    }

    #[test]
    fn test_decode_options_serde_defaults() {
        let options: DecodeOptions = toml_like_default();
        assert!(options.strict_crc);
        assert!(!options.tolerate_unknown_metadata);
    }

    fn toml_like_default() -> DecodeOptions {
        serde_json::from_str("{}").unwrap()
    }
}
