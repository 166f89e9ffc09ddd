//! The timeline: the engine's sole long-lived output
//!
//! Ordered snapshots plus ordered derived events, together with everything
//! a downstream consumer needs to judge trust: accumulated warnings, the
//! schema resolution that was in effect, and a single degraded flag. The
//! whole value serializes to nested maps and sequences of primitives — no
//! engine-internal identities leak out.

use std::io;

use serde::Serialize;

use rewind_format::{DecodeWarning, DictionaryResolution, EngineVersion, PropertyList};

use crate::actors::Snapshot;
use crate::events::Event;

/// Reconstructed match data for one replay file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    /// Engine version the file declared
    pub engine_version: EngineVersion,
    /// Which dictionary version was used (exact match vs. fallback)
    pub schema: DictionaryResolution,
    /// True when anything about the decode is less than fully trusted
    pub degraded: bool,
    /// Header metadata, verbatim
    pub metadata: PropertyList,
    /// Per-tick entity state, in frame order
    pub snapshots: Vec<Snapshot>,
    /// Derived events, ordered by tick
    pub events: Vec<Event>,
    /// Recoverable conditions hit during decoding, in order of occurrence
    pub warnings: Vec<DecodeWarning>,
}

impl Timeline {
    /// The timeline as a JSON value tree (maps/sequences of primitives)
    pub fn to_value(&self) -> serde_json::Value {
        // Serialize on our own types cannot fail
        serde_json::to_value(self).unwrap()
    }
}

/// Serializes timelines for downstream consumers
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineEmitter {
    pretty: bool,
}

impl TimelineEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit human-readable JSON instead of compact
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Write the timeline as JSON to `writer`
    pub fn emit<W: io::Write>(&self, timeline: &Timeline, writer: W) -> serde_json::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, timeline)
        } else {
            serde_json::to_writer(writer, timeline)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_timeline() -> Timeline {
        Timeline {
            engine_version: EngineVersion::new(1, 4, 5),
            schema: DictionaryResolution {
                requested: EngineVersion::new(1, 4, 5),
                resolved: Some(EngineVersion::new(1, 4, 5)),
                exact: true,
            },
            degraded: false,
            metadata: PropertyList::new(),
            snapshots: Vec::new(),
            events: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_to_value_is_object_of_primitives() {
        let value = empty_timeline().to_value();
        let object = value.as_object().unwrap();
        assert_eq!(object["degraded"], serde_json::json!(false));
        assert!(object["snapshots"].as_array().unwrap().is_empty());
        assert_eq!(object["engine_version"]["major"], serde_json::json!(1));
    }

    #[test]
    fn test_emit_compact_and_pretty() {
        let timeline = empty_timeline();
        let mut compact = Vec::new();
        TimelineEmitter::new().emit(&timeline, &mut compact).unwrap();
        let mut pretty = Vec::new();
        TimelineEmitter::new()
            .pretty()
            .emit(&timeline, &mut pretty)
            .unwrap();
        assert!(compact.len() < pretty.len());
        // Both parse back to the same value
        let a: serde_json::Value = serde_json::from_slice(&compact).unwrap();
        let b: serde_json::Value = serde_json::from_slice(&pretty).unwrap();
        assert_eq!(a, b);
    }
}
