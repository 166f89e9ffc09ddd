//! Rewind-Engine: game-state reconstruction and event derivation
//!
//! Consumes the decoded frame stream from `rewind-format` and produces the
//! pipeline's sole long-lived artifact: a [`Timeline`] of per-tick entity
//! snapshots plus derived match events (goals, saves, demolitions, boost
//! pickups), each event carrying a confidence score.
//!
//! # Usage
//!
//! ```ignore
//! use rewind_engine::{decode_replay, EngineConfig};
//!
//! let data = std::fs::read("match.replay").unwrap();
//! let timeline = decode_replay(&data, &EngineConfig::default()).unwrap();
//!
//! println!("ticks: {}", timeline.snapshots.len());
//! for event in &timeline.events {
//!     println!("[{}] {:?} ({:.0}%)", event.tick, event.kind, event.confidence * 100.0);
//! }
//! ```
//!
//! Decoding one file is a single sequential pass: net cache resolution, the
//! actor table and frame ordering are all order-dependent, so there is no
//! parallel decomposition within a file. Run independent files on
//! independent threads — `decode_replay` shares no mutable state between
//! calls. Fatal conditions return an error identifying stage and offset;
//! recoverable conditions surface as warnings on the returned timeline, and
//! a single bad file never needs to take down a batch.

mod actors;
mod category;
mod config;
mod events;
mod timeline;

pub use actors::{reconstruct, ActorSnapshot, GameStateReconstructor, Snapshot};
pub use category::ActorCategory;
pub use config::{EngineConfig, EventConfig};
pub use events::{extract_events, Event, EventKind};
pub use timeline::{Timeline, TimelineEmitter};

use rewind_format::{parse_replay, DecodeError};

/// Decode a replay and reconstruct its full timeline
///
/// The whole-file operation: parse, fold frames into snapshots, derive
/// events. Cancellation and timeouts are the caller's concern, applied at
/// whole-file granularity.
pub fn decode_replay(data: &[u8], config: &EngineConfig) -> Result<Timeline, DecodeError> {
    let replay = parse_replay(data, &config.decode)?;
    let snapshots = reconstruct(&replay);
    let events = extract_events(&snapshots, &config.events);
    Ok(Timeline {
        engine_version: replay.header.version,
        schema: replay.resolution,
        degraded: replay.is_degraded(),
        metadata: replay.header.properties.clone(),
        snapshots,
        events,
        warnings: replay.warnings,
    })
}
