//! Game-state reconstruction
//!
//! Folds the decoded frame stream into a timeline of per-tick snapshots.
//! The live actor table is owned here for the duration of one decode pass;
//! after each frame's records are applied, a deep copy of every active
//! actor's property map is emitted so downstream consumers never observe
//! later mutations.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::Serialize;

use rewind_format::{ActorRecord, Dictionary, NetCache, NetValue, ReplayFile};

use crate::category::ActorCategory;

/// One actor's materialized state at a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSnapshot {
    pub class_name: String,
    pub category: ActorCategory,
    /// property name -> current value, ordered for deterministic emission
    pub properties: BTreeMap<String, NetValue>,
}

/// The state of all live actors at one tick, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Frame index this snapshot was taken at
    pub frame: u32,
    /// Cumulative wall-clock time at this frame
    pub time: f32,
    /// True when records in this frame were skipped during decoding
    pub partial: bool,
    /// actor id -> state
    pub actors: BTreeMap<u32, ActorSnapshot>,
}

struct LiveActor {
    class_name: String,
    category: ActorCategory,
    properties: BTreeMap<String, NetValue>,
}

/// Folds frames into snapshots, maintaining actor identity across frames
pub struct GameStateReconstructor<'a> {
    net_cache: &'a NetCache,
    dictionary: Option<&'static Dictionary>,
    actors: HashMap<u32, LiveActor>,
}

impl<'a> GameStateReconstructor<'a> {
    pub fn new(net_cache: &'a NetCache, dictionary: Option<&'static Dictionary>) -> Self {
        Self {
            net_cache,
            dictionary,
            actors: HashMap::new(),
        }
    }

    /// Apply one frame's records and emit the resulting snapshot
    pub fn apply_frame(&mut self, frame: &rewind_format::Frame) -> Snapshot {
        for record in &frame.records {
            match record {
                ActorRecord::Spawn {
                    actor_id,
                    class_id,
                    class_name,
                    initial,
                } => {
                    // A fresh actor never inherits state from a previously
                    // deleted holder of the same id
                    let mut properties = self.spawn_defaults(*class_id);
                    for update in initial {
                        properties.insert(update.name.clone(), update.value.clone());
                    }
                    self.actors.insert(
                        *actor_id,
                        LiveActor {
                            class_name: class_name.clone(),
                            category: ActorCategory::from_class_name(class_name),
                            properties,
                        },
                    );
                }
                ActorRecord::Update { actor_id, updates } => {
                    match self.actors.get_mut(actor_id) {
                        Some(actor) => {
                            for update in updates {
                                actor
                                    .properties
                                    .insert(update.name.clone(), update.value.clone());
                            }
                        }
                        None => {
                            // The decoder only emits updates for active
                            // actors; reaching this means the record stream
                            // was assembled by hand out of order
                            log::debug!(
                                "frame {}: update for untracked actor {actor_id}",
                                frame.index
                            );
                        }
                    }
                }
                ActorRecord::Delete { actor_id } => {
                    self.actors.remove(actor_id);
                }
            }
        }

        Snapshot {
            frame: frame.index,
            time: frame.time,
            partial: frame.partial,
            actors: self
                .actors
                .iter()
                .map(|(id, actor)| {
                    (
                        *id,
                        ActorSnapshot {
                            class_name: actor.class_name.clone(),
                            category: actor.category,
                            properties: actor.properties.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Type-appropriate zero for every replicated property the schema
    /// declares and the dictionary knows; properties the dictionary does not
    /// know stay absent until their first delta
    fn spawn_defaults(&self, class_id: u32) -> BTreeMap<String, NetValue> {
        let mut defaults = BTreeMap::new();
        let Some(dictionary) = self.dictionary else {
            return defaults;
        };
        if let Some(schema) = self.net_cache.class(class_id) {
            for name in schema.properties.values() {
                if let Some(kind) = dictionary.kind_of(name) {
                    defaults.insert(name.clone(), NetValue::zero(kind));
                }
            }
        }
        defaults
    }
}

/// Fold a decoded replay into its full snapshot timeline
pub fn reconstruct(replay: &ReplayFile) -> Vec<Snapshot> {
    let mut reconstructor = GameStateReconstructor::new(&replay.net_cache, replay.dictionary);
    replay
        .frames
        .iter()
        .map(|frame| reconstructor.apply_frame(frame))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_format::{
        parse_replay, DecodeOptions, EngineVersion, NetValue, ReplayBuilder, PROP_CAR_BOOST,
        PROP_CAR_DEMOLISHED, PROP_POSITION, PROP_TEAM_SCORE,
    };

    const V1_4: EngineVersion = EngineVersion::new(1, 4, 5);

    fn decode(builder: &ReplayBuilder) -> ReplayFile {
        parse_replay(&builder.build(), &DecodeOptions::default()).unwrap()
    }

    #[test]
    fn test_final_snapshot_reflects_last_deltas() {
        let mut builder = ReplayBuilder::new(V1_4);
        builder.class(10, "Game.Ball", None, &[(0, PROP_POSITION)]);
        builder.class(30, "Game.Car", None, &[(0, PROP_POSITION), (1, PROP_CAR_BOOST)]);
        builder.begin_frame(0.033);
        builder.spawn(1, 10, &[(0, NetValue::Vector([0.0, 0.0, 93.0]))]);
        builder.spawn(2, 30, &[]);
        builder.begin_frame(0.033);
        builder.update(1, &[(0, NetValue::Vector([10.0, 20.0, 93.0]))]);
        builder.update(2, &[(1, NetValue::Int(33))]);
        builder.begin_frame(0.033);
        builder.update(2, &[(1, NetValue::Int(45))]);

        let replay = decode(&builder);
        let snapshots = reconstruct(&replay);
        assert_eq!(snapshots.len(), 3);

        let last = snapshots.last().unwrap();
        assert_eq!(last.actors.len(), 2);
        assert_eq!(
            last.actors[&1].properties.get(PROP_POSITION),
            Some(&NetValue::Vector([10.0, 20.0, 93.0]))
        );
        assert_eq!(
            last.actors[&2].properties.get(PROP_CAR_BOOST),
            Some(&NetValue::Int(45))
        );
        assert_eq!(last.actors[&2].category, ActorCategory::Car);
    }

    #[test]
    fn test_spawn_defaults_fill_unsent_properties() {
        let mut builder = ReplayBuilder::new(V1_4);
        builder.class(
            30,
            "Game.Car",
            None,
            &[(0, PROP_POSITION), (1, PROP_CAR_BOOST), (2, PROP_CAR_DEMOLISHED)],
        );
        builder.begin_frame(0.033);
        // Spawn with a reduced initial set: only position
        builder.spawn(5, 30, &[(0, NetValue::Vector([1.0, 2.0, 3.0]))]);

        let replay = decode(&builder);
        let snapshots = reconstruct(&replay);
        let car = &snapshots[0].actors[&5];
        assert_eq!(car.properties.get(PROP_CAR_BOOST), Some(&NetValue::Int(0)));
        assert_eq!(
            car.properties.get(PROP_CAR_DEMOLISHED),
            Some(&NetValue::Bool(false))
        );
        assert_eq!(
            car.properties.get(PROP_POSITION),
            Some(&NetValue::Vector([1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn test_id_reuse_does_not_inherit_stale_state() {
        let mut builder = ReplayBuilder::new(V1_4);
        builder.class(30, "Game.Car", None, &[(1, PROP_CAR_BOOST)]);
        builder.begin_frame(0.033);
        builder.spawn(5, 30, &[(1, NetValue::Int(77))]);
        builder.begin_frame(0.033);
        builder.delete(5);
        builder.begin_frame(0.033);
        builder.spawn(5, 30, &[]);

        let replay = decode(&builder);
        let snapshots = reconstruct(&replay);
        assert!(!snapshots[1].actors.contains_key(&5));
        // Respawned actor starts from the default, not the stale 77
        assert_eq!(
            snapshots[2].actors[&5].properties.get(PROP_CAR_BOOST),
            Some(&NetValue::Int(0))
        );
    }

    #[test]
    fn test_snapshots_are_isolated_copies() {
        let mut builder = ReplayBuilder::new(V1_4);
        builder.class(20, "Game.Team", None, &[(1, PROP_TEAM_SCORE)]);
        builder.begin_frame(0.033);
        builder.spawn(2, 20, &[(1, NetValue::Int(0))]);
        builder.begin_frame(0.033);
        builder.update(2, &[(1, NetValue::Int(1))]);

        let replay = decode(&builder);
        let snapshots = reconstruct(&replay);
        // The frame-0 snapshot still shows the old score after the update
        assert_eq!(
            snapshots[0].actors[&2].properties.get(PROP_TEAM_SCORE),
            Some(&NetValue::Int(0))
        );
        assert_eq!(
            snapshots[1].actors[&2].properties.get(PROP_TEAM_SCORE),
            Some(&NetValue::Int(1))
        );
    }

    #[test]
    fn test_no_dictionary_means_no_defaults() {
        // Version older than every known dictionary
        let mut builder = ReplayBuilder::new(EngineVersion::new(0, 1, 0));
        builder.class(30, "Game.Car", None, &[(1, PROP_CAR_BOOST)]);
        builder.begin_frame(0.033);
        builder.spawn(5, 30, &[]);

        let replay = decode(&builder);
        assert!(replay.dictionary.is_none());
        let snapshots = reconstruct(&replay);
        assert!(snapshots[0].actors[&5].properties.is_empty());
    }
}
