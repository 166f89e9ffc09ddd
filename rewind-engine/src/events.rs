//! Rule-based event derivation
//!
//! Each rule is independent and stateless across invocations: it scans
//! consecutive snapshot pairs, optionally consulting a short trailing
//! window (debounce, score cross-checks). Ambiguous transitions are emitted
//! at low confidence rather than silently dropped.

use serde::Serialize;

use rewind_format::{NetValue, PROP_CAR_BOOST, PROP_CAR_DEMOLISHED, PROP_POSITION,
    PROP_TEAM_INDEX, PROP_TEAM_SCORE};

use crate::actors::Snapshot;
use crate::category::ActorCategory;
use crate::config::EventConfig;

/// A derived semantic occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// Frame index the event is anchored to
    pub tick: u32,
    /// Wall-clock time at that frame
    pub time: f32,
    /// Actors involved
    pub actors: Vec<u32>,
    /// 0.0..=1.0; below 1.0 means the rule saw an ambiguous or degraded
    /// transition
    pub confidence: f32,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventKind {
    /// A team's score increased
    Goal {
        team_actor: u32,
        team_index: Option<i32>,
        new_score: i32,
    },
    /// A car's demolished flag held long enough to be trusted
    Demolition { car_actor: u32 },
    /// A car's boost jumped by at least the configured pad gain
    BoostPickup { car_actor: u32, gained: i32 },
    /// The ball left a goal mouth without a score change in the window
    Save { ball_actor: u32 },
}

/// Run every rule over the snapshot timeline
pub fn extract_events(snapshots: &[Snapshot], config: &EventConfig) -> Vec<Event> {
    let mut events = Vec::new();
    events.extend(goal_rule(snapshots, config));
    events.extend(demolition_rule(snapshots, config));
    events.extend(boost_pickup_rule(snapshots, config));
    events.extend(save_rule(snapshots, config));
    events.sort_by_key(|event| event.tick);
    events
}

fn int_prop(snapshot: &Snapshot, actor_id: u32, name: &str) -> Option<i32> {
    match snapshot.actors.get(&actor_id)?.properties.get(name)? {
        NetValue::Int(v) => Some(*v),
        _ => None,
    }
}

fn bool_prop(snapshot: &Snapshot, actor_id: u32, name: &str) -> bool {
    matches!(
        snapshot
            .actors
            .get(&actor_id)
            .and_then(|a| a.properties.get(name)),
        Some(NetValue::Bool(true))
    )
}

fn position_y(snapshot: &Snapshot, actor_id: u32) -> Option<f32> {
    match snapshot.actors.get(&actor_id)?.properties.get(PROP_POSITION)? {
        NetValue::Vector(v) => Some(v[1]),
        _ => None,
    }
}

/// True when any team's score increased between the two snapshots
fn any_score_increase(prev: &Snapshot, curr: &Snapshot) -> bool {
    curr.actors.iter().any(|(id, actor)| {
        actor.category == ActorCategory::Team
            && matches!(
                (int_prop(prev, *id, PROP_TEAM_SCORE), int_prop(curr, *id, PROP_TEAM_SCORE)),
                (Some(old), Some(new)) if new > old
            )
    })
}

fn clamp_confidence(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

fn goal_rule(snapshots: &[Snapshot], config: &EventConfig) -> Vec<Event> {
    let mut events = Vec::new();
    for pair in snapshots.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        for (id, actor) in &curr.actors {
            if actor.category != ActorCategory::Team {
                continue;
            }
            let (Some(old), Some(new)) = (
                int_prop(prev, *id, PROP_TEAM_SCORE),
                int_prop(curr, *id, PROP_TEAM_SCORE),
            ) else {
                continue;
            };
            if new <= old {
                continue;
            }
            // A jump of more than one point in a single tick is decode
            // noise more often than a real double score
            let mut confidence = if new - old == 1 {
                config.full_confidence
            } else {
                config.low_confidence
            };
            if prev.partial || curr.partial {
                confidence *= config.partial_frame_penalty;
            }
            events.push(Event {
                kind: EventKind::Goal {
                    team_actor: *id,
                    team_index: int_prop(curr, *id, PROP_TEAM_INDEX),
                    new_score: new,
                },
                tick: curr.frame,
                time: curr.time,
                actors: vec![*id],
                confidence: clamp_confidence(confidence),
            });
        }
    }
    events
}

fn demolition_rule(snapshots: &[Snapshot], config: &EventConfig) -> Vec<Event> {
    let debounce = config.demolition_debounce_ticks.max(1) as usize;
    let mut events = Vec::new();
    for i in 0..snapshots.len() {
        for (id, actor) in &snapshots[i].actors {
            if actor.category != ActorCategory::Car {
                continue;
            }
            if !bool_prop(&snapshots[i], *id, PROP_CAR_DEMOLISHED) {
                continue;
            }
            // Only handle each true-run at its first tick
            if i > 0 && bool_prop(&snapshots[i - 1], *id, PROP_CAR_DEMOLISHED) {
                continue;
            }
            let run = snapshots[i..]
                .iter()
                .take_while(|s| bool_prop(s, *id, PROP_CAR_DEMOLISHED))
                .count();
            let reaches_end = i + run == snapshots.len();
            let mut confidence = if run >= debounce {
                config.full_confidence
            } else if reaches_end {
                // Replay ended before the hold requirement could be met
                config.low_confidence
            } else {
                // Single-tick blip that reverted: decoding noise
                continue;
            };
            if snapshots[i..(i + run.min(debounce))].iter().any(|s| s.partial) {
                confidence *= config.partial_frame_penalty;
            }
            events.push(Event {
                kind: EventKind::Demolition { car_actor: *id },
                tick: snapshots[i].frame,
                time: snapshots[i].time,
                actors: vec![*id],
                confidence: clamp_confidence(confidence),
            });
        }
    }
    events
}

fn boost_pickup_rule(snapshots: &[Snapshot], config: &EventConfig) -> Vec<Event> {
    let mut events = Vec::new();
    for pair in snapshots.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        for (id, actor) in &curr.actors {
            if actor.category != ActorCategory::Car {
                continue;
            }
            let (Some(old), Some(new)) = (
                int_prop(prev, *id, PROP_CAR_BOOST),
                int_prop(curr, *id, PROP_CAR_BOOST),
            ) else {
                continue;
            };
            let gained = new - old;
            if gained < config.boost_pickup_min_gain {
                continue;
            }
            let mut confidence = config.full_confidence;
            if prev.partial || curr.partial {
                confidence *= config.partial_frame_penalty;
            }
            events.push(Event {
                kind: EventKind::BoostPickup {
                    car_actor: *id,
                    gained,
                },
                tick: curr.frame,
                time: curr.time,
                actors: vec![*id],
                confidence: clamp_confidence(confidence),
            });
        }
    }
    events
}

fn save_rule(snapshots: &[Snapshot], config: &EventConfig) -> Vec<Event> {
    let mut events = Vec::new();
    for i in 1..snapshots.len() {
        let (prev, curr) = (&snapshots[i - 1], &snapshots[i]);
        for (id, actor) in &curr.actors {
            if actor.category != ActorCategory::Ball {
                continue;
            }
            let (Some(prev_y), Some(curr_y)) = (position_y(prev, *id), position_y(curr, *id))
            else {
                continue;
            };
            let inside = prev_y.abs() >= config.goal_mouth_depth;
            let outside = curr_y.abs() < config.goal_mouth_depth;
            if !(inside && outside) {
                continue;
            }
            // The ball left the goal mouth. If no team scored inside the
            // trailing window, somebody kept it out.
            let start = i.saturating_sub(config.save_window_ticks as usize);
            let scored = (start + 1..=i)
                .any(|j| any_score_increase(&snapshots[j - 1], &snapshots[j]));
            if scored {
                continue;
            }
            let mut confidence = config.low_confidence;
            if snapshots[start..=i].iter().any(|s| s.partial) {
                confidence *= config.partial_frame_penalty;
            }
            events.push(Event {
                kind: EventKind::Save { ball_actor: *id },
                tick: curr.frame,
                time: curr.time,
                actors: vec![*id],
                confidence: clamp_confidence(confidence),
            });
        }
    }
    events
}
