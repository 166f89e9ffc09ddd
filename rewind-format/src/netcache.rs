//! Class net cache resolution
//!
//! Every file embeds its own table mapping numeric class ids to class names
//! and replicated property schemas. A class inherits its parent's schema;
//! the effective schema is the closure over the parent chain, parents
//! resolved first. Property *ids* are file-scoped and unstable across engine
//! releases, so interpretation (which property names exist and what value
//! kind each carries) goes through a per-version dictionary with an explicit
//! nearest-lower fallback — never a silent default.

use std::io::Cursor;
use std::sync::OnceLock;

use hashbrown::HashMap;
use serde::Serialize;

use crate::bytes::{read_i32, read_string, read_u32};
use crate::error::{DecodeError, DecodeWarning, Stage};
use crate::header::EngineVersion;
use crate::{MAX_NET_CACHE_ENTRIES, MAX_SCHEMA_PROPERTIES};

// Canonical replicated property names. Ids drift between engine releases;
// names do not.
pub const PROP_POSITION: &str = "Core.Actor:Position";
pub const PROP_ROTATION: &str = "Core.Actor:Rotation";
pub const PROP_VELOCITY: &str = "Core.Actor:LinearVelocity";
pub const PROP_TEAM_SCORE: &str = "Game.Team:Score";
pub const PROP_TEAM_INDEX: &str = "Game.Team:Index";
pub const PROP_CAR_DEMOLISHED: &str = "Game.Car:Demolished";
pub const PROP_CAR_BOOST: &str = "Game.Car:BoostAmount";
pub const PROP_CAR_THROTTLE: &str = "Game.Car:Throttle";
pub const PROP_PLAYER_NAME: &str = "Game.Player:Name";
pub const PROP_PLAYER_PING: &str = "Game.Player:Ping";
pub const PROP_PLAYER_UNIQUE_ID: &str = "Game.Player:UniqueId";
pub const PROP_BOOST_PAD_ACTIVE: &str = "Game.BoostPad:Active";
pub const PROP_BALL_LAST_TOUCH_TEAM: &str = "Game.Ball:LastTouchTeam";

/// Wire value kind a known property carries
///
/// Drives type-appropriate spawn defaults for replicated properties the
/// spawn record did not include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    Vector,
    Rotation,
    QWord,
    Bytes,
}

/// One raw net cache entry as read from the file
#[derive(Debug, Clone)]
pub struct RawClassEntry {
    pub class_id: u32,
    pub class_name: String,
    pub parent: Option<u32>,
    pub properties: Vec<(u16, String)>,
}

/// A class with its effective (closure) property schema
#[derive(Debug, Clone, Serialize)]
pub struct ClassSchema {
    pub class_id: u32,
    pub class_name: String,
    /// property id -> property name, own pairs plus the parent closure
    pub properties: HashMap<u16, String>,
}

/// Per-file class table, built once after the header and read-only afterward
#[derive(Debug, Default, Serialize)]
pub struct NetCache {
    classes: HashMap<u32, ClassSchema>,
}

impl NetCache {
    /// Look up a class by id
    pub fn class(&self, class_id: u32) -> Option<&ClassSchema> {
        self.classes.get(&class_id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Build the effective schemas from raw entries
    ///
    /// Parents are resolved before children. A cycle in the parent chain is
    /// fatal; a parent id that names no entry degrades the entry to a root
    /// class with a warning.
    pub fn build(
        entries: Vec<RawClassEntry>,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Result<Self, DecodeError> {
        let by_id: HashMap<u32, &RawClassEntry> =
            entries.iter().map(|e| (e.class_id, e)).collect();

        let mut resolved: HashMap<u32, ClassSchema> = HashMap::with_capacity(entries.len());
        for entry in &entries {
            if resolved.contains_key(&entry.class_id) {
                continue;
            }
            // Walk up the parent chain until a resolved ancestor or a root
            let mut chain = Vec::new();
            let mut current = entry;
            loop {
                if chain.iter().any(|c: &&RawClassEntry| c.class_id == current.class_id) {
                    return Err(DecodeError::NetCacheCycle {
                        class_id: current.class_id,
                    });
                }
                chain.push(current);
                let Some(parent_id) = current.parent else {
                    break;
                };
                if resolved.contains_key(&parent_id) {
                    break;
                }
                match by_id.get(&parent_id) {
                    Some(parent) => current = *parent,
                    None => {
                        warnings.push(DecodeWarning::UnknownParentClass {
                            class_id: current.class_id,
                            parent_id,
                        });
                        log::warn!(
                            "net cache class {} names missing parent {}; treating as root",
                            current.class_id,
                            parent_id
                        );
                        break;
                    }
                }
            }
            // Resolve the chain top-down so each child unions its parent
            for raw in chain.into_iter().rev() {
                if resolved.contains_key(&raw.class_id) {
                    continue;
                }
                let mut properties = raw
                    .parent
                    .and_then(|p| resolved.get(&p))
                    .map(|parent| parent.properties.clone())
                    .unwrap_or_default();
                for (prop_id, name) in &raw.properties {
                    // Own pairs override inherited ones
                    properties.insert(*prop_id, name.clone());
                }
                resolved.insert(
                    raw.class_id,
                    ClassSchema {
                        class_id: raw.class_id,
                        class_name: raw.class_name.clone(),
                        properties,
                    },
                );
            }
        }

        Ok(Self { classes: resolved })
    }
}

/// Parse the class net cache section
pub(crate) fn parse_net_cache(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<RawClassEntry>, DecodeError> {
    let count = read_u32(cursor, Stage::NetCache)?;
    if count > MAX_NET_CACHE_ENTRIES {
        return Err(DecodeError::TooManyClasses {
            count,
            max: MAX_NET_CACHE_ENTRIES,
        });
    }

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let class_id = read_u32(cursor, Stage::NetCache)?;
        let class_name = read_string(cursor, Stage::NetCache)?;
        let parent_raw = read_i32(cursor, Stage::NetCache)?;
        let parent = u32::try_from(parent_raw).ok();

        let prop_count = read_u32(cursor, Stage::NetCache)?;
        if prop_count > MAX_SCHEMA_PROPERTIES {
            return Err(DecodeError::TooManyProperties {
                class_id,
                count: prop_count,
                max: MAX_SCHEMA_PROPERTIES,
            });
        }
        let mut properties = Vec::with_capacity(prop_count as usize);
        for _ in 0..prop_count {
            let prop_id = read_u32(cursor, Stage::NetCache)?;
            let prop_id = u16::try_from(prop_id)
                .map_err(|_| DecodeError::PropertyIdOutOfRange { class_id, prop_id })?;
            let name = read_string(cursor, Stage::NetCache)?;
            properties.push((prop_id, name));
        }

        entries.push(RawClassEntry {
            class_id,
            class_name,
            parent,
            properties,
        });
    }
    Ok(entries)
}

// =============================================================================
// Version dictionaries
// =============================================================================

/// Which replicated properties a given engine release knows, and the value
/// kind each carries
#[derive(Debug)]
pub struct Dictionary {
    pub version: EngineVersion,
    properties: HashMap<&'static str, ValueKind>,
}

impl Dictionary {
    /// Value kind a known property name carries, if the name is known to
    /// this release
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.properties.get(name).copied()
    }
}

/// How the requested engine version mapped onto a known dictionary
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DictionaryResolution {
    /// Version the file declared
    pub requested: EngineVersion,
    /// Dictionary version actually used (None: older than everything known)
    pub resolved: Option<EngineVersion>,
    /// True when requested matched a known version exactly
    pub exact: bool,
}

const V1_0: EngineVersion = EngineVersion::new(1, 0, 1);
const V1_4: EngineVersion = EngineVersion::new(1, 4, 5);
const V2_0: EngineVersion = EngineVersion::new(2, 0, 9);

const BASE_PROPERTIES: &[(&str, ValueKind)] = &[
    (PROP_POSITION, ValueKind::Vector),
    (PROP_ROTATION, ValueKind::Rotation),
    (PROP_VELOCITY, ValueKind::Vector),
    (PROP_TEAM_SCORE, ValueKind::Int),
    (PROP_TEAM_INDEX, ValueKind::Int),
    (PROP_CAR_THROTTLE, ValueKind::Float),
    (PROP_PLAYER_NAME, ValueKind::Str),
    (PROP_PLAYER_PING, ValueKind::Int),
    (PROP_PLAYER_UNIQUE_ID, ValueKind::QWord),
];

const V1_4_PROPERTIES: &[(&str, ValueKind)] = &[
    (PROP_CAR_DEMOLISHED, ValueKind::Bool),
    (PROP_CAR_BOOST, ValueKind::Int),
    (PROP_BOOST_PAD_ACTIVE, ValueKind::Bool),
];

const V2_0_PROPERTIES: &[(&str, ValueKind)] = &[(PROP_BALL_LAST_TOUCH_TEAM, ValueKind::Int)];

/// Known dictionaries, built once per process and shared read-only across
/// concurrent decodes
fn catalog() -> &'static [Dictionary] {
    static CATALOG: OnceLock<Vec<Dictionary>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let mut v1_0: HashMap<&'static str, ValueKind> = HashMap::new();
        v1_0.extend(BASE_PROPERTIES.iter().copied());

        let mut v1_4 = v1_0.clone();
        v1_4.extend(V1_4_PROPERTIES.iter().copied());

        let mut v2_0 = v1_4.clone();
        v2_0.extend(V2_0_PROPERTIES.iter().copied());

        vec![
            Dictionary {
                version: V1_0,
                properties: v1_0,
            },
            Dictionary {
                version: V1_4,
                properties: v1_4,
            },
            Dictionary {
                version: V2_0,
                properties: v2_0,
            },
        ]
    })
}

/// Select the dictionary for `requested`
///
/// Exact match wins. Otherwise the nearest lower known version is used and a
/// fallback warning recorded; a version older than everything known yields
/// no dictionary at all (spawn defaults unavailable, decode degraded).
pub fn resolve_dictionary(
    requested: EngineVersion,
    warnings: &mut Vec<DecodeWarning>,
) -> (DictionaryResolution, Option<&'static Dictionary>) {
    let known = catalog();
    if let Some(dictionary) = known.iter().find(|d| d.version == requested) {
        return (
            DictionaryResolution {
                requested,
                resolved: Some(requested),
                exact: true,
            },
            Some(dictionary),
        );
    }

    let fallback = known
        .iter()
        .filter(|d| d.version < requested)
        .max_by_key(|d| d.version);
    match fallback {
        Some(dictionary) => {
            log::warn!(
                "no dictionary for engine {requested}, falling back to {}",
                dictionary.version
            );
            warnings.push(DecodeWarning::SchemaFallback {
                requested,
                resolved: dictionary.version,
            });
            (
                DictionaryResolution {
                    requested,
                    resolved: Some(dictionary.version),
                    exact: false,
                },
                Some(dictionary),
            )
        }
        None => {
            log::warn!("engine {requested} predates every known dictionary");
            warnings.push(DecodeWarning::NoDictionary { requested });
            (
                DictionaryResolution {
                    requested,
                    resolved: None,
                    exact: false,
                },
                None,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        class_id: u32,
        name: &str,
        parent: Option<u32>,
        props: &[(u16, &str)],
    ) -> RawClassEntry {
        RawClassEntry {
            class_id,
            class_name: name.into(),
            parent,
            properties: props.iter().map(|(id, n)| (*id, (*n).into())).collect(),
        }
    }

    #[test]
    fn test_closure_includes_parent_properties() {
        let entries = vec![
            entry(1, "Core.Actor", None, &[(0, PROP_POSITION), (1, PROP_ROTATION)]),
            entry(2, "Game.Car", Some(1), &[(2, PROP_CAR_BOOST)]),
        ];
        let mut warnings = Vec::new();
        let cache = NetCache::build(entries, &mut warnings).unwrap();
        let car = cache.class(2).unwrap();
        assert_eq!(car.properties.len(), 3);
        assert_eq!(car.properties.get(&0).map(String::as_str), Some(PROP_POSITION));
        assert_eq!(car.properties.get(&2).map(String::as_str), Some(PROP_CAR_BOOST));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_child_overrides_inherited_id() {
        let entries = vec![
            entry(1, "Core.Actor", None, &[(0, PROP_POSITION)]),
            entry(2, "Game.Ball", Some(1), &[(0, PROP_VELOCITY)]),
        ];
        let mut warnings = Vec::new();
        let cache = NetCache::build(entries, &mut warnings).unwrap();
        assert_eq!(
            cache.class(2).unwrap().properties.get(&0).map(String::as_str),
            Some(PROP_VELOCITY)
        );
        // Parent keeps its own mapping
        assert_eq!(
            cache.class(1).unwrap().properties.get(&0).map(String::as_str),
            Some(PROP_POSITION)
        );
    }

    #[test]
    fn test_deep_chain_resolves_out_of_order() {
        // Child listed before grandparent
        let entries = vec![
            entry(3, "Game.Car", Some(2), &[(5, PROP_CAR_BOOST)]),
            entry(2, "Game.Pawn", Some(1), &[(1, PROP_ROTATION)]),
            entry(1, "Core.Actor", None, &[(0, PROP_POSITION)]),
        ];
        let mut warnings = Vec::new();
        let cache = NetCache::build(entries, &mut warnings).unwrap();
        assert_eq!(cache.class(3).unwrap().properties.len(), 3);
    }

    #[test]
    fn test_parent_cycle_is_fatal() {
        let entries = vec![
            entry(1, "A", Some(2), &[]),
            entry(2, "B", Some(1), &[]),
        ];
        let mut warnings = Vec::new();
        assert!(matches!(
            NetCache::build(entries, &mut warnings),
            Err(DecodeError::NetCacheCycle { .. })
        ));
    }

    #[test]
    fn test_missing_parent_degrades_to_root() {
        let entries = vec![entry(1, "Orphan", Some(99), &[(0, PROP_POSITION)])];
        let mut warnings = Vec::new();
        let cache = NetCache::build(entries, &mut warnings).unwrap();
        assert_eq!(cache.class(1).unwrap().properties.len(), 1);
        assert!(matches!(
            warnings.as_slice(),
            [DecodeWarning::UnknownParentClass {
                class_id: 1,
                parent_id: 99
            }]
        ));
    }

    #[test]
    fn test_resolve_exact_version() {
        let mut warnings = Vec::new();
        let (resolution, dictionary) = resolve_dictionary(V1_4, &mut warnings);
        assert!(resolution.exact);
        assert_eq!(resolution.resolved, Some(V1_4));
        assert!(warnings.is_empty());
        let dictionary = dictionary.unwrap();
        assert_eq!(dictionary.kind_of(PROP_CAR_BOOST), Some(ValueKind::Int));
        // v2.0 additions are not in the 1.4 dictionary
        assert_eq!(dictionary.kind_of(PROP_BALL_LAST_TOUCH_TEAM), None);
    }

    #[test]
    fn test_resolve_falls_back_to_nearest_lower() {
        let mut warnings = Vec::new();
        let requested = EngineVersion::new(1, 7, 0);
        let (resolution, dictionary) = resolve_dictionary(requested, &mut warnings);
        assert!(!resolution.exact);
        assert_eq!(resolution.resolved, Some(V1_4));
        assert_eq!(dictionary.unwrap().version, V1_4);
        assert!(matches!(
            warnings.as_slice(),
            [DecodeWarning::SchemaFallback { .. }]
        ));
    }

    #[test]
    fn test_resolve_never_falls_forward() {
        let mut warnings = Vec::new();
        let requested = EngineVersion::new(0, 9, 0);
        let (resolution, dictionary) = resolve_dictionary(requested, &mut warnings);
        assert_eq!(resolution.resolved, None);
        assert!(dictionary.is_none());
        assert!(matches!(
            warnings.as_slice(),
            [DecodeWarning::NoDictionary { .. }]
        ));
    }
}
