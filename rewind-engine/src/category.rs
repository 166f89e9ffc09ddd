//! Actor categorization
//!
//! Entity behavior is a closed set of categories resolved from the class
//! name when snapshots are consumed, not during decoding. Class names are
//! the stable surface across engine releases; numeric ids are file-scoped.

use serde::Serialize;

/// Known entity categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActorCategory {
    Ball,
    Car,
    BoostPad,
    Team,
    /// Anything the rules have no special handling for
    Generic,
}

/// Class name prefixes for each special category
const CATEGORY_PREFIXES: &[(&str, ActorCategory)] = &[
    ("Game.Ball", ActorCategory::Ball),
    ("Game.Car", ActorCategory::Car),
    ("Game.BoostPad", ActorCategory::BoostPad),
    ("Game.Team", ActorCategory::Team),
];

impl ActorCategory {
    /// Resolve a category from a net cache class name
    pub fn from_class_name(class_name: &str) -> Self {
        for (prefix, category) in CATEGORY_PREFIXES {
            if class_name.starts_with(prefix) {
                return *category;
            }
        }
        Self::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_categories() {
        assert_eq!(ActorCategory::from_class_name("Game.Ball"), ActorCategory::Ball);
        assert_eq!(
            ActorCategory::from_class_name("Game.Ball_Cube"),
            ActorCategory::Ball
        );
        assert_eq!(ActorCategory::from_class_name("Game.Car"), ActorCategory::Car);
        assert_eq!(
            ActorCategory::from_class_name("Game.BoostPad_Big"),
            ActorCategory::BoostPad
        );
        assert_eq!(ActorCategory::from_class_name("Game.Team"), ActorCategory::Team);
    }

    #[test]
    fn test_unknown_class_is_generic() {
        assert_eq!(
            ActorCategory::from_class_name("Game.CameraSettings"),
            ActorCategory::Generic
        );
        assert_eq!(ActorCategory::from_class_name(""), ActorCategory::Generic);
    }
}
