//! # Species Profiles
//!
//! Resolved once per actor when it first becomes a candidate, then cached in
//! its [`crate::actor::ActorState`]. Lookup order:
//!
//! 1. exact key (`"minecraft:wolf"`)
//! 2. key without its namespace (`"wolf"`)
//! 3. [`SpeciesProfile::GENERIC`]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use swarm_shared::{BehaviorClass, ScentChannel};

/// Static behavior parameters of one species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesProfile {
    /// Behavior class
    pub behavior: BehaviorClass,
    /// Food channel it seeks
    pub preferred_channel: Option<ScentChannel>,
    /// Predator avoidance scale
    pub fear: f32,
    /// Prey attraction scale
    pub aggression: f32,
    /// Bond with players, 0..1
    pub familiarity: f32,
}

impl SpeciesProfile {
    /// No overlay, average temperament.
    pub const GENERIC: Self = Self {
        behavior: BehaviorClass::Generic,
        preferred_channel: None,
        fear: 1.0,
        aggression: 1.0,
        familiarity: 0.0,
    };

    /// Profile of `behavior` with default temperament.
    #[must_use]
    pub const fn new(behavior: BehaviorClass) -> Self {
        Self {
            behavior,
            ..Self::GENERIC
        }
    }

    /// Sets the preferred food channel.
    #[must_use]
    pub const fn eats(mut self, channel: ScentChannel) -> Self {
        self.preferred_channel = Some(channel);
        self
    }

    /// Sets fear and aggression.
    #[must_use]
    pub const fn temperament(mut self, fear: f32, aggression: f32) -> Self {
        self.fear = fear;
        self.aggression = aggression;
        self
    }

    /// Sets familiarity.
    #[must_use]
    pub const fn familiarity(mut self, familiarity: f32) -> Self {
        self.familiarity = familiarity;
        self
    }

    /// Whether a nearby hostile should make this actor panic.
    #[must_use]
    pub fn is_fearful(&self) -> bool {
        self.fear > 0.0
            && matches!(
                self.behavior,
                BehaviorClass::Livestock | BehaviorClass::PreyWild | BehaviorClass::Generic
            )
    }
}

impl Default for SpeciesProfile {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// Species profile source.
pub trait SpeciesCatalog: Send {
    /// Profile for `key`, falling back to [`SpeciesProfile::GENERIC`].
    fn resolve(&self, key: &str) -> SpeciesProfile;
}

/// Table-backed catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesTable {
    entries: HashMap<String, SpeciesProfile>,
}

impl SpeciesTable {
    /// Empty table (everything resolves to generic).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Common vanilla species.
    #[must_use]
    pub fn builtin() -> Self {
        use BehaviorClass::{Fish, Livestock, Pet, Predator, PreyWild};
        use ScentChannel::{Grain, Meat};

        let mut table = Self::new();
        for key in ["cow", "sheep", "pig", "chicken", "goat", "llama", "horse"] {
            table.insert(key, SpeciesProfile::new(Livestock).eats(Grain));
        }
        table.insert("wolf", SpeciesProfile::new(Predator).eats(Meat).temperament(0.2, 1.5));
        table.insert("fox", SpeciesProfile::new(Predator).eats(Meat).temperament(0.8, 1.0));
        table.insert("polar_bear", SpeciesProfile::new(Predator).eats(ScentChannel::Fish).temperament(0.1, 1.2));
        table.insert("rabbit", SpeciesProfile::new(PreyWild).eats(Grain).temperament(2.0, 0.0));
        table.insert("turtle", SpeciesProfile::new(PreyWild).temperament(1.0, 0.0));
        for key in ["cod", "salmon", "tropical_fish", "pufferfish", "squid"] {
            table.insert(key, SpeciesProfile::new(Fish).temperament(1.5, 0.0));
        }
        table.insert("cat", SpeciesProfile::new(Pet).eats(ScentChannel::Fish).familiarity(0.6));
        table.insert("parrot", SpeciesProfile::new(Pet).eats(Grain).familiarity(0.5));
        table
    }

    /// Parses a table from TOML (`[wolf]` sections of profile fields).
    ///
    /// # Errors
    ///
    /// Returns the parse error message.
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Adds or replaces a profile.
    pub fn insert(&mut self, key: impl Into<String>, profile: SpeciesProfile) {
        self.entries.insert(key.into(), profile);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<&SpeciesProfile> {
        self.entries.get(key).or_else(|| {
            let (_, bare) = key.split_once(':')?;
            self.entries.get(bare)
        })
    }
}

impl SpeciesCatalog for SpeciesTable {
    fn resolve(&self, key: &str) -> SpeciesProfile {
        self.lookup(key).copied().unwrap_or(SpeciesProfile::GENERIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_key_wins_over_bare_key() {
        let mut table = SpeciesTable::new();
        table.insert("wolf", SpeciesProfile::new(BehaviorClass::Predator));
        table.insert("modded:wolf", SpeciesProfile::new(BehaviorClass::Pet));
        assert_eq!(table.resolve("modded:wolf").behavior, BehaviorClass::Pet);
        assert_eq!(table.resolve("minecraft:wolf").behavior, BehaviorClass::Predator);
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        let table = SpeciesTable::builtin();
        assert_eq!(table.resolve("minecraft:zombie"), SpeciesProfile::GENERIC);
        assert_eq!(table.resolve(""), SpeciesProfile::GENERIC);
        assert_eq!(table.resolve(":"), SpeciesProfile::GENERIC);
    }

    #[test]
    fn test_builtin_taxonomy() {
        let table = SpeciesTable::builtin();
        let cow = table.resolve("minecraft:cow");
        assert_eq!(cow.behavior, BehaviorClass::Livestock);
        assert_eq!(cow.preferred_channel, Some(ScentChannel::Grain));
        assert!(cow.is_fearful());
        assert_eq!(table.resolve("salmon").behavior, BehaviorClass::Fish);
        assert!(!table.resolve("wolf").is_fearful());
    }

    #[test]
    fn test_table_from_toml() {
        let table = SpeciesTable::from_toml_str(
            r#"
            [boar]
            behavior = "prey_wild"
            preferred_channel = "Grain"
            fear = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        let boar = table.resolve("mod:boar");
        assert_eq!(boar.behavior, BehaviorClass::PreyWild);
        assert_eq!(boar.preferred_channel, Some(ScentChannel::Grain));
        assert_eq!(boar.fear, 0.5);
        assert_eq!(boar.aggression, 1.0);
    }
}
