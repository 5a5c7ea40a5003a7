//! Character definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{CharacterId, TraitKind, TraitVector};

/// A character present (or formerly present) in the conversation.
///
/// Characters are owned by the avatar manager; the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub display_name: String,

    /// Alternate names the user may address this character by.
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub traits: TraitVector,

    pub active_since: DateTime<Utc>,

    // Avatar-manager data the engine carries through untouched
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Character {
    /// Create a new character with the given display name and neutral traits.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            display_name: display_name.into(),
            aliases: Vec::new(),
            traits: TraitVector::new(),
            active_since: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Replace the trait vector.
    pub fn with_traits(mut self, traits: TraitVector) -> Self {
        self.traits = traits;
        self
    }

    /// Set a single trait.
    pub fn with_trait(mut self, kind: TraitKind, value: f32) -> Self {
        self.traits.set(kind, value);
        self
    }

    /// Add an alternate name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// All names this character answers to, display name first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Check whether `name` refers to this character (case-insensitive).
    pub fn answers_to(&self, name: &str) -> bool {
        self.names().any(|n| n.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_character() {
        let character = Character::new("Hiyori");
        assert_eq!(character.display_name, "Hiyori");
        assert!(character.aliases.is_empty());
        assert_eq!(character.traits.extroversion(), 0.5);
    }

    #[test]
    fn test_names_and_aliases() {
        let character = Character::new("Haru").with_alias("Haru-chan");
        let names: Vec<_> = character.names().collect();
        assert_eq!(names, vec!["Haru", "Haru-chan"]);
        assert!(character.answers_to("haru"));
        assert!(character.answers_to("HARU-CHAN"));
        assert!(!character.answers_to("Mao"));
    }

    #[test]
    fn test_trait_builder() {
        let character = Character::new("Mao")
            .with_trait(TraitKind::Extroversion, 0.9)
            .with_trait(TraitKind::Empathy, 0.2);
        assert_eq!(character.traits.extroversion(), 0.9);
        assert_eq!(character.traits.get(TraitKind::Empathy), 0.2);
    }
}
