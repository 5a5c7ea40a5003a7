//! The active roster - the ordered set of characters present in the session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::{Character, CharacterId};

/// Characters currently on stage, in the order the avatar manager added them.
///
/// Order matters: weighted selection walks the roster in this order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActiveRoster {
    order: Vec<CharacterId>,
    characters: HashMap<CharacterId, Character>,
}

impl ActiveRoster {
    /// Create a new empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from characters, preserving their order.
    pub fn from_characters(characters: impl IntoIterator<Item = Character>) -> Self {
        let mut roster = Self::new();
        for character in characters {
            roster.add(character);
        }
        roster
    }

    /// Add a character to the end of the roster.
    ///
    /// Re-adding a known ID replaces its record but keeps its position.
    pub fn add(&mut self, character: Character) -> CharacterId {
        let id = character.id;
        if self.characters.insert(id, character).is_none() {
            self.order.push(id);
        }
        id
    }

    /// Remove a character from the roster.
    pub fn remove(&mut self, id: CharacterId) -> Option<Character> {
        let removed = self.characters.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        Some(removed)
    }

    /// Get character by ID.
    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Check whether a character is on the roster.
    pub fn contains(&self, id: CharacterId) -> bool {
        self.characters.contains_key(&id)
    }

    /// Character IDs in roster order.
    pub fn ids(&self) -> &[CharacterId] {
        &self.order
    }

    /// Characters in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.order.iter().filter_map(|id| self.characters.get(id))
    }

    /// Everyone except `id`, in roster order.
    pub fn others(&self, id: CharacterId) -> impl Iterator<Item = &Character> {
        self.iter().filter(move |c| c.id != id)
    }

    /// Find a character by display name or alias (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&Character> {
        self.iter().find(|c| c.answers_to(name))
    }

    /// Display name for an ID, if present.
    pub fn display_name(&self, id: CharacterId) -> Option<&str> {
        self.get(id).map(|c| c.display_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_preserves_order() {
        let mut roster = ActiveRoster::new();
        let a = roster.add(Character::new("A"));
        let b = roster.add(Character::new("B"));
        let c = roster.add(Character::new("C"));

        assert_eq!(roster.ids(), &[a, b, c]);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_remove_character() {
        let mut roster = ActiveRoster::new();
        let a = roster.add(Character::new("A"));
        let b = roster.add(Character::new("B"));

        let removed = roster.remove(a);
        assert_eq!(removed.map(|c| c.display_name), Some("A".to_string()));
        assert_eq!(roster.ids(), &[b]);
        assert!(!roster.contains(a));
        assert!(roster.remove(a).is_none());
    }

    #[test]
    fn test_readd_keeps_position() {
        let mut roster = ActiveRoster::new();
        let first = Character::new("A");
        let a = roster.add(first.clone());
        let b = roster.add(Character::new("B"));

        let mut renamed = first;
        renamed.display_name = "Alpha".to_string();
        roster.add(renamed);

        assert_eq!(roster.ids(), &[a, b]);
        assert_eq!(roster.display_name(a), Some("Alpha"));
    }

    #[test]
    fn test_find_by_name_and_others() {
        let roster = ActiveRoster::from_characters([
            Character::new("Hiyori").with_alias("Hiyo"),
            Character::new("Mao"),
        ]);

        let hiyori = roster.find_by_name("hiyo").map(|c| c.id);
        assert!(hiyori.is_some());

        let others: Vec<_> = roster
            .others(hiyori.unwrap())
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(others, vec!["Mao"]);
    }
}
