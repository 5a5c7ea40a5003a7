//! Trait backends - where personality data comes from.

use async_trait::async_trait;
use cast_rules::{ActiveRoster, CharacterId, TraitVector};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::EngineResult;

/// Source of personality data for characters.
///
/// `Ok(None)` means "no data for this character"; callers fall back to defaults.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TraitBackend: Send + Sync {
    async fn fetch_traits(&self, id: CharacterId) -> EngineResult<Option<TraitVector>>;
}

/// Trait sheets held in memory, typically seeded from the roster.
#[derive(Debug, Default)]
pub struct InMemoryTraitBackend {
    sheets: RwLock<HashMap<CharacterId, TraitVector>>,
}

impl InMemoryTraitBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every character on the roster that carries explicit traits.
    pub fn from_roster(roster: &ActiveRoster) -> Self {
        let backend = Self::new();
        backend.seed_from_roster(roster);
        backend
    }

    /// Parse a JSON object of `{ "<character uuid>": { "<trait>": value } }`.
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let sheets: HashMap<CharacterId, TraitVector> = serde_json::from_str(raw)?;
        Ok(Self {
            sheets: RwLock::new(sheets),
        })
    }

    /// Insert or replace a character's sheet.
    pub fn upsert(&self, id: CharacterId, traits: TraitVector) {
        self.sheets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, traits);
    }

    /// Remove a character's sheet.
    pub fn remove(&self, id: CharacterId) -> Option<TraitVector> {
        self.sheets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Upsert every roster character with explicit traits. Returns the IDs touched.
    pub fn seed_from_roster(&self, roster: &ActiveRoster) -> Vec<CharacterId> {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        roster
            .iter()
            .filter(|c| !c.traits.is_empty())
            .map(|c| {
                sheets.insert(c.id, c.traits.clone());
                c.id
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TraitBackend for InMemoryTraitBackend {
    async fn fetch_traits(&self, id: CharacterId) -> EngineResult<Option<TraitVector>> {
        Ok(self
            .sheets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_rules::{Character, TraitKind};

    #[tokio::test]
    async fn test_seed_skips_characters_without_traits() {
        let mut roster = ActiveRoster::new();
        let a = roster.add(Character::new("A").with_trait(TraitKind::Extroversion, 0.9));
        let b = roster.add(Character::new("B"));

        let backend = InMemoryTraitBackend::from_roster(&roster);
        assert_eq!(backend.len(), 1);

        let traits = backend.fetch_traits(a).await.unwrap().unwrap();
        assert_eq!(traits.extroversion(), 0.9);
        assert!(backend.fetch_traits(b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_json() {
        let id = CharacterId::new();
        let raw = format!(r#"{{"{}": {{"empathy": 0.8, "dominant": 0.1}}}}"#, id);

        let backend = InMemoryTraitBackend::from_json(&raw).unwrap();
        let traits = backend.fetch_traits(id).await.unwrap().unwrap();
        assert_eq!(traits.get(TraitKind::Empathy), 0.8);
        assert_eq!(traits.get(TraitKind::Dominant), 0.1);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(InMemoryTraitBackend::from_json("[1, 2, 3]").is_err());
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let backend = InMemoryTraitBackend::new();
        let id = CharacterId::new();

        backend.upsert(id, TraitVector::new().with(TraitKind::Openness, 0.2));
        assert!(backend.fetch_traits(id).await.unwrap().is_some());

        backend.remove(id);
        assert!(backend.is_empty());
    }
}
