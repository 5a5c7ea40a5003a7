//! Personality trait definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Traits consulted by the orchestration formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Extroversion,
    Confidence,
    Openness,
    Conscientiousness,
    Agreeableness,
    Neuroticism,
    Empathy,
    Flirtatious,
    Dominant,
}

impl TraitKind {
    /// Every trait kind, in declaration order.
    pub const ALL: [TraitKind; 9] = [
        TraitKind::Extroversion,
        TraitKind::Confidence,
        TraitKind::Openness,
        TraitKind::Conscientiousness,
        TraitKind::Agreeableness,
        TraitKind::Neuroticism,
        TraitKind::Empathy,
        TraitKind::Flirtatious,
        TraitKind::Dominant,
    ];

    /// The key this trait is stored under in a [`TraitVector`].
    pub fn as_str(&self) -> &'static str {
        match self {
            TraitKind::Extroversion => "extroversion",
            TraitKind::Confidence => "confidence",
            TraitKind::Openness => "openness",
            TraitKind::Conscientiousness => "conscientiousness",
            TraitKind::Agreeableness => "agreeableness",
            TraitKind::Neuroticism => "neuroticism",
            TraitKind::Empathy => "empathy",
            TraitKind::Flirtatious => "flirtatious",
            TraitKind::Dominant => "dominant",
        }
    }

    /// Value used when a vector has no entry for this trait.
    ///
    /// Everything is neutral (0.5) except neuroticism, which leans calm.
    pub fn default_value(&self) -> f32 {
        match self {
            TraitKind::Neuroticism => 0.3,
            _ => 0.5,
        }
    }

    /// Parse a stored trait key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

impl std::fmt::Display for TraitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from trait name to a value in `[0, 1]`.
///
/// The key set is open so that trait sheets can carry traits the engine does not
/// read, but every [`TraitKind`] always resolves to a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "HashMap<String, f32>", into = "HashMap<String, f32>")]
pub struct TraitVector {
    values: HashMap<String, f32>,
}

impl TraitVector {
    /// Create an empty vector. Every lookup falls back to defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default vector used when no backing data exists.
    pub fn neutral() -> Self {
        let mut vector = Self::new();
        for kind in TraitKind::ALL {
            vector.set(kind, kind.default_value());
        }
        vector
    }

    /// Set a known trait, builder style.
    pub fn with(mut self, kind: TraitKind, value: f32) -> Self {
        self.set(kind, value);
        self
    }

    /// Set a trait by raw name, builder style.
    pub fn with_named(mut self, name: impl Into<String>, value: f32) -> Self {
        self.set_named(name, value);
        self
    }

    /// Set a known trait. Values are clamped to `[0, 1]`.
    pub fn set(&mut self, kind: TraitKind, value: f32) {
        self.set_named(kind.as_str(), value);
    }

    /// Set a trait by raw name. Values are clamped to `[0, 1]`; NaN is ignored.
    pub fn set_named(&mut self, name: impl Into<String>, value: f32) {
        if value.is_nan() {
            return;
        }
        self.values.insert(name.into(), value.clamp(0.0, 1.0));
    }

    /// Resolve a trait, falling back to its documented default.
    pub fn get(&self, kind: TraitKind) -> f32 {
        self.values
            .get(kind.as_str())
            .copied()
            .unwrap_or_else(|| kind.default_value())
    }

    /// Look up a raw trait name without defaults.
    pub fn get_named(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    /// Whether the trait is strictly above `threshold`.
    pub fn is_high(&self, kind: TraitKind, threshold: f32) -> bool {
        self.get(kind) > threshold
    }

    /// Whether the trait is strictly below `threshold`.
    pub fn is_low(&self, kind: TraitKind, threshold: f32) -> bool {
        self.get(kind) < threshold
    }

    /// Overlay another vector's explicit values onto this one.
    pub fn merge(&mut self, other: &TraitVector) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }

    /// Iterate over explicitly stored values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Number of explicitly stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is explicitly stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn extroversion(&self) -> f32 {
        self.get(TraitKind::Extroversion)
    }

    pub fn confidence(&self) -> f32 {
        self.get(TraitKind::Confidence)
    }

    pub fn agreeableness(&self) -> f32 {
        self.get(TraitKind::Agreeableness)
    }

    pub fn neuroticism(&self) -> f32 {
        self.get(TraitKind::Neuroticism)
    }
}

impl From<HashMap<String, f32>> for TraitVector {
    fn from(raw: HashMap<String, f32>) -> Self {
        let mut vector = Self::new();
        for (name, value) in raw {
            vector.set_named(name, value);
        }
        vector
    }
}

impl From<TraitVector> for HashMap<String, f32> {
    fn from(vector: TraitVector) -> Self {
        vector.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_traits() {
        let traits = TraitVector::new();
        assert_eq!(traits.get(TraitKind::Extroversion), 0.5);
        assert_eq!(traits.get(TraitKind::Confidence), 0.5);
        assert_eq!(traits.get(TraitKind::Neuroticism), 0.3);
    }

    #[test]
    fn test_neutral_vector_is_complete() {
        let traits = TraitVector::neutral();
        assert_eq!(traits.len(), TraitKind::ALL.len());
        assert_eq!(traits.neuroticism(), 0.3);
        assert_eq!(traits.get(TraitKind::Empathy), 0.5);
    }

    #[test]
    fn test_values_are_clamped() {
        let traits = TraitVector::new()
            .with(TraitKind::Extroversion, 1.7)
            .with(TraitKind::Agreeableness, -0.2);

        assert_eq!(traits.extroversion(), 1.0);
        assert_eq!(traits.agreeableness(), 0.0);
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut traits = TraitVector::new();
        traits.set(TraitKind::Openness, f32::NAN);
        assert!(traits.is_empty());
        assert_eq!(traits.get(TraitKind::Openness), 0.5);
    }

    #[test]
    fn test_high_and_low() {
        let traits = TraitVector::new()
            .with(TraitKind::Empathy, 0.9)
            .with(TraitKind::Agreeableness, 0.2);

        assert!(traits.is_high(TraitKind::Empathy, 0.7));
        assert!(!traits.is_high(TraitKind::Openness, 0.7));
        assert!(traits.is_low(TraitKind::Agreeableness, 0.4));
    }

    #[test]
    fn test_unknown_traits_are_preserved() {
        let traits = TraitVector::new().with_named("playfulness", 0.8);
        assert_eq!(traits.get_named("playfulness"), Some(0.8));
        assert_eq!(TraitKind::from_key("playfulness"), None);
        assert_eq!(TraitKind::from_key("dominant"), Some(TraitKind::Dominant));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = TraitVector::neutral();
        base.merge(&TraitVector::new().with(TraitKind::Extroversion, 0.9));
        assert_eq!(base.extroversion(), 0.9);
        assert_eq!(base.confidence(), 0.5);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let traits = TraitVector::new().with(TraitKind::Dominant, 0.25);
        let json = serde_json::to_string(&traits).unwrap();
        assert_eq!(json, r#"{"dominant":0.25}"#);

        let parsed: TraitVector = serde_json::from_str(r#"{"empathy":0.75}"#).unwrap();
        assert_eq!(parsed.get(TraitKind::Empathy), 0.75);
    }

    #[test]
    fn test_deserialization_clamps() {
        let parsed: TraitVector = serde_json::from_str(r#"{"openness":3.0}"#).unwrap();
        assert_eq!(parsed.get(TraitKind::Openness), 1.0);
    }
}
