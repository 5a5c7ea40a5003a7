//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields the stock tuning:
//!
//! ```toml
//! rng_seed = 7
//!
//! [selection]
//! direct_address_threshold = 0.8
//!
//! [queue]
//! initial_mode = "priority"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::audio::QueueMode;
use crate::error::EngineResult;

/// Top-level configuration for an orchestration session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub context: ContextConfig,
    pub selection: SelectionConfig,
    pub interjection: InterjectionConfig,
    pub queue: QueueConfig,
    pub traits: TraitCacheConfig,

    /// Fixed seed for the session RNG. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl EngineConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Conversation memory limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum number of messages kept in the rolling history.
    pub max_messages: usize,

    /// Maximum number of turn records kept for recency and flow.
    pub max_turns: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: 300,
            max_turns: 20,
        }
    }
}

/// Configuration for responder selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Addressing confidence at which a named character answers without a lottery.
    pub direct_address_threshold: f32,

    /// Lower bound of "moderate" addressing confidence.
    pub moderate_address_threshold: f32,

    /// Floor applied to every candidate probability.
    pub min_probability: f32,

    /// A trait above this value counts as "high" for topic boosts.
    pub high_trait_threshold: f32,

    /// Response thresholds above this value damp a character.
    pub constraint_threshold: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            direct_address_threshold: 0.8,
            moderate_address_threshold: 0.3,
            min_probability: 0.01,
            high_trait_threshold: 0.7,
            constraint_threshold: 0.7,
        }
    }
}

/// Configuration for autonomous interjections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterjectionConfig {
    /// Probability a candidate must exceed before the random draw is attempted.
    pub probability_threshold: f32,

    /// Relationship likelihood used when no relationship model is supplied.
    pub default_relationship: f32,

    /// Base delay before an interjection fires.
    pub base_delay_ms: u64,

    /// Upper bound of the uniform jitter added to the delay.
    pub max_jitter_ms: u64,

    /// A trait above this value counts as "high" for triggers and delays.
    pub high_trait_threshold: f32,

    /// Agreeableness below this value enables disagreement.
    pub low_agreeableness_threshold: f32,
}

impl Default for InterjectionConfig {
    fn default() -> Self {
        Self {
            probability_threshold: 0.3,
            default_relationship: 0.6,
            base_delay_ms: 2000,
            max_jitter_ms: 2000,
            high_trait_threshold: 0.7,
            low_agreeableness_threshold: 0.4,
        }
    }
}

impl InterjectionConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Configuration for the audio queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Admission policy at session start.
    pub initial_mode: QueueMode,

    /// How many finished requests stay queryable through `state_of`.
    pub retired_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_mode: QueueMode::Queue,
            retired_capacity: 64,
        }
    }
}

/// Trait provider cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitCacheConfig {
    /// Maximum number of cached trait vectors.
    pub cache_capacity: u64,

    /// Time-to-live for cached vectors, in seconds.
    pub cache_ttl_seconds: u64,
}

impl Default for TraitCacheConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            cache_ttl_seconds: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.context.max_turns, 20);
        assert_eq!(config.context.max_messages, 300);
        assert_eq!(config.selection.direct_address_threshold, 0.8);
        assert_eq!(config.interjection.base_delay(), Duration::from_millis(2000));
        assert_eq!(config.queue.initial_mode, QueueMode::Queue);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.interjection.probability_threshold, 0.3);
        assert_eq!(config.traits.cache_capacity, 256);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            rng_seed = 42

            [queue]
            initial_mode = "priority"

            [interjection]
            base_delay_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.queue.initial_mode, QueueMode::Priority);
        assert_eq!(config.interjection.base_delay_ms, 500);
        assert_eq!(config.interjection.max_jitter_ms, 2000);
        assert_eq!(config.queue.retired_capacity, 64);
    }

    #[test]
    fn test_invalid_document() {
        let result = EngineConfig::from_toml_str("[queue]\ninitial_mode = \"shuffle\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/definitely/not/here/ensemble.toml");
        assert!(matches!(result, Err(crate::EngineError::Io(_))));
    }
}
