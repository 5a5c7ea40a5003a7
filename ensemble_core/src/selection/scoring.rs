//! Pure scoring functions for responder selection.
//!
//! Each factor is a multiplier around 1.0 so the final product reads as
//! "base tendency, nudged by context". Nothing here touches randomness or
//! mutable state.

use cast_rules::{CharacterId, TraitKind, TraitVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SelectionConfig;
use crate::conversation::{Addressing, TopicTags};
use crate::history::InteractionHistory;

/// Multiplier for a character that was named.
pub const NAMED_BOOST: f32 = 3.0;

/// Multiplier for the last speaker under moderate addressing confidence.
pub const LAST_SPEAKER_BOOST: f32 = 1.5;

/// Records inspected for conversational flow.
pub const FLOW_WINDOW: usize = 5;

/// Records inspected for recency damping.
pub const RECENCY_WINDOW: usize = 3;

/// Everything that went into one candidate's probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f32,
    pub addressing: f32,
    pub flow: f32,
    pub constraint: f32,
    pub recency: f32,
    pub topic: f32,
    /// The clamped product of every factor.
    pub probability: f32,
}

impl ScoreBreakdown {
    /// Score one candidate.
    pub fn compute(
        id: CharacterId,
        traits: &TraitVector,
        addressing: &Addressing,
        last_speaker: Option<CharacterId>,
        topics: &TopicTags,
        history: &InteractionHistory,
        config: &SelectionConfig,
    ) -> Self {
        let base = base_score(traits);
        let addressing = addressing_multiplier(id, addressing, last_speaker, config);
        let flow = flow_multiplier(id, history);
        let constraint = constraint_multiplier(traits, config);
        let recency = recency_multiplier(id, history);
        let topic = topic_multiplier(traits, topics, config);

        let product = base * addressing * flow * constraint * recency * topic;
        Self {
            base,
            addressing,
            flow,
            constraint,
            recency,
            topic,
            probability: clamp_probability(product, config.min_probability),
        }
    }
}

/// Baseline eagerness to speak.
pub fn base_score(traits: &TraitVector) -> f32 {
    (traits.extroversion() + traits.confidence()) / 2.0
}

/// Boost for being named, or for having spoken last under a moderate cue.
pub fn addressing_multiplier(
    id: CharacterId,
    addressing: &Addressing,
    last_speaker: Option<CharacterId>,
    config: &SelectionConfig,
) -> f32 {
    if addressing.names(id) {
        return NAMED_BOOST;
    }

    let moderate = addressing.confidence >= config.moderate_address_threshold
        && addressing.confidence < config.direct_address_threshold;
    if moderate && last_speaker == Some(id) {
        LAST_SPEAKER_BOOST
    } else {
        1.0
    }
}

/// Favour characters already in the thread, damp those who are not.
pub fn flow_multiplier(id: CharacterId, history: &InteractionHistory) -> f32 {
    match history.involvement_in_last(id, FLOW_WINDOW) {
        0 => 0.8,
        n if n > 2 => 1.2,
        _ => 1.0,
    }
}

/// How reluctant a character is to speak at all.
pub fn response_threshold(traits: &TraitVector) -> f32 {
    (1.0 - traits.extroversion()) * 0.8 + traits.neuroticism() * 0.2
}

/// Heavy damping for reluctant characters.
pub fn constraint_multiplier(traits: &TraitVector, config: &SelectionConfig) -> f32 {
    if response_threshold(traits) > config.constraint_threshold {
        0.3
    } else {
        1.0
    }
}

/// Damp whoever has been doing all the talking.
pub fn recency_multiplier(id: CharacterId, history: &InteractionHistory) -> f32 {
    match history.responses_in_last(id, RECENCY_WINDOW) {
        0 => 1.0,
        1 => 0.7,
        _ => 0.4,
    }
}

/// Compounding personality/topic affinities.
pub fn topic_multiplier(traits: &TraitVector, topics: &TopicTags, config: &SelectionConfig) -> f32 {
    let high = |kind| traits.is_high(kind, config.high_trait_threshold);

    [
        (topics.question && high(TraitKind::Openness), 1.3),
        (topics.emotional && high(TraitKind::Empathy), 1.2),
        (topics.flirtatious_opportunity && high(TraitKind::Flirtatious), 1.4),
        (topics.help_request && high(TraitKind::Agreeableness), 1.3),
    ]
    .into_iter()
    .filter(|(applies, _)| *applies)
    .map(|(_, factor)| factor)
    .product()
}

/// Clamp a raw product into `[min, 1.0]`. NaN collapses to `min`.
pub fn clamp_probability(raw: f32, min: f32) -> f32 {
    if raw.is_nan() {
        return min;
    }
    raw.clamp(min, 1.0)
}

/// Cumulative weighted draw over `(candidate, weight)` pairs.
///
/// Draws `r` uniformly from `[0, total)` and walks the list subtracting
/// weights until `r` is exhausted. With no usable weight the draw is uniform.
pub fn weighted_draw<R: Rng + ?Sized>(
    candidates: &[(CharacterId, f32)],
    rng: &mut R,
) -> Option<CharacterId> {
    if candidates.is_empty() {
        return None;
    }

    let total: f32 = candidates.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        let index = rng.random_range(0..candidates.len());
        return Some(candidates[index].0);
    }

    let mut remaining = rng.random::<f32>() * total;
    for (id, weight) in candidates {
        remaining -= weight.max(0.0);
        if remaining <= 0.0 {
            return Some(*id);
        }
    }

    // Float rounding can leave a sliver; it belongs to the last candidate
    candidates.last().map(|(id, _)| *id)
}
