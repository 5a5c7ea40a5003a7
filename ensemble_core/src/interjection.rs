//! Interaction Trigger - decides whether bystanders chime in.
//!
//! Every active character other than the responder gets a chance. A
//! character interjects only when its probability clears the configured
//! threshold *and* an independent draw lands under it, so low-probability
//! characters never speak even on lucky draws.

use cast_rules::{ActiveRoster, CharacterId, InteractionType, TraitKind, TraitVector};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::InterjectionConfig;
use crate::conversation::TopicTags;
use crate::history::InteractionHistory;
use crate::personality::TraitTable;

/// Records inspected for the "just spoke" damping.
pub const RECENT_WINDOW: usize = 2;

/// How likely one character is to react to another.
pub trait RelationshipModel: Send + Sync {
    /// Likelihood in `[0, 1]` that `from` reacts to `to`.
    fn likelihood(&self, from: CharacterId, to: CharacterId) -> f32;
}

/// The same likelihood for every pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRelationship(pub f32);

impl Default for ConstantRelationship {
    fn default() -> Self {
        Self(0.6)
    }
}

impl RelationshipModel for ConstantRelationship {
    fn likelihood(&self, _from: CharacterId, _to: CharacterId) -> f32 {
        self.0
    }
}

/// A scheduled reaction from a bystander.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interjection {
    pub character: CharacterId,
    /// The responder being reacted to.
    pub target: CharacterId,
    pub interaction_type: InteractionType,
    pub delay: Duration,
    pub probability: f32,
}

/// Evaluates bystanders after a responder starts speaking.
#[derive(Clone)]
pub struct InteractionTrigger {
    config: InterjectionConfig,
    relationships: Arc<dyn RelationshipModel>,
}

impl std::fmt::Debug for InteractionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionTrigger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InteractionTrigger {
    pub fn new(config: InterjectionConfig, relationships: Arc<dyn RelationshipModel>) -> Self {
        Self {
            config,
            relationships,
        }
    }

    /// A trigger using the configured constant relationship likelihood.
    pub fn with_defaults(config: InterjectionConfig) -> Self {
        let relationships = Arc::new(ConstantRelationship(config.default_relationship));
        Self::new(config, relationships)
    }

    /// Which topic trigger fits `candidate`, and the compounded multiplier of all that matched.
    pub fn classify(
        &self,
        candidate: &TraitVector,
        responder: &TraitVector,
        topics: &TopicTags,
    ) -> (InteractionType, f32) {
        let high = self.config.high_trait_threshold;
        let matched = [
            (
                InteractionType::Disagreement,
                topics.controversial
                    && candidate.is_low(
                        TraitKind::Agreeableness,
                        self.config.low_agreeableness_threshold,
                    ),
            ),
            (
                InteractionType::EmotionalSupport,
                topics.emotional && candidate.is_high(TraitKind::Empathy, high),
            ),
            (
                InteractionType::CompetitiveBanter,
                candidate.is_high(TraitKind::Dominant, high)
                    && responder.is_high(TraitKind::Dominant, high),
            ),
            (
                InteractionType::FlirtatiousInterjection,
                topics.flirtatious_opportunity && candidate.is_high(TraitKind::Flirtatious, high),
            ),
        ];

        let mut strongest = InteractionType::SupportiveComment;
        let mut multiplier = 1.0;
        for (kind, applies) in matched {
            if !applies {
                continue;
            }
            multiplier *= kind.trigger_multiplier();
            if kind.trigger_multiplier() > strongest.trigger_multiplier() {
                strongest = kind;
            }
        }
        (strongest, multiplier)
    }

    /// Probability that `candidate` reacts to `responder`, before the draw.
    pub fn probability(
        &self,
        candidate: CharacterId,
        candidate_traits: &TraitVector,
        responder: CharacterId,
        trigger_multiplier: f32,
        history: &InteractionHistory,
    ) -> f32 {
        let base = candidate_traits.agreeableness() * 0.2 + candidate_traits.extroversion() * 0.3;
        let relationship = self
            .relationships
            .likelihood(candidate, responder)
            .clamp(0.0, 1.0);

        let mut probability = base * relationship * trigger_multiplier;
        if history.involvement_in_last(candidate, RECENT_WINDOW) > 0 {
            probability *= 0.5;
        }
        probability
    }

    /// How long `character` waits before interjecting.
    pub fn delay<R: Rng + ?Sized>(
        &self,
        traits: &TraitVector,
        interaction_type: InteractionType,
        rng: &mut R,
    ) -> Duration {
        let high = self.config.high_trait_threshold;
        let mut scale = interaction_type.delay_multiplier();
        if traits.is_high(TraitKind::Extroversion, high) {
            scale *= 0.7;
        }
        if traits.is_high(TraitKind::Conscientiousness, high) {
            scale *= 1.3;
        }

        let jitter = rng.random_range(0..=self.config.max_jitter_ms);
        self.config.base_delay().mul_f32(scale) + Duration::from_millis(jitter)
    }

    /// Evaluate every bystander. Results are sorted by descending probability.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        responder: CharacterId,
        roster: &ActiveRoster,
        traits: &TraitTable,
        topics: &TopicTags,
        history: &InteractionHistory,
        rng: &mut R,
    ) -> Vec<Interjection> {
        let fallback = TraitVector::neutral();
        let lookup = |id: CharacterId| traits.get(&id).map(Arc::as_ref).unwrap_or(&fallback);
        let responder_traits = lookup(responder);

        let mut interjections: Vec<Interjection> = roster
            .ids()
            .iter()
            .copied()
            .filter(|id| *id != responder)
            .filter_map(|candidate| {
                let candidate_traits = lookup(candidate);
                let (interaction_type, multiplier) =
                    self.classify(candidate_traits, responder_traits, topics);
                let probability =
                    self.probability(candidate, candidate_traits, responder, multiplier, history);

                if probability <= self.config.probability_threshold {
                    debug!(character = %candidate, probability, "Below interjection threshold");
                    return None;
                }
                let draw = rng.random::<f32>();
                if draw >= probability {
                    debug!(character = %candidate, probability, draw, "Interjection draw missed");
                    return None;
                }

                Some(Interjection {
                    character: candidate,
                    target: responder,
                    interaction_type,
                    delay: self.delay(candidate_traits, interaction_type, rng),
                    probability,
                })
            })
            .collect();

        interjections.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        interjections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_rules::Character;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Everyone reacts to everyone, always.
    struct Inseparable;

    impl RelationshipModel for Inseparable {
        fn likelihood(&self, _from: CharacterId, _to: CharacterId) -> f32 {
            1.0
        }
    }

    fn trigger() -> InteractionTrigger {
        InteractionTrigger::with_defaults(InterjectionConfig::default())
    }

    fn table(roster: &ActiveRoster) -> TraitTable {
        roster
            .iter()
            .map(|c| (c.id, Arc::new(c.traits.clone())))
            .collect()
    }

    #[test]
    fn test_classify_picks_strongest_and_compounds() {
        let candidate = TraitVector::new()
            .with(TraitKind::Empathy, 0.9)
            .with(TraitKind::Flirtatious, 0.9);
        let topics = TopicTags {
            emotional: true,
            flirtatious_opportunity: true,
            ..TopicTags::default()
        };

        let (kind, multiplier) = trigger().classify(&candidate, &TraitVector::new(), &topics);
        assert_eq!(kind, InteractionType::FlirtatiousInterjection);
        assert!((multiplier - 1.5 * 1.7).abs() < 1e-5);
    }

    #[test]
    fn test_classify_banter_needs_two_dominant_characters() {
        let dominant = TraitVector::new().with(TraitKind::Dominant, 0.9);
        let meek = TraitVector::new().with(TraitKind::Dominant, 0.2);
        let topics = TopicTags::default();

        assert_eq!(
            trigger().classify(&dominant, &dominant, &topics).0,
            InteractionType::CompetitiveBanter
        );
        assert_eq!(
            trigger().classify(&dominant, &meek, &topics),
            (InteractionType::SupportiveComment, 1.0)
        );
    }

    #[test]
    fn test_classify_disagreement() {
        let contrarian = TraitVector::new().with(TraitKind::Agreeableness, 0.1);
        let topics = TopicTags {
            controversial: true,
            ..TopicTags::default()
        };
        assert_eq!(
            trigger().classify(&contrarian, &TraitVector::new(), &topics),
            (InteractionType::Disagreement, 1.6)
        );
    }

    #[test]
    fn test_probability_damped_after_speaking() {
        let a = CharacterId::new();
        let b = CharacterId::new();
        let traits = TraitVector::neutral();
        let trigger = trigger();
        let mut history = InteractionHistory::default();

        let fresh = trigger.probability(a, &traits, b, 1.0, &history);
        assert!((fresh - 0.25 * 0.6).abs() < 1e-6);

        history.record(a, None, InteractionType::UserResponse);
        let damped = trigger.probability(a, &traits, b, 1.0, &history);
        assert!((damped - fresh * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_delay_bounds() {
        let trigger = trigger();
        let mut rng = StdRng::seed_from_u64(9);
        let eager = TraitVector::new().with(TraitKind::Extroversion, 0.9);
        let careful = TraitVector::new().with(TraitKind::Conscientiousness, 0.9);

        for _ in 0..50 {
            let fast = trigger.delay(&eager, InteractionType::FlirtatiousInterjection, &mut rng);
            assert!(fast >= Duration::from_millis(1100));
            assert!(fast <= Duration::from_millis(3150));

            let slow = trigger.delay(&careful, InteractionType::Disagreement, &mut rng);
            assert!(slow >= Duration::from_millis(3850));
            assert!(slow <= Duration::from_millis(5950));
        }
    }

    #[test]
    fn test_neutral_bystanders_never_interject() {
        // 0.25 * 0.6 is far under the 0.3 gate, whatever the draw
        let mut roster = ActiveRoster::new();
        let responder = roster.add(Character::new("Aiko"));
        roster.add(Character::new("Ren"));
        roster.add(Character::new("Mio"));
        let traits = table(&roster);
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..100 {
            let found = trigger().evaluate(
                responder,
                &roster,
                &traits,
                &TopicTags::default(),
                &InteractionHistory::default(),
                &mut rng,
            );
            assert!(found.is_empty());
        }
    }

    #[test]
    fn test_evaluate_sorted_and_excludes_responder() {
        let mut roster = ActiveRoster::new();
        let responder = roster.add(Character::new("Aiko").with_trait(TraitKind::Dominant, 0.9));
        let bold = TraitVector::new()
            .with(TraitKind::Extroversion, 1.0)
            .with(TraitKind::Agreeableness, 1.0)
            .with(TraitKind::Dominant, 0.9);
        roster.add(Character::new("Ren").with_traits(bold.clone()));
        roster.add(
            Character::new("Mio")
                .with_traits(bold)
                .with_trait(TraitKind::Dominant, 0.1),
        );
        let traits = table(&roster);
        let trigger = InteractionTrigger::new(InterjectionConfig::default(), Arc::new(Inseparable));

        let mut seen_two = false;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let found = trigger.evaluate(
                responder,
                &roster,
                &traits,
                &TopicTags::default(),
                &InteractionHistory::default(),
                &mut rng,
            );
            assert!(found.iter().all(|i| i.character != responder && i.target == responder));
            assert!(found
                .windows(2)
                .all(|pair| pair[0].probability >= pair[1].probability));
            seen_two |= found.len() == 2;
        }
        assert!(seen_two);
    }
}
