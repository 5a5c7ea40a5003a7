//! Responder Selector - picks who answers a stimulus.
//!
//! # Algorithm
//!
//! 1. **Trivial rosters**: nobody, or the only character, answers
//! 2. **Direct address**: a single named character with high confidence answers
//! 3. **Lottery**: every candidate gets a probability from [`scoring`], then a
//!    weighted draw picks one
//!
//! The chosen turn is committed to the [`InteractionHistory`] before returning.

pub mod scoring;

pub use scoring::ScoreBreakdown;

use cast_rules::{ActiveRoster, CharacterId, InteractionType, TraitVector};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SelectionConfig;
use crate::conversation::{Addressing, TopicTags};
use crate::history::InteractionHistory;
use crate::personality::TraitTable;

/// What is being answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stimulus {
    /// A user message. The turn targets the user.
    User,
    /// Another character's utterance. The speaker is never a candidate.
    Character {
        source: CharacterId,
        interaction_type: InteractionType,
    },
}

impl Stimulus {
    fn source(&self) -> Option<CharacterId> {
        match self {
            Stimulus::User => None,
            Stimulus::Character { source, .. } => Some(*source),
        }
    }

    fn interaction_type(&self) -> InteractionType {
        match self {
            Stimulus::User => InteractionType::UserResponse,
            Stimulus::Character {
                interaction_type, ..
            } => *interaction_type,
        }
    }
}

/// Everything the selector reads for one decision.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub roster: &'a ActiveRoster,
    pub traits: &'a TraitTable,
    pub addressing: &'a Addressing,
    pub topics: TopicTags,
    pub last_speaker: Option<CharacterId>,
    pub stimulus: Stimulus,
}

/// Why a character was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    SoleCandidate,
    DirectAddress,
    Lottery,
}

/// The outcome of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub character: CharacterId,
    pub reason: SelectionReason,
    /// The winner's clamped probability. 1.0 outside the lottery.
    pub probability: f32,
}

/// Picks the responder for each turn.
#[derive(Debug, Clone, Default)]
pub struct ResponderSelector {
    config: SelectionConfig,
}

impl ResponderSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Score every candidate without choosing or committing anything.
    pub fn score_candidates(
        &self,
        input: &SelectionInput<'_>,
        history: &InteractionHistory,
    ) -> Vec<(CharacterId, ScoreBreakdown)> {
        let fallback = TraitVector::neutral();
        candidates(input)
            .into_iter()
            .map(|id| {
                let traits = input.traits.get(&id).map(Arc::as_ref).unwrap_or(&fallback);
                let score = ScoreBreakdown::compute(
                    id,
                    traits,
                    input.addressing,
                    input.last_speaker,
                    &input.topics,
                    history,
                    &self.config,
                );
                (id, score)
            })
            .collect()
    }

    /// Pick a responder and commit the turn. `None` when nobody can answer.
    pub fn select<R: Rng + ?Sized>(
        &self,
        input: &SelectionInput<'_>,
        history: &mut InteractionHistory,
        rng: &mut R,
    ) -> Option<Selection> {
        let pool = candidates(input);

        let selection = match pool.as_slice() {
            [] => return None,
            [only] => Selection {
                character: *only,
                reason: SelectionReason::SoleCandidate,
                probability: 1.0,
            },
            _ => match input
                .addressing
                .direct_target(self.config.direct_address_threshold)
                .filter(|id| pool.contains(id))
            {
                Some(target) => Selection {
                    character: target,
                    reason: SelectionReason::DirectAddress,
                    probability: 1.0,
                },
                None => self.lottery(input, history, rng)?,
            },
        };

        let record = history.record(
            selection.character,
            input.stimulus.source(),
            input.stimulus.interaction_type(),
        );
        info!(
            character = %selection.character,
            reason = ?selection.reason,
            probability = selection.probability,
            turn = record.turn_index,
            "Selected responder"
        );
        Some(selection)
    }

    fn lottery<R: Rng + ?Sized>(
        &self,
        input: &SelectionInput<'_>,
        history: &InteractionHistory,
        rng: &mut R,
    ) -> Option<Selection> {
        let scored = self.score_candidates(input, history);
        for (id, score) in &scored {
            debug!(character = %id, ?score, "Scored candidate");
        }

        let weights: Vec<(CharacterId, f32)> = scored
            .iter()
            .map(|(id, score)| (*id, score.probability))
            .collect();
        let winner = scoring::weighted_draw(&weights, rng)?;

        let probability = weights
            .iter()
            .find(|(id, _)| *id == winner)
            .map(|(_, p)| *p)
            .unwrap_or(self.config.min_probability);

        Some(Selection {
            character: winner,
            reason: SelectionReason::Lottery,
            probability,
        })
    }
}

/// Roster order, minus the speaker of a character stimulus.
fn candidates(input: &SelectionInput<'_>) -> Vec<CharacterId> {
    let source = input.stimulus.source();
    input
        .roster
        .ids()
        .iter()
        .copied()
        .filter(|id| Some(*id) != source)
        .collect()
}
