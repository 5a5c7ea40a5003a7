//! Conversation mechanics: interaction types and expressive emotions.

use serde::{Deserialize, Serialize};

/// What kind of turn a character took.
///
/// The set is closed so the delay and trigger tables stay exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    /// Answering the user.
    UserResponse,
    Disagreement,
    EmotionalSupport,
    CompetitiveBanter,
    FlirtatiousInterjection,
    /// Fallback when no topic trigger matched.
    SupportiveComment,
}

impl InteractionType {
    /// Wire name for logs and serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::UserResponse => "user_response",
            InteractionType::Disagreement => "disagreement",
            InteractionType::EmotionalSupport => "emotional_support",
            InteractionType::CompetitiveBanter => "competitive_banter",
            InteractionType::FlirtatiousInterjection => "flirtatious_interjection",
            InteractionType::SupportiveComment => "supportive_comment",
        }
    }

    /// Whether this turn was volunteered by a character rather than prompted by the user.
    pub fn is_interjection(&self) -> bool {
        !matches!(self, InteractionType::UserResponse)
    }

    /// Scaling applied to the base interjection delay.
    pub fn delay_multiplier(&self) -> f32 {
        match self {
            InteractionType::Disagreement => 1.5,
            InteractionType::FlirtatiousInterjection => 0.8,
            InteractionType::EmotionalSupport => 1.2,
            InteractionType::UserResponse
            | InteractionType::CompetitiveBanter
            | InteractionType::SupportiveComment => 1.0,
        }
    }

    /// Scaling applied to interjection probability when this type's topic trigger fires.
    pub fn trigger_multiplier(&self) -> f32 {
        match self {
            InteractionType::Disagreement => 1.6,
            InteractionType::EmotionalSupport => 1.5,
            InteractionType::CompetitiveBanter => 1.4,
            InteractionType::FlirtatiousInterjection => 1.7,
            InteractionType::UserResponse | InteractionType::SupportiveComment => 1.0,
        }
    }

    /// Emotion an interjection of this type is usually voiced with.
    pub fn default_emotion(&self) -> Emotion {
        match self {
            InteractionType::UserResponse => Emotion::Neutral,
            InteractionType::Disagreement => Emotion::Angry,
            InteractionType::EmotionalSupport => Emotion::Thoughtful,
            InteractionType::CompetitiveBanter => Emotion::Excited,
            InteractionType::FlirtatiousInterjection => Emotion::Shy,
            InteractionType::SupportiveComment => Emotion::Happy,
        }
    }
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotions used for synthesis styling and avatar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Shy,
    Excited,
    Thoughtful,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Shy => "shy",
            Emotion::Excited => "excited",
            Emotion::Thoughtful => "thoughtful",
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Emotion::Neutral)
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
