//! Conversation Context - rolling message history and addressing signals.
//!
//! The context answers three questions for the rest of the engine:
//! 1. **Who was addressed?** Name and second-person detection against the roster
//! 2. **Who spoke last?** The most recent character utterance
//! 3. **What is it about?** Topic tags from the shared keyword classifier

mod topics;

pub use topics::*;

use cast_rules::{ActiveRoster, CharacterId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::time::Instant;
use tracing::debug;

use crate::config::ContextConfig;

/// Confidence assigned when exactly one character is named.
pub const NAMED_CONFIDENCE: f32 = 0.9;

/// Confidence assigned to the last speaker when the user asks a bare question.
pub const QUESTION_CONFIDENCE: f32 = 0.4;

/// Confidence assigned to the last speaker on a second-person cue.
pub const SECOND_PERSON_CONFIDENCE: f32 = 0.3;

const SECOND_PERSON_CUES: &[&str] = &["you", "your", "yours", "you're", "youre", "yourself", "u"];

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Character(CharacterId),
}

/// One entry of the rolling history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// How a message is aimed at the cast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Addressing {
    /// Characters the message is aimed at. Empty when ambiguous or undirected.
    pub focused: Vec<CharacterId>,

    /// Every character named in the message, whether or not it was ambiguous.
    pub mentioned: Vec<CharacterId>,

    /// Confidence in `focused`, from 0.0 to 1.0.
    pub confidence: f32,
}

impl Addressing {
    /// Nobody in particular.
    pub fn none() -> Self {
        Self::default()
    }

    /// The focused character, if there is exactly one.
    pub fn sole_focus(&self) -> Option<CharacterId> {
        match self.focused.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// A single focus at or above `threshold`.
    pub fn direct_target(&self, threshold: f32) -> Option<CharacterId> {
        self.sole_focus().filter(|_| self.confidence >= threshold)
    }

    /// Whether `id` was named, alone or among others.
    pub fn names(&self, id: CharacterId) -> bool {
        self.mentioned.contains(&id)
    }
}

/// Signals derived from the latest user input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalFactors {
    /// Seconds since the user last said anything. `None` before the first message.
    pub seconds_since_last_user_input: Option<f64>,

    /// Topic tags of the latest user message.
    pub topics: TopicTags,
}

/// Rolling conversation state for one session.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    messages: VecDeque<Message>,
    max_messages: usize,
    last_user_input: Option<Instant>,
    last_user_text: Option<String>,
    last_character_speaker: Option<CharacterId>,
}

impl ConversationContext {
    /// Create a new context with the given limits.
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: config.max_messages.max(1),
            last_user_input: None,
            last_user_text: None,
            last_character_speaker: None,
        }
    }

    /// Create a context with default limits.
    pub fn with_defaults() -> Self {
        Self::new(&ContextConfig::default())
    }

    /// Append a user message.
    pub fn record_user_message(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.last_user_input = Some(Instant::now());
        self.last_user_text = Some(text.clone());
        self.push(Speaker::User, text);
    }

    /// Append a character utterance.
    pub fn record_character_message(&mut self, id: CharacterId, text: impl Into<String>) {
        self.last_character_speaker = Some(id);
        self.push(Speaker::Character(id), text.into());
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.messages.push_back(Message {
            speaker,
            text,
            timestamp: Utc::now(),
        });
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }

    /// The character who spoke most recently.
    pub fn last_character_speaker(&self) -> Option<CharacterId> {
        self.last_character_speaker
    }

    /// The last `count` messages, oldest first.
    pub fn recent_messages(&self, count: usize) -> impl Iterator<Item = &Message> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Work out who `text` is aimed at.
    ///
    /// # Rules
    ///
    /// 1. Exactly one active character named: that character, high confidence
    /// 2. Several named: no focus (ambiguous), but the names are kept in `mentioned`
    /// 3. No name, a direct question, and an active last speaker: moderate confidence
    /// 4. No name, a second-person cue, and an active last speaker: lower moderate confidence
    pub fn detect_addressing(&self, roster: &ActiveRoster, text: &str) -> Addressing {
        let lowered = text.to_lowercase();

        let named: Vec<CharacterId> = roster
            .iter()
            .filter(|c| {
                c.names()
                    .any(|name| contains_name(&lowered, &name.to_lowercase()))
            })
            .map(|c| c.id)
            .collect();

        let addressing = match named.len() {
            1 => Addressing {
                focused: named.clone(),
                mentioned: named,
                confidence: NAMED_CONFIDENCE,
            },
            0 => self.implicit_addressing(roster, &lowered),
            _ => Addressing {
                focused: Vec::new(),
                mentioned: named,
                confidence: 0.0,
            },
        };

        debug!(
            focused = addressing.focused.len(),
            mentioned = addressing.mentioned.len(),
            confidence = addressing.confidence,
            "Detected addressing"
        );
        addressing
    }

    fn implicit_addressing(&self, roster: &ActiveRoster, lowered: &str) -> Addressing {
        let Some(last) = self
            .last_character_speaker
            .filter(|id| roster.contains(*id))
        else {
            return Addressing::none();
        };

        let confidence = if lowered.trim_end().ends_with('?') {
            QUESTION_CONFIDENCE
        } else if words(lowered).any(|w| SECOND_PERSON_CUES.contains(&w)) {
            SECOND_PERSON_CONFIDENCE
        } else {
            return Addressing::none();
        };

        Addressing {
            focused: vec![last],
            mentioned: Vec::new(),
            confidence,
        }
    }

    /// Timing and topic signals for the latest user message.
    pub fn environmental_factors(&self) -> EnvironmentalFactors {
        EnvironmentalFactors {
            seconds_since_last_user_input: self
                .last_user_input
                .map(|at| at.elapsed().as_secs_f64()),
            topics: self
                .last_user_text
                .as_deref()
                .map(|text| classify_topics(&text.to_lowercase()))
                .unwrap_or_default(),
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_user_input = None;
        self.last_user_text = None;
        self.last_character_speaker = None;
    }
}

/// Whole-word (or whole-phrase) search for an already lower-cased name.
fn contains_name(haystack: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    haystack.match_indices(name).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + name.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_rules::Character;

    fn roster_abc() -> (ActiveRoster, CharacterId, CharacterId, CharacterId) {
        let mut roster = ActiveRoster::new();
        let a = roster.add(Character::new("Hiyori"));
        let b = roster.add(Character::new("Mao").with_alias("Mao-chan"));
        let c = roster.add(Character::new("Haru"));
        (roster, a, b, c)
    }

    #[test]
    fn test_single_name_is_direct() {
        let (roster, a, _, _) = roster_abc();
        let context = ConversationContext::with_defaults();

        let addressing = context.detect_addressing(&roster, "Hiyori, what do you think?");
        assert_eq!(addressing.focused, vec![a]);
        assert_eq!(addressing.mentioned, vec![a]);
        assert!(addressing.confidence >= 0.8);
        assert_eq!(addressing.direct_target(0.8), Some(a));
    }

    #[test]
    fn test_alias_and_case() {
        let (roster, _, b, _) = roster_abc();
        let context = ConversationContext::with_defaults();

        let addressing = context.detect_addressing(&roster, "hey MAO-CHAN!");
        assert_eq!(addressing.sole_focus(), Some(b));
    }

    #[test]
    fn test_multiple_names_are_ambiguous() {
        let (roster, a, _, c) = roster_abc();
        let context = ConversationContext::with_defaults();

        let addressing = context.detect_addressing(&roster, "Hiyori and Haru, come here");
        assert!(addressing.focused.is_empty());
        assert_eq!(addressing.mentioned, vec![a, c]);
        assert_eq!(addressing.direct_target(0.8), None);
        assert!(addressing.names(a));
    }

    #[test]
    fn test_name_inside_word_does_not_match() {
        let (roster, _, _, _) = roster_abc();
        let context = ConversationContext::with_defaults();

        // "harum" and "maori" contain names but are different words
        let addressing = context.detect_addressing(&roster, "harum scarum maori");
        assert_eq!(addressing, Addressing::none());
    }

    #[test]
    fn test_question_to_last_speaker() {
        let (roster, _, b, _) = roster_abc();
        let mut context = ConversationContext::with_defaults();
        context.record_character_message(b, "I love rainy days.");
        context.record_user_message("really?");

        let addressing = context.detect_addressing(&roster, "really?");
        assert_eq!(addressing.focused, vec![b]);
        assert!((addressing.confidence - QUESTION_CONFIDENCE).abs() < f32::EPSILON);
        assert_eq!(addressing.direct_target(0.8), None);
        assert!(!addressing.names(b));
    }

    #[test]
    fn test_second_person_cue() {
        let (roster, _, b, _) = roster_abc();
        let mut context = ConversationContext::with_defaults();
        context.record_character_message(b, "Morning!");

        let addressing = context.detect_addressing(&roster, "you're up early");
        assert_eq!(addressing.focused, vec![b]);
        assert!((addressing.confidence - SECOND_PERSON_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_removed_last_speaker_is_ignored() {
        let (mut roster, _, b, _) = roster_abc();
        let mut context = ConversationContext::with_defaults();
        context.record_character_message(b, "Bye!");
        roster.remove(b);

        let addressing = context.detect_addressing(&roster, "wait, where are you going?");
        assert_eq!(addressing, Addressing::none());
    }

    #[test]
    fn test_history_is_capped() {
        let mut context = ConversationContext::new(&ContextConfig {
            max_messages: 3,
            max_turns: 20,
        });
        for i in 0..5 {
            context.record_user_message(format!("message {}", i));
        }

        assert_eq!(context.len(), 3);
        let texts: Vec<_> = context.recent_messages(10).map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_environmental_factors() {
        let mut context = ConversationContext::with_defaults();
        assert_eq!(context.environmental_factors().seconds_since_last_user_input, None);

        context.record_user_message("I'm so stressed, can you help?");
        tokio::time::advance(std::time::Duration::from_secs(5)).await;

        let factors = context.environmental_factors();
        let elapsed = factors.seconds_since_last_user_input.unwrap();
        assert!((elapsed - 5.0).abs() < 0.01);
        assert!(factors.topics.emotional);
        assert!(factors.topics.help_request);
    }

    #[test]
    fn test_clear() {
        let (_, a, _, _) = roster_abc();
        let mut context = ConversationContext::with_defaults();
        context.record_character_message(a, "hi");
        context.clear();

        assert!(context.is_empty());
        assert!(context.last_character_speaker().is_none());
    }
}
