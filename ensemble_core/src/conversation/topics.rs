//! Keyword topic classifier shared by responder selection and interjections.

use serde::{Deserialize, Serialize};

const QUESTION_OPENERS: &[&str] = &[
    "what", "why", "how", "who", "where", "when", "which", "can", "could", "would",
    "should", "do", "does", "did", "is", "are", "will",
];

const EMOTIONAL_WORDS: &[&str] = &[
    "sad", "lonely", "cry", "crying", "tired", "scared", "afraid", "anxious", "upset",
    "depressed", "hurt", "miss", "stressed", "worried", "happy", "excited", "angry",
    "love", "heartbroken",
];

const HELP_WORDS: &[&str] = &["help", "advice", "assist", "stuck", "recommend", "suggest"];

const HELP_PHRASES: &[&str] = &["how do i", "how can i", "can you", "could you", "what should i"];

const CONTROVERSIAL_WORDS: &[&str] = &[
    "politics", "political", "religion", "election", "abortion", "war", "controversial",
    "debate", "wrong", "disagree", "overrated", "best", "worst",
];

const FLIRTATIOUS_WORDS: &[&str] = &[
    "cute", "pretty", "beautiful", "handsome", "date", "crush", "kiss", "flirt",
    "gorgeous", "darling", "sweetheart", "hug",
];

/// Boolean topic tags for a single message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicTags {
    pub question: bool,
    pub emotional: bool,
    pub help_request: bool,
    pub controversial: bool,
    pub flirtatious_opportunity: bool,
}

impl TopicTags {
    /// Whether no tag is set.
    pub fn is_empty(&self) -> bool {
        *self == TopicTags::default()
    }

    /// Names of the set tags, for logging.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.question {
            names.push("question");
        }
        if self.emotional {
            names.push("emotional");
        }
        if self.help_request {
            names.push("help_request");
        }
        if self.controversial {
            names.push("controversial");
        }
        if self.flirtatious_opportunity {
            names.push("flirtatious_opportunity");
        }
        names
    }
}

/// Split lower-cased text into alphanumeric words (apostrophes kept).
pub(crate) fn words(lowercased: &str) -> impl Iterator<Item = &str> {
    lowercased
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
}

/// Classify lower-cased text into topic tags.
///
/// Pure and cheap, so both selection and interjection call it on demand
/// instead of caching results.
pub fn classify_topics(lowercased: &str) -> TopicTags {
    let trimmed = lowercased.trim();
    let tokens: Vec<&str> = words(trimmed).collect();
    let has_word = |list: &[&str]| tokens.iter().any(|t| list.contains(t));
    let has_phrase = |list: &[&str]| list.iter().any(|p| trimmed.contains(p));

    let question = trimmed.ends_with('?')
        || tokens
            .first()
            .is_some_and(|first| QUESTION_OPENERS.contains(first));

    TopicTags {
        question,
        emotional: has_word(EMOTIONAL_WORDS),
        help_request: has_word(HELP_WORDS) || has_phrase(HELP_PHRASES),
        controversial: has_word(CONTROVERSIAL_WORDS),
        flirtatious_opportunity: has_word(FLIRTATIOUS_WORDS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_statement_has_no_tags() {
        let tags = classify_topics("the weather is nice today.");
        assert!(tags.is_empty());
        assert!(tags.names().is_empty());
    }

    #[test]
    fn test_question_detection() {
        assert!(classify_topics("you like tea?").question);
        assert!(classify_topics("what is your favorite song").question);
        assert!(!classify_topics("i like tea").question);
    }

    #[test]
    fn test_emotional_and_help() {
        let tags = classify_topics("i feel so lonely, can you help me?");
        assert!(tags.emotional);
        assert!(tags.help_request);
        assert!(tags.question);
        assert!(!tags.controversial);
    }

    #[test]
    fn test_whole_words_only() {
        // "saddle" must not read as "sad", "warm" must not read as "war"
        let tags = classify_topics("the saddle is warm");
        assert!(!tags.emotional);
        assert!(!tags.controversial);
    }

    #[test]
    fn test_controversial_and_flirtatious() {
        let tags = classify_topics("pineapple pizza is the worst, but you look cute");
        assert!(tags.controversial);
        assert!(tags.flirtatious_opportunity);
        assert_eq!(tags.names(), vec!["controversial", "flirtatious_opportunity"]);
    }

    #[test]
    fn test_help_phrases() {
        assert!(classify_topics("how do i bake bread").help_request);
        assert!(classify_topics("any advice").help_request);
    }
}
