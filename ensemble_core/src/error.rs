//! Error taxonomy for the orchestration engine.
//!
//! Nothing here is allowed to stop the conversation loop. Most variants are
//! logged and degraded at the session boundary rather than returned to the UI.

use cast_rules::CharacterId;
use thiserror::Error;

/// Errors raised inside the engine or reported by its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The roster is empty. Callers treat this as "nobody speaks".
    #[error("No active characters in the roster")]
    NoActiveCharacters,

    /// The trait backend failed; the default vector is used instead.
    #[error("Trait resolution failed for {character}: {reason}")]
    TraitResolution {
        character: CharacterId,
        reason: String,
    },

    /// Speech synthesis failed, including the neutral fallback when reported by it.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// The audio output could not play a request.
    #[error("Playback failed: {0}")]
    Playback(String),

    /// The avatar could not follow along with speech.
    #[error("Animation sync failed: {0}")]
    AnimationSync(String),

    /// The character is not on the active roster.
    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    /// A queue mode name was not recognised.
    #[error("Unknown queue mode: {0}")]
    UnknownQueueMode(String),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Trait sheet JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading configuration or trait sheets from disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let id = CharacterId::nil();
        let err = EngineError::TraitResolution {
            character: id,
            reason: "backend offline".to_string(),
        };
        assert_eq!(
            err.to_string(),
            format!("Trait resolution failed for {}: backend offline", id)
        );
        assert_eq!(
            EngineError::NoActiveCharacters.to_string(),
            "No active characters in the roster"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let parse: Result<toml::Value, toml::de::Error> = toml::from_str("not = [valid");
        let err: EngineError = parse.unwrap_err().into();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
