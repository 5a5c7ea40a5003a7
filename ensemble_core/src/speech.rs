//! Speech synthesis and avatar animation seams.

use async_trait::async_trait;
use cast_rules::{CharacterId, Emotion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::audio::{AudioPayload, PlaybackHooks, PlaybackOutcome, RequestSummary};
use crate::error::{EngineError, EngineResult};

/// Intensity used for neutral delivery, including the synthesis fallback.
pub const NEUTRAL_INTENSITY: f32 = 0.5;

/// Intensity used for emotional delivery.
pub const EXPRESSIVE_INTENSITY: f32 = 0.8;

/// What to say, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub emotion: Emotion,
    pub intensity: f32,
    pub character: CharacterId,
}

impl SynthesisRequest {
    /// A request with the intensity implied by `emotion`.
    pub fn new(character: CharacterId, text: impl Into<String>, emotion: Emotion) -> Self {
        let intensity = if emotion.is_neutral() {
            NEUTRAL_INTENSITY
        } else {
            EXPRESSIVE_INTENSITY
        };
        Self {
            text: text.into(),
            emotion,
            intensity,
            character,
        }
    }

    /// The same text, delivered flat.
    pub fn neutral(&self) -> Self {
        Self {
            emotion: Emotion::Neutral,
            intensity: NEUTRAL_INTENSITY,
            ..self.clone()
        }
    }
}

/// Text-to-speech service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> EngineResult<AudioPayload>;
}

/// Produces empty audio. For headless sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, _request: &SynthesisRequest) -> EngineResult<AudioPayload> {
        Ok(AudioPayload::default())
    }
}

/// Synthesize `request`, retrying once with neutral delivery.
pub async fn synthesize_with_fallback(
    synthesizer: &dyn SpeechSynthesizer,
    request: &SynthesisRequest,
) -> EngineResult<AudioPayload> {
    match synthesizer.synthesize(request).await {
        Ok(payload) => Ok(payload),
        Err(e) => {
            warn!(
                character = %request.character,
                emotion = %request.emotion,
                error = %e,
                "Synthesis failed, retrying with neutral delivery"
            );
            synthesizer
                .synthesize(&request.neutral())
                .await
                .map_err(|e| match e {
                    EngineError::Synthesis(_) => e,
                    other => EngineError::Synthesis(other.to_string()),
                })
        }
    }
}

/// The animated avatar, told when a character starts and stops talking.
#[cfg_attr(test, mockall::automock)]
pub trait AvatarAnimator: Send + Sync {
    fn speech_started(
        &self,
        character: CharacterId,
        emotion: Emotion,
        duration: Option<Duration>,
    ) -> EngineResult<()>;

    fn speech_ended(&self, character: CharacterId) -> EngineResult<()>;
}

/// An avatar that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnimator;

impl AvatarAnimator for NullAnimator {
    fn speech_started(
        &self,
        _character: CharacterId,
        _emotion: Emotion,
        _duration: Option<Duration>,
    ) -> EngineResult<()> {
        Ok(())
    }

    fn speech_ended(&self, _character: CharacterId) -> EngineResult<()> {
        Ok(())
    }
}

/// Drives the avatar from playback events.
#[derive(Clone)]
pub struct AnimationHooks {
    animator: Arc<dyn AvatarAnimator>,
}

impl AnimationHooks {
    pub fn new(animator: Arc<dyn AvatarAnimator>) -> Self {
        Self { animator }
    }
}

impl PlaybackHooks for AnimationHooks {
    fn on_start(&self, request: &RequestSummary) -> EngineResult<()> {
        self.animator
            .speech_started(request.owner, request.emotion, request.duration)
            .map_err(as_animation_error)
    }

    fn on_end(&self, request: &RequestSummary, outcome: &PlaybackOutcome) -> EngineResult<()> {
        debug!(character = %request.owner, ?outcome, "Speech ended");
        self.animator
            .speech_ended(request.owner)
            .map_err(as_animation_error)
    }
}

fn as_animation_error(e: EngineError) -> EngineError {
    match e {
        EngineError::AnimationSync(_) => e,
        other => EngineError::AnimationSync(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RequestId;
    use mockall::predicate::*;
    use tracing_test::traced_test;

    #[test]
    fn test_request_intensity_follows_emotion() {
        let id = CharacterId::new();
        assert_eq!(SynthesisRequest::new(id, "hi", Emotion::Neutral).intensity, 0.5);
        let excited = SynthesisRequest::new(id, "hi!", Emotion::Excited);
        assert_eq!(excited.intensity, 0.8);

        let flat = excited.neutral();
        assert_eq!(flat.emotion, Emotion::Neutral);
        assert_eq!(flat.intensity, 0.5);
        assert_eq!(flat.text, "hi!");
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(AudioPayload::new(vec![7u8])));

        let request = SynthesisRequest::new(CharacterId::new(), "hello", Emotion::Happy);
        let payload = synthesize_with_fallback(&synth, &request).await.unwrap();
        assert_eq!(payload.data.as_ref(), &[7u8]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fallback_uses_neutral_delivery() {
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_synthesize()
            .withf(|r: &SynthesisRequest| r.emotion == Emotion::Angry)
            .times(1)
            .returning(|_| Err(EngineError::Synthesis("voice unavailable".to_string())));
        synth
            .expect_synthesize()
            .withf(|r: &SynthesisRequest| r.emotion == Emotion::Neutral && r.intensity == 0.5)
            .times(1)
            .returning(|_| Ok(AudioPayload::new(vec![1u8, 2])));

        let request = SynthesisRequest::new(CharacterId::new(), "no way", Emotion::Angry);
        let payload = synthesize_with_fallback(&synth, &request).await.unwrap();
        assert_eq!(payload.data.len(), 2);
        assert!(logs_contain("retrying with neutral delivery"));
    }

    #[tokio::test]
    async fn test_double_failure_is_a_synthesis_error() {
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_synthesize()
            .times(2)
            .returning(|_| Err(EngineError::Playback("tts socket closed".to_string())));

        let request = SynthesisRequest::new(CharacterId::new(), "hm", Emotion::Sad);
        let err = synthesize_with_fallback(&synth, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::Synthesis(_)));
    }

    #[test]
    fn test_animation_hooks_forward_to_animator() {
        let owner = CharacterId::new();
        let mut animator = MockAvatarAnimator::new();
        animator
            .expect_speech_started()
            .with(eq(owner), eq(Emotion::Shy), eq(Some(Duration::from_secs(2))))
            .times(1)
            .returning(|_, _, _| Ok(()));
        animator
            .expect_speech_ended()
            .with(eq(owner))
            .times(1)
            .returning(|_| Err(EngineError::Playback("rig detached".to_string())));

        let hooks = AnimationHooks::new(Arc::new(animator));
        let summary = RequestSummary {
            id: RequestId::new(),
            owner,
            priority: 0,
            emotion: Emotion::Shy,
            duration: Some(Duration::from_secs(2)),
        };

        assert!(hooks.on_start(&summary).is_ok());
        let err = hooks
            .on_end(&summary, &PlaybackOutcome::Completed)
            .unwrap_err();
        assert!(matches!(err, EngineError::AnimationSync(_)));
    }
}
