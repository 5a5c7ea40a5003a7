//! Audio requests and the types the scheduler reports about them.

use bytes::Bytes;
use cast_rules::{CharacterId, Emotion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Unique identifier for a submitted audio request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Synthesized audio. The engine never looks inside `data`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioPayload {
    pub data: Bytes,
    pub duration: Option<Duration>,
    pub mime: Option<String>,
}

impl AudioPayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            duration: None,
            mime: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Lifecycle of a request inside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Queued,
    Playing,
    Completed,
    Cancelled,
    Interrupted,
    Failed,
}

impl RequestState {
    /// Whether the request can no longer change state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Queued | RequestState::Playing)
    }
}

/// How a request left the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
    /// Removed before it ever played.
    Cancelled,
    Failed { reason: String },
}

impl PlaybackOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PlaybackOutcome::Failed { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, PlaybackOutcome::Interrupted)
    }

    /// The terminal state this outcome leaves a request in.
    pub fn state(&self) -> RequestState {
        match self {
            PlaybackOutcome::Completed => RequestState::Completed,
            PlaybackOutcome::Interrupted => RequestState::Interrupted,
            PlaybackOutcome::Cancelled => RequestState::Cancelled,
            PlaybackOutcome::Failed { .. } => RequestState::Failed,
        }
    }
}

/// The parts of a request that hooks and sinks get to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub owner: CharacterId,
    pub priority: i32,
    pub emotion: Emotion,
    pub duration: Option<Duration>,
}

/// Callbacks around a request's time on the speaker.
///
/// `on_end` fires for completion, interruption, and failure alike. Errors are
/// logged by the scheduler and never stop playback.
pub trait PlaybackHooks: Send + Sync {
    fn on_start(&self, _request: &RequestSummary) -> EngineResult<()> {
        Ok(())
    }

    fn on_end(&self, _request: &RequestSummary, _outcome: &PlaybackOutcome) -> EngineResult<()> {
        Ok(())
    }
}

/// Admission policy for new requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Wait for the current speaker to finish.
    #[default]
    Queue,
    /// Cut off the current speaker.
    Interrupt,
    /// Cut off only lower-priority speakers; otherwise wait in priority order.
    Priority,
}

impl QueueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueMode::Queue => "queue",
            QueueMode::Interrupt => "interrupt",
            QueueMode::Priority => "priority",
        }
    }
}

impl std::fmt::Display for QueueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(QueueMode::Queue),
            "interrupt" => Ok(QueueMode::Interrupt),
            "priority" => Ok(QueueMode::Priority),
            other => Err(EngineError::UnknownQueueMode(other.to_string())),
        }
    }
}

/// Read-only snapshot of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub mode: QueueMode,
    pub is_playing: bool,
    pub current_owner: Option<CharacterId>,
    pub current_request: Option<RequestId>,
    pub pending_length: usize,
}

/// A request to put one utterance on the speaker.
pub struct AudioRequest {
    pub(crate) id: RequestId,
    pub(crate) owner: CharacterId,
    pub(crate) payload: AudioPayload,
    pub(crate) priority: i32,
    pub(crate) emotion: Emotion,
    pub(crate) submitted_at: DateTime<Utc>,
    /// Admission order, assigned by the scheduler.
    pub(crate) seq: u64,
    pub(crate) hooks: Option<Arc<dyn PlaybackHooks>>,
    pub(crate) completion: Option<oneshot::Sender<PlaybackOutcome>>,
}

impl std::fmt::Debug for AudioRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRequest")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("priority", &self.priority)
            .field("emotion", &self.emotion)
            .field("submitted_at", &self.submitted_at)
            .field("seq", &self.seq)
            .field("bytes", &self.payload.data.len())
            .finish_non_exhaustive()
    }
}

impl AudioRequest {
    /// A low-priority, neutral request with no hooks.
    pub fn new(owner: CharacterId, payload: AudioPayload) -> Self {
        Self {
            id: RequestId::new(),
            owner,
            payload,
            priority: 0,
            emotion: Emotion::Neutral,
            submitted_at: Utc::now(),
            seq: 0,
            hooks: None,
            completion: None,
        }
    }

    /// Higher is more urgent.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = emotion;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PlaybackHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Attach a one-shot signal that resolves when the request leaves the scheduler.
    pub fn with_completion(mut self) -> (Self, oneshot::Receiver<PlaybackOutcome>) {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        (self, rx)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn owner(&self) -> CharacterId {
        self.owner
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn payload(&self) -> &AudioPayload {
        &self.payload
    }

    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id,
            owner: self.owner,
            priority: self.priority,
            emotion: self.emotion,
            duration: self.payload.duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_mode_parsing() {
        assert_eq!("Priority".parse::<QueueMode>().unwrap(), QueueMode::Priority);
        assert_eq!(" queue ".parse::<QueueMode>().unwrap(), QueueMode::Queue);
        assert!(matches!(
            "shuffle".parse::<QueueMode>(),
            Err(EngineError::UnknownQueueMode(_))
        ));
        assert_eq!(QueueMode::Interrupt.to_string(), "interrupt");
    }

    #[test]
    fn test_outcome_flags() {
        let failed = PlaybackOutcome::Failed {
            reason: "device lost".to_string(),
        };
        assert!(failed.is_failed());
        assert!(!failed.is_interrupted());
        assert_eq!(failed.state(), RequestState::Failed);
        assert!(PlaybackOutcome::Interrupted.is_interrupted());
        assert!(RequestState::Cancelled.is_terminal());
        assert!(!RequestState::Playing.is_terminal());
    }

    #[test]
    fn test_request_builder() {
        let owner = CharacterId::new();
        let payload = AudioPayload::new(vec![1u8, 2, 3])
            .with_duration(Duration::from_millis(1500))
            .with_mime("audio/wav");
        let (request, _rx) = AudioRequest::new(owner, payload)
            .with_priority(5)
            .with_emotion(Emotion::Happy)
            .with_completion();

        let summary = request.summary();
        assert_eq!(summary.owner, owner);
        assert_eq!(summary.priority, 5);
        assert_eq!(summary.emotion, Emotion::Happy);
        assert_eq!(summary.duration, Some(Duration::from_millis(1500)));
        assert_eq!(request.payload().data.len(), 3);
        assert!(request.completion.is_some());
    }
}
