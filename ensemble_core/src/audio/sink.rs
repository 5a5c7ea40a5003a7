//! The audio output the scheduler drives.

use tracing::trace;

use super::request::{AudioPayload, RequestId, RequestSummary};
use crate::error::{EngineError, EngineResult};

/// Where admitted audio is played.
///
/// Calls are made outside the scheduler's lock, one at a time, in admission
/// order. `play` should start playback and return without waiting for it to
/// finish; the caller reports the natural end through the scheduler.
pub trait AudioSink: Send + Sync {
    fn play(&self, request: &RequestSummary, payload: &AudioPayload) -> EngineResult<()>;

    /// Second attempt after `play` failed, e.g. a plainer decoder or device.
    fn play_fallback(&self, request: &RequestSummary, _payload: &AudioPayload) -> EngineResult<()> {
        Err(EngineError::Playback(format!(
            "no fallback output for request {}",
            request.id
        )))
    }

    /// Release whatever is playing `id`. Must be idempotent.
    fn stop(&self, id: RequestId);
}

/// A sink that plays nothing. Useful headless and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn play(&self, request: &RequestSummary, payload: &AudioPayload) -> EngineResult<()> {
        trace!(request = %request.id, bytes = payload.data.len(), "Null sink play");
        Ok(())
    }

    fn stop(&self, id: RequestId) {
        trace!(request = %id, "Null sink stop");
    }
}
