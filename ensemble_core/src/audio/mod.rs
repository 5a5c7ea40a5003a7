//! Audio Queue Scheduler - the single authority over who is speaking.
//!
//! At most one request is ever `Playing`. New requests are admitted according
//! to the current [`QueueMode`]:
//!
//! - **queue**: wait behind everyone, FIFO
//! - **interrupt**: cut off the current speaker, leave the waiting line alone
//! - **priority**: cut off the current speaker only if strictly more urgent,
//!   otherwise wait in `(priority desc, submission asc)` order
//!
//! # Side effects
//!
//! State changes happen under a lock and push effects (sink calls, hooks,
//! completion signals) onto an outbox. The outbox is drained outside the
//! lock, one effect at a time, so hooks may call back into the scheduler.
//! Effects always run in the order their transitions happened.

mod request;
mod sink;

pub use request::*;
pub use sink::*;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;

enum Effect {
    Start {
        summary: RequestSummary,
        payload: AudioPayload,
        hooks: Option<Arc<dyn PlaybackHooks>>,
    },
    Stop(RequestId),
    End {
        summary: RequestSummary,
        outcome: PlaybackOutcome,
        hooks: Option<Arc<dyn PlaybackHooks>>,
        completion: Option<oneshot::Sender<PlaybackOutcome>>,
    },
}

struct QueueState {
    mode: QueueMode,
    current: Option<AudioRequest>,
    pending: VecDeque<AudioRequest>,
    retired: VecDeque<(RequestId, RequestState)>,
    retired_capacity: usize,
    next_seq: u64,
    outbox: VecDeque<Effect>,
    draining: bool,
}

impl QueueState {
    fn begin(&mut self, request: AudioRequest) {
        debug!(request = %request.id, owner = %request.owner, "Playback starting");
        self.outbox.push_back(Effect::Start {
            summary: request.summary(),
            payload: request.payload.clone(),
            hooks: request.hooks.clone(),
        });
        self.current = Some(request);
    }

    /// End the current request with `outcome`. Does not promote.
    fn finish_current(&mut self, outcome: PlaybackOutcome) -> Option<RequestId> {
        let mut request = self.current.take()?;
        let id = request.id;
        debug!(request = %id, ?outcome, "Playback ended");

        if !matches!(outcome, PlaybackOutcome::Completed) {
            self.outbox.push_back(Effect::Stop(id));
        }
        self.retire(id, outcome.state());
        self.outbox.push_back(Effect::End {
            summary: request.summary(),
            outcome,
            hooks: request.hooks.take(),
            completion: request.completion.take(),
        });
        Some(id)
    }

    fn promote_next(&mut self) {
        if self.current.is_some() {
            return;
        }
        if let Some(next) = self.pending.pop_front() {
            self.begin(next);
        }
    }

    fn enqueue(&mut self, request: AudioRequest) {
        match self.mode {
            QueueMode::Priority => {
                let at = self
                    .pending
                    .iter()
                    .position(|waiting| waiting.priority < request.priority)
                    .unwrap_or(self.pending.len());
                self.pending.insert(at, request);
            }
            QueueMode::Queue | QueueMode::Interrupt => self.pending.push_back(request),
        }
    }

    fn cancel(&mut self, mut request: AudioRequest) {
        debug!(request = %request.id, "Request cancelled");
        self.retire(request.id, RequestState::Cancelled);
        if let Some(tx) = request.completion.take() {
            let _ = tx.send(PlaybackOutcome::Cancelled);
        }
    }

    fn retire(&mut self, id: RequestId, state: RequestState) {
        if self.retired.len() == self.retired_capacity {
            self.retired.pop_front();
        }
        self.retired.push_back((id, state));
    }

    fn sort_pending(&mut self) {
        match self.mode {
            QueueMode::Priority => self
                .pending
                .make_contiguous()
                .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq))),
            QueueMode::Queue | QueueMode::Interrupt => {
                self.pending.make_contiguous().sort_by_key(|r| r.seq)
            }
        }
    }
}

/// Serializes spoken audio so characters never talk over each other.
pub struct AudioQueueScheduler {
    state: Mutex<QueueState>,
    sink: Arc<dyn AudioSink>,
}

impl std::fmt::Debug for AudioQueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioQueueScheduler")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl AudioQueueScheduler {
    pub fn new(config: &QueueConfig, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                mode: config.initial_mode,
                current: None,
                pending: VecDeque::new(),
                retired: VecDeque::new(),
                retired_capacity: config.retired_capacity.max(1),
                next_seq: 0,
                outbox: VecDeque::new(),
                draining: false,
            }),
            sink,
        }
    }

    /// A scheduler with default settings and no audio output.
    pub fn headless() -> Self {
        Self::new(&QueueConfig::default(), Arc::new(NullAudioSink))
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a request under the current mode. Never blocks on playback.
    pub fn submit(&self, mut request: AudioRequest) -> RequestId {
        let id = request.id;
        {
            let mut state = self.lock();
            request.seq = state.next_seq;
            state.next_seq += 1;

            info!(
                request = %id,
                owner = %request.owner,
                priority = request.priority,
                mode = %state.mode,
                "Audio request submitted"
            );

            let current_priority = state.current.as_ref().map(|c| c.priority);
            match (state.mode, current_priority) {
                (_, None) => state.begin(request),
                (QueueMode::Queue, Some(_)) => state.enqueue(request),
                (QueueMode::Interrupt, Some(_)) => {
                    state.finish_current(PlaybackOutcome::Interrupted);
                    state.begin(request);
                }
                (QueueMode::Priority, Some(current)) if request.priority > current => {
                    state.finish_current(PlaybackOutcome::Interrupted);
                    state.begin(request);
                }
                (QueueMode::Priority, Some(_)) => state.enqueue(request),
            }
        }
        self.drain();
        id
    }

    /// Remove a request that has not started. Returns whether anything was removed.
    pub fn cancel_pending(&self, id: RequestId) -> bool {
        let mut state = self.lock();
        let Some(index) = state.pending.iter().position(|r| r.id == id) else {
            return false;
        };
        if let Some(request) = state.pending.remove(index) {
            state.cancel(request);
        }
        true
    }

    /// Interrupt whatever is playing and promote the next request.
    pub fn stop_current(&self) -> Option<RequestId> {
        let stopped = {
            let mut state = self.lock();
            let stopped = state.finish_current(PlaybackOutcome::Interrupted);
            state.promote_next();
            stopped
        };
        self.drain();
        stopped
    }

    /// Cancel everything waiting and stop the current speaker. Nothing is promoted.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            let pending: Vec<AudioRequest> = state.pending.drain(..).collect();
            for request in pending {
                state.cancel(request);
            }
            state.finish_current(PlaybackOutcome::Interrupted);
            info!("Audio queue cleared");
        }
        self.drain();
    }

    /// Report that `id` finished playing naturally.
    pub fn complete(&self, id: RequestId) -> bool {
        self.end_current(id, PlaybackOutcome::Completed)
    }

    /// Report that `id` failed mid-playback.
    pub fn fail(&self, id: RequestId, reason: impl Into<String>) -> bool {
        self.end_current(
            id,
            PlaybackOutcome::Failed {
                reason: reason.into(),
            },
        )
    }

    fn end_current(&self, id: RequestId, outcome: PlaybackOutcome) -> bool {
        {
            let mut state = self.lock();
            if state.current.as_ref().map(|c| c.id) != Some(id) {
                debug!(request = %id, "Ignoring end report for a request that is not playing");
                return false;
            }
            state.finish_current(outcome);
            state.promote_next();
        }
        self.drain();
        true
    }

    /// Change the admission policy. The current speaker is left alone; the
    /// waiting line is re-ordered for the new mode (priority order in
    /// priority mode, submission order otherwise).
    pub fn set_mode(&self, mode: QueueMode) {
        let mut state = self.lock();
        if state.mode == mode {
            return;
        }
        info!(from = %state.mode, to = %mode, "Queue mode changed");
        state.mode = mode;
        state.sort_pending();
    }

    pub fn mode(&self) -> QueueMode {
        self.lock().mode
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            mode: state.mode,
            is_playing: state.current.is_some(),
            current_owner: state.current.as_ref().map(|c| c.owner),
            current_request: state.current.as_ref().map(|c| c.id),
            pending_length: state.pending.len(),
        }
    }

    /// Where `id` is now. Finished requests are remembered for a bounded while.
    pub fn state_of(&self, id: RequestId) -> Option<RequestState> {
        let state = self.lock();
        if state.current.as_ref().is_some_and(|c| c.id == id) {
            return Some(RequestState::Playing);
        }
        if state.pending.iter().any(|r| r.id == id) {
            return Some(RequestState::Queued);
        }
        state
            .retired
            .iter()
            .rev()
            .find(|(retired, _)| *retired == id)
            .map(|(_, s)| *s)
    }

    /// Run queued effects until the outbox is empty. Re-entrant calls return
    /// at once and leave their effects to the outer drain.
    fn drain(&self) {
        {
            let mut state = self.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let effect = {
                let mut state = self.lock();
                match state.outbox.pop_front() {
                    Some(effect) => effect,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            self.run(effect);
        }
    }

    fn run(&self, effect: Effect) {
        match effect {
            Effect::Start {
                summary,
                payload,
                hooks,
            } => {
                let played = self.sink.play(&summary, &payload).or_else(|e| {
                    warn!(request = %summary.id, error = %e, "Playback failed, trying fallback");
                    self.sink.play_fallback(&summary, &payload)
                });

                match played {
                    Ok(()) => {
                        if let Some(hooks) = hooks {
                            if let Err(e) = hooks.on_start(&summary) {
                                warn!(request = %summary.id, error = %e, "on_start hook failed");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(request = %summary.id, error = %e, "Playback fallback failed, dropping request");
                        self.fail(summary.id, e.to_string());
                    }
                }
            }
            Effect::Stop(id) => self.sink.stop(id),
            Effect::End {
                summary,
                outcome,
                hooks,
                completion,
            } => {
                if let Some(hooks) = hooks {
                    if let Err(e) = hooks.on_end(&summary, &outcome) {
                        warn!(request = %summary.id, error = %e, "on_end hook failed");
                    }
                }
                if let Some(tx) = completion {
                    let _ = tx.send(outcome);
                }
            }
        }
    }
}
