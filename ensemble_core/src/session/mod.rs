//! Orchestration Session - the facade the chat layer talks to.
//!
//! One session owns the roster, the conversation context, the interaction
//! history, the RNG, and the audio queue for a single conversation.
//!
//! # Turn Flow
//!
//! 1. **determine_responder**: record the user message, pick who answers
//! 2. **respond**: synthesize the answer and queue it for playback
//! 3. **On playback start**: bystanders are evaluated; interjections are
//!    scheduled after their delays and delivered on the [`DueInterjection`]
//!    channel for the chat layer to voice
//!
//! Every roster change cancels outstanding interjections.

mod builder;
mod hooks;

pub use builder::SessionBuilder;

use cast_rules::{ActiveRoster, Character, CharacterId, Emotion, InteractionType};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{AudioQueueScheduler, AudioRequest, QueueMode, QueueStatus, RequestId};
use crate::config::EngineConfig;
use crate::conversation::{classify_topics, Addressing, ConversationContext, Message, TopicTags};
use crate::error::EngineError;
use crate::history::{InteractionHistory, TurnRecord};
use crate::interjection::{InteractionTrigger, Interjection};
use crate::personality::{InMemoryTraitBackend, TraitProvider, TraitTable};
use crate::selection::{ResponderSelector, Selection, SelectionInput, Stimulus};
use crate::speech::{
    synthesize_with_fallback, AnimationHooks, AvatarAnimator, SpeechSynthesizer, SynthesisRequest,
};
use hooks::{FollowUp, TurnHooks};

/// An interjection whose delay has elapsed, committed and ready to be voiced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueInterjection {
    pub character: CharacterId,
    pub target: CharacterId,
    pub interaction_type: InteractionType,
    /// Suggested delivery for the generated line.
    pub emotion: Emotion,
    /// The utterance being reacted to.
    pub triggering_message: String,
    pub turn_index: u64,
}

struct SessionState {
    roster: ActiveRoster,
    context: ConversationContext,
    history: InteractionHistory,
    rng: StdRng,
    cancel: CancellationToken,
}

impl SessionState {
    fn renew_token(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }
}

pub(crate) struct Inner {
    config: EngineConfig,
    state: Mutex<SessionState>,
    traits: TraitProvider,
    sheets: Option<Arc<InMemoryTraitBackend>>,
    selector: ResponderSelector,
    trigger: InteractionTrigger,
    scheduler: AudioQueueScheduler,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    animator: Arc<dyn AvatarAnimator>,
    due_tx: mpsc::UnboundedSender<DueInterjection>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap to clone; clones share the same conversation.
#[derive(Clone)]
pub struct OrchestrationSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for OrchestrationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationSession")
            .field("queue", &self.queue_status())
            .finish_non_exhaustive()
    }
}

impl OrchestrationSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Record a user message and pick who answers it.
    ///
    /// Returns `None` when the roster is empty.
    pub async fn determine_responder(&self, user_message: &str) -> Option<Selection> {
        let (ids, addressing, topics, last_speaker) = {
            let mut state = self.inner.lock();
            state.context.record_user_message(user_message);
            if state.roster.is_empty() {
                debug!(error = %EngineError::NoActiveCharacters, "Nobody to respond");
                return None;
            }
            let addressing = state.context.detect_addressing(&state.roster, user_message);
            let factors = state.context.environmental_factors();
            debug!(topics = ?factors.topics.names(), "User message classified");
            (
                state.roster.ids().to_vec(),
                addressing,
                factors.topics,
                state.context.last_character_speaker(),
            )
        };

        let traits = self.inner.traits.resolve_all(&ids).await;
        self.select(&traits, &addressing, topics, last_speaker, Stimulus::User)
    }

    /// Pick who answers another character's line. The speaker never answers itself.
    ///
    /// The line itself should already be in the context (see [`Self::respond`]).
    pub async fn determine_reply(
        &self,
        source: CharacterId,
        utterance: &str,
        interaction_type: InteractionType,
    ) -> Option<Selection> {
        let (ids, addressing) = {
            let state = self.inner.lock();
            if !state.roster.contains(source) {
                warn!(error = %EngineError::UnknownCharacter(source), "Cannot reply to an absent character");
                return None;
            }
            let addressing = state.context.detect_addressing(&state.roster, utterance);
            (state.roster.ids().to_vec(), addressing)
        };

        let topics = classify_topics(&utterance.to_lowercase());
        let traits = self.inner.traits.resolve_all(&ids).await;
        self.select(
            &traits,
            &addressing,
            topics,
            Some(source),
            Stimulus::Character {
                source,
                interaction_type,
            },
        )
    }

    fn select(
        &self,
        traits: &TraitTable,
        addressing: &Addressing,
        topics: TopicTags,
        last_speaker: Option<CharacterId>,
        stimulus: Stimulus,
    ) -> Option<Selection> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let input = SelectionInput {
            roster: &state.roster,
            traits,
            addressing,
            topics,
            last_speaker,
            stimulus,
        };
        self.inner
            .selector
            .select(&input, &mut state.history, &mut state.rng)
    }

    /// Which bystanders react to `responder` saying `triggering_message`.
    ///
    /// Nothing is committed; see [`Self::schedule_interjections`].
    pub async fn check_for_interjections(
        &self,
        responder: CharacterId,
        triggering_message: &str,
    ) -> Vec<Interjection> {
        let ids = {
            let state = self.inner.lock();
            if !state.roster.contains(responder) {
                warn!(error = %EngineError::UnknownCharacter(responder), "No interjections for an absent responder");
                return Vec::new();
            }
            state.roster.ids().to_vec()
        };

        let topics = classify_topics(&triggering_message.to_lowercase());
        let traits = self.inner.traits.resolve_all(&ids).await;

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let found = self.inner.trigger.evaluate(
            responder,
            &state.roster,
            &traits,
            &topics,
            &state.history,
            &mut state.rng,
        );
        debug!(responder = %responder, count = found.len(), "Evaluated interjections");
        found
    }

    /// Synthesize `text` and queue it. Returns `None` if the turn had to be dropped.
    pub async fn submit_speech(
        &self,
        character: CharacterId,
        text: &str,
        emotion: Emotion,
        priority: i32,
    ) -> Option<RequestId> {
        self.speak(character, text, emotion, priority, false).await
    }

    /// Like [`Self::submit_speech`], and once playback starts, evaluate and
    /// schedule interjections against this line.
    pub async fn respond(
        &self,
        character: CharacterId,
        text: &str,
        emotion: Emotion,
        priority: i32,
    ) -> Option<RequestId> {
        self.speak(character, text, emotion, priority, true).await
    }

    async fn speak(
        &self,
        character: CharacterId,
        text: &str,
        emotion: Emotion,
        priority: i32,
        follow_up: bool,
    ) -> Option<RequestId> {
        if !self.inner.lock().roster.contains(character) {
            warn!(error = %EngineError::UnknownCharacter(character), "Dropping speech");
            return None;
        }

        let request = SynthesisRequest::new(character, text, emotion);
        let payload =
            match synthesize_with_fallback(self.inner.synthesizer.as_ref(), &request).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(character = %character, error = %e, "Dropping turn after synthesis failure");
                    if let Err(e) = self.inner.animator.speech_ended(character) {
                        warn!(character = %character, error = %e, "Animator did not reset");
                    }
                    return None;
                }
            };
        self.inner
            .lock()
            .context
            .record_character_message(character, text);

        let follow_up = if follow_up {
            match Handle::try_current() {
                Ok(runtime) => Some(FollowUp {
                    session: Arc::downgrade(&self.inner),
                    runtime,
                    responder: character,
                    text: text.to_string(),
                }),
                Err(e) => {
                    warn!(error = %e, "No runtime for interjection follow-up");
                    None
                }
            }
        } else {
            None
        };

        let hooks = TurnHooks {
            animation: AnimationHooks::new(Arc::clone(&self.inner.animator)),
            follow_up,
        };
        let request = AudioRequest::new(character, payload)
            .with_emotion(emotion)
            .with_priority(priority)
            .with_hooks(Arc::new(hooks));

        Some(self.inner.scheduler.submit(request))
    }

    /// Start a timer per interjection. Each fires onto the interjection
    /// channel unless the roster changes first. Must run inside a tokio runtime.
    ///
    /// Returns how many timers were started.
    pub fn schedule_interjections(
        &self,
        interjections: Vec<Interjection>,
        triggering_message: &str,
    ) -> usize {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, count = interjections.len(), "No runtime, interjections dropped");
                return 0;
            }
        };
        let token = self.inner.lock().cancel.clone();

        let scheduled = interjections.len();
        for interjection in interjections {
            let session = self.clone();
            let token = token.clone();
            let message = triggering_message.to_string();

            debug!(
                character = %interjection.character,
                delay_ms = interjection.delay.as_millis() as u64,
                kind = %interjection.interaction_type,
                "Interjection scheduled"
            );
            runtime.spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(character = %interjection.character, "Interjection cancelled by roster change");
                    }
                    _ = tokio::time::sleep(interjection.delay) => {
                        session.dispatch(interjection, message);
                    }
                }
            });
        }
        scheduled
    }

    fn dispatch(&self, interjection: Interjection, triggering_message: String) {
        let record = {
            let mut state = self.inner.lock();
            let present = state.roster.contains(interjection.character)
                && state.roster.contains(interjection.target);
            if !present {
                debug!(character = %interjection.character, "Interjection dropped, character left");
                return;
            }
            state.history.record(
                interjection.character,
                Some(interjection.target),
                interjection.interaction_type,
            )
        };

        info!(
            character = %interjection.character,
            target = %interjection.target,
            kind = %interjection.interaction_type,
            turn = record.turn_index,
            "Interjection due"
        );
        let due = DueInterjection {
            character: interjection.character,
            target: interjection.target,
            interaction_type: interjection.interaction_type,
            emotion: interjection.interaction_type.default_emotion(),
            triggering_message,
            turn_index: record.turn_index,
        };
        if self.inner.due_tx.send(due).is_err() {
            debug!("Interjection receiver dropped");
        }
    }

    /// Report that a request finished playing on its own.
    pub fn playback_finished(&self, id: RequestId) -> bool {
        self.inner.scheduler.complete(id)
    }

    /// Report that a request failed part-way through.
    pub fn playback_failed(&self, id: RequestId, reason: &str) -> bool {
        self.inner.scheduler.fail(id, reason)
    }

    pub fn set_queue_mode(&self, mode: QueueMode) {
        self.inner.scheduler.set_mode(mode);
    }

    pub fn clear_queue(&self) {
        self.inner.scheduler.clear();
    }

    pub fn stop_current(&self) -> Option<RequestId> {
        self.inner.scheduler.stop_current()
    }

    /// Drop a request that has not started yet.
    pub fn cancel_speech(&self, id: RequestId) -> bool {
        self.inner.scheduler.cancel_pending(id)
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.inner.scheduler.status()
    }

    /// Replace the roster. Outstanding interjections are cancelled.
    pub fn set_roster(&self, roster: ActiveRoster) {
        {
            let mut state = self.inner.lock();
            if let Some(sheets) = &self.inner.sheets {
                sheets.seed_from_roster(&roster);
            }
            info!(characters = roster.len(), "Roster replaced");
            state.roster = roster;
            state.renew_token();
        }
        self.inner.traits.invalidate_all();
    }

    /// Put a character on stage. Outstanding interjections are cancelled.
    pub async fn add_character(&self, character: Character) -> CharacterId {
        let id = {
            let mut state = self.inner.lock();
            if let (Some(sheets), false) = (&self.inner.sheets, character.traits.is_empty()) {
                sheets.upsert(character.id, character.traits.clone());
            }
            let id = state.roster.add(character);
            state.renew_token();
            id
        };
        self.inner.traits.invalidate(id).await;
        info!(character = %id, "Character joined");
        id
    }

    /// Take a character off stage. Outstanding interjections are cancelled.
    pub fn remove_character(&self, id: CharacterId) -> Option<Character> {
        let mut state = self.inner.lock();
        let removed = state.roster.remove(id);
        if removed.is_some() {
            info!(character = %id, "Character left");
            state.renew_token();
        }
        removed
    }

    pub fn roster(&self) -> ActiveRoster {
        self.inner.lock().roster.clone()
    }

    /// Forget the conversation, stop all audio, and cancel pending interjections.
    pub fn reset(&self) {
        {
            let mut state = self.inner.lock();
            state.context.clear();
            state.history.clear();
            state.renew_token();
        }
        self.inner.scheduler.clear();
        info!("Session reset");
    }

    pub fn history_snapshot(&self) -> Vec<TurnRecord> {
        self.inner.lock().history.snapshot()
    }

    pub fn recent_messages(&self, count: usize) -> Vec<Message> {
        self.inner
            .lock()
            .context
            .recent_messages(count)
            .cloned()
            .collect()
    }
}
