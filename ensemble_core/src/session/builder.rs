//! Session construction.

use cast_rules::ActiveRoster;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{DueInterjection, Inner, OrchestrationSession, SessionState};
use crate::audio::{AudioQueueScheduler, AudioSink, NullAudioSink};
use crate::config::EngineConfig;
use crate::conversation::ConversationContext;
use crate::history::InteractionHistory;
use crate::interjection::{ConstantRelationship, InteractionTrigger, RelationshipModel};
use crate::personality::{InMemoryTraitBackend, TraitBackend, TraitProvider};
use crate::selection::ResponderSelector;
use crate::speech::{AvatarAnimator, NullAnimator, SilentSynthesizer, SpeechSynthesizer};

/// Builds an [`OrchestrationSession`]. Every collaborator is optional.
///
/// Without a trait backend, the session keeps an [`InMemoryTraitBackend`]
/// seeded from the roster (and re-seeded on every roster change).
#[derive(Default)]
pub struct SessionBuilder {
    config: EngineConfig,
    roster: ActiveRoster,
    trait_backend: Option<Arc<dyn TraitBackend>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    animator: Option<Arc<dyn AvatarAnimator>>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    relationships: Option<Arc<dyn RelationshipModel>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn roster(mut self, roster: ActiveRoster) -> Self {
        self.roster = roster;
        self
    }

    pub fn trait_backend(mut self, backend: Arc<dyn TraitBackend>) -> Self {
        self.trait_backend = Some(backend);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn animator(mut self, animator: Arc<dyn AvatarAnimator>) -> Self {
        self.animator = Some(animator);
        self
    }

    pub fn audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    pub fn relationships(mut self, relationships: Arc<dyn RelationshipModel>) -> Self {
        self.relationships = Some(relationships);
        self
    }

    /// Build the session and the receiving end of its interjection channel.
    pub fn build(self) -> (OrchestrationSession, mpsc::UnboundedReceiver<DueInterjection>) {
        let config = self.config;

        let (sheets, backend): (Option<Arc<InMemoryTraitBackend>>, Arc<dyn TraitBackend>) =
            match self.trait_backend {
                Some(backend) => (None, backend),
                None => {
                    let sheets = Arc::new(InMemoryTraitBackend::from_roster(&self.roster));
                    let backend: Arc<dyn TraitBackend> = sheets.clone();
                    (Some(sheets), backend)
                }
            };

        let relationships = self.relationships.unwrap_or_else(|| {
            Arc::new(ConstantRelationship(config.interjection.default_relationship))
        });

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let (due_tx, due_rx) = mpsc::unbounded_channel();

        info!(
            characters = self.roster.len(),
            mode = %config.queue.initial_mode,
            seeded = config.rng_seed.is_some(),
            "Orchestration session created"
        );

        let inner = Inner {
            state: Mutex::new(SessionState {
                roster: self.roster,
                context: ConversationContext::new(&config.context),
                history: InteractionHistory::new(config.context.max_turns),
                rng,
                cancel: CancellationToken::new(),
            }),
            traits: TraitProvider::new(backend, &config.traits),
            sheets,
            selector: ResponderSelector::new(config.selection.clone()),
            trigger: InteractionTrigger::new(config.interjection.clone(), relationships),
            scheduler: AudioQueueScheduler::new(
                &config.queue,
                self.audio_sink.unwrap_or_else(|| Arc::new(NullAudioSink)),
            ),
            synthesizer: self
                .synthesizer
                .unwrap_or_else(|| Arc::new(SilentSynthesizer)),
            animator: self.animator.unwrap_or_else(|| Arc::new(NullAnimator)),
            due_tx,
            config,
        };

        (
            OrchestrationSession {
                inner: Arc::new(inner),
            },
            due_rx,
        )
    }
}
