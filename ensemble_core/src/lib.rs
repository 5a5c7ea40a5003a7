//! # Ensemble Core
//!
//! The turn-taking engine for a multi-character companion. It decides which
//! character answers each message, whether the others chime in, and in what
//! order their speech reaches the speaker. Character data lives in
//! `cast_rules`; this crate only reads it.
//!
//! ## Core Components
//!
//! - **conversation**: Rolling message history, addressing detection, topic tags
//! - **history**: Bounded log of committed turns
//! - **personality**: Trait resolution with caching and default fallback
//! - **selection**: Weighted responder lottery with a direct-address short-circuit
//! - **interjection**: Two-stage bystander reactions with personality-driven delays
//! - **audio**: Single-speaker admission scheduler (queue, interrupt, priority)
//! - **speech**: Synthesis and avatar animation seams
//! - **session**: The facade tying it all together
//!
//! ## Design Philosophy
//!
//! - **Degrade, don't halt**: collaborator failures fall back or drop a turn, never the loop
//! - **Pure scoring**: every probability factor is a plain function; randomness is injected
//! - **One speaker**: all audio goes through one scheduler that owns the queue state

pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod interjection;
pub mod personality;
pub mod selection;
pub mod session;
pub mod speech;

pub use audio::{
    AudioPayload, AudioQueueScheduler, AudioRequest, AudioSink, NullAudioSink, PlaybackHooks,
    PlaybackOutcome, QueueMode, QueueStatus, RequestId, RequestState, RequestSummary,
};
pub use config::EngineConfig;
pub use conversation::{classify_topics, Addressing, ConversationContext, TopicTags};
pub use error::{EngineError, EngineResult};
pub use history::{InteractionHistory, TurnRecord};
pub use interjection::{ConstantRelationship, InteractionTrigger, Interjection, RelationshipModel};
pub use personality::{InMemoryTraitBackend, TraitBackend, TraitProvider};
pub use selection::{ResponderSelector, Selection, SelectionReason};
pub use session::{DueInterjection, OrchestrationSession, SessionBuilder};
pub use speech::{AvatarAnimator, SpeechSynthesizer, SynthesisRequest};
