//! Playback hooks attached to every spoken turn.

use cast_rules::CharacterId;
use std::sync::Weak;
use tokio::runtime::Handle;
use tracing::debug;

use super::{Inner, OrchestrationSession};
use crate::audio::{PlaybackHooks, PlaybackOutcome, RequestSummary};
use crate::error::EngineResult;
use crate::speech::AnimationHooks;

/// Evaluates bystanders once the responder is actually audible.
pub(crate) struct FollowUp {
    pub(crate) session: Weak<Inner>,
    pub(crate) runtime: Handle,
    pub(crate) responder: CharacterId,
    pub(crate) text: String,
}

impl FollowUp {
    fn launch(&self) {
        let Some(inner) = self.session.upgrade() else {
            debug!(character = %self.responder, "Session gone, skipping interjection check");
            return;
        };
        let session = OrchestrationSession { inner };
        let responder = self.responder;
        let text = self.text.clone();

        self.runtime.spawn(async move {
            let found = session.check_for_interjections(responder, &text).await;
            if !found.is_empty() {
                session.schedule_interjections(found, &text);
            }
        });
    }
}

pub(crate) struct TurnHooks {
    pub(crate) animation: AnimationHooks,
    pub(crate) follow_up: Option<FollowUp>,
}

impl PlaybackHooks for TurnHooks {
    fn on_start(&self, request: &RequestSummary) -> EngineResult<()> {
        let animated = self.animation.on_start(request);
        if let Some(follow_up) = &self.follow_up {
            follow_up.launch();
        }
        animated
    }

    fn on_end(&self, request: &RequestSummary, outcome: &PlaybackOutcome) -> EngineResult<()> {
        self.animation.on_end(request, outcome)
    }
}
