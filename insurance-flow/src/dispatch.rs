//! Dispatcher – routes one inbound message through the state machine, runs the
//! side effects the machine asks for, and commits the new session state.
//!
//! Every message is an independent unit of work. Run as many `handle` calls
//! concurrently as the transport delivers; the [`SessionRegistry`] lease keeps
//! events for the same user from interleaving their read-modify-write cycles.
//!
//! Extraction is a suspension point: the lease is released while the extractor
//! runs and re-acquired for the commit, and the result is only applied if the
//! session is still waiting for documents.
//!
//! Failures stay scoped to the user's event. Transport and collaborator errors
//! are logged, the user gets an apology, and the session is not committed.

use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    collaborators::{DocumentExtractor, Messenger, PolicyGenerator, TextAssistant},
    error::Result,
    event::{DocumentSource, Event, InboundMessage},
    machine::{Outcome, StateMachine},
    messages,
    registry::SessionRegistry,
    session::{SessionState, UserId},
};

/// The external services a dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub policy: Arc<dyn PolicyGenerator>,
    pub messenger: Arc<dyn Messenger>,
    pub assistant: Option<Arc<dyn TextAssistant>>,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    machine: Arc<StateMachine>,
    collaborators: Collaborators,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        machine: StateMachine,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            registry,
            machine: Arc::new(machine),
            collaborators,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Process one inbound message end to end.
    pub async fn handle(&self, message: InboundMessage) -> Result<()> {
        let (user_id, event) = message.into_event();
        let span = info_span!("dispatch", user_id = %user_id, event = event.name());

        async {
            let result = self.process(&user_id, event).await;
            if let Err(e) = &result {
                error!(error = %e, "failed to handle event");
                self.apologize(&user_id).await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process(&self, user_id: &UserId, event: Event) -> Result<()> {
        let mut lease = self.registry.checkout(user_id).await?;
        let previous = lease.session().state();
        let outcome = self.machine.decide(lease.session(), event);

        match outcome {
            Outcome::Ignore => {
                debug!(state = %previous, "command does not apply, ignoring");
                lease.commit().await
            }
            Outcome::Reply(text) => {
                self.send_text(user_id, &text).await?;
                lease.commit().await
            }
            Outcome::ReplyAndPersist(text, next) => {
                self.send_text(user_id, &text).await?;
                lease.session_mut().enter(next);
                lease.commit().await?;
                info!(from = %previous, to = %next, "session transitioned");
                Ok(())
            }
            Outcome::ExtractThenReply(source) => {
                drop(lease);
                self.extract_and_reply(user_id, source).await
            }
            Outcome::GeneratePolicyAndSend(snapshot) => {
                let policy = self.collaborators.policy.generate_policy(&snapshot).await?;

                self.send_text(user_id, messages::POLICY_GENERATED).await?;
                self.collaborators
                    .messenger
                    .send_document(
                        user_id,
                        policy.into_bytes(),
                        messages::POLICY_FILENAME,
                        messages::POLICY_CAPTION,
                    )
                    .await?;

                let next = SessionState::PriceAccepted;
                lease.session_mut().enter(next);
                lease.commit().await?;
                info!(from = %previous, to = %next, "policy delivered");
                Ok(())
            }
            Outcome::AssistantReply(text) => {
                let reply = self.assistant_reply(&text).await;
                self.send_text(user_id, &reply).await?;
                lease.commit().await
            }
        }
    }

    async fn extract_and_reply(&self, user_id: &UserId, source: DocumentSource) -> Result<()> {
        let extracted = match self.fetch_document(source).await {
            Ok(document) => {
                let extractor = &self.collaborators.extractor;
                info!(
                    extractor = extractor.name(),
                    bytes = document.len(),
                    "extracting document data"
                );
                extractor.extract(&document).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &extracted {
            warn!(error = %e, "document extraction failed");
        }

        let mut lease = self.registry.checkout(user_id).await?;
        match lease.session().state() {
            SessionState::AwaitingDocuments => {}
            // Nothing else moves a session back to Idle.
            SessionState::Idle => {
                warn!("session was evicted during extraction, discarding result");
                return Ok(());
            }
            state => {
                info!(
                    state = %state,
                    "session moved on during extraction, discarding result"
                );
                return Ok(());
            }
        }

        let reply = self
            .machine
            .complete_extraction(lease.session_mut(), extracted);
        self.send_text(user_id, &reply).await?;

        let state = lease.session().state();
        lease.commit().await?;
        if state == SessionState::AwaitingConfirmation {
            info!(to = %state, "document data extracted");
        }
        Ok(())
    }

    async fn fetch_document(&self, source: DocumentSource) -> Result<Vec<u8>> {
        match source {
            DocumentSource::Inline(bytes) => Ok(bytes),
            DocumentSource::Remote { file_id } => {
                self.collaborators.messenger.download(&file_id).await
            }
        }
    }

    async fn assistant_reply(&self, text: &str) -> String {
        let Some(assistant) = &self.collaborators.assistant else {
            return messages::UNKNOWN_COMMAND.to_string();
        };

        match assistant.respond(text).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => messages::UNKNOWN_COMMAND.to_string(),
            Err(e) => {
                warn!(error = %e, "assistant failed, falling back to canned reply");
                messages::UNKNOWN_COMMAND.to_string()
            }
        }
    }

    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<()> {
        self.collaborators.messenger.send_text(user_id, text).await
    }

    async fn apologize(&self, user_id: &UserId) {
        if let Err(e) = self.send_text(user_id, messages::APOLOGY).await {
            warn!(error = %e, "could not deliver apology");
        }
    }
}
