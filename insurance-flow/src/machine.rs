//! Pure transition logic: `(session, event) -> outcome`.
//!
//! Nothing in here performs I/O. The dispatcher executes whatever the returned
//! [`Outcome`] asks for and commits the resulting state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{FlowError, Result},
    event::{DocumentSource, Event},
    messages,
    session::{Session, SessionState},
};

/// What to do with commands that do not apply in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfStatePolicy {
    /// Drop the command without replying.
    #[default]
    Silent,
    /// Tell the user why nothing happened.
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    pub out_of_state: OutOfStatePolicy,
    /// Answer free text through the text-generation collaborator.
    pub assistant_replies: bool,
    pub price_usd: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            out_of_state: OutOfStatePolicy::Silent,
            assistant_replies: false,
            price_usd: 100,
        }
    }
}

/// Decision produced for a `(state, event)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send a text, leave the session alone.
    Reply(String),
    /// Send a text and move the session to the given state.
    ReplyAndPersist(String, SessionState),
    /// Run extraction on the document, then finish with [`StateMachine::complete_extraction`].
    ExtractThenReply(DocumentSource),
    /// Generate the policy for this session snapshot and deliver it.
    GeneratePolicyAndSend(Session),
    /// Ask the text-generation collaborator to answer the user's text.
    AssistantReply(String),
    Ignore,
}

#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    config: MachineConfig,
}

impl StateMachine {
    pub fn new(config: MachineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn decide(&self, session: &Session, event: Event) -> Outcome {
        let state = session.state();
        debug!(state = %state, event = event.name(), "deciding transition");

        match (state, event) {
            (_, Event::StartCommand) => Outcome::ReplyAndPersist(
                messages::START.to_string(),
                SessionState::AwaitingDocuments,
            ),

            (SessionState::AwaitingDocuments, Event::PhotoSubmitted(source)) => {
                Outcome::ExtractThenReply(source)
            }
            (_, Event::PhotoSubmitted(_)) => {
                Outcome::Reply(messages::UNEXPECTED_PHOTO.to_string())
            }

            (SessionState::AwaitingConfirmation, Event::ConfirmCommand) => {
                Outcome::ReplyAndPersist(
                    messages::confirm_prompt(self.config.price_usd),
                    SessionState::Confirmed,
                )
            }
            (_, Event::ConfirmCommand) => self.out_of_state(messages::NOTHING_TO_CONFIRM),

            (_, Event::RetryCommand) => Outcome::ReplyAndPersist(
                messages::RETRY_PROMPT.to_string(),
                SessionState::AwaitingDocuments,
            ),

            (SessionState::Confirmed, Event::AcceptPriceCommand) => {
                Outcome::GeneratePolicyAndSend(session.clone())
            }
            (_, Event::AcceptPriceCommand) => {
                self.out_of_state(messages::CONFIRM_BEFORE_ACCEPT)
            }

            (_, Event::DeclinePriceCommand) => {
                Outcome::Reply(messages::decline(self.config.price_usd))
            }

            (_, Event::UnrecognizedText(text)) => {
                if self.config.assistant_replies && !text.trim().is_empty() {
                    Outcome::AssistantReply(text)
                } else {
                    Outcome::Reply(messages::UNKNOWN_COMMAND.to_string())
                }
            }
        }
    }

    /// Second half of the photo transition, once the extraction call returned.
    ///
    /// On success the data is stored and the session waits for confirmation.
    /// On failure, or when the extractor produced nothing, the session is left
    /// in `AwaitingDocuments`.
    pub fn complete_extraction(&self, session: &mut Session, extracted: Result<String>) -> String {
        let extracted = extracted.and_then(|data| {
            if data.trim().is_empty() {
                Err(FlowError::ExtractionFailed("no data extracted".to_string()))
            } else {
                Ok(data)
            }
        });

        match extracted {
            Ok(data) => {
                let reply = messages::extraction_summary(&data);
                session.record_extraction(data);
                reply
            }
            Err(_) => messages::EXTRACTION_FAILED.to_string(),
        }
    }

    fn out_of_state(&self, notice: &str) -> Outcome {
        match self.config.out_of_state {
            OutOfStatePolicy::Silent => Outcome::Ignore,
            OutOfStatePolicy::Notify => Outcome::Reply(notice.to_string()),
        }
    }
}
