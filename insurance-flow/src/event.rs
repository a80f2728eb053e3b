use std::fmt;

use crate::session::UserId;

/// Where the bytes of a submitted document live.
#[derive(Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Bytes already in hand.
    Inline(Vec<u8>),
    /// A transport-side file handle, downloaded only when extraction runs.
    Remote { file_id: String },
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
            DocumentSource::Remote { file_id } => write!(f, "Remote({})", file_id),
        }
    }
}

/// A classified inbound action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartCommand,
    PhotoSubmitted(DocumentSource),
    ConfirmCommand,
    RetryCommand,
    AcceptPriceCommand,
    DeclinePriceCommand,
    UnrecognizedText(String),
}

impl Event {
    /// Classify a text message. Commands are matched exactly after trimming,
    /// and the `/command@BotName` form used in group chats is accepted.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let command = match trimmed.split_once('@') {
            Some((command, bot)) if command.starts_with('/') && !bot.contains(' ') => command,
            _ => trimmed,
        };

        match command {
            "/start" => Event::StartCommand,
            "/confirm" => Event::ConfirmCommand,
            "/retry" => Event::RetryCommand,
            "/acceptprice" => Event::AcceptPriceCommand,
            "/declineprice" => Event::DeclinePriceCommand,
            _ => Event::UnrecognizedText(text.to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::StartCommand => "start",
            Event::PhotoSubmitted(_) => "photo",
            Event::ConfirmCommand => "confirm",
            Event::RetryCommand => "retry",
            Event::AcceptPriceCommand => "accept_price",
            Event::DeclinePriceCommand => "decline_price",
            Event::UnrecognizedText(_) => "unrecognized_text",
        }
    }
}

/// Transport-neutral payload of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    Text(String),
    Photo(DocumentSource),
}

/// One message from one user, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub payload: InboundPayload,
}

impl InboundMessage {
    pub fn text(user_id: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            payload: InboundPayload::Text(text.into()),
        }
    }

    pub fn photo(user_id: impl Into<UserId>, source: DocumentSource) -> Self {
        Self {
            user_id: user_id.into(),
            payload: InboundPayload::Photo(source),
        }
    }

    pub fn into_event(self) -> (UserId, Event) {
        let event = match self.payload {
            InboundPayload::Text(text) => Event::from_text(&text),
            InboundPayload::Photo(source) => Event::PhotoSubmitted(source),
        };
        (self.user_id, event)
    }
}
