use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FlowError;

/// Opaque identity of a user as handed to us by the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Stage of a user's insurance purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingDocuments,
    AwaitingConfirmation,
    Confirmed,
    PriceAccepted,
}

impl SessionState {
    /// States in which the session must carry extracted document data.
    pub fn holds_extracted_data(self) -> bool {
        matches!(
            self,
            SessionState::AwaitingConfirmation
                | SessionState::Confirmed
                | SessionState::PriceAccepted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingDocuments => "awaiting_documents",
            SessionState::AwaitingConfirmation => "awaiting_confirmation",
            SessionState::Confirmed => "confirmed",
            SessionState::PriceAccepted => "price_accepted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionState::Idle),
            "awaiting_documents" => Ok(SessionState::AwaitingDocuments),
            "awaiting_confirmation" => Ok(SessionState::AwaitingConfirmation),
            "confirmed" => Ok(SessionState::Confirmed),
            "price_accepted" => Ok(SessionState::PriceAccepted),
            other => Err(FlowError::InvalidState(format!(
                "unknown session state '{}'",
                other
            ))),
        }
    }
}

/// Per-user conversation record.
///
/// State and extracted data only change together through [`Session::enter`] and
/// [`Session::record_extraction`], which keeps `extracted_data` present exactly
/// when the state is one that requires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    user_id: UserId,
    state: SessionState,
    extracted_data: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            state: SessionState::Idle,
            extracted_data: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Rebuild a session loaded from a persistent backend.
    pub fn restore(
        user_id: UserId,
        state: SessionState,
        extracted_data: Option<String>,
        created_at: DateTime<Utc>,
        last_activity: DateTime<Utc>,
    ) -> Result<Self, FlowError> {
        let has_data = extracted_data
            .as_deref()
            .is_some_and(|data| !data.trim().is_empty());
        if has_data != state.holds_extracted_data() {
            return Err(FlowError::InvalidState(format!(
                "session {} in state {} has inconsistent extracted data",
                user_id, state
            )));
        }

        Ok(Self {
            user_id,
            state,
            extracted_data,
            created_at,
            last_activity,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn extracted_data(&self) -> Option<&str> {
        self.extracted_data.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Move to `state`. Data is dropped when the target state does not carry it.
    pub fn enter(&mut self, state: SessionState) {
        if !state.holds_extracted_data() {
            self.extracted_data = None;
        }
        self.state = state;
    }

    /// Store a successful extraction and wait for the user's confirmation.
    pub fn record_extraction(&mut self, data: impl Into<String>) {
        self.extracted_data = Some(data.into());
        self.state = SessionState::AwaitingConfirmation;
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_consistent(&self) -> bool {
        let has_data = self
            .extracted_data
            .as_deref()
            .is_some_and(|data| !data.trim().is_empty());
        has_data == self.state.holds_extracted_data()
    }
}
