pub mod collaborators;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod machine;
pub mod messages;
pub mod registry;
pub mod session;
pub mod storage;
pub mod storage_postgres;

// Re-export commonly used types
pub use collaborators::{DocumentExtractor, Messenger, PolicyGenerator, TextAssistant};
pub use dispatch::{Collaborators, Dispatcher};
pub use error::{FlowError, Result};
pub use event::{DocumentSource, Event, InboundMessage, InboundPayload};
pub use machine::{MachineConfig, OutOfStatePolicy, Outcome, StateMachine};
pub use registry::{SessionLease, SessionRegistry};
pub use session::{Session, SessionState, UserId};
pub use storage::{InMemorySessionStore, SessionStore};
pub use storage_postgres::PostgresSessionStore;
