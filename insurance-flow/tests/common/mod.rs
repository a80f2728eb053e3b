#![allow(dead_code)]

use async_trait::async_trait;
use insurance_flow::{
    Collaborators, Dispatcher, DocumentExtractor, FlowError, InMemorySessionStore, MachineConfig,
    Messenger, PolicyGenerator, Result, Session, SessionRegistry, SessionState, SessionStore,
    StateMachine, TextAssistant, UserId,
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const EXTRACTED: &str = "Name: X\nVehicle Number: Y";

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        user_id: UserId,
        text: String,
    },
    Document {
        user_id: UserId,
        body: String,
        filename: String,
        caption: String,
    },
}

/// Messenger double that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_texts: AtomicBool,
    fail_documents: AtomicBool,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_for(&self, user_id: &UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { user_id: to, text } if &to == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn documents_for(&self, user_id: &UserId) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| matches!(sent, Sent::Document { user_id: to, .. } if to == user_id))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn add_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(file_id.to_string(), bytes);
    }

    pub fn fail_texts(&self, fail: bool) {
        self.fail_texts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_documents(&self, fail: bool) {
        self.fail_documents.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<()> {
        if self.fail_texts.load(Ordering::SeqCst) {
            return Err(FlowError::Transport("send_text unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Text {
            user_id: user_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        user_id: &UserId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<()> {
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(FlowError::Transport("send_document unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Document {
            user_id: user_id.clone(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
            filename: filename.to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| FlowError::Transport(format!("unknown file {}", file_id)))
    }
}

/// Extractor double returning a fixed result after an optional delay.
pub struct StaticExtractor {
    result: std::result::Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticExtractor {
    pub fn ok(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentExtractor for StaticExtractor {
    async fn extract(&self, _document: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result
            .clone()
            .map_err(FlowError::ExtractionFailed)
    }
}

/// Policy double that echoes the stored extraction into the document body.
pub struct EchoPolicy;

#[async_trait]
impl PolicyGenerator for EchoPolicy {
    async fn generate_policy(&self, session: &Session) -> Result<String> {
        let data = session
            .extracted_data()
            .ok_or_else(|| FlowError::PolicyGenerationFailed("no data".to_string()))?;
        Ok(format!("POLICY\n{}\nPrice: 100$", data))
    }
}

pub struct CannedAssistant(pub std::result::Result<String, String>);

#[async_trait]
impl TextAssistant for CannedAssistant {
    async fn respond(&self, _message: &str) -> Result<String> {
        self.0.clone().map_err(FlowError::AssistantFailed)
    }
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub messenger: Arc<RecordingMessenger>,
    pub registry: Arc<SessionRegistry>,
}

impl Harness {
    pub fn new(extractor: StaticExtractor) -> Self {
        Self::build(extractor, MachineConfig::default(), None)
    }

    pub fn build(
        extractor: StaticExtractor,
        config: MachineConfig,
        assistant: Option<Arc<dyn TextAssistant>>,
    ) -> Self {
        Self::assemble(extractor, config, assistant, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_store(extractor: StaticExtractor, store: Arc<dyn SessionStore>) -> Self {
        Self::assemble(extractor, MachineConfig::default(), None, store)
    }

    fn assemble(
        extractor: StaticExtractor,
        config: MachineConfig,
        assistant: Option<Arc<dyn TextAssistant>>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let messenger = Arc::new(RecordingMessenger::default());
        let registry = Arc::new(SessionRegistry::new(store));
        let collaborators = Collaborators {
            extractor: Arc::new(extractor),
            policy: Arc::new(EchoPolicy),
            messenger: messenger.clone(),
            assistant,
        };
        let dispatcher = Dispatcher::new(registry.clone(), StateMachine::new(config), collaborators);

        Self {
            dispatcher,
            messenger,
            registry,
        }
    }

    pub async fn session(&self, user_id: &UserId) -> Session {
        self.registry
            .store()
            .get_or_create(user_id)
            .await
            .unwrap()
    }

    pub async fn state(&self, user_id: &UserId) -> SessionState {
        self.session(user_id).await.state()
    }
}
