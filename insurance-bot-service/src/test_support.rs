//! Doubles shared by the service's unit tests.

use async_trait::async_trait;
use insurance_flow::{
    Collaborators, Dispatcher, InMemorySessionStore, Messenger, SessionRegistry, StateMachine,
    UserId,
};
use serde_json::json;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    providers::{MockExtractor, TemplatePolicyGenerator},
    telegram::Update,
};

/// Messenger that records texts per chat and serves any file.
#[derive(Default)]
pub struct RecordingMessenger {
    texts: Mutex<Vec<(UserId, String)>>,
}

impl RecordingMessenger {
    pub fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn texts_for(&self, user_id: &UserId) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, user_id: &UserId, text: &str) -> insurance_flow::Result<()> {
        self.texts
            .lock()
            .unwrap()
            .push((user_id.clone(), text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        _user_id: &UserId,
        _bytes: Vec<u8>,
        _filename: &str,
        _caption: &str,
    ) -> insurance_flow::Result<()> {
        Ok(())
    }

    async fn download(&self, _file_id: &str) -> insurance_flow::Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8])
    }
}

pub fn test_dispatcher() -> (Dispatcher, Arc<RecordingMessenger>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let registry = Arc::new(SessionRegistry::new(Arc::new(InMemorySessionStore::new())));
    let dispatcher = Dispatcher::new(
        registry,
        StateMachine::default(),
        Collaborators {
            extractor: Arc::new(MockExtractor::new(Duration::ZERO)),
            policy: Arc::new(TemplatePolicyGenerator::new(100)),
            messenger: messenger.clone(),
            assistant: None,
        },
    );
    (dispatcher, messenger)
}

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "message": { "message_id": update_id, "chat": { "id": chat_id }, "text": text }
    }))
    .unwrap()
}

pub fn photo_update(update_id: i64, chat_id: i64) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": { "id": chat_id },
            "photo": [
                { "file_id": "small", "width": 90, "height": 60 },
                { "file_id": "large", "width": 1280, "height": 853 }
            ]
        }
    }))
    .unwrap()
}
