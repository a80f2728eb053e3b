//! The slice of the Telegram Bot API object model this service reads.

use insurance_flow::{DocumentSource, InboundMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl Message {
    /// Convert to a transport-neutral message. Only text and photo messages are
    /// meaningful to the bot; everything else yields `None`.
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        let user_id = self.chat.id;

        if let Some(photo) = self.photo.as_ref().and_then(|sizes| largest_photo(sizes)) {
            return Some(InboundMessage::photo(
                user_id,
                DocumentSource::Remote {
                    file_id: photo.file_id.clone(),
                },
            ));
        }

        self.text
            .as_ref()
            .map(|text| InboundMessage::text(user_id, text.clone()))
    }
}

fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|size| (u64::from(size.width) * u64::from(size.height), size.file_size))
}
