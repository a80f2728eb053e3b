//! Narrow contracts for the external services the dispatcher drives.
//!
//! The core only ever sees these traits; concrete providers are chosen when the
//! service is assembled.

use async_trait::async_trait;

use crate::{
    error::Result,
    session::{Session, UserId},
};

/// Pulls structured text (client name, vehicle number) out of a document photo.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn extract(&self, document: &[u8]) -> Result<String>;
}

/// Renders the policy document for a session that accepted the price.
#[async_trait]
pub trait PolicyGenerator: Send + Sync {
    async fn generate_policy(&self, session: &Session) -> Result<String>;
}

/// Outbound side of the messaging transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<()>;

    async fn send_document(
        &self,
        user_id: &UserId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<()>;

    /// Fetch the bytes behind a transport file handle.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Free-text conversational replies from a language model.
#[async_trait]
pub trait TextAssistant: Send + Sync {
    async fn respond(&self, message: &str) -> Result<String>;
}
