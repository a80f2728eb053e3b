//! Telegram Bot API transport: HTTP client, update model, per-chat queues and
//! long polling.

pub mod client;
pub mod polling;
pub mod queue;
pub mod types;

pub use client::TelegramClient;
pub use polling::run_polling;
pub use queue::UpdateQueue;
pub use types::Update;
