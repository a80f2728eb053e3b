use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use insurance_flow::{FlowError, Messenger, UserId};
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::types::{ApiResponse, File, Update, User};

/// Minimal Telegram Bot API client.
///
/// Errors never carry request URLs: the bot token is part of every URL.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> anyhow::Result<T> {
        debug!(method, "calling Telegram API");
        let response = self
            .http
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!("{} request failed: {}", method, e.without_url()))?;

        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> anyhow::Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| anyhow!("{} returned an unreadable body ({}): {}", method, status, e.without_url()))?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(anyhow!(
                "{} failed with {} (code {:?}): {}",
                method,
                status,
                body.error_code,
                body.description.unwrap_or_else(|| "no description".to_string())
            )),
        }
    }

    pub async fn get_me(&self) -> anyhow::Result<User> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates. `timeout_secs` must stay below the HTTP client timeout.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> anyhow::Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", &payload).await
    }

    pub async fn get_file(&self, file_id: &str) -> anyhow::Result<File> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    pub async fn download_file(&self, file_path: &str) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}/file/bot{}/{}", self.api_url, self.token, file_path);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("file download failed: {}", e.without_url()))?;

        if !response.status().is_success() {
            return Err(anyhow!("file download failed: {}", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| anyhow!("file download interrupted: {}", e.without_url()))?;
        Ok(bytes.to_vec())
    }

    pub async fn send_message(&self, chat_id: &UserId, text: &str) -> anyhow::Result<()> {
        let _: Value = self
            .call(
                "sendMessage",
                &json!({ "chat_id": chat_id_value(chat_id), "text": text }),
            )
            .await?;
        Ok(())
    }

    pub async fn send_document(
        &self,
        chat_id: &UserId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> anyhow::Result<()> {
        let document = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/plain")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", document);

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow!("sendDocument request failed: {}", e.without_url()))?;

        let _: Value = Self::unwrap_response("sendDocument", response).await?;
        Ok(())
    }
}

fn chat_id_value(chat_id: &UserId) -> Value {
    match chat_id.as_str().parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(chat_id.as_str()),
    }
}

fn transport_error(e: anyhow::Error) -> FlowError {
    FlowError::Transport(format!("{:#}", e))
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, user_id: &UserId, text: &str) -> insurance_flow::Result<()> {
        self.send_message(user_id, text)
            .await
            .map_err(transport_error)
    }

    async fn send_document(
        &self,
        user_id: &UserId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> insurance_flow::Result<()> {
        TelegramClient::send_document(self, user_id, bytes, filename, caption)
            .await
            .map_err(transport_error)
    }

    async fn download(&self, file_id: &str) -> insurance_flow::Result<Vec<u8>> {
        let file = self.get_file(file_id).await.map_err(transport_error)?;
        let file_path = file
            .file_path
            .ok_or_else(|| FlowError::Transport(format!("file {} has no download path", file.file_id)))?;
        self.download_file(&file_path).await.map_err(transport_error)
    }
}
