use async_trait::async_trait;
use insurance_flow::{FlowError, Result, TextAssistant};
use rig::{agent::Agent, completion::Prompt, providers::openrouter};
use tracing::info;

use super::utils::get_llm_agent;

const ASSISTANT_PROMPT: &str = r#"
You are the assistant of a car insurance Telegram bot.

The purchase flow is fixed:
1. /start, then the user sends photos of their passport and vehicle document
2. The bot shows the extracted data; the user types /confirm or /retry
3. The price is a fixed 100$; the user types /acceptprice or /declineprice
4. The bot sends the generated policy document

Answer the user's question briefly and politely, in the user's language.
Always point the user to the next command they should use.
Never promise a different price, discounts, or coverage details you do not know.
"#;

/// Free-text replies from an OpenRouter-hosted model.
pub struct RigAssistant {
    agent: Agent<openrouter::CompletionModel>,
}

impl RigAssistant {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            agent: get_llm_agent(api_key, model, ASSISTANT_PROMPT),
        }
    }
}

#[async_trait]
impl TextAssistant for RigAssistant {
    async fn respond(&self, message: &str) -> Result<String> {
        info!(chars = message.len(), "asking assistant");
        let reply = self
            .agent
            .prompt(message)
            .await
            .map_err(|e| FlowError::AssistantFailed(e.to_string()))?;
        Ok(reply.trim().to_string())
    }
}
