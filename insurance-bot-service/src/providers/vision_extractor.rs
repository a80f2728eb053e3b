use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use insurance_flow::{DocumentExtractor, FlowError, Result};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const EXTRACTION_PROMPT: &str = "You are a document OCR system for a car insurance service. \
The image is a passport or a vehicle registration document. \
Extract the holder's full name and the vehicle registration number. \
Respond with EXACTLY these two lines and nothing else:\n\
Name: <full name>\n\
Vehicle Number: <registration number>\n\
Use 'Not provided' for a value you cannot read. \
If the image is not an identity or vehicle document, respond with NONE.";

/// Document extraction through an OpenRouter vision model.
pub struct VisionExtractor {
    http: Client,
    api_key: String,
    model: String,
}

impl VisionExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn call_openrouter_api(&self, content: Vec<Value>) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": 200
        });

        let response = self
            .http
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM API request failed: {}", response.status()));
        }

        let response_json: Value = response.json().await?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid response format from LLM"))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl DocumentExtractor for VisionExtractor {
    async fn extract(&self, document: &[u8]) -> Result<String> {
        if document.is_empty() {
            return Err(FlowError::ExtractionFailed("empty document".to_string()));
        }

        info!(
            model = %self.model,
            bytes = document.len(),
            "extracting document data with LLM vision"
        );

        let content = vec![
            json!({ "type": "text", "text": EXTRACTION_PROMPT }),
            json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image_mime(document), STANDARD.encode(document))
                }
            }),
        ];

        let raw = self
            .call_openrouter_api(content)
            .await
            .map_err(|e| FlowError::ExtractionFailed(e.to_string()))?;

        normalize_extraction(&raw).ok_or_else(|| {
            warn!(chars = raw.len(), "vision model returned no usable fields");
            FlowError::ExtractionFailed("no document fields recognized".to_string())
        })
    }
}

/// Best-effort image type sniffing for the data URL.
fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Keep only the two expected lines, in a fixed order.
fn normalize_extraction(raw: &str) -> Option<String> {
    let mut name = None;
    let mut vehicle = None;

    for line in raw.lines() {
        let cleaned = line.replace('*', "");
        let line = cleaned.trim();
        if let Some(value) = line.strip_prefix("Vehicle Number:") {
            vehicle.get_or_insert_with(|| value.trim().to_string());
        } else if let Some(value) = line
            .strip_prefix("Client Name:")
            .or_else(|| line.strip_prefix("Name:"))
        {
            name.get_or_insert_with(|| value.trim().to_string());
        }
    }

    let name = name.filter(|v| !v.is_empty());
    let vehicle = vehicle.filter(|v| !v.is_empty());
    if name.is_none() && vehicle.is_none() {
        return None;
    }

    Some(format!(
        "Name: {}\nVehicle Number: {}",
        name.unwrap_or_else(|| "Not provided".to_string()),
        vehicle.unwrap_or_else(|| "Not provided".to_string())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extraction() {
        let raw = "Sure!\n**Name:** Jane Doe\nVehicle Number: AB1234CD\nAnything else?";
        assert_eq!(
            normalize_extraction(raw).as_deref(),
            Some("Name: Jane Doe\nVehicle Number: AB1234CD")
        );

        assert_eq!(
            normalize_extraction("Vehicle Number: KA0001AA").as_deref(),
            Some("Name: Not provided\nVehicle Number: KA0001AA")
        );

        assert!(normalize_extraction("NONE").is_none());
        assert!(normalize_extraction("Name: \nVehicle Number:").is_none());
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(image_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }

    /// Test extraction against the live API
    /// Usage: OPENROUTER_API_KEY=key VISION_TEST_IMAGE=path cargo test test_live_vision_extraction
    #[tokio::test]
    async fn test_live_vision_extraction() -> anyhow::Result<()> {
        let (Ok(api_key), Ok(path)) = (
            std::env::var("OPENROUTER_API_KEY"),
            std::env::var("VISION_TEST_IMAGE"),
        ) else {
            println!("Skipping test - set OPENROUTER_API_KEY and VISION_TEST_IMAGE");
            return Ok(());
        };

        let extractor = VisionExtractor::new(api_key, "openai/gpt-4.1-mini")?;
        let image = tokio::fs::read(path).await?;
        match extractor.extract(&image).await {
            Ok(data) => {
                println!("Extracted: {}", data);
                assert!(data.starts_with("Name: "));
            }
            Err(e) => println!("Extraction failed: {}", e),
        }
        Ok(())
    }
}
