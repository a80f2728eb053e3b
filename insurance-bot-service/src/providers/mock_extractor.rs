use async_trait::async_trait;
use insurance_flow::{DocumentExtractor, Result};
use std::time::Duration;
use tracing::info;

pub const SAMPLE_EXTRACTION: &str =
    "Name: Олександр Олександрович Коваленко\nVehicle Number: АА1234ВХ";

/// Stand-in for a document OCR provider: waits like a remote call and returns
/// fixed data.
pub struct MockExtractor {
    latency: Duration,
}

impl MockExtractor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl DocumentExtractor for MockExtractor {
    async fn extract(&self, document: &[u8]) -> Result<String> {
        info!(bytes = document.len(), "mock extraction");
        tokio::time::sleep(self.latency).await;
        Ok(SAMPLE_EXTRACTION.to_string())
    }
}
