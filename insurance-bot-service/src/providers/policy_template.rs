use async_trait::async_trait;
use chrono::{DateTime, Utc};
use insurance_flow::{PolicyGenerator, Result, Session};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

static NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Client[ \t]+)?Name:[ \t]*(.+?)[ \t\r]*$").expect("valid name regex")
});

static VEHICLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Vehicle[ \t]+Number:[ \t]*(.+?)[ \t\r]*$").expect("valid vehicle regex")
});

const NOT_PROVIDED: &str = "Not provided";

pub const MISSING_DATA: &str = "Unable to generate policy. Extracted data is missing.";

/// Renders the plain-text policy from the extracted client name and vehicle number.
pub struct TemplatePolicyGenerator {
    price_usd: u32,
}

impl TemplatePolicyGenerator {
    pub fn new(price_usd: u32) -> Self {
        Self { price_usd }
    }

    fn render(&self, extracted_data: &str, policy_number: u32, issued_at: DateTime<Utc>) -> String {
        let client_name = capture(&NAME_LINE, extracted_data);
        let vehicle_number = capture(&VEHICLE_LINE, extracted_data);

        format!(
            "Insurance Policy No. {}\n\
             Client Name: {}\n\
             Vehicle Number: {}\n\
             Date of Issuance: {}\n\
             Price: {}$\n\
             Thank you for using our services!\n",
            policy_number,
            client_name,
            vehicle_number,
            issued_at.format("%Y-%m-%d"),
            self.price_usd
        )
    }
}

fn capture<'a>(pattern: &Regex, text: &'a str) -> &'a str {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(NOT_PROVIDED)
}

#[async_trait]
impl PolicyGenerator for TemplatePolicyGenerator {
    async fn generate_policy(&self, session: &Session) -> Result<String> {
        let Some(extracted_data) = session.extracted_data().filter(|d| !d.trim().is_empty()) else {
            return Ok(MISSING_DATA.to_string());
        };

        let policy_number = rand::random_range(10_000..=99_999);
        info!(user_id = %session.user_id(), policy_number, "rendering policy");
        Ok(self.render(extracted_data, policy_number, Utc::now()))
    }
}
