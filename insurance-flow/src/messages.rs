//! Fixed texts the bot sends to users.

pub const START: &str =
    "Hello! 👋 I will help you purchase car insurance. Please send me photos of your passport and car document.";

pub const RETRY_PROMPT: &str = "Please send the photos again 📷";

pub const POLICY_GENERATED: &str = "Your insurance policy has been generated 📄";

pub const POLICY_CAPTION: &str = "Here is your insurance policy.";

pub const POLICY_FILENAME: &str = "policy.txt";

pub const UNKNOWN_COMMAND: &str = "Please use the commands or send documents.";

pub const UNEXPECTED_PHOTO: &str =
    "I am currently waiting for confirmation or a command, not new photos.";

pub const EXTRACTION_FAILED: &str =
    "An error occurred while processing your photo. Please try again.";

pub const APOLOGY: &str = "Sorry, something went wrong. Please try again later.";

pub const NOTHING_TO_CONFIRM: &str =
    "There is nothing to confirm yet. Please send your documents first.";

pub const CONFIRM_BEFORE_ACCEPT: &str = "Please confirm your data before accepting the price.";

pub fn confirm_prompt(price_usd: u32) -> String {
    format!(
        "✅ Data confirmed. The insurance cost is {}$. Do you agree? Type /acceptprice or /declineprice.",
        price_usd
    )
}

pub fn decline(price_usd: u32) -> String {
    format!(
        "Unfortunately, the insurance is available only at the fixed price of {}$. If you want to proceed, type /acceptprice.",
        price_usd
    )
}

pub fn extraction_summary(extracted_data: &str) -> String {
    format!(
        "Personal info is:\n{}\n\n Confirm data (/confirm) or retry again (/retry).",
        extracted_data
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_summary_layout() {
        assert_eq!(
            extraction_summary("Name: A\nVehicle Number: B"),
            "Personal info is:\nName: A\nVehicle Number: B\n\n Confirm data (/confirm) or retry again (/retry)."
        );
    }

    #[test]
    fn test_price_follows_config() {
        assert!(confirm_prompt(250).contains("The insurance cost is 250$."));
        assert!(decline(250).contains("fixed price of 250$."));
    }
}
