// Concrete collaborators the service can be assembled with
pub mod assistant;
pub mod mock_extractor;
pub mod policy_template;
pub mod utils;
pub mod vision_extractor;

pub use assistant::RigAssistant;
pub use mock_extractor::MockExtractor;
pub use policy_template::TemplatePolicyGenerator;
pub use vision_extractor::VisionExtractor;
