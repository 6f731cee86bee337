pub mod api_client;
pub mod instruction;
pub mod upload;

// Re-export commonly used services
pub use api_client::{ApiClient, ProcessingBackend};
pub use instruction::{default_prompt, parse_instruction};
pub use upload::{process_upload, validate_upload};
