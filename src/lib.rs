// Library exports for the ID-photo generation workflow

// Core modules
pub mod core;
pub mod orchestration;
pub mod services;
pub mod session;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{
        ApiError, ApiErrorKind, ConfigError, PipelineError, SessionError, UploadError,
    },
    types::{
        Face, FaceDetectionResult, GenerationOptions, GenerationResult, Lighting, OutputFormat,
        PhotoSize, PhotoStyle, PipelineRun, ProgressEvent, SegmentationResult, Stage,
        UploadedImage,
    },
};

pub use orchestration::PipelineOrchestrator;

pub use services::{
    default_prompt, parse_instruction, process_upload, validate_upload, ApiClient,
    ProcessingBackend,
};

pub use session::{ChatSession, ProcessingState, Responder, SessionState, SimulatedResponder};
