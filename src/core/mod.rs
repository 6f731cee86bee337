// Core module exports

pub mod config;
pub mod errors;
pub mod types;

pub use config::Config;
pub use errors::{
    ApiError, ApiErrorKind, ConfigError, PipelineError, SessionError, UploadError,
};
