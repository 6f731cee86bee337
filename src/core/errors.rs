// Error types for the workflow
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Source error chaining
//
// The remote client normalizes every transport-level fault into ApiError
// before it reaches the orchestrator; the orchestrator wraps those with
// pipeline-stage context and never inspects transport details itself.

use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a normalized remote-call failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Non-2xx status or an envelope with `success: false`
    Api,
    /// Transport fault (connection refused, DNS, broken pipe, bad body)
    Network,
    /// The per-operation budget elapsed and the request was aborted
    Timeout,
}

/// Remote processing client errors, normalized from the transport layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API request failed: {message} (code {code})")]
    Api { code: String, message: String },

    #[error("network error calling {operation}: {message}")]
    Network {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {budget:?}")]
    Timeout {
        operation: &'static str,
        budget: Duration,
    },
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Api { .. } => ApiErrorKind::Api,
            ApiError::Network { .. } => ApiErrorKind::Network,
            ApiError::Timeout { .. } => ApiErrorKind::Timeout,
        }
    }
}

/// Pipeline orchestration errors, one per failing stage
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Business-rule rejection of an otherwise successful detection result
    #[error("{reason}")]
    Validation { reason: String },

    #[error("人脸检测失败: {source}")]
    FaceDetectionFailed {
        #[source]
        source: ApiError,
    },

    #[error("人物抠图失败: {source}")]
    SegmentationFailed {
        #[source]
        source: ApiError,
    },

    #[error("证件照生成失败: {source}")]
    GenerationFailed {
        #[source]
        source: ApiError,
    },

    /// Catch-all for faults that are not remote-call failures
    #[error("处理过程中出现未知错误: {0}")]
    Unknown(String),
}

impl PipelineError {
    /// The normalized kind of the underlying remote failure, if any
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            PipelineError::FaceDetectionFailed { source }
            | PipelineError::SegmentationFailed { source }
            | PipelineError::GenerationFailed { source } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Upload validation errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("不支持的文件格式。请上传以下格式：.jpg、.jpeg、.png、.webp")]
    UnsupportedFormat,

    #[error("文件大小超过限制。最大支持 {max_mb}MB")]
    TooLarge { size: usize, max_mb: usize },

    #[error("文件名过长，请重命名文件")]
    NameTooLong,

    #[error("图片文件损坏或格式不正确")]
    Corrupt(#[source] image::ImageError),
}

/// Chat session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// A pipeline run is already in flight; one run per session at a time
    #[error("当前正在处理中，请等待完成后再发送")]
    Busy,

    #[error("请先上传照片")]
    NoImage,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API base URL must not be empty (set IDPHOTO_API_BASE_URL)")]
    EmptyBaseUrl,

    #[error("{name} timeout must be > 0")]
    InvalidTimeout { name: &'static str },

    #[error("max upload size must be > 0")]
    InvalidMaxFileSize,

    #[error("simulation delay window is inverted ({min_ms}ms > {max_ms}ms)")]
    InvalidDelayWindow { min_ms: u64, max_ms: u64 },
}

// Convenience aliases
pub type ApiResult<T> = Result<T, ApiError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type UploadResult<T> = Result<T, UploadError>;
pub type SessionResult<T> = Result<T, SessionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_kinds_are_distinct() {
        let api = ApiError::Api {
            code: "API_ERROR".to_string(),
            message: "500 Internal Server Error".to_string(),
        };
        let network = ApiError::Network {
            operation: "face-detection",
            message: "connection refused".to_string(),
        };
        let timeout = ApiError::Timeout {
            operation: "segmentation",
            budget: Duration::from_secs(20),
        };

        assert_eq!(api.kind(), ApiErrorKind::Api);
        assert_eq!(network.kind(), ApiErrorKind::Network);
        assert_eq!(timeout.kind(), ApiErrorKind::Timeout);
        assert_ne!(api.kind(), timeout.kind());
        assert_ne!(network.kind(), timeout.kind());
    }

    #[test]
    fn test_pipeline_error_exposes_wrapped_kind() {
        let err = PipelineError::SegmentationFailed {
            source: ApiError::Timeout {
                operation: "person-segmentation",
                budget: Duration::from_secs(20),
            },
        };
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Timeout));

        let validation = PipelineError::Validation {
            reason: "检测到多张人脸".to_string(),
        };
        assert_eq!(validation.api_kind(), None);
    }
}
