// Remote Processing Client
//
// Typed wrapper around the four remote operations (face detection, person
// segmentation, ID photo generation, health check). Every call attaches a
// fresh request id and the bearer credential, enforces its per-operation
// timeout budget, and normalizes all failure modes (non-2xx status, envelope
// with success=false, abort, transport fault) into the ApiError taxonomy
// before they reach the orchestrator. The client performs no retries; a
// failed run is re-invoked by the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::core::config::Config;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::types::{
    ApiEnvelope, FaceDetectionResult, GenerationOptions, GenerationResult, SegmentationResult,
};

// Remote service endpoints
const FACE_DETECTION: &str = "/api/face-detection";
const PERSON_SEGMENTATION: &str = "/api/person-segmentation";
const ID_PHOTO_GENERATION: &str = "/api/id-photo-generation";
const HEALTH_CHECK: &str = "/api/health";

// Request constants for face detection
const MIN_CONFIDENCE: f32 = 0.7;
const MAX_FACES: u32 = 10;

/// The remote service boundary consumed by the orchestrator.
///
/// Production uses [`ApiClient`]; tests substitute call-counting doubles.
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    async fn detect_faces(&self, image_base64: &str) -> ApiResult<FaceDetectionResult>;

    async fn segment_person(&self, image_base64: &str) -> ApiResult<SegmentationResult>;

    async fn generate_id_photo(
        &self,
        segmented_image: &str,
        options: &GenerationOptions,
        prompt: &str,
    ) -> ApiResult<GenerationResult>;

    /// Liveness probe; any failure maps to `false`.
    async fn health_check(&self) -> bool;
}

/// HTTP client for the remote processing service
pub struct ApiClient {
    config: Arc<Config>,
    http_client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: Arc<Config>) -> ApiResult<Self> {
        // Pooled HTTP client; per-operation budgets are enforced around each
        // request rather than on the client itself.
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Network {
                operation: "client-init",
                message: e.to_string(),
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// POST a JSON body and unwrap the success envelope, normalizing every
    /// failure mode into ApiError.
    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        endpoint: &str,
        body: &serde_json::Value,
        budget: Duration,
    ) -> ApiResult<T> {
        let url = format!("{}{}", self.config.api.base_url, endpoint);
        let request_id = Uuid::new_v4().to_string();

        debug!(operation, %request_id, "sending request");

        let request = self
            .http_client
            .post(&url)
            .header("X-Request-ID", &request_id)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api.api_key),
            )
            .header("X-Client-Version", &self.config.api.client_version)
            .json(body);

        // The budget covers the whole exchange: connect, send, and body read.
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(budget, exchange).await {
            Err(_) => {
                warn!(operation, ?budget, "request aborted on timeout");
                return Err(ApiError::Timeout { operation, budget });
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(ApiError::Timeout { operation, budget });
            }
            Ok(Err(e)) => {
                return Err(ApiError::Network {
                    operation,
                    message: e.to_string(),
                });
            }
            Ok(Ok(pair)) => pair,
        };

        if !status.is_success() {
            return Err(ApiError::Api {
                code: "API_ERROR".to_string(),
                message: format!("{} {}", status.as_u16(), text.trim()),
            });
        }

        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&text).map_err(|e| ApiError::Network {
                operation,
                message: format!("invalid response body: {}", e),
            })?;

        if !envelope.success {
            let (code, message) = envelope
                .error
                .map(|e| (e.code, e.message))
                .unwrap_or_else(|| ("API_ERROR".to_string(), "API request failed".to_string()));
            return Err(ApiError::Api { code, message });
        }

        envelope.data.ok_or_else(|| ApiError::Api {
            code: "API_ERROR".to_string(),
            message: "success envelope carried no data".to_string(),
        })
    }
}

#[async_trait]
impl ProcessingBackend for ApiClient {
    #[instrument(skip(self, image_base64))]
    async fn detect_faces(&self, image_base64: &str) -> ApiResult<FaceDetectionResult> {
        let body = serde_json::json!({
            "image": image_base64,
            "minConfidence": MIN_CONFIDENCE,
            "maxFaces": MAX_FACES,
        });

        self.post_json(
            "face-detection",
            FACE_DETECTION,
            &body,
            self.config.api.face_detection_timeout,
        )
        .await
    }

    #[instrument(skip(self, image_base64))]
    async fn segment_person(&self, image_base64: &str) -> ApiResult<SegmentationResult> {
        let body = serde_json::json!({
            "image": image_base64,
            "model": "deeplabv3",
            "outputFormat": "png",
        });

        self.post_json(
            "person-segmentation",
            PERSON_SEGMENTATION,
            &body,
            self.config.api.segmentation_timeout,
        )
        .await
    }

    #[instrument(skip(self, segmented_image, options, prompt))]
    async fn generate_id_photo(
        &self,
        segmented_image: &str,
        options: &GenerationOptions,
        prompt: &str,
    ) -> ApiResult<GenerationResult> {
        let body = serde_json::json!({
            "image": segmented_image,
            "options": options,
            "prompt": prompt,
            "enhanceQuality": true,
            "removeBackground": true,
        });

        self.post_json(
            "id-photo-generation",
            ID_PHOTO_GENERATION,
            &body,
            self.config.api.generation_timeout,
        )
        .await
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}{}", self.config.api.base_url, HEALTH_CHECK);
        let request_id = Uuid::new_v4().to_string();

        let exchange = self
            .http_client
            .get(&url)
            .header("X-Request-ID", &request_id)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api.api_key),
            )
            .send();

        match tokio::time::timeout(self.config.api.face_detection_timeout, exchange).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}
