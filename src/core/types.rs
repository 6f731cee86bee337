// Data model for the ID photo generation workflow

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use base64::{engine::general_purpose, Engine};

/// Photo size class for the generated ID photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoSize {
    #[serde(rename = "1inch")]
    OneInch,
    #[serde(rename = "2inch")]
    TwoInch,
    #[serde(rename = "passport")]
    Passport,
    #[serde(rename = "custom")]
    Custom,
}

impl PhotoSize {
    /// Chinese label used when synthesizing the default generation prompt
    pub fn label(&self) -> &'static str {
        match self {
            PhotoSize::OneInch => "1寸",
            PhotoSize::TwoInch => "2寸",
            PhotoSize::Passport => "护照",
            PhotoSize::Custom => "自定义尺寸",
        }
    }
}

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpg,
}

/// Lighting preset applied during generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lighting {
    Natural,
    Studio,
    Bright,
}

impl Lighting {
    pub fn label(&self) -> &'static str {
        match self {
            Lighting::Natural => "自然光",
            Lighting::Studio => "专业工作室灯光",
            Lighting::Bright => "明亮均匀的光线",
        }
    }
}

/// Style preset applied during generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStyle {
    Professional,
    Casual,
    Traditional,
}

impl PhotoStyle {
    pub fn label(&self) -> &'static str {
        match self {
            PhotoStyle::Professional => "商务专业风格",
            PhotoStyle::Casual => "休闲自然风格",
            PhotoStyle::Traditional => "传统正式风格",
        }
    }
}

/// Structured generation parameters derived from a user instruction.
///
/// Every field carries a default, so a parsed options record is always fully
/// populated. Produced once per instruction and never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    pub size: PhotoSize,
    pub background_color: String,
    pub format: OutputFormat,
    pub quality: u8,
    pub padding: f32,
    pub lighting: Lighting,
    pub style: PhotoStyle,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            size: PhotoSize::OneInch,
            background_color: "#ffffff".to_string(),
            format: OutputFormat::Png,
            quality: 95,
            padding: 0.1,
            lighting: Lighting::Studio,
            style: PhotoStyle::Professional,
        }
    }
}

/// A validated user upload. Immutable after creation; replaced wholesale when
/// the user uploads a new file.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub id: Uuid,
    pub filename: String,
    pub bytes: Arc<Vec<u8>>,
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

impl UploadedImage {
    /// Raw base64 payload (without the data-URL prefix) sent to the remote
    /// service.
    pub fn base64(&self) -> String {
        general_purpose::STANDARD.encode(self.bytes.as_slice())
    }
}

/// Axis-aligned face bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Optional facial landmark returned by detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A single detected face
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Face {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<Landmark>>,
}

/// Face detection payload returned by the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetectionResult {
    pub has_face: bool,
    pub face_count: usize,
    pub faces: Vec<Face>,
    pub processing_time: f64,
}

/// Person segmentation payload returned by the remote service.
/// All image fields are base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    pub mask: String,
    pub original_image: String,
    pub segmented_image: String,
    pub processing_time: f64,
}

/// Pixel dimensions of a generated photo
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// ID photo generation payload returned by the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// base64 encoded result image
    pub image: String,
    pub size: ImageSize,
    pub format: String,
    pub processing_time: f64,
    /// Prompt the service actually used
    pub prompt: String,
}

/// Uniform success/error envelope wrapping every remote response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Error body carried by a failed envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Aggregate of the three stage outputs, created only on full pipeline success
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub face: FaceDetectionResult,
    pub segmentation: SegmentationResult,
    pub generation: GenerationResult,
    /// Data URI assembled from the generation payload's format and base64 image
    pub final_image: String,
}

/// Processing stage observed by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Uploading,
    FaceDetection,
    Validation,
    Segmentation,
    Generation,
    Complete,
}

impl Stage {
    /// Terminal stages carry no spinner; everything else counts as processing.
    pub fn is_processing(&self) -> bool {
        !matches!(self, Stage::Idle | Stage::Complete)
    }
}

/// Structured progress event emitted once per stage transition.
/// Percent values are monotonically increasing within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_fully_populated() {
        let options = GenerationOptions::default();
        assert_eq!(options.size, PhotoSize::OneInch);
        assert_eq!(options.background_color, "#ffffff");
        assert_eq!(options.format, OutputFormat::Png);
        assert_eq!(options.quality, 95);
        assert!((options.padding - 0.1).abs() < f32::EPSILON);
        assert_eq!(options.lighting, Lighting::Studio);
        assert_eq!(options.style, PhotoStyle::Professional);
    }

    #[test]
    fn test_options_serialize_wire_names() {
        let json = serde_json::to_value(GenerationOptions::default()).unwrap();
        assert_eq!(json["size"], "1inch");
        assert_eq!(json["backgroundColor"], "#ffffff");
        assert_eq!(json["format"], "png");
        assert_eq!(json["lighting"], "studio");
        assert_eq!(json["style"], "professional");
    }

    #[test]
    fn test_face_detection_result_deserializes_camel_case() {
        let payload = serde_json::json!({
            "hasFace": true,
            "faceCount": 1,
            "faces": [{
                "boundingBox": { "x": 10.0, "y": 20.0, "width": 100.0, "height": 120.0 },
                "confidence": 0.93
            }],
            "processingTime": 120.5
        });
        let result: FaceDetectionResult = serde_json::from_value(payload).unwrap();
        assert!(result.has_face);
        assert_eq!(result.face_count, 1);
        assert!(result.faces[0].landmarks.is_none());
    }

    #[test]
    fn test_envelope_failure_carries_error_body() {
        let payload = serde_json::json!({
            "success": false,
            "error": { "code": "FACE_NOT_FOUND", "message": "no face" },
            "requestId": "abc",
            "timestamp": 1700000000000u64
        });
        let envelope: ApiEnvelope<FaceDetectionResult> =
            serde_json::from_value(payload).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.unwrap().code, "FACE_NOT_FOUND");
    }

    #[test]
    fn test_stage_processing_classification() {
        assert!(!Stage::Idle.is_processing());
        assert!(!Stage::Complete.is_processing());
        assert!(Stage::Uploading.is_processing());
        assert!(Stage::FaceDetection.is_processing());
        assert!(Stage::Validation.is_processing());
        assert!(Stage::Segmentation.is_processing());
        assert!(Stage::Generation.is_processing());
    }
}
