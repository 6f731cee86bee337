// Pipeline Orchestrator: sequential three-stage workflow coordinator
//
// idle -> face_detection -> segmentation -> generation -> complete, with any
// stage failure short-circuiting the rest. Stage 1 applies business rules on
// top of the raw detection result (exactly one face, confidence >= 0.70).
// Progress is reported as structured events, one per stage transition with
// monotonically increasing percent. A failed run produces no PipelineRun.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument};

use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::{
    FaceDetectionResult, GenerationOptions, PipelineRun, ProgressEvent, Stage, UploadedImage,
};
use crate::services::api_client::ProcessingBackend;
use crate::services::instruction::default_prompt;

/// Primary face confidence below this fails validation; exactly the threshold
/// passes.
const MIN_FACE_CONFIDENCE: f32 = 0.70;

/// Main pipeline orchestrator
pub struct PipelineOrchestrator {
    backend: Arc<dyn ProcessingBackend>,
}

impl PipelineOrchestrator {
    pub fn new(backend: Arc<dyn ProcessingBackend>) -> Self {
        Self { backend }
    }

    fn emit(
        progress: Option<&UnboundedSender<ProgressEvent>>,
        stage: Stage,
        percent: u8,
        message: &str,
    ) {
        if let Some(sender) = progress {
            // A dropped receiver only means nobody is watching anymore.
            let _ = sender.send(ProgressEvent {
                stage,
                percent,
                message: message.to_string(),
            });
        }
    }

    /// Business rules applied on top of the raw detection result.
    fn validate_detection(detection: &FaceDetectionResult) -> PipelineResult<()> {
        if !detection.has_face {
            return Err(PipelineError::Validation {
                reason: "未检测到人脸，请上传包含清晰人脸的照片".to_string(),
            });
        }

        if detection.face_count == 0 {
            return Err(PipelineError::Validation {
                reason: "未检测到人脸，请确保照片中有人物".to_string(),
            });
        }

        if detection.face_count > 1 {
            return Err(PipelineError::Validation {
                reason: "检测到多张人脸，请上传只包含一个人的照片".to_string(),
            });
        }

        let main_face = detection.faces.first().ok_or(PipelineError::Validation {
            reason: "未检测到人脸，请确保照片中有人物".to_string(),
        })?;

        if main_face.confidence < MIN_FACE_CONFIDENCE {
            return Err(PipelineError::Validation {
                reason: "人脸检测置信度较低，请上传更清晰的照片".to_string(),
            });
        }

        Ok(())
    }

    /// Run the full pipeline for one uploaded image.
    ///
    /// `prompt` overrides the synthesized default generation prompt when the
    /// user supplied free text. Stages execute strictly in sequence; the only
    /// cancellation is the remote client's per-operation timeout.
    #[instrument(skip(self, image, options, prompt, progress), fields(image_id = %image.id))]
    pub async fn run(
        &self,
        image: &UploadedImage,
        options: &GenerationOptions,
        prompt: Option<&str>,
        progress: Option<&UnboundedSender<ProgressEvent>>,
    ) -> PipelineResult<PipelineRun> {
        let start = Instant::now();
        let image_base64 = image.base64();

        // Stage 1: face detection + validation
        Self::emit(progress, Stage::FaceDetection, 10, "正在检测人脸...");

        let face = self
            .backend
            .detect_faces(&image_base64)
            .await
            .map_err(|source| PipelineError::FaceDetectionFailed { source })?;

        Self::emit(
            progress,
            Stage::Validation,
            20,
            "人脸检测完成，正在验证人脸质量...",
        );
        Self::validate_detection(&face)?;

        info!(
            faces = face.face_count,
            confidence = face.faces[0].confidence,
            "face validation passed"
        );

        // Stage 2: person segmentation on the original image
        Self::emit(
            progress,
            Stage::Segmentation,
            30,
            "人脸检测完成，正在抠取人物...",
        );

        let segmentation = self
            .backend
            .segment_person(&image_base64)
            .await
            .map_err(|source| PipelineError::SegmentationFailed { source })?;

        // Stage 3: generation from the segmented image
        Self::emit(
            progress,
            Stage::Generation,
            60,
            "人物抠取完成，正在生成证件照...",
        );

        let owned_prompt;
        let prompt = match prompt {
            Some(text) => text,
            None => {
                owned_prompt = default_prompt(options);
                &owned_prompt
            }
        };

        let generation = self
            .backend
            .generate_id_photo(&segmentation.segmented_image, options, prompt)
            .await
            .map_err(|source| PipelineError::GenerationFailed { source })?;

        Self::emit(progress, Stage::Complete, 100, "证件照生成完成！");

        let final_image = format!("data:image/{};base64,{}", generation.format, generation.image);

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            format = %generation.format,
            "pipeline complete"
        );

        Ok(PipelineRun {
            face,
            segmentation,
            generation,
            final_image,
        })
    }
}
