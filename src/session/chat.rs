// Chat/Instruction Session
//
// A linear transcript of turns. User turns that carry an action intent
// (生成/创建/制作/调整) trigger exactly one pipeline run; every other turn gets
// a canned acknowledgement from the injectable Responder strategy. At most one
// run is in flight per session; a send during a run is rejected, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::Config;
use crate::core::errors::{SessionError, SessionResult};
use crate::core::types::ProgressEvent;
use crate::orchestration::pipeline::PipelineOrchestrator;
use crate::services::api_client::ProcessingBackend;
use crate::services::instruction::parse_instruction;
use crate::services::upload::process_upload;
use crate::session::state::{SessionState, StateAction};

const GREETING: &str =
    "您好！我可以帮您生成专业的证件照。请告诉我您想要什么样的证件照效果，比如尺寸、背景颜色等。";

const INTENT_VERBS: &[&str] = &["生成", "创建", "制作", "调整"];

const CANNED_RESPONSES: &[&str] = &[
    "我明白了。让我为您调整图片的构图和光线。",
    "好的，我会优化图片的质量，让它更适合证件照使用。",
    "根据您的要求，我来调整图片的尺寸和比例。",
    "我来帮您美化一下这张照片，让它看起来更专业。",
    "明白了，我会按照您的要求处理这张图片。",
];

/// Whether a turn asks for a photo to be produced or adjusted
pub fn is_generation_intent(text: &str) -> bool {
    INTENT_VERBS.iter().any(|verb| text.contains(verb))
}

/// Transcript message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript turn
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: SystemTime,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Reply strategy for turns that are not generation requests. Injectable so
/// tests can replace simulated latency and random selection with a
/// deterministic implementation.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, instruction: &str) -> String;
}

/// Production responder: canned acknowledgement picked pseudo-randomly after a
/// simulated thinking delay.
pub struct SimulatedResponder {
    delay_min: Duration,
    delay_max: Duration,
}

impl SimulatedResponder {
    pub fn new(config: &Config) -> Self {
        Self {
            delay_min: Duration::from_millis(config.chat.simulation_delay_min_ms),
            delay_max: Duration::from_millis(config.chat.simulation_delay_max_ms),
        }
    }
}

#[async_trait]
impl Responder for SimulatedResponder {
    async fn respond(&self, _instruction: &str) -> String {
        use rand::Rng;

        let (delay, index) = {
            let mut rng = rand::thread_rng();
            let spread = self
                .delay_max
                .saturating_sub(self.delay_min)
                .as_millis() as u64;
            let jitter = if spread == 0 {
                0
            } else {
                rng.gen_range(0..=spread)
            };
            (
                self.delay_min + Duration::from_millis(jitter),
                rng.gen_range(0..CANNED_RESPONSES.len()),
            )
        };

        tokio::time::sleep(delay).await;
        CANNED_RESPONSES[index].to_string()
    }
}

/// One chat-driven processing session. Sessions are fully isolated; sharing a
/// session across tasks goes through `Arc<ChatSession>`.
pub struct ChatSession {
    config: Arc<Config>,
    state: SessionState,
    orchestrator: PipelineOrchestrator,
    responder: Arc<dyn Responder>,
    messages: RwLock<Vec<Message>>,
    in_flight: AtomicBool,
}

impl ChatSession {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn ProcessingBackend>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            config,
            state: SessionState::new(),
            orchestrator: PipelineOrchestrator::new(backend),
            responder,
            messages: RwLock::new(vec![Message::new(Role::Assistant, GREETING)]),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Observable handle over the session's processing state
    pub fn state(&self) -> SessionState {
        self.state.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    fn push_message(&self, role: Role, content: impl Into<String>) {
        self.messages.write().push(Message::new(role, content));
    }

    /// Validate and accept a new upload. Replacing the current image always
    /// clears any previous result, error, and stage first.
    pub fn upload(&self, filename: &str, bytes: Vec<u8>) -> SessionResult<()> {
        self.state
            .dispatch(StateAction::SetStage(crate::core::types::Stage::Uploading));

        match process_upload(filename, bytes, &self.config.upload) {
            Ok(image) => {
                info!(filename, image_id = %image.id, "image uploaded");
                self.state.dispatch(StateAction::SetUploadedImage(image));
                Ok(())
            }
            Err(e) => {
                self.state.dispatch(StateAction::SetError(e.to_string()));
                Err(SessionError::Upload(e))
            }
        }
    }

    /// Handle one user turn; returns the assistant's reply.
    ///
    /// Rejects with `SessionError::Busy` while a pipeline run is in flight —
    /// sends are refused at the input layer, never queued.
    pub async fn send(&self, text: &str) -> SessionResult<String> {
        if self.in_flight.load(Ordering::SeqCst) {
            return Err(SessionError::Busy);
        }

        if !is_generation_intent(text) {
            self.push_message(Role::User, text);
            let reply = self.responder.respond(text).await;
            self.push_message(Role::Assistant, reply.clone());
            return Ok(reply);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::Busy);
        }

        let result = self.run_generation(text).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.push_message(Role::Assistant, e.to_string());
                Err(e)
            }
        }
    }

    async fn run_generation(&self, text: &str) -> SessionResult<String> {
        let image = self.state.uploaded_image().ok_or(SessionError::NoImage)?;

        self.push_message(Role::User, text);
        self.push_message(
            Role::Assistant,
            format!(
                "正在为您生成证件照，请稍候... 我会根据您的要求\"{}\"来处理图片。",
                text
            ),
        );

        let options = parse_instruction(text);

        // Progress events drive the observable stage while the run is in
        // flight. The forwarding task is drained to completion before the
        // outcome is dispatched, so a stray stage event can never land after
        // SetResult/SetError.
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let state = self.state.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                state.dispatch(StateAction::SetStage(event.stage));
            }
        });

        let run = self
            .orchestrator
            .run(&image, &options, Some(text), Some(&tx))
            .await;
        drop(tx);
        let _ = forwarder.await;

        match run {
            Ok(run) => {
                self.state.dispatch(StateAction::SetResult(run));
                let reply = "证件照生成完成！".to_string();
                self.push_message(Role::Assistant, reply.clone());
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "pipeline run failed");
                self.state.dispatch(StateAction::SetError(e.to_string()));
                Err(SessionError::Pipeline(e))
            }
        }
    }

    /// Start over: clears the processing state and the transcript.
    pub fn reset(&self) {
        self.state.dispatch(StateAction::Reset);
        let mut messages = self.messages.write();
        messages.clear();
        messages.push(Message::new(Role::Assistant, GREETING));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ApiResult;
    use crate::core::types::{
        BoundingBox, Face, FaceDetectionResult, GenerationOptions, GenerationResult, ImageSize,
        SegmentationResult, Stage,
    };
    use tokio::sync::Notify;

    /// Zero-delay responder that always picks the first canned reply
    struct FixedResponder;

    #[async_trait]
    impl Responder for FixedResponder {
        async fn respond(&self, _instruction: &str) -> String {
            CANNED_RESPONSES[0].to_string()
        }
    }

    /// Backend double; detection can be made to block until released
    struct TestBackend {
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ProcessingBackend for TestBackend {
        async fn detect_faces(&self, _image: &str) -> ApiResult<FaceDetectionResult> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(FaceDetectionResult {
                has_face: true,
                face_count: 1,
                faces: vec![Face {
                    bounding_box: BoundingBox {
                        x: 0.0,
                        y: 0.0,
                        width: 10.0,
                        height: 10.0,
                    },
                    confidence: 0.9,
                    landmarks: None,
                }],
                processing_time: 1.0,
            })
        }

        async fn segment_person(&self, _image: &str) -> ApiResult<SegmentationResult> {
            Ok(SegmentationResult {
                mask: String::new(),
                original_image: String::new(),
                segmented_image: "c2Vn".to_string(),
                processing_time: 1.0,
            })
        }

        async fn generate_id_photo(
            &self,
            _segmented_image: &str,
            _options: &GenerationOptions,
            _prompt: &str,
        ) -> ApiResult<GenerationResult> {
            Ok(GenerationResult {
                image: "aW1n".to_string(),
                size: ImageSize {
                    width: 295,
                    height: 413,
                },
                format: "png".to_string(),
                processing_time: 1.0,
                prompt: String::new(),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn session_with(gate: Option<Arc<Notify>>) -> Arc<ChatSession> {
        Arc::new(ChatSession::new(
            Arc::new(Config::default()),
            Arc::new(TestBackend { gate }),
            Arc::new(FixedResponder),
        ))
    }

    fn tiny_png() -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_intent_detection() {
        assert!(is_generation_intent("生成1寸证件照"));
        assert!(is_generation_intent("帮我调整背景颜色"));
        assert!(is_generation_intent("创建护照照片"));
        assert!(is_generation_intent("制作2寸照片"));
        assert!(!is_generation_intent("你好"));
        assert!(!is_generation_intent("这张照片怎么样？"));
    }

    #[tokio::test]
    async fn test_non_intent_turn_gets_canned_reply() {
        let session = session_with(None);
        let reply = session.send("你好").await.unwrap();
        assert_eq!(reply, CANNED_RESPONSES[0]);

        let messages = session.messages();
        // greeting + user turn + assistant reply
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);
        // No pipeline ran
        assert_eq!(session.state().stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_generation_turn_without_image_rejected() {
        let session = session_with(None);
        let err = session.send("生成1寸证件照").await.unwrap_err();
        assert!(matches!(err, SessionError::NoImage));
    }

    #[tokio::test]
    async fn test_generation_turn_runs_pipeline_to_complete() {
        let session = session_with(None);
        session.upload("portrait.png", tiny_png()).unwrap();

        let reply = session.send("生成1寸证件照，白色背景").await.unwrap();
        assert_eq!(reply, "证件照生成完成！");

        let state = session.state().snapshot();
        assert_eq!(state.stage, Stage::Complete);
        assert!(!state.processing);
        assert!(state.error.is_none());
        let run = state.result.unwrap();
        assert_eq!(run.final_image, "data:image/png;base64,aW1n");
    }

    #[tokio::test]
    async fn test_send_while_in_flight_is_rejected() {
        let gate = Arc::new(Notify::new());
        let session = session_with(Some(gate.clone()));
        session.upload("portrait.png", tiny_png()).unwrap();

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.send("生成1寸证件照").await })
        };

        // Wait until the first run holds the in-flight flag
        while !session.in_flight.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let err = session.send("生成2寸证件照").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));
        // Plain chat turns are refused too while a run is in flight
        let err = session.send("你好").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        // The flag is released once the run resolves
        assert!(!session.in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_upload_replaces_stale_state() {
        let session = session_with(None);
        session.upload("first.png", tiny_png()).unwrap();
        session.send("生成1寸证件照").await.unwrap();
        assert_eq!(session.state().stage(), Stage::Complete);

        session.upload("second.png", tiny_png()).unwrap();
        let state = session.state().snapshot();
        assert_eq!(state.stage, Stage::Idle);
        assert!(state.result.is_none());
        assert!(state.error.is_none());
        assert_eq!(state.uploaded_image.unwrap().filename, "second.png");
    }

    #[tokio::test]
    async fn test_invalid_upload_sets_error() {
        let session = session_with(None);
        let err = session.upload("notes.txt", b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, SessionError::Upload(_)));

        let state = session.state().snapshot();
        assert_eq!(state.stage, Stage::Idle);
        assert!(state.error.is_some());
        assert!(!state.processing);
    }

    #[tokio::test]
    async fn test_reset_restores_greeting_and_idle_state() {
        let session = session_with(None);
        session.upload("portrait.png", tiny_png()).unwrap();
        session.send("生成1寸证件照").await.unwrap();

        session.reset();

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, GREETING);
        let state = session.state().snapshot();
        assert_eq!(state.stage, Stage::Idle);
        assert!(state.result.is_none());
        assert!(state.uploaded_image.is_none());
    }
}
