// Processing State Machine
//
// The session's observable view: current stage, at most one error, at most
// one pipeline result. Implemented as a pure transition function over a
// tagged action enum plus a shared dispatcher handle, so the invariants hold
// by construction:
//   - a result exists iff stage == Complete and error is None
//   - an error collapses the stage back to Idle (no spinner beside an error)
//   - a new upload clears any previous result/error/stage

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::types::{PipelineRun, Stage, UploadedImage};

/// Snapshot of the session's processing state
#[derive(Debug, Clone, Default)]
pub struct ProcessingState {
    pub stage: Stage,
    pub processing: bool,
    pub error: Option<String>,
    pub result: Option<PipelineRun>,
    pub uploaded_image: Option<UploadedImage>,
}

/// State transitions consumed by the dispatcher
#[derive(Debug, Clone)]
pub enum StateAction {
    SetUploadedImage(UploadedImage),
    SetStage(Stage),
    SetResult(PipelineRun),
    SetError(String),
    Reset,
}

/// Pure transition function; every mutation of the session state goes
/// through here.
pub fn reduce(state: ProcessingState, action: StateAction) -> ProcessingState {
    match action {
        StateAction::SetUploadedImage(image) => ProcessingState {
            uploaded_image: Some(image),
            result: None,
            error: None,
            stage: Stage::Idle,
            processing: false,
        },
        StateAction::SetStage(stage) => ProcessingState {
            stage,
            processing: stage.is_processing(),
            ..state
        },
        StateAction::SetResult(run) => ProcessingState {
            result: Some(run),
            stage: Stage::Complete,
            processing: false,
            error: None,
            ..state
        },
        StateAction::SetError(message) => ProcessingState {
            error: Some(message),
            stage: Stage::Idle,
            processing: false,
            result: None,
            ..state
        },
        StateAction::Reset => ProcessingState::default(),
    }
}

/// Shared, observable handle over the processing state. Cloning shares the
/// underlying state; mutation happens only through `dispatch`.
#[derive(Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<ProcessingState>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self, action: StateAction) {
        let mut state = self.inner.write();
        *state = reduce(state.clone(), action);
    }

    pub fn snapshot(&self) -> ProcessingState {
        self.inner.read().clone()
    }

    pub fn stage(&self) -> Stage {
        self.inner.read().stage
    }

    pub fn is_processing(&self) -> bool {
        self.inner.read().processing
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read().error.clone()
    }

    pub fn uploaded_image(&self) -> Option<UploadedImage> {
        self.inner.read().uploaded_image.clone()
    }
}
