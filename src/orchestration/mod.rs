pub mod pipeline;

pub use pipeline::PipelineOrchestrator;
