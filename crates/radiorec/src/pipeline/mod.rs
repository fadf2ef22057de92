pub mod error;
pub mod orchestrator;
pub mod progress;

pub use error::PipelineError;
pub use orchestrator::{RecordingOrchestrator, RecordingResult};
pub use progress::{
    BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter, RecordingPhase,
    RecordingProgressEvent,
};
