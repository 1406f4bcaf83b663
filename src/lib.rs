pub mod analyzer;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod lease;
pub mod pipeline;
pub mod segment;

pub use analyzer::{EvaluationBlock, MotionGate};
pub use app::{
    control_channel, run_recorder, spawn_signal_handlers, ControlCommand, MotionRecorder,
    RecorderStats, ShutdownReason,
};
pub use config::MotionvidConfig;
pub use error::{MotionvidError, PipelineError, Result};
pub use events::{EventBus, RecorderEvent};
pub use frame::{CapturedFrame, FrameBuffer, MotionSample};
pub use lease::{BufferLease, BufferLeaseQueue, CompletionListener, EncodeCompletion, LeaseId};
pub use pipeline::{CapturePipeline, Destination, MotionScript, SimulatedPipeline};
pub use segment::{Segment, SegmentController, SegmentNamer, SegmentState, StepOutcome};
