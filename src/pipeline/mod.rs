mod simulated;
#[cfg(test)]
mod tests;

pub use simulated::{MotionScript, PipelineCall, PipelineCallKind, PipelineLog, SimulatedPipeline};

use crate::error::PipelineError;
use crate::frame::{CapturedFrame, FrameBuffer};
use crate::lease::CompletionSender;
use std::fmt;
use std::path::PathBuf;

/// Where the encoder output currently goes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The live/default output used while not recording motion
    Default(String),
    /// A motion segment file
    Segment(PathBuf),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Default(name) => write!(f, "default output '{}'", name),
            Destination::Segment(path) => write!(f, "segment '{}'", path.display()),
        }
    }
}

/// Camera and encoder collaborator driven by the control loop.
///
/// Every call is synchronous and blocks the capture thread. Encoder
/// completions are delivered asynchronously through the sender passed to
/// `attach_completions`, one per submitted buffer and in submission order.
pub trait CapturePipeline: Send {
    /// Provide the channel the encoder signals completions on
    fn attach_completions(&mut self, completions: CompletionSender);

    /// Block until the next completed frame; `None` when the camera has quit
    fn capture_next_frame(&mut self) -> Result<Option<CapturedFrame>, PipelineError>;

    /// Hand a buffer to the encoder
    fn submit_for_encode(&mut self, frame: &FrameBuffer) -> Result<(), PipelineError>;

    /// Configure the video stream, start a fresh encoder and point it at `destination`
    fn reconfigure(&mut self, destination: &Destination) -> Result<(), PipelineError>;

    fn start_camera(&mut self) -> Result<(), PipelineError>;

    fn stop_camera(&mut self) -> Result<(), PipelineError>;

    /// Release the stream configuration after the camera is stopped
    fn teardown(&mut self) -> Result<(), PipelineError>;

    /// Flush and shut down the encoder.
    ///
    /// Must drop the completion sender so the listener thread can exit.
    fn stop_encoder(&mut self) -> Result<(), PipelineError>;

    /// Manual trigger forwarded to the output
    fn signal_output(&mut self);
}
