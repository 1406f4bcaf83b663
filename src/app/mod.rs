#[cfg(feature = "keyboard")]
pub mod keyboard_input;

mod recorder;
mod runtime;
mod shutdown;
mod types;


pub use recorder::{control_channel, MotionRecorder};
pub use runtime::{run_recorder, spawn_signal_handlers};
pub use types::{ControlCommand, RecorderStats, ShutdownReason};
