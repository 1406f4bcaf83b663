use crate::lease::LeaseStatsSnapshot;
use std::fmt;
use std::time::Duration;

/// Commands delivered to the control loop from signals or the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Forward a manual trigger to the output
    ManualTrigger,
    /// Finish the session gracefully
    Stop,
}

/// Why the control loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Timeout(Duration),
    FrameLimit(u64),
    UserRequest,
    CameraQuit,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Timeout(limit) => {
                write!(f, "reached timeout of {} milliseconds", limit.as_millis())
            }
            ShutdownReason::FrameLimit(frames) => write!(f, "reached limit of {} frames", frames),
            ShutdownReason::UserRequest => write!(f, "stop requested"),
            ShutdownReason::CameraQuit => write!(f, "camera quit"),
        }
    }
}

/// Counters describing a recording session
#[derive(Debug, Clone, Default)]
pub struct RecorderStats {
    pub frames_processed: u64,
    pub frames_encoded: u64,
    pub verdicts: u64,
    pub segments_opened: u64,
    pub segments_closed: u64,
    pub leases_abandoned: usize,
    pub leases: Option<LeaseStatsSnapshot>,
}
