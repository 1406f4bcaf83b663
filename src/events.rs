use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Events emitted by the recording control loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderEvent {
    /// The motion gate evaluated a full block
    MotionVerdict { active: bool, frame_id: u64 },
    /// A motion segment was opened
    SegmentStarted {
        name: String,
        path: PathBuf,
        timestamp: SystemTime,
    },
    /// The open motion segment was closed
    SegmentStopped { name: String, frames_encoded: u64 },
    /// Manual output trigger was received
    ManualTrigger { timestamp: SystemTime },
    /// Control loop is shutting down
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl RecorderEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            RecorderEvent::MotionVerdict { active, frame_id } => {
                format!("Motion verdict {} at frame {}", active, frame_id)
            }
            RecorderEvent::SegmentStarted { name, .. } => format!("Segment started: {}", name),
            RecorderEvent::SegmentStopped {
                name,
                frames_encoded,
            } => format!("Segment stopped: {} ({} frames)", name, frames_encoded),
            RecorderEvent::ManualTrigger { .. } => "Manual trigger".to_string(),
            RecorderEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RecorderEvent::MotionVerdict { .. } => "motion_verdict",
            RecorderEvent::SegmentStarted { .. } => "segment_started",
            RecorderEvent::SegmentStopped { .. } => "segment_stopped",
            RecorderEvent::ManualTrigger { .. } => "manual_trigger",
            RecorderEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus for recorder events
pub struct EventBus {
    sender: broadcast::Sender<RecorderEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; returns the number of receivers reached
    pub fn publish(&self, event: RecorderEvent) -> usize {
        match &event {
            RecorderEvent::SegmentStarted { .. } | RecorderEvent::SegmentStopped { .. } => {
                info!("{}", event.description());
            }
            _ => debug!("{}", event.description()),
        }

        // No subscribers is not an error for the control loop
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
