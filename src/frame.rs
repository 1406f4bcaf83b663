use std::sync::Arc;
use std::time::SystemTime;

/// A captured frame buffer shared between the capture subsystem and the encoder.
///
/// The pixel data lives behind an `Arc`; every clone is another owner, so the
/// capture subsystem can only recycle the memory once all clones are dropped.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Capture sequence number
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    /// Size of the frame data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of live owners of the underlying memory
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.data)
    }
}

/// One frame's motion flag, as produced by the upstream detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSample {
    pub sequence: u64,
    pub motion: bool,
}

/// A completed capture request: the buffer plus its motion flag
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub buffer: FrameBuffer,
    pub sample: MotionSample,
}

impl CapturedFrame {
    pub fn new(buffer: FrameBuffer, motion: bool) -> Self {
        let sample = MotionSample {
            sequence: buffer.id,
            motion,
        };
        Self { buffer, sample }
    }
}
