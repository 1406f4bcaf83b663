use super::{Segment, SegmentNamer};
use crate::config::MotionvidConfig;
use crate::error::{MotionvidError, PipelineError, Result};
use crate::frame::FrameBuffer;
use crate::lease::{BufferLeaseQueue, LeaseId};
use crate::pipeline::{CapturePipeline, Destination};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, trace};

/// Recording state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Monitoring,
    Recording,
}

/// What a single step did with its frame
#[derive(Debug)]
pub enum StepOutcome {
    /// Frame was leased and handed to the encoder
    Encoded(LeaseId),
    /// Frame was consumed by switching to a new segment
    SegmentStarted(Segment),
    /// Frame was consumed by switching back to the default destination
    SegmentStopped(Segment),
}

/// Hysteresis state machine deciding when motion segments open and close.
///
/// A segment opens on the first positive verdict and is held open for at
/// least `min_hold_frames` further frames. After that it closes on the
/// first negative verdict; continuous motion keeps it open indefinitely.
pub struct SegmentController {
    min_hold_frames: u32,
    hold_frames_remaining: u32,
    active: Option<Segment>,
    /// Segment detached by a close that failed part way
    interrupted: Option<Segment>,
    namer: SegmentNamer,
    default_destination: Destination,
    leases: Arc<BufferLeaseQueue>,
    segments_opened: u64,
}

impl SegmentController {
    pub fn new(
        min_hold_frames: u32,
        namer: SegmentNamer,
        default_destination: Destination,
        leases: Arc<BufferLeaseQueue>,
    ) -> Result<Self> {
        if min_hold_frames == 0 {
            return Err(MotionvidError::invalid_config(
                "Minimum hold frames must be greater than 0",
            ));
        }

        Ok(Self {
            min_hold_frames,
            hold_frames_remaining: 0,
            active: None,
            interrupted: None,
            namer,
            default_destination,
            leases,
            segments_opened: 0,
        })
    }

    pub fn from_config(config: &MotionvidConfig, leases: Arc<BufferLeaseQueue>) -> Result<Self> {
        Self::new(
            config.motion.min_hold_frames,
            SegmentNamer::from_config(&config.output),
            Destination::Default(config.output.default_destination.clone()),
            leases,
        )
    }

    /// Process one frame under the current motion verdict
    pub fn step<P>(&mut self, verdict: bool, frame: FrameBuffer, pipeline: &mut P) -> Result<StepOutcome>
    where
        P: CapturePipeline + ?Sized,
    {
        match (self.state(), verdict) {
            (SegmentState::Monitoring, true) => {
                let segment = self.open_segment(pipeline)?;
                Ok(StepOutcome::SegmentStarted(segment))
            }
            (SegmentState::Recording, false) if self.hold_frames_remaining == 0 => {
                let segment = self.close_segment(pipeline)?;
                Ok(StepOutcome::SegmentStopped(segment))
            }
            _ => {
                let lease = self.encode(frame, pipeline)?;
                if let Some(segment) = self.active.as_mut() {
                    segment.frames_encoded += 1;
                    self.hold_frames_remaining = self.hold_frames_remaining.saturating_sub(1);
                }
                Ok(StepOutcome::Encoded(lease))
            }
        }
    }

    fn encode<P>(&self, frame: FrameBuffer, pipeline: &mut P) -> Result<LeaseId>
    where
        P: CapturePipeline + ?Sized,
    {
        trace!("Encoding frame {}", frame.id);
        // The lease must exist before the encoder can possibly complete it
        let lease = self.leases.submit(frame.clone());
        if let Err(e) = pipeline.submit_for_encode(&frame) {
            self.leases.withdraw(lease);
            return Err(e.into());
        }
        Ok(lease)
    }

    fn open_segment<P>(&mut self, pipeline: &mut P) -> Result<Segment>
    where
        P: CapturePipeline + ?Sized,
    {
        let segment = self.namer.next();
        self.namer.ensure_directory()?;

        info!("Motion detected - starting segment {}", segment.path.display());
        switch_destination(pipeline, &Destination::Segment(segment.path.clone()))?;

        self.hold_frames_remaining = self.min_hold_frames;
        self.segments_opened += 1;
        self.active = Some(segment.clone());
        Ok(segment)
    }

    fn close_segment<P>(&mut self, pipeline: &mut P) -> Result<Segment>
    where
        P: CapturePipeline + ?Sized,
    {
        let mut segment = self
            .active
            .take()
            .ok_or_else(|| MotionvidError::system("No segment open to close"))?;
        segment.stopped_at = Some(Utc::now());

        info!(
            "Motion ended - closing segment {} after {} frames",
            segment.name, segment.frames_encoded
        );
        if let Err(e) = switch_destination(pipeline, &self.default_destination) {
            error!(
                "Failed to close segment {} after {} frames: {}",
                segment.name, segment.frames_encoded, e
            );
            self.interrupted = Some(segment);
            return Err(e.into());
        }

        Ok(segment)
    }

    /// Detach the open segment at shutdown without touching the pipeline.
    ///
    /// Also hands back a segment whose close failed, so it can be reported.
    pub fn finish(&mut self) -> Option<Segment> {
        self.hold_frames_remaining = 0;
        if let Some(segment) = self.interrupted.take() {
            return Some(segment);
        }
        self.active.take().map(|mut segment| {
            segment.stopped_at = Some(Utc::now());
            segment
        })
    }

    pub fn state(&self) -> SegmentState {
        if self.active.is_some() {
            SegmentState::Recording
        } else {
            SegmentState::Monitoring
        }
    }

    pub fn hold_frames_remaining(&self) -> u32 {
        self.hold_frames_remaining
    }

    pub fn active_segment(&self) -> Option<&Segment> {
        self.active.as_ref()
    }

    pub fn segments_opened(&self) -> u64 {
        self.segments_opened
    }

    pub fn default_destination(&self) -> &Destination {
        &self.default_destination
    }
}

/// Stop the camera, rebuild the pipeline for `destination` and restart
fn switch_destination<P>(pipeline: &mut P, destination: &Destination) -> std::result::Result<(), PipelineError>
where
    P: CapturePipeline + ?Sized,
{
    pipeline.stop_camera()?;
    pipeline.teardown()?;
    pipeline.reconfigure(destination)?;
    pipeline.start_camera()
}
