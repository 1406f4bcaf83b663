use super::types::{ControlCommand, RecorderStats, ShutdownReason};
use crate::analyzer::MotionGate;
use crate::config::MotionvidConfig;
use crate::error::Result;
use crate::events::{EventBus, RecorderEvent};
use crate::frame::CapturedFrame;
use crate::lease::{completion_channel, BufferLeaseQueue, CompletionListener};
use crate::pipeline::{CapturePipeline, Destination};
use crate::segment::{save_metadata, Segment, SegmentController, SegmentMetadata, StepOutcome};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, trace};

/// Create the inbound channel for manual trigger and stop requests
pub fn control_channel() -> (Sender<ControlCommand>, Receiver<ControlCommand>) {
    channel::unbounded()
}

/// Capture/control loop: motion gate, segment controller and buffer leases
/// driven frame by frame on a single thread.
pub struct MotionRecorder<P: CapturePipeline> {
    pub(super) config: MotionvidConfig,
    pub(super) pipeline: P,
    pub(super) gate: MotionGate,
    pub(super) controller: SegmentController,
    pub(super) leases: Arc<BufferLeaseQueue>,
    pub(super) listener: Option<CompletionListener>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) control: Receiver<ControlCommand>,
    pub(super) stats: RecorderStats,
}

impl<P: CapturePipeline> MotionRecorder<P> {
    /// Create a recorder; fails on invalid configuration
    pub fn new(
        config: MotionvidConfig,
        pipeline: P,
        event_bus: Arc<EventBus>,
        control: Receiver<ControlCommand>,
    ) -> Result<Self> {
        config.validate()?;

        let gate = MotionGate::from_config(&config.motion)?;
        let leases = Arc::new(BufferLeaseQueue::new());
        let controller = SegmentController::from_config(&config, Arc::clone(&leases))?;

        info!(
            "Motion recorder configured: block size {}, minimum hold {} frames, saving to {}",
            config.motion.block_size, config.motion.min_hold_frames, config.output.save_directory
        );

        Ok(Self {
            config,
            pipeline,
            gate,
            controller,
            leases,
            listener: None,
            event_bus,
            control,
            stats: RecorderStats::default(),
        })
    }

    /// Run until a stop condition or a fatal error.
    ///
    /// Either way the camera and encoder are stopped before returning.
    pub fn run(&mut self) -> Result<ShutdownReason> {
        let result = self.start().and_then(|_| self.event_loop());

        match result {
            Ok(reason) => {
                self.shutdown(&reason)?;
                Ok(reason)
            }
            Err(e) => {
                error!("Control loop failed ({}): {}", e.kind(), e);
                self.abort();
                Err(e)
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        let (sender, receiver) = completion_channel();
        self.listener = Some(CompletionListener::spawn(Arc::clone(&self.leases), receiver)?);
        self.pipeline.attach_completions(sender);

        let destination = Destination::Default(self.config.output.default_destination.clone());
        self.pipeline.reconfigure(&destination)?;
        self.pipeline.start_camera()?;

        info!("Camera started, streaming to {}", destination);
        Ok(())
    }

    fn event_loop(&mut self) -> Result<ShutdownReason> {
        let frame_limit = self.config.session.frame_limit();
        // A frame limit takes precedence over the timeout
        let timeout = match frame_limit {
            Some(_) => None,
            None => self.config.session.timeout(),
        };
        let started = Instant::now();
        let mut count = 0u64;

        loop {
            let Some(captured) = self.pipeline.capture_next_frame()? else {
                return Ok(ShutdownReason::CameraQuit);
            };

            if let Some(listener) = &self.listener {
                listener.check()?;
            }

            if self.poll_control() {
                return Ok(ShutdownReason::UserRequest);
            }

            trace!("Viewfinder frame {}", count);

            if let Some(limit) = timeout {
                if started.elapsed() > limit {
                    info!("Halting: reached timeout of {} milliseconds", limit.as_millis());
                    return Ok(ShutdownReason::Timeout(limit));
                }
            }
            if let Some(limit) = frame_limit {
                if count >= limit {
                    info!("Halting: processed {} frames", limit);
                    return Ok(ShutdownReason::FrameLimit(limit));
                }
            }

            self.process_frame(captured)?;
            count += 1;
        }
    }

    /// Drain pending control commands; returns true when a stop was requested
    fn poll_control(&mut self) -> bool {
        loop {
            match self.control.try_recv() {
                Ok(ControlCommand::ManualTrigger) => {
                    self.pipeline.signal_output();
                    self.event_bus.publish(RecorderEvent::ManualTrigger {
                        timestamp: SystemTime::now(),
                    });
                }
                Ok(ControlCommand::Stop) => return true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn process_frame(&mut self, captured: CapturedFrame) -> Result<()> {
        let frame_id = captured.buffer.id;

        if let Some(active) = self.gate.observe(captured.sample.motion) {
            self.stats.verdicts += 1;
            debug!("Motion verdict for block ending at frame {}: {}", frame_id, active);
            self.event_bus
                .publish(RecorderEvent::MotionVerdict { active, frame_id });
        }

        let outcome = self
            .controller
            .step(self.gate.verdict(), captured.buffer, &mut self.pipeline)?;
        self.stats.frames_processed += 1;

        match outcome {
            StepOutcome::Encoded(_) => self.stats.frames_encoded += 1,
            StepOutcome::SegmentStarted(segment) => {
                self.stats.segments_opened += 1;
                self.event_bus.publish(RecorderEvent::SegmentStarted {
                    name: segment.name,
                    path: segment.path,
                    timestamp: SystemTime::now(),
                });
            }
            StepOutcome::SegmentStopped(segment) => self.complete_segment(segment)?,
        }

        Ok(())
    }

    pub(super) fn complete_segment(&mut self, segment: Segment) -> Result<()> {
        if self.config.output.save_metadata {
            let metadata = SegmentMetadata::new(
                &segment,
                self.config.motion.block_size,
                self.config.motion.min_hold_frames,
            );
            save_metadata(&metadata)?;
        }

        self.stats.segments_closed += 1;
        self.event_bus.publish(RecorderEvent::SegmentStopped {
            name: segment.name,
            frames_encoded: segment.frames_encoded,
        });
        Ok(())
    }

    pub fn stats(&self) -> RecorderStats {
        let mut stats = self.stats.clone();
        stats.leases = Some(self.leases.stats());
        stats
    }

    pub fn controller(&self) -> &SegmentController {
        &self.controller
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }
}
