use super::{MotionRecorder, ShutdownReason};
use crate::error::{MotionvidError, Result};
use crate::events::RecorderEvent;
use crate::pipeline::CapturePipeline;
use std::time::SystemTime;
use tracing::{error, info, warn};

impl<P: CapturePipeline> MotionRecorder<P> {
    /// Orderly shutdown: stop camera, stop encoder, close any open segment
    pub(super) fn shutdown(&mut self, reason: &ShutdownReason) -> Result<()> {
        info!("Beginning shutdown: {}", reason);
        self.event_bus.publish(RecorderEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        });

        let mut first_error: Option<MotionvidError> = None;

        // Stop the camera first; stopping fails if the encoder is slow to close
        if let Err(e) = self.pipeline.stop_camera() {
            error!("Error stopping camera: {}", e);
            first_error.get_or_insert(e.into());
        }

        let encoder_stopped = match self.pipeline.stop_encoder() {
            Ok(()) => true,
            Err(e) => {
                error!("Error stopping encoder: {}", e);
                first_error.get_or_insert(e.into());
                false
            }
        };

        if let Some(segment) = self.controller.finish() {
            info!(
                "Closing segment {} at shutdown after {} frames",
                segment.name, segment.frames_encoded
            );
            if let Err(e) = self.complete_segment(segment) {
                error!("Error closing segment: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.release_listener(encoder_stopped) {
            error!("Encode completion listener failed: {}", e);
            first_error.get_or_insert(e);
        }

        self.stats.leases_abandoned = self.leases.abandon_all();

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Shutdown complete");
                Ok(())
            }
        }
    }

    /// Best-effort cleanup after a fatal error
    pub(super) fn abort(&mut self) {
        warn!("Aborting capture");

        if let Err(e) = self.pipeline.stop_camera() {
            warn!("Error stopping camera during abort: {}", e);
        }
        let encoder_stopped = match self.pipeline.stop_encoder() {
            Ok(()) => true,
            Err(e) => {
                warn!("Error stopping encoder during abort: {}", e);
                false
            }
        };

        if let Some(segment) = self.controller.finish() {
            warn!("Abandoning segment {}", segment.name);
        }

        if let Err(e) = self.release_listener(encoder_stopped) {
            warn!("Encode completion listener failed during abort: {}", e);
        }

        self.stats.leases_abandoned = self.leases.abandon_all();
    }

    /// Join the completion listener once the encoder has dropped its sender.
    ///
    /// If the encoder could not be stopped the listener may never see the
    /// channel close, so it is detached instead.
    fn release_listener(&mut self, encoder_stopped: bool) -> Result<()> {
        match self.listener.take() {
            Some(listener) if encoder_stopped => listener.join(),
            Some(listener) => {
                listener.check()?;
                warn!("Encoder still running; detaching completion listener");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
