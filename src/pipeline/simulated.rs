use super::{CapturePipeline, Destination};
use crate::config::SimulationConfig;
use crate::error::PipelineError;
use crate::frame::{CapturedFrame, FrameBuffer};
use crate::lease::{CompletionSender, EncodeCompletion};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

/// Source of per-frame motion flags for the simulated camera
#[derive(Debug, Clone)]
pub enum MotionScript {
    /// Fixed sequence; the camera quits once it is exhausted
    Scripted(VecDeque<bool>),
    /// Endless cycle of `on` motion frames followed by `off` still frames
    Periodic { on: u32, off: u32 },
}

impl MotionScript {
    pub fn scripted<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        Self::Scripted(flags.into_iter().collect())
    }

    pub(crate) fn next(&mut self, frame_id: u64) -> Option<bool> {
        match self {
            MotionScript::Scripted(flags) => flags.pop_front(),
            MotionScript::Periodic { on, off } => {
                let cycle = (*on as u64 + *off as u64).max(1);
                Some(frame_id % cycle < *on as u64)
            }
        }
    }
}

/// Collaborator calls observed by the simulated pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineCall {
    Encode(u64),
    Reconfigure(Destination),
    StartCamera,
    StopCamera,
    Teardown,
    StopEncoder,
    SignalOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineCallKind {
    Capture,
    Encode,
    Reconfigure,
    StartCamera,
    StopCamera,
    Teardown,
    StopEncoder,
}

/// Shared, cloneable view of the calls made on a simulated pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineLog {
    calls: Arc<Mutex<Vec<PipelineCall>>>,
}

impl PipelineLog {
    fn record(&self, call: PipelineCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<PipelineCall> {
        self.calls.lock().clone()
    }

    /// Calls other than per-frame encodes
    pub fn control_calls(&self) -> Vec<PipelineCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| !matches!(call, PipelineCall::Encode(_)))
            .cloned()
            .collect()
    }

    /// Frame ids submitted for encoding, in order
    pub fn encoded_frames(&self) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PipelineCall::Encode(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, expected: &PipelineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == expected).count()
    }
}

struct EncoderWorker {
    input: Sender<FrameBuffer>,
    handle: JoinHandle<()>,
}

impl EncoderWorker {
    fn spawn(
        destination: Destination,
        completions: CompletionSender,
        encode_delay: Duration,
    ) -> Result<Self, PipelineError> {
        let (input, frames) = channel::unbounded::<FrameBuffer>();

        let handle = thread::Builder::new()
            .name("sim-encoder".to_string())
            .spawn(move || {
                let mut encoded_bytes = 0usize;
                let mut encoded_frames = 0u64;

                for frame in frames.iter() {
                    if !encode_delay.is_zero() {
                        thread::sleep(encode_delay);
                    }
                    encoded_bytes += frame.size();
                    encoded_frames += 1;
                    let frame_id = frame.id;
                    // The encoder is done with the input buffer before it signals
                    drop(frame);

                    if completions
                        .send(EncodeCompletion {
                            frame_id: Some(frame_id),
                        })
                        .is_err()
                    {
                        warn!("Completion channel closed; dropping completion for frame {}", frame_id);
                    }
                }

                debug!(
                    "Encoder for {} flushed {} frames ({} bytes)",
                    destination, encoded_frames, encoded_bytes
                );
            })
            .map_err(|e| PipelineError::Reconfigure {
                destination: "encoder".to_string(),
                details: format!("Failed to spawn encoder thread: {}", e),
            })?;

        Ok(Self { input, handle })
    }

    /// Close the input and wait for every pending completion
    fn finish(self) -> Result<(), PipelineError> {
        drop(self.input);
        self.handle.join().map_err(|_| PipelineError::StopEncoder {
            details: "encoder thread panicked".to_string(),
        })
    }
}

/// In-process stand-in for the camera and encoder.
///
/// Produces synthetic frames with motion flags from a `MotionScript`, encodes
/// on a worker thread that completes buffers in FIFO order, records every
/// control call and can be told to fail the n-th call of a given kind.
pub struct SimulatedPipeline {
    script: MotionScript,
    resolution: (u32, u32),
    frame_interval: Option<Duration>,
    encode_delay: Duration,
    next_frame_id: u64,
    camera_running: bool,
    configured: Option<Destination>,
    completions: Option<CompletionSender>,
    encoder: Option<EncoderWorker>,
    log: PipelineLog,
    call_counts: HashMap<PipelineCallKind, usize>,
    failures: Vec<(PipelineCallKind, usize)>,
    spurious_completion_at: Option<u64>,
}

impl SimulatedPipeline {
    pub fn new(script: MotionScript) -> Self {
        Self {
            script,
            resolution: (64, 48),
            frame_interval: None,
            encode_delay: Duration::ZERO,
            next_frame_id: 0,
            camera_running: false,
            configured: None,
            completions: None,
            encoder: None,
            log: PipelineLog::default(),
            call_counts: HashMap::new(),
            failures: Vec::new(),
            spurious_completion_at: None,
        }
    }

    /// Real-time simulation driven by configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        info!(
            "Simulated camera at {}x{} @ {}fps ({} motion / {} still frames per cycle)",
            config.resolution.0,
            config.resolution.1,
            config.fps,
            config.motion_on_frames,
            config.motion_off_frames
        );

        Self::new(MotionScript::Periodic {
            on: config.motion_on_frames,
            off: config.motion_off_frames,
        })
        .with_resolution(config.resolution)
        .with_frame_interval(config.frame_interval())
    }

    pub fn with_resolution(mut self, resolution: (u32, u32)) -> Self {
        self.resolution = resolution;
        self
    }

    /// Pace frame delivery like a real camera
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    pub fn with_encode_delay(mut self, delay: Duration) -> Self {
        self.encode_delay = delay;
        self
    }

    /// Fail the `occurrence`-th (1-based) call of `kind`
    pub fn fail_on(mut self, kind: PipelineCallKind, occurrence: usize) -> Self {
        self.failures.push((kind, occurrence));
        self
    }

    /// Signal one extra completion, for a buffer never submitted, when
    /// frame `frame_id` is captured
    pub fn with_spurious_completion(mut self, frame_id: u64) -> Self {
        self.spurious_completion_at = Some(frame_id);
        self
    }

    pub fn log(&self) -> PipelineLog {
        self.log.clone()
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.configured.as_ref()
    }

    pub fn is_camera_running(&self) -> bool {
        self.camera_running
    }

    fn check_failure(&mut self, kind: PipelineCallKind) -> bool {
        let count = self.call_counts.entry(kind).or_insert(0);
        *count += 1;
        let count = *count;
        self.failures
            .iter()
            .any(|(failing, occurrence)| *failing == kind && *occurrence == count)
    }

    fn finish_encoder(&mut self) -> Result<(), PipelineError> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => Ok(()),
        }
    }
}

impl CapturePipeline for SimulatedPipeline {
    fn attach_completions(&mut self, completions: CompletionSender) {
        self.completions = Some(completions);
    }

    fn capture_next_frame(&mut self) -> Result<Option<CapturedFrame>, PipelineError> {
        if self.check_failure(PipelineCallKind::Capture) {
            return Err(PipelineError::Capture {
                details: "injected capture failure".to_string(),
            });
        }
        if !self.camera_running {
            return Err(PipelineError::Capture {
                details: "camera is not running".to_string(),
            });
        }

        if let Some(interval) = self.frame_interval {
            thread::sleep(interval);
        }

        let id = self.next_frame_id;
        let Some(motion) = self.script.next(id) else {
            info!("Simulated camera finished after {} frames", id);
            return Ok(None);
        };
        self.next_frame_id += 1;

        if self.spurious_completion_at == Some(id) {
            if let Some(completions) = &self.completions {
                warn!("Signalling spurious encode completion at frame {}", id);
                let _ = completions.send(EncodeCompletion { frame_id: None });
            }
        }

        let (width, height) = self.resolution;
        let fill = (id % 251) as u8;
        let data = vec![fill; width as usize * height as usize];
        let buffer = FrameBuffer::new(id, SystemTime::now(), data, width, height);

        trace!("Simulated frame {} (motion: {})", id, motion);
        Ok(Some(CapturedFrame::new(buffer, motion)))
    }

    fn submit_for_encode(&mut self, frame: &FrameBuffer) -> Result<(), PipelineError> {
        if self.check_failure(PipelineCallKind::Encode) {
            return Err(PipelineError::Encode {
                details: "injected encode failure".to_string(),
            });
        }
        let encoder = self.encoder.as_ref().ok_or_else(|| PipelineError::Encode {
            details: "encoder is not running".to_string(),
        })?;

        encoder
            .input
            .send(frame.clone())
            .map_err(|_| PipelineError::Encode {
                details: "encoder input closed".to_string(),
            })?;
        self.log.record(PipelineCall::Encode(frame.id));
        Ok(())
    }

    fn reconfigure(&mut self, destination: &Destination) -> Result<(), PipelineError> {
        self.log.record(PipelineCall::Reconfigure(destination.clone()));
        if self.check_failure(PipelineCallKind::Reconfigure) {
            return Err(PipelineError::Reconfigure {
                destination: destination.to_string(),
                details: "injected reconfigure failure".to_string(),
            });
        }
        if self.camera_running {
            return Err(PipelineError::Reconfigure {
                destination: destination.to_string(),
                details: "camera must be stopped first".to_string(),
            });
        }
        let completions = self
            .completions
            .clone()
            .ok_or_else(|| PipelineError::Reconfigure {
                destination: destination.to_string(),
                details: "no completion channel attached".to_string(),
            })?;

        // Replacing the encoder flushes the old one first
        self.finish_encoder()?;
        self.encoder = Some(EncoderWorker::spawn(
            destination.clone(),
            completions,
            self.encode_delay,
        )?);
        self.configured = Some(destination.clone());

        debug!("Pipeline configured for {}", destination);
        Ok(())
    }

    fn start_camera(&mut self) -> Result<(), PipelineError> {
        self.log.record(PipelineCall::StartCamera);
        if self.check_failure(PipelineCallKind::StartCamera) {
            return Err(PipelineError::StartCamera {
                details: "injected start failure".to_string(),
            });
        }
        if self.configured.is_none() {
            return Err(PipelineError::StartCamera {
                details: "pipeline is not configured".to_string(),
            });
        }
        self.camera_running = true;
        Ok(())
    }

    fn stop_camera(&mut self) -> Result<(), PipelineError> {
        self.log.record(PipelineCall::StopCamera);
        if self.check_failure(PipelineCallKind::StopCamera) {
            return Err(PipelineError::StopCamera {
                details: "injected stop failure".to_string(),
            });
        }
        self.camera_running = false;
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), PipelineError> {
        self.log.record(PipelineCall::Teardown);
        if self.check_failure(PipelineCallKind::Teardown) {
            return Err(PipelineError::Teardown {
                details: "injected teardown failure".to_string(),
            });
        }
        self.configured = None;
        Ok(())
    }

    fn stop_encoder(&mut self) -> Result<(), PipelineError> {
        self.log.record(PipelineCall::StopEncoder);
        let injected = self.check_failure(PipelineCallKind::StopEncoder);

        let flushed = self.finish_encoder();
        self.completions = None;
        flushed?;

        if injected {
            return Err(PipelineError::StopEncoder {
                details: "injected stop failure".to_string(),
            });
        }
        Ok(())
    }

    fn signal_output(&mut self) {
        self.log.record(PipelineCall::SignalOutput);
        info!("Output signalled");
    }
}
