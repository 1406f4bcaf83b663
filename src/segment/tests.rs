use super::*;
use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::lease::{completion_channel, BufferLeaseQueue, CompletionListener};
use crate::pipeline::{
    CapturePipeline, Destination, MotionScript, PipelineCall, PipelineCallKind, PipelineLog,
    SimulatedPipeline,
};
use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;

struct Harness {
    controller: SegmentController,
    pipeline: SimulatedPipeline,
    leases: Arc<BufferLeaseQueue>,
    listener: CompletionListener,
    _dir: TempDir,
    next_frame: u64,
}

impl Harness {
    fn new(min_hold_frames: u32) -> Self {
        Self::with_pipeline(min_hold_frames, SimulatedPipeline::new(MotionScript::scripted([false; 0])))
    }

    fn with_pipeline(min_hold_frames: u32, mut pipeline: SimulatedPipeline) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let save_directory = dir.path().to_string_lossy().to_string();
        let namer = SegmentNamer::new(
            save_directory,
            "h264".to_string(),
            NamingZone::Named(chrono_tz::UTC),
        );

        let leases = Arc::new(BufferLeaseQueue::new());
        let (sender, receiver) = completion_channel();
        let listener = CompletionListener::spawn(Arc::clone(&leases), receiver).unwrap();

        pipeline.attach_completions(sender);
        pipeline
            .reconfigure(&Destination::Default("-".to_string()))
            .unwrap();
        pipeline.start_camera().unwrap();

        let controller = SegmentController::new(
            min_hold_frames,
            namer,
            Destination::Default("-".to_string()),
            Arc::clone(&leases),
        )
        .unwrap();

        Self {
            controller,
            pipeline,
            leases,
            listener,
            _dir: dir,
            next_frame: 1,
        }
    }

    fn step(&mut self, verdict: bool) -> Result<StepOutcome> {
        let frame = FrameBuffer::new(self.next_frame, SystemTime::now(), vec![0u8; 32], 4, 8);
        self.next_frame += 1;
        self.controller.step(verdict, frame, &mut self.pipeline)
    }

    fn finish(mut self) -> PipelineLog {
        self.pipeline.stop_camera().unwrap();
        self.pipeline.stop_encoder().unwrap();
        self.listener.join().unwrap();
        assert!(self.leases.is_empty());
        self.pipeline.log()
    }
}

#[test]
fn test_hold_counter_sequence() {
    let mut harness = Harness::new(3);

    let outcome = harness.step(true).unwrap();
    assert!(matches!(outcome, StepOutcome::SegmentStarted(_)));
    assert_eq!(harness.controller.state(), SegmentState::Recording);
    assert_eq!(harness.controller.hold_frames_remaining(), 3);

    for expected in [2, 1, 0] {
        let outcome = harness.step(false).unwrap();
        assert!(matches!(outcome, StepOutcome::Encoded(_)));
        assert_eq!(harness.controller.state(), SegmentState::Recording);
        assert_eq!(harness.controller.hold_frames_remaining(), expected);
    }

    match harness.step(false).unwrap() {
        StepOutcome::SegmentStopped(segment) => {
            assert_eq!(segment.frames_encoded, 3);
            assert!(segment.stopped_at.is_some());
        }
        other => panic!("Expected segment to stop, got {:?}", other),
    }
    assert_eq!(harness.controller.state(), SegmentState::Monitoring);

    let log = harness.finish();
    // Frames 1 and 5 were consumed by transitions
    assert_eq!(log.encoded_frames(), vec![2, 3, 4]);
}

#[test]
fn test_continuous_motion_keeps_single_segment_open() {
    let mut harness = Harness::new(2);

    for _ in 0..20 {
        harness.step(true).unwrap();
    }

    assert_eq!(harness.controller.state(), SegmentState::Recording);
    assert_eq!(harness.controller.segments_opened(), 1);
    assert_eq!(harness.controller.hold_frames_remaining(), 0);
    assert_eq!(
        harness.controller.active_segment().unwrap().frames_encoded,
        19
    );
    harness.finish();
}

#[test]
fn test_monitoring_passes_frames_through() {
    let mut harness = Harness::new(5);
    for _ in 0..4 {
        assert!(matches!(
            harness.step(false).unwrap(),
            StepOutcome::Encoded(_)
        ));
    }
    assert_eq!(harness.controller.state(), SegmentState::Monitoring);
    assert_eq!(harness.finish().encoded_frames(), vec![1, 2, 3, 4]);
}

#[test]
fn test_transition_switches_pipeline_destination() {
    let mut harness = Harness::new(1);

    let segment = match harness.step(true).unwrap() {
        StepOutcome::SegmentStarted(segment) => segment,
        other => panic!("Expected segment to start, got {:?}", other),
    };
    harness.step(false).unwrap();
    harness.step(false).unwrap();

    let log = harness.finish();
    let segment_destination = Destination::Segment(segment.path.clone());
    let default_destination = Destination::Default("-".to_string());

    assert_eq!(
        log.control_calls(),
        vec![
            PipelineCall::Reconfigure(default_destination.clone()),
            PipelineCall::StartCamera,
            PipelineCall::StopCamera,
            PipelineCall::Teardown,
            PipelineCall::Reconfigure(segment_destination),
            PipelineCall::StartCamera,
            PipelineCall::StopCamera,
            PipelineCall::Teardown,
            PipelineCall::Reconfigure(default_destination),
            PipelineCall::StartCamera,
            PipelineCall::StopCamera,
            PipelineCall::StopEncoder,
        ]
    );
}

#[test]
fn test_segment_invariants_over_verdict_pattern() {
    let min_hold_frames = 4u32;
    let mut harness = Harness::new(min_hold_frames);

    // Bursty pattern with gaps both shorter and longer than the hold
    let verdicts: Vec<bool> = (0..400u64)
        .map(|i| (i / 7) % 3 == 0 || (i % 29) < 2)
        .collect();

    let mut open_since: Option<usize> = None;
    let mut recording_steps = 0u32;

    for (step, verdict) in verdicts.iter().enumerate() {
        let was_recording = harness.controller.state() == SegmentState::Recording;
        match harness.step(*verdict).unwrap() {
            StepOutcome::SegmentStarted(_) => {
                assert!(!was_recording, "segment opened while another was open");
                assert!(open_since.is_none());
                open_since = Some(step);
                recording_steps = 0;
            }
            StepOutcome::SegmentStopped(_) => {
                let opened = open_since.take().expect("segment stopped without being open");
                assert!(!verdict);
                assert!(recording_steps >= min_hold_frames + 1);
                assert!(step - opened > min_hold_frames as usize);
            }
            StepOutcome::Encoded(_) => {}
        }
        if harness.controller.state() == SegmentState::Recording {
            recording_steps += 1;
        }
    }

    assert!(harness.controller.segments_opened() > 1);
    harness.finish();
}

#[test]
fn test_failed_segment_start_leaves_no_segment() {
    // The first reconfigure is the harness start-up
    let pipeline = SimulatedPipeline::new(MotionScript::scripted([false; 0]))
        .fail_on(PipelineCallKind::Reconfigure, 2);
    let mut harness = Harness::with_pipeline(3, pipeline);

    let err = harness.step(true).unwrap_err();
    assert_eq!(err.kind(), "pipeline");
    assert_eq!(harness.controller.state(), SegmentState::Monitoring);
    assert!(harness.controller.active_segment().is_none());
    assert_eq!(harness.controller.segments_opened(), 0);
}

#[test]
fn test_failed_segment_stop_does_not_stay_recording() {
    let pipeline = SimulatedPipeline::new(MotionScript::scripted([false; 0]))
        .fail_on(PipelineCallKind::StartCamera, 3);
    let mut harness = Harness::with_pipeline(1, pipeline);

    harness.step(true).unwrap();
    harness.step(false).unwrap();
    let err = harness.step(false).unwrap_err();

    assert_eq!(err.kind(), "pipeline");
    assert_eq!(harness.controller.state(), SegmentState::Monitoring);

    // The detached segment is still reported when the controller is finished
    let segment = harness.controller.finish().unwrap();
    assert_eq!(segment.frames_encoded, 1);
    assert!(segment.stopped_at.is_some());
    assert!(harness.controller.finish().is_none());
}

#[test]
fn test_refused_encode_leaves_no_lease() {
    let pipeline = SimulatedPipeline::new(MotionScript::scripted([false; 0]))
        .fail_on(PipelineCallKind::Encode, 2);
    let mut harness = Harness::with_pipeline(3, pipeline);

    harness.step(false).unwrap();
    let err = harness.step(false).unwrap_err();
    assert_eq!(err.kind(), "pipeline");

    let log = harness.finish();
    assert_eq!(log.encoded_frames(), vec![1]);
}

#[test]
fn test_unwritable_save_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"file").unwrap();

    let namer = SegmentNamer::new(
        blocker.to_string_lossy().to_string(),
        "h264".to_string(),
        NamingZone::Named(chrono_tz::UTC),
    );
    let leases = Arc::new(BufferLeaseQueue::new());
    let mut controller = SegmentController::new(
        2,
        namer,
        Destination::Default("-".to_string()),
        leases,
    )
    .unwrap();

    let mut pipeline = SimulatedPipeline::new(MotionScript::scripted([false; 0]));
    let log = pipeline.log();
    let frame = FrameBuffer::new(1, SystemTime::now(), vec![0u8; 4], 2, 2);

    let err = controller.step(true, frame, &mut pipeline).unwrap_err();
    assert_eq!(err.kind(), "io");
    assert_eq!(controller.state(), SegmentState::Monitoring);
    assert!(log.calls().is_empty());
}

#[test]
fn test_controller_rejects_zero_hold() {
    let namer = SegmentNamer::new("/tmp", "h264", NamingZone::Local);
    let result = SegmentController::new(
        0,
        namer,
        Destination::Default("-".to_string()),
        Arc::new(BufferLeaseQueue::new()),
    );
    assert!(result.is_err());
}

#[test]
fn test_finish_detaches_open_segment() {
    let mut harness = Harness::new(10);
    harness.step(true).unwrap();
    harness.step(true).unwrap();

    let segment = harness.controller.finish().unwrap();
    assert_eq!(segment.frames_encoded, 1);
    assert_eq!(harness.controller.state(), SegmentState::Monitoring);
    assert!(harness.controller.finish().is_none());
    harness.finish();
}

#[test]
fn test_segment_names() {
    let namer = SegmentNamer::new("/data/motion", "h264", NamingZone::Named(chrono_tz::UTC));

    let first = namer.name_at(Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap());
    let second = namer.name_at(Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 10).unwrap());

    assert_eq!(first.name, "2024-03-05_14-07-09-motionmov.h264");
    assert_eq!(
        first.path,
        PathBuf::from("/data/motion/2024-03-05_14-07-09-motionmov.h264")
    );
    assert_ne!(first.path, second.path);
    assert!(first
        .path
        .to_string_lossy()
        .starts_with(&format!("{}/", namer.save_directory())));
}

#[test]
fn test_named_timezone_applied() {
    let namer = SegmentNamer::new("out", "mp4", NamingZone::resolve("Asia/Tokyo"));
    let segment = namer.name_at(Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap());
    assert_eq!(segment.name, "2024-01-02_05-00-00-motionmov.mp4");

    assert_eq!(
        NamingZone::resolve("Not/AZone"),
        NamingZone::Named(chrono_tz::UTC)
    );
    assert_eq!(NamingZone::resolve("LOCAL"), NamingZone::Local);
}

#[test]
fn test_save_metadata_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let namer = SegmentNamer::new(
        dir.path().to_string_lossy().to_string(),
        "h264".to_string(),
        NamingZone::Named(chrono_tz::UTC),
    );
    let mut segment = namer.name_at(Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap());
    segment.frames_encoded = 64;
    segment.stopped_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 5).unwrap());

    let sidecar = save_metadata(&SegmentMetadata::new(&segment, 20, 50)).unwrap();
    assert_eq!(
        sidecar,
        dir.path().join("2024-06-01_08-30-00-motionmov.h264.json")
    );

    let saved: SegmentMetadata =
        serde_json::from_str(&std::fs::read_to_string(&sidecar).unwrap()).unwrap();
    assert_eq!(saved.frames_encoded, 64);
    assert_eq!(saved.block_size, 20);
    assert_eq!(saved.min_hold_frames, 50);
    assert_eq!(saved.stopped_at, segment.stopped_at);
}
