use super::*;
use crate::lease::completion_channel;
use std::path::PathBuf;

fn started_pipeline(script: MotionScript) -> (SimulatedPipeline, crossbeam::channel::Receiver<crate::lease::EncodeCompletion>) {
    let (sender, receiver) = completion_channel();
    let mut pipeline = SimulatedPipeline::new(script);
    pipeline.attach_completions(sender);
    pipeline
        .reconfigure(&Destination::Default("-".to_string()))
        .unwrap();
    pipeline.start_camera().unwrap();
    (pipeline, receiver)
}

#[test]
fn test_scripted_camera_quits_when_exhausted() {
    let (mut pipeline, _completions) = started_pipeline(MotionScript::scripted([true, false]));

    let first = pipeline.capture_next_frame().unwrap().unwrap();
    assert_eq!(first.sample.sequence, 0);
    assert!(first.sample.motion);

    let second = pipeline.capture_next_frame().unwrap().unwrap();
    assert!(!second.sample.motion);

    assert!(pipeline.capture_next_frame().unwrap().is_none());
}

#[test]
fn test_periodic_script_cycles() {
    let mut script = MotionScript::Periodic { on: 2, off: 3 };
    let flags: Vec<bool> = (0..10).map(|id| script.next(id).unwrap()).collect();
    assert_eq!(
        flags,
        vec![true, true, false, false, false, true, true, false, false, false]
    );
}

#[test]
fn test_capture_requires_running_camera() {
    let mut pipeline = SimulatedPipeline::new(MotionScript::scripted([false]));
    assert!(matches!(
        pipeline.capture_next_frame(),
        Err(PipelineError::Capture { .. })
    ));
}

#[test]
fn test_encoder_completes_in_fifo_order() {
    let (mut pipeline, completions) = started_pipeline(MotionScript::Periodic { on: 0, off: 1 });

    for _ in 0..5 {
        let frame = pipeline.capture_next_frame().unwrap().unwrap();
        pipeline.submit_for_encode(&frame.buffer).unwrap();
    }
    pipeline.stop_camera().unwrap();
    pipeline.stop_encoder().unwrap();

    let completed: Vec<u64> = completions.iter().filter_map(|c| c.frame_id).collect();
    assert_eq!(completed, vec![0, 1, 2, 3, 4]);
    assert_eq!(pipeline.log().encoded_frames(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_reconfigure_requires_stopped_camera() {
    let (mut pipeline, _completions) = started_pipeline(MotionScript::scripted([false; 0]));
    let segment = Destination::Segment(PathBuf::from("/tmp/segment.h264"));
    assert!(pipeline.reconfigure(&segment).is_err());

    pipeline.stop_camera().unwrap();
    pipeline.teardown().unwrap();
    pipeline.reconfigure(&segment).unwrap();
    assert_eq!(pipeline.destination(), Some(&segment));
}

#[test]
fn test_injected_failure_hits_requested_occurrence() {
    let (sender, _receiver) = completion_channel();
    let mut pipeline =
        SimulatedPipeline::new(MotionScript::scripted([false; 0])).fail_on(PipelineCallKind::StartCamera, 2);
    pipeline.attach_completions(sender);
    pipeline
        .reconfigure(&Destination::Default("-".to_string()))
        .unwrap();

    assert!(pipeline.start_camera().is_ok());
    pipeline.stop_camera().unwrap();
    assert!(matches!(
        pipeline.start_camera(),
        Err(PipelineError::StartCamera { .. })
    ));
}

#[test]
fn test_spurious_completion_signalled_on_requested_frame() {
    let (sender, receiver) = completion_channel();
    let mut pipeline =
        SimulatedPipeline::new(MotionScript::Periodic { on: 0, off: 1 }).with_spurious_completion(1);
    pipeline.attach_completions(sender);
    pipeline
        .reconfigure(&Destination::Default("-".to_string()))
        .unwrap();
    pipeline.start_camera().unwrap();

    pipeline.capture_next_frame().unwrap().unwrap();
    assert!(receiver.try_recv().is_err());

    pipeline.capture_next_frame().unwrap().unwrap();
    assert_eq!(
        receiver.try_recv().unwrap(),
        crate::lease::EncodeCompletion { frame_id: None }
    );
}
