//! Begin/end protocol, frame pacing and protocol-violation handling.

use ash::vk;
use cadence_frame::{
    ErrorKind, FrameConfig, FrameError, FrameOrchestrator, FrameState, ProtocolViolation,
};
use cadence_test::{FrameHarness, FrameRecord, MockBackend, MockConfig, ScriptedSurface};
use std::sync::Arc;

fn harness() -> FrameHarness {
    FrameHarness::new(FrameConfig::default()).expect("harness")
}

fn violation<T: std::fmt::Debug>(result: Result<T, FrameError>) -> ProtocolViolation {
    match result {
        Err(FrameError::Protocol(violation)) => violation,
        other => panic!("expected protocol violation, got {other:?}"),
    }
}

#[test]
fn three_images_two_frames_in_flight() {
    let mut h = harness();
    assert_eq!(h.orchestrator.chain().image_count(), 3);
    assert_eq!(h.orchestrator.frames_in_flight(), 2);

    let records = h.run_frames(10).expect("frames");
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.frame_index, i % 2);
        assert!(record.image_index < 3);
    }
    assert_eq!(
        records[..4],
        [
            FrameRecord {
                frame_index: 0,
                image_index: 0
            },
            FrameRecord {
                frame_index: 1,
                image_index: 1
            },
            FrameRecord {
                frame_index: 0,
                image_index: 2
            },
            FrameRecord {
                frame_index: 1,
                image_index: 0
            },
        ]
    );
    assert!(h.backend.violations().is_empty(), "{:?}", h.backend.violations());
}

#[test]
fn never_more_than_frames_in_flight_pending() {
    for frames_in_flight in 1..=3 {
        let config = FrameConfig::default().with_frames_in_flight(frames_in_flight);
        let mut h = FrameHarness::new(config).expect("harness");

        h.run_frames(25).expect("frames");

        assert!(h.backend.max_pending_submissions() <= frames_in_flight);
        assert!(h.backend.violations().is_empty(), "{:?}", h.backend.violations());
    }
}

#[test]
fn single_frame_in_flight_serialises_frames() {
    let config = FrameConfig::default().with_frames_in_flight(1);
    let mut h = FrameHarness::new(config).expect("harness");

    let records = h.run_frames(5).expect("frames");

    assert!(records.iter().all(|r| r.frame_index == 0));
    assert_eq!(h.backend.max_pending_submissions(), 1);
}

#[test]
fn repeated_frames_return_to_idle() {
    let mut h = harness();

    for k in 0..5 {
        assert_eq!(h.orchestrator.state(), FrameState::Idle);
        let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
        assert!(h.orchestrator.is_frame_in_progress());
        assert_eq!(h.orchestrator.frame_index().expect("index"), k % 2);
        assert_eq!(h.orchestrator.current_command_buffer().expect("cmd"), cmd);

        h.orchestrator.begin_render_pass(cmd).expect("begin pass");
        h.orchestrator.end_render_pass(cmd).expect("end pass");
        h.orchestrator.end_frame().expect("end");

        assert!(!h.orchestrator.is_frame_in_progress());
    }

    assert_eq!(h.backend.submits(), 5);
    assert_eq!(h.backend.presents(), 5);
    assert_eq!(h.orchestrator.rebuild_count(), 0);
}

#[test]
fn empty_frames_are_idempotent() {
    const FRAMES: u64 = 12;

    for frames_in_flight in 1..=3 {
        let config = FrameConfig::default().with_frames_in_flight(frames_in_flight);
        let mut h = FrameHarness::new(config).expect("harness");

        for k in 0..FRAMES {
            let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
            assert_eq!(cmd.frame_number(), k);
            h.orchestrator.end_frame().expect("end");
            assert_eq!(h.orchestrator.state(), FrameState::Idle);
            assert!(h.backend.pending_submissions() <= frames_in_flight);
        }

        assert_eq!(h.orchestrator.frames_begun(), FRAMES);
        assert_eq!(h.backend.submits(), 12);
        assert_eq!(h.backend.call_count("cmd_begin_render_pass"), 0);
        assert!(h.backend.max_pending_submissions() <= frames_in_flight);
        assert_eq!(h.orchestrator.rebuild_count(), 0);
        assert!(h.backend.violations().is_empty(), "{:?}", h.backend.violations());
    }
}

#[test]
fn command_buffers_alternate_between_slots() {
    let mut h = harness();

    let mut buffers = Vec::new();
    for _ in 0..4 {
        let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
        buffers.push(cmd.handle());
        h.orchestrator.begin_render_pass(cmd).expect("begin pass");
        h.orchestrator.end_render_pass(cmd).expect("end pass");
        h.orchestrator.end_frame().expect("end");
    }

    assert_ne!(buffers[0], buffers[1]);
    assert_eq!(buffers[0], buffers[2]);
    assert_eq!(buffers[1], buffers[3]);
}

#[test]
fn frame_info_describes_frame_in_progress() {
    let mut h = harness();
    assert!(h.orchestrator.frame_info(0.016).is_err());

    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
    let info = h.orchestrator.frame_info(0.016).expect("info");

    assert_eq!(info.command_buffer, cmd.handle());
    assert_eq!(info.frame_index, 0);
    assert_eq!(info.render_pass, h.orchestrator.render_pass());
    assert_eq!(
        info.extent,
        vk::Extent2D {
            width: 800,
            height: 600
        }
    );
    assert!((info.aspect_ratio() - 800.0 / 600.0).abs() < f32::EPSILON);
}

#[test]
fn end_frame_while_idle_is_rejected_without_device_calls() {
    let mut h = harness();
    h.backend.clear_calls();

    let err = h.orchestrator.end_frame().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(
        violation::<()>(Err(err)),
        ProtocolViolation::FrameNotActive {
            operation: "end_frame"
        }
    );
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.orchestrator.state(), FrameState::Idle);
}

#[test]
fn begin_frame_twice_is_rejected_without_device_calls() {
    let mut h = harness();
    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
    h.backend.clear_calls();

    assert_eq!(
        violation(h.orchestrator.begin_frame()),
        ProtocolViolation::FrameAlreadyActive
    );
    assert!(h.backend.calls().is_empty());

    // The frame in progress is unaffected.
    assert_eq!(h.orchestrator.current_command_buffer().expect("cmd"), cmd);
    h.orchestrator.begin_render_pass(cmd).expect("begin pass");
    h.orchestrator.end_render_pass(cmd).expect("end pass");
    h.orchestrator.end_frame().expect("end");
}

#[test]
fn render_pass_calls_outside_a_frame_are_rejected() {
    let mut h = harness();
    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
    h.orchestrator.end_frame().expect("end");
    h.backend.clear_calls();

    assert_eq!(
        violation(h.orchestrator.begin_render_pass(cmd)),
        ProtocolViolation::FrameNotActive {
            operation: "begin_render_pass"
        }
    );
    assert_eq!(
        violation(h.orchestrator.end_render_pass(cmd)),
        ProtocolViolation::FrameNotActive {
            operation: "end_render_pass"
        }
    );
    assert!(h.backend.calls().is_empty());
}

#[test]
fn previous_frame_command_buffer_is_rejected() {
    // With one frame in flight every frame reuses the same buffer.
    let config = FrameConfig::default().with_frames_in_flight(1);
    let mut h = FrameHarness::new(config).expect("harness");
    let previous = h.orchestrator.begin_frame().expect("begin").expect("image");
    h.orchestrator.end_frame().expect("end");

    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
    assert_eq!(cmd.handle(), previous.handle());
    h.backend.clear_calls();

    assert_eq!(
        violation(h.orchestrator.begin_render_pass(previous)),
        ProtocolViolation::ForeignCommandBuffer {
            operation: "begin_render_pass"
        }
    );
    assert!(h.backend.calls().is_empty());

    h.orchestrator.begin_render_pass(cmd).expect("begin pass");
    h.backend.clear_calls();
    assert_eq!(
        violation(h.orchestrator.end_render_pass(previous)),
        ProtocolViolation::ForeignCommandBuffer {
            operation: "end_render_pass"
        }
    );
    assert!(h.backend.calls().is_empty());

    h.orchestrator.end_render_pass(cmd).expect("end pass");
    h.orchestrator.end_frame().expect("end");
}

#[test]
fn command_buffer_from_same_slot_two_frames_back_is_rejected() {
    let mut h = harness();
    let first = h.orchestrator.begin_frame().expect("begin").expect("image");
    h.orchestrator.end_frame().expect("end");
    h.orchestrator.begin_frame().expect("begin").expect("image");
    h.orchestrator.end_frame().expect("end");

    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
    assert_eq!(cmd.handle(), first.handle());
    assert_eq!(h.orchestrator.current_command_buffer().expect("cmd"), cmd);
    h.backend.clear_calls();

    assert_eq!(
        violation(h.orchestrator.begin_render_pass(first)),
        ProtocolViolation::ForeignCommandBuffer {
            operation: "begin_render_pass"
        }
    );
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.orchestrator.state(), FrameState::Active);

    h.orchestrator.begin_render_pass(cmd).expect("begin pass");
    h.orchestrator.end_render_pass(cmd).expect("end pass");
    h.orchestrator.end_frame().expect("end");
}

#[test]
fn render_pass_nesting_is_enforced() {
    let mut h = harness();
    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");

    assert_eq!(
        violation(h.orchestrator.end_render_pass(cmd)),
        ProtocolViolation::RenderPassNotOpen
    );

    h.orchestrator.begin_render_pass(cmd).expect("begin pass");
    h.backend.clear_calls();
    assert_eq!(
        violation(h.orchestrator.begin_render_pass(cmd)),
        ProtocolViolation::RenderPassAlreadyOpen
    );
    assert!(h.backend.calls().is_empty());
    assert!(h.orchestrator.is_frame_in_progress());

    h.orchestrator.end_render_pass(cmd).expect("end pass");
    h.orchestrator.end_frame().expect("end");
    assert!(h.backend.violations().is_empty());
}

#[test]
fn end_frame_closes_an_open_render_pass_and_returns_to_idle() {
    let mut h = harness();
    let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
    h.orchestrator.begin_render_pass(cmd).expect("begin pass");
    h.backend.clear_calls();

    assert_eq!(
        violation(h.orchestrator.end_frame()),
        ProtocolViolation::RenderPassStillOpen
    );
    assert_eq!(h.orchestrator.state(), FrameState::Idle);
    assert_eq!(h.backend.call_count("cmd_end_render_pass"), 1);
    assert_eq!(h.backend.submits(), 1);
    assert_eq!(h.backend.presents(), 1);
    assert!(h.backend.violations().is_empty(), "{:?}", h.backend.violations());

    // The frame index advanced and the next frame runs normally.
    let record = h.run_frame().expect("frame").expect("rendered");
    assert_eq!(record.frame_index, 1);
    assert!(matches!(
        h.orchestrator.begin_render_pass(cmd),
        Err(FrameError::Protocol(ProtocolViolation::FrameNotActive { .. }))
    ));
}

#[test]
fn more_frames_in_flight_than_images_is_rejected() {
    // A minimum of one image negotiates a two-image swapchain.
    let backend = Arc::new(MockBackend::new(MockConfig {
        min_image_count: 1,
        ..MockConfig::default()
    }));
    let config = FrameConfig::default().with_frames_in_flight(3);

    let err = FrameOrchestrator::new(Arc::clone(&backend), ScriptedSurface::new(800, 600), config)
        .err()
        .expect("rejected");

    assert!(matches!(
        err,
        FrameError::TooManyFramesInFlight {
            frames_in_flight: 3,
            image_count: 2
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(backend.live_objects(), 0);
    assert!(backend.violations().is_empty(), "{:?}", backend.violations());
}

#[test]
fn frame_queries_while_idle_are_rejected() {
    let h = harness();

    assert_eq!(
        violation(h.orchestrator.frame_index()),
        ProtocolViolation::FrameNotActive {
            operation: "frame_index"
        }
    );
    assert_eq!(
        violation(h.orchestrator.image_index()),
        ProtocolViolation::FrameNotActive {
            operation: "image_index"
        }
    );
    assert_eq!(
        violation(h.orchestrator.current_command_buffer()),
        ProtocolViolation::FrameNotActive {
            operation: "current_command_buffer"
        }
    );
}

#[test]
fn fence_timeout_is_fatal_and_leaves_frame_idle() {
    let mut h = harness();
    h.backend.time_out_fence_waits(1);

    let err = h.orchestrator.begin_frame().unwrap_err();
    assert!(matches!(err, FrameError::Timeout { .. }));
    assert_eq!(err.kind(), ErrorKind::Device);
    assert_eq!(h.orchestrator.state(), FrameState::Idle);
}

#[test]
fn device_lost_on_present_returns_to_idle() {
    let mut h = harness();
    h.backend.fail_next_present(vk::Result::ERROR_DEVICE_LOST);

    let err = h.run_frame().unwrap_err();
    assert!(matches!(err, FrameError::DeviceLost { .. }));
    assert_eq!(h.orchestrator.state(), FrameState::Idle);
    assert_eq!(h.orchestrator.rebuild_count(), 0);
}

#[test]
fn clear_color_can_change_between_frames() {
    let mut h = harness();
    h.orchestrator.set_clear_color([1.0, 0.0, 0.0, 1.0]);
    assert_eq!(h.orchestrator.config().clear_color, [1.0, 0.0, 0.0, 1.0]);
    h.run_frames(2).expect("frames");
}
