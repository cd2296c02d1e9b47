//! Resource ownership, configuration errors and depth options.

use cadence_frame::{ErrorKind, FrameConfig, FrameError};
use cadence_test::{FrameHarness, MockConfig, ScriptedSurface, TestError};
use std::sync::Arc;

fn build(mock: MockConfig, config: FrameConfig) -> Result<FrameHarness, FrameError> {
    match FrameHarness::with_mock(mock, ScriptedSurface::new(800, 600), config) {
        Ok(h) => Ok(h),
        Err(TestError::Frame(e)) => Err(e),
        Err(other) => panic!("unexpected harness error: {other}"),
    }
}

#[test]
fn dropping_the_orchestrator_releases_everything() {
    let mut h = FrameHarness::new(FrameConfig::default()).expect("harness");
    h.run_frames(5).expect("frames");
    h.surface_mut().resize(1024, 768);
    h.run_frames(3).expect("frames after resize");

    let backend = Arc::clone(&h.backend);
    assert!(backend.live_objects() > 0);
    drop(h);

    assert_eq!(backend.live_objects(), 0);
    assert_eq!(backend.pending_submissions(), 0);
    assert!(backend.violations().is_empty(), "{:?}", backend.violations());
}

#[test]
fn depth_buffer_can_be_disabled() {
    let h = build(
        MockConfig::default(),
        FrameConfig::default().with_depth_buffer(false),
    )
    .expect("harness");

    assert_eq!(h.orchestrator.chain().depth_format(), None);
    assert_eq!(h.backend.call_count("create_depth_image"), 0);
    assert_eq!(h.backend.call_count("depth_format"), 0);
}

#[test]
fn missing_depth_format_is_a_configuration_error() {
    let mock = MockConfig {
        depth_format: None,
        ..MockConfig::default()
    };
    let err = build(mock, FrameConfig::default()).err().expect("error");

    assert!(matches!(err, FrameError::NoDepthFormat));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn missing_present_modes_is_a_configuration_error() {
    let mock = MockConfig {
        present_modes: Vec::new(),
        ..MockConfig::default()
    };
    let err = build(mock, FrameConfig::default()).err().expect("error");

    assert!(matches!(err, FrameError::NoPresentMode));
}

#[test]
fn zero_frames_in_flight_is_rejected() {
    let err = build(
        MockConfig::default(),
        FrameConfig::default().with_frames_in_flight(0),
    )
    .err()
    .expect("error");

    assert!(matches!(err, FrameError::ZeroFramesInFlight));
}

#[test]
fn chain_reports_negotiated_state() {
    let h = FrameHarness::new(FrameConfig::default().with_vsync(true)).expect("harness");
    let chain = h.orchestrator.chain();

    assert_eq!(chain.image_count(), 3);
    assert_eq!(chain.frames_in_flight(), 2);
    assert_eq!((chain.width(), chain.height()), (800, 600));
    assert_eq!(chain.present_mode(), ash::vk::PresentModeKHR::FIFO);
    assert_eq!(chain.depth_format(), Some(ash::vk::Format::D32_SFLOAT));
    assert!(chain.framebuffer(2).is_some());
    assert!(chain.framebuffer(3).is_none());
    assert!(chain.compare_formats(chain));
}

#[test]
fn mailbox_preferred_without_vsync() {
    let h = FrameHarness::new(FrameConfig::default()).expect("harness");
    assert_eq!(
        h.orchestrator.chain().present_mode(),
        ash::vk::PresentModeKHR::MAILBOX
    );
}
