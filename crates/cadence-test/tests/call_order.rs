//! Device call order for a frame and for a rebuild.

use ash::vk;
use cadence_frame::FrameConfig;
use cadence_test::FrameHarness;

#[test]
fn single_frame_call_order() {
    let mut h = FrameHarness::new(FrameConfig::default()).expect("harness");
    h.backend.clear_calls();

    h.run_frame().expect("frame").expect("rendered");

    insta::assert_debug_snapshot!(h.backend.calls(), @r#"
    [
        "wait_for_fence",
        "acquire_next_image",
        "begin_command_buffer",
        "cmd_begin_render_pass",
        "cmd_set_viewport_and_scissor",
        "cmd_end_render_pass",
        "end_command_buffer",
        "reset_fence",
        "submit",
        "present",
    ]
    "#);
}

#[test]
fn image_reuse_waits_for_previous_owner() {
    let mut h = FrameHarness::new(FrameConfig::default()).expect("harness");
    h.run_frames(3).expect("frames");
    h.backend.clear_calls();

    // Frame 3 renders image 0 from frame slot 1; image 0 was last used by slot 0.
    h.run_frame().expect("frame").expect("rendered");

    insta::assert_debug_snapshot!(h.backend.calls(), @r#"
    [
        "wait_for_fence",
        "acquire_next_image",
        "begin_command_buffer",
        "cmd_begin_render_pass",
        "cmd_set_viewport_and_scissor",
        "cmd_end_render_pass",
        "end_command_buffer",
        "wait_for_fence",
        "reset_fence",
        "submit",
        "present",
    ]
    "#);
}

#[test]
fn rebuild_call_order() {
    let mut h = FrameHarness::new(FrameConfig::default()).expect("harness");
    h.backend.clear_calls();
    h.backend.fail_next_acquire(vk::Result::ERROR_OUT_OF_DATE_KHR);

    assert!(h.orchestrator.begin_frame().expect("begin").is_none());

    insta::assert_debug_snapshot!(h.backend.calls(), @r#"
    [
        "wait_for_fence",
        "acquire_next_image",
        "wait_idle",
        "surface_support",
        "depth_format",
        "create_swapchain",
        "swapchain_images",
        "create_render_pass",
        "create_image_view",
        "create_depth_image",
        "create_image_view",
        "create_framebuffer",
        "create_image_view",
        "create_depth_image",
        "create_image_view",
        "create_framebuffer",
        "create_image_view",
        "create_depth_image",
        "create_image_view",
        "create_framebuffer",
        "destroy_framebuffer",
        "destroy_framebuffer",
        "destroy_framebuffer",
        "destroy_image_view",
        "destroy_depth_image",
        "destroy_image_view",
        "destroy_depth_image",
        "destroy_image_view",
        "destroy_depth_image",
        "destroy_image_view",
        "destroy_image_view",
        "destroy_image_view",
        "destroy_render_pass",
        "destroy_swapchain",
    ]
    "#);
}
