//! Per-frame context for rendering.

use ash::vk;
use cadence_frame::FrameInfo;

/// Context for the frame being recorded.
pub struct FrameContext {
    /// Command buffer, recording inside the render pass.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// Frame slot index, in `[0, frames_in_flight)`.
    pub frame_index: usize,
    /// Render pass the command buffer is inside.
    pub render_pass: vk::RenderPass,
    /// Drawable extent.
    pub extent: vk::Extent2D,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Frames rendered before this one.
    pub frame_number: u64,
}

impl FrameContext {
    pub(crate) fn new(info: FrameInfo, frame_number: u64) -> Self {
        Self {
            command_buffer: info.command_buffer,
            image_index: info.image_index,
            frame_index: info.frame_index,
            render_pass: info.render_pass,
            extent: info.extent,
            dt: info.frame_time,
            frame_number,
        }
    }
}
