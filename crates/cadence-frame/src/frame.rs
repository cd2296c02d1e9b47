//! Per-frame data handed to recording code.

use ash::vk;

/// The command buffer of one frame, as handed out by
/// [`begin_frame`](crate::FrameOrchestrator::begin_frame).
///
/// Carries the number of the frame it was issued for. The orchestrator
/// rejects it once that frame has ended, even though the same buffer is
/// reused when its frame slot comes round again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCommandBuffer {
    pub(crate) handle: vk::CommandBuffer,
    pub(crate) frame_number: u64,
}

impl FrameCommandBuffer {
    /// Raw handle to record into.
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// Frames begun before this one.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

/// Everything a renderer needs to record one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// The command buffer recording this frame.
    pub command_buffer: vk::CommandBuffer,
    /// Sync slot index, in `[0, frames_in_flight)`.
    pub frame_index: usize,
    /// Acquired swapchain image index.
    pub image_index: u32,
    /// Drawable extent.
    pub extent: vk::Extent2D,
    /// Render pass compatible with the chain's framebuffers.
    pub render_pass: vk::RenderPass,
    /// Seconds since the previous frame.
    pub frame_time: f32,
}

impl FrameInfo {
    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }
}

/// Emitted once per successful chain rebuild.
///
/// Per-image resources owned outside the orchestrator (descriptor sets,
/// uniform buffers) should be resized when the image count changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildEvent {
    pub previous_image_count: usize,
    pub image_count: usize,
    pub extent: vk::Extent2D,
}

impl RebuildEvent {
    /// Whether the number of swapchain images changed.
    pub fn image_count_changed(&self) -> bool {
        self.previous_image_count != self.image_count
    }
}
