//! Application context.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use cadence_frame::{FrameOrchestrator, PresentationChain, VulkanBackend};
use cadence_gpu::GpuContext;
use cadence_platform::WindowSurface;
use winit::window::Window;

/// The orchestrator type driving a window.
pub type WindowOrchestrator = FrameOrchestrator<VulkanBackend, WindowSurface>;

/// Application context shared across all app methods.
pub struct AppContext {
    pub(crate) orchestrator: WindowOrchestrator,
    /// Total frames rendered.
    pub frame_count: u64,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    pub(crate) fn new(orchestrator: WindowOrchestrator) -> Self {
        Self {
            orchestrator,
            frame_count: 0,
            last_frame_time: Instant::now(),
        }
    }

    /// The window being rendered to.
    pub fn window(&self) -> &Arc<Window> {
        self.orchestrator.surface().window()
    }

    /// GPU context with device and queues.
    pub fn gpu(&self) -> &GpuContext {
        self.orchestrator.backend().gpu()
    }

    /// The current presentation chain.
    pub fn chain(&self) -> &PresentationChain<VulkanBackend> {
        self.orchestrator.chain()
    }

    /// Render pass compatible with the swapchain framebuffers.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.orchestrator.render_pass()
    }

    /// Get the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.orchestrator.extent()
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.orchestrator.aspect_ratio()
    }

    /// Get the number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.orchestrator.frames_in_flight()
    }

    /// Number of swapchain images.
    pub fn image_count(&self) -> usize {
        self.orchestrator.chain().image_count()
    }

    /// Change the colour the render pass clears to.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.orchestrator.set_clear_color(color);
    }
}
