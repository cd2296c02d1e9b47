//! The device seam the presentation chain and orchestrator drive.
//!
//! [`VulkanBackend`](crate::VulkanBackend) implements it over a real device.
//! Simulated devices used in tests implement it without a GPU.
//!
//! Every method that receives a handle is `unsafe`: the caller guarantees the
//! handle was created by this backend and has not been destroyed yet. Errors
//! are returned raw; classification (out-of-date, timeout, device lost) is
//! done by the caller.

use ash::vk;
use cadence_gpu::{Result, SurfaceCapabilities, SwapchainDesc};

/// Device operations required to build swapchains and drive frames.
pub trait PresentBackend {
    // Negotiation

    /// Query formats, present modes and capabilities of the target surface.
    fn surface_support(&self) -> Result<SurfaceCapabilities>;

    /// First supported depth attachment format, if any.
    fn depth_format(&self) -> Option<vk::Format>;

    // Swapchain

    /// Create a swapchain, retiring `old_swapchain` when it is not null.
    ///
    /// # Safety
    /// `old_swapchain` must be null or a live swapchain of this backend.
    unsafe fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<vk::SwapchainKHR>;

    /// Images owned by `swapchain`.
    ///
    /// # Safety
    /// `swapchain` must be live.
    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;

    /// # Safety
    /// `swapchain` must be live and no longer used by the device.
    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    // Image resources

    /// # Safety
    /// `image` must be live.
    unsafe fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView>;

    /// # Safety
    /// `view` must be live and unused by the device.
    unsafe fn destroy_image_view(&self, view: vk::ImageView);

    /// Allocate a device-local depth image.
    fn create_depth_image(&self, extent: vk::Extent2D, format: vk::Format) -> Result<vk::Image>;

    /// # Safety
    /// `image` must come from [`create_depth_image`](Self::create_depth_image)
    /// and be unused by the device.
    unsafe fn destroy_depth_image(&self, image: vk::Image);

    /// Create the chain's render pass. The colour attachment ends in
    /// `PRESENT_SRC_KHR`; the depth attachment is omitted when `depth` is `None`.
    fn create_render_pass(
        &self,
        color: vk::Format,
        depth: Option<vk::Format>,
    ) -> Result<vk::RenderPass>;

    /// # Safety
    /// `render_pass` must be live and unused by the device.
    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// # Safety
    /// `render_pass` and `attachments` must be live.
    unsafe fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;

    /// # Safety
    /// `framebuffer` must be live and unused by the device.
    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // Synchronization

    fn create_semaphore(&self) -> Result<vk::Semaphore>;

    /// # Safety
    /// `semaphore` must be live and have no pending operations.
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;

    /// # Safety
    /// `fence` must be live and have no pending operations.
    unsafe fn destroy_fence(&self, fence: vk::Fence);

    /// Wait until `fence` is signaled. Expiry surfaces as `vk::Result::TIMEOUT`.
    ///
    /// # Safety
    /// `fence` must be live.
    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()>;

    /// # Safety
    /// `fence` must be live and not pending.
    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    // Commands

    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>>;

    /// # Safety
    /// The buffers must not be pending execution.
    unsafe fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);

    /// Begin recording, implicitly resetting the buffer.
    ///
    /// # Safety
    /// `cmd` must be live and not pending execution.
    unsafe fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;

    /// # Safety
    /// `cmd` must be recording.
    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;

    /// # Safety
    /// `cmd` must be recording outside a render pass; the other handles must be live.
    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );

    /// Set a full-extent viewport (depth 0..1) and scissor.
    ///
    /// # Safety
    /// `cmd` must be recording.
    unsafe fn cmd_set_viewport_and_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D);

    /// # Safety
    /// `cmd` must be recording inside a render pass.
    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);

    // Queue

    /// Acquire the next image, signalling `semaphore` when it is ready.
    /// Returns the index and whether the swapchain is suboptimal.
    ///
    /// # Safety
    /// `swapchain` and `semaphore` must be live; `semaphore` must be unsignaled.
    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, bool)>;

    /// Submit `cmd` waiting on `wait` at colour output, signalling `signal` and `fence`.
    ///
    /// # Safety
    /// `cmd` must be executable; `fence` must be unsignaled.
    unsafe fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()>;

    /// Present `image_index` after `wait`. Returns whether the swapchain is suboptimal.
    ///
    /// # Safety
    /// `swapchain` and `wait` must be live.
    unsafe fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<bool>;

    /// Block until the device has finished all submitted work.
    fn wait_idle(&self) -> Result<()>;
}
